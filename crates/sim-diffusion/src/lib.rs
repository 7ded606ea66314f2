#![deny(warnings)]

//! Spatial threshold-diffusion model: social circles built from toroidal
//! proximity, threshold assignment with innovator seeding, social shifting,
//! and the monthly two-pass spread under the infection or influence rule.

use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use sim_core::{
    mean, median, round_dp, AdoptionStatus, Household, ModelLedger, OriginTag, ThresholdMode,
    Torus,
};
use tracing::info;

/// Rebuild every household's social circle from its current position and
/// refresh the circle-size statistics. Runs at setup and after shifting.
pub fn build_circles(ledger: &mut ModelLedger, households: &mut [Household], torus: &Torus) {
    let mut sizes = Vec::with_capacity(households.len());
    for i in 0..households.len() {
        sizes.push(
            torus
                .neighbors_within(households, i, ledger.social_reach, false)
                .len(),
        );
    }
    for (h, &n) in households.iter_mut().zip(&sizes) {
        h.circle_size = n;
    }

    ledger.min_circle_size = 0.0;
    ledger.av_circle_size = 0.0;
    ledger.max_circle_size = 0.0;
    if !sizes.is_empty() {
        let sizes_f: Vec<f64> = sizes.iter().map(|&n| n as f64).collect();
        ledger.min_circle_size = round_dp(sizes_f.iter().fold(f64::INFINITY, |a, &b| a.min(b)), 2);
        ledger.av_circle_size = round_dp(mean(&sizes_f), 2);
        ledger.max_circle_size = sizes_f.iter().fold(0.0f64, |a, &b| a.max(b));
    }
    ledger.n_with_no_circle = sizes.iter().filter(|&&n| n == 0).count();
}

/// Month-1 threshold assignment and innovator seeding, dispatched on the
/// configured mode.
pub fn assign_thresholds_and_seed_innovators<R: Rng>(
    ledger: &mut ModelLedger,
    households: &mut [Household],
    torus: &Torus,
    rng: &mut R,
) {
    match ledger.threshold_mode {
        ThresholdMode::OneScattered => {
            set_unit_thresholds(households);
            for i in rand::seq::index::sample(rng, households.len(), ledger.n_of_innovators) {
                seed_innovator(&mut households[i], ledger.month_counter);
            }
            ledger.count_of_innovators = ledger.n_of_innovators;
        }
        ThresholdMode::OneClustered => {
            set_unit_thresholds(households);
            let first = rng.gen_range(0..households.len());
            seed_innovator(&mut households[first], ledger.month_counter);
            grow_innovator_network(ledger, households, torus, rng);
            revoke_surplus_innovators(ledger, households, rng);
        }
        ThresholdMode::HeterogeneousUniform => {
            for h in households.iter_mut() {
                h.threshold = rng.gen_range(1..=100) as f64;
            }
            record_threshold_stats(ledger, households);
            select_innovators_by_threshold(ledger, households);
        }
        ThresholdMode::HeterogeneousNormal => {
            // Mean and standard deviation are both the configured mean;
            // out-of-range draws are replaced by the mean itself.
            let normal =
                Normal::new(ledger.mean_threshold, ledger.mean_threshold).expect("finite std dev");
            for h in households.iter_mut() {
                let draw = round_dp(1.0 + normal.sample(rng), 0);
                h.threshold = if (0.0..=100.0).contains(&draw) {
                    draw
                } else {
                    ledger.mean_threshold
                };
            }
            record_threshold_stats(ledger, households);
            select_innovators_by_threshold(ledger, households);
        }
    }
    info!(
        mode = ?ledger.threshold_mode,
        innovators = ledger.count_of_innovators,
        "thresholds assigned and innovators seeded"
    );
}

/// Unit threshold for every household with a non-empty circle: one adopting
/// neighbor is enough.
fn set_unit_thresholds(households: &mut [Household]) {
    for h in households.iter_mut().filter(|h| h.circle_size > 0) {
        h.threshold = 1.0;
    }
}

fn seed_innovator(h: &mut Household, month: u32) {
    h.adopt(month);
    h.origin = OriginTag::Innovator;
}

/// Grow adoption outward from the seed until the innovator count is
/// reached. The query radius is reach + 10 so growth favors one cluster
/// over several small ones; a cluster with no frontier left reseeds at a
/// random non-adopter.
fn grow_innovator_network<R: Rng>(
    ledger: &mut ModelLedger,
    households: &mut [Household],
    torus: &Torus,
    rng: &mut R,
) {
    ledger.count_of_innovators = households.iter().filter(|h| h.has_adopted()).count();
    while ledger.count_of_innovators < ledger.n_of_innovators {
        let adopters: Vec<usize> = households
            .iter()
            .enumerate()
            .filter(|(_, h)| h.has_adopted())
            .map(|(i, _)| i)
            .collect();
        for a in adopters {
            let frontier: Vec<usize> = torus
                .neighbors_within(households, a, ledger.social_reach + 10.0, false)
                .into_iter()
                .filter(|&i| !households[i].has_adopted())
                .collect();
            if !frontier.is_empty() {
                for i in frontier {
                    seed_innovator(&mut households[i], ledger.month_counter);
                }
            } else {
                let holdouts: Vec<usize> = households
                    .iter()
                    .enumerate()
                    .filter(|(_, h)| !h.has_adopted())
                    .map(|(i, _)| i)
                    .collect();
                match holdouts.choose(rng) {
                    Some(&i) => seed_innovator(&mut households[i], ledger.month_counter),
                    None => break,
                }
            }
        }
        ledger.count_of_innovators = households.iter().filter(|h| h.has_adopted()).count();
    }
}

/// Clustered growth may overshoot; randomly revoke the surplus back to
/// not-adopted so exactly the configured innovator count remains.
fn revoke_surplus_innovators<R: Rng>(
    ledger: &mut ModelLedger,
    households: &mut [Household],
    rng: &mut R,
) {
    if ledger.count_of_innovators <= ledger.n_of_innovators {
        return;
    }
    let surplus = ledger.count_of_innovators - ledger.n_of_innovators;
    let innovators: Vec<usize> = households
        .iter()
        .enumerate()
        .filter(|(_, h)| h.origin == OriginTag::Innovator && h.has_adopted())
        .map(|(i, _)| i)
        .collect();
    for &i in innovators.choose_multiple(rng, surplus) {
        households[i].revoke_adoption();
    }
    ledger.count_of_innovators = ledger.n_of_innovators;
}

fn record_threshold_stats(ledger: &mut ModelLedger, households: &[Household]) {
    let thresholds: Vec<f64> = households.iter().map(|h| h.threshold).collect();
    ledger.min_threshold = thresholds.iter().fold(f64::INFINITY, |a, &b| a.min(b));
    ledger.max_threshold = thresholds.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    ledger.mean_threshold_observed = mean(&thresholds);
    ledger.median_threshold = median(&thresholds);
}

/// In the heterogeneous modes innovators are not random: the households
/// with the lowest thresholds are the most susceptible and seed first.
fn select_innovators_by_threshold(ledger: &mut ModelLedger, households: &mut [Household]) {
    let mut order: Vec<usize> = (0..households.len()).collect();
    order.sort_by(|&a, &b| {
        households[a]
            .threshold
            .partial_cmp(&households[b].threshold)
            .expect("finite threshold")
    });
    for &i in order.iter().take(ledger.n_of_innovators) {
        seed_innovator(&mut households[i], ledger.month_counter);
    }
    ledger.count_of_innovators = ledger.n_of_innovators;
}

/// Population adoption percentage on the population-1000 basis of the
/// reference model, appended to the run's time series.
pub fn record_adoption_rate(ledger: &mut ModelLedger, households: &[Household]) {
    let adopters = households.iter().filter(|h| h.has_adopted()).count();
    ledger.adopters_percent = adopters as f64 / 10.0;
    ledger.adoption_percent_record.push(ledger.adopters_percent);
}

/// A sampled share of households each takes one step in a random compass
/// direction, clamped at the grid edge. Circles must be rebuilt afterwards.
pub fn shift<R: Rng>(
    ledger: &mut ModelLedger,
    households: &mut [Household],
    torus: &Torus,
    rng: &mut R,
) {
    ledger.n_of_shifters =
        ((ledger.social_shift_percent * 10.0) as usize).min(households.len());
    for i in rand::seq::index::sample(rng, households.len(), ledger.n_of_shifters) {
        let (dx, dy) = match rng.gen_range(1..=8) {
            1 => (-1.0, 1.0),
            2 => (0.0, 1.0),
            3 => (1.0, 1.0),
            4 => (1.0, 0.0),
            5 => (1.0, -1.0),
            6 => (0.0, -1.0),
            7 => (-1.0, -1.0),
            _ => (-1.0, 0.0),
        };
        let (nx, ny) = torus.step_clamped(households[i].pos(), dx, dy);
        households[i].x = nx;
        households[i].y = ny;
    }
}

/// Monthly spread: mark pending adopters under the mode's rule, then commit
/// them in a second pass so a same-month adoption is never read by another
/// household's decision. Records the adoption rate afterwards.
pub fn spread(ledger: &mut ModelLedger, households: &mut [Household], torus: &Torus) {
    if ledger.threshold_mode.spreads_by_infection() {
        spread_by_infection(ledger, households, torus);
    } else {
        spread_by_influence(ledger, households, torus);
    }

    for h in households.iter_mut() {
        if h.adoption == AdoptionStatus::PendingAdopt {
            h.adopt(ledger.month_counter);
        }
    }

    record_adoption_rate(ledger, households);
}

/// Infection rule: any non-adopter with a non-empty circle and at least one
/// adopting neighbor within reach becomes pending.
pub fn spread_by_infection(ledger: &ModelLedger, households: &mut [Household], torus: &Torus) {
    let candidates: Vec<usize> = households
        .iter()
        .enumerate()
        .filter(|(_, h)| h.adoption == AdoptionStatus::NotAdopted && h.circle_size > 0)
        .map(|(i, _)| i)
        .collect();
    for i in candidates {
        let adopting = torus
            .neighbors_within(households, i, ledger.social_reach, false)
            .into_iter()
            .filter(|&j| households[j].has_adopted())
            .count();
        households[i].adopting_friends = adopting;
        if adopting >= 1 {
            households[i].adoption = AdoptionStatus::PendingAdopt;
        }
    }
}

/// Influence rule: a non-adopter compares the adopting percentage of its
/// circle against its own threshold. Households with an empty circle use
/// the population-wide adoption percentage instead.
pub fn spread_by_influence(ledger: &ModelLedger, households: &mut [Household], torus: &Torus) {
    for h in households
        .iter_mut()
        .filter(|h| h.adoption == AdoptionStatus::NotAdopted && h.circle_size == 0)
    {
        h.friends_adoption_percent = ledger.adopters_percent;
    }

    let with_circle: Vec<usize> = households
        .iter()
        .enumerate()
        .filter(|(_, h)| h.adoption == AdoptionStatus::NotAdopted && h.circle_size > 0)
        .map(|(i, _)| i)
        .collect();
    for i in with_circle {
        // The reference query includes the center; the center is a
        // non-adopter, so the adopting count is unaffected.
        let adopting = torus
            .neighbors_within(households, i, ledger.social_reach, true)
            .into_iter()
            .filter(|&j| households[j].has_adopted())
            .count();
        households[i].adopting_friends = adopting;
        households[i].friends_adoption_percent = round_dp(
            adopting as f64 / households[i].circle_size as f64 * 100.0,
            1,
        );
    }

    for h in households
        .iter_mut()
        .filter(|h| h.adoption == AdoptionStatus::NotAdopted)
    {
        if h.friends_adoption_percent >= h.threshold {
            h.adoption = AdoptionStatus::PendingAdopt;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use sim_core::ScenarioConfig;

    fn ledger_for(cfg: &ScenarioConfig) -> ModelLedger {
        ModelLedger::from_config(cfg).unwrap()
    }

    fn grid_households(n: usize, spacing: f64) -> Vec<Household> {
        // A row of n households `spacing` apart along x.
        (0..n)
            .map(|i| Household::new(i, 10.0 + i as f64 * spacing, 50.0))
            .collect()
    }

    #[test]
    fn circles_count_neighbors_within_reach() {
        let cfg = ScenarioConfig {
            population: 100,
            social_reach: 5.0,
            ..ScenarioConfig::default()
        };
        let mut ledger = ledger_for(&cfg);
        let torus = Torus::new(100.0);
        // Three in a chain 4 apart, one isolated.
        let mut households = vec![
            Household::new(0, 10.0, 10.0),
            Household::new(1, 14.0, 10.0),
            Household::new(2, 18.0, 10.0),
            Household::new(3, 80.0, 80.0),
        ];
        build_circles(&mut ledger, &mut households, &torus);
        assert_eq!(households[0].circle_size, 1);
        assert_eq!(households[1].circle_size, 2);
        assert_eq!(households[2].circle_size, 1);
        assert_eq!(households[3].circle_size, 0);
        assert_eq!(ledger.n_with_no_circle, 1);
        assert_eq!(ledger.min_circle_size, 0.0);
        assert_eq!(ledger.max_circle_size, 2.0);
        assert_eq!(ledger.av_circle_size, 1.0);
    }

    #[test]
    fn scattered_seeding_marks_exactly_the_configured_innovators() {
        let cfg = ScenarioConfig {
            population: 100,
            innovators_percent: 2.5,
            threshold_mode: ThresholdMode::OneScattered,
            ..ScenarioConfig::default()
        };
        let mut ledger = ledger_for(&cfg);
        let torus = Torus::new(ledger.space_size);
        let mut households = grid_households(100, 1.0);
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        build_circles(&mut ledger, &mut households, &torus);
        assign_thresholds_and_seed_innovators(&mut ledger, &mut households, &torus, &mut rng);

        let adopted: Vec<&Household> = households.iter().filter(|h| h.has_adopted()).collect();
        assert_eq!(adopted.len(), 25);
        assert!(adopted.iter().all(|h| h.origin == OriginTag::Innovator));
        assert!(households
            .iter()
            .filter(|h| h.circle_size > 0)
            .all(|h| h.threshold == 1.0));
    }

    #[test]
    fn clustered_seeding_lands_on_exact_count_after_revocation() {
        let cfg = ScenarioConfig {
            population: 100,
            innovators_percent: 2.5,
            threshold_mode: ThresholdMode::OneClustered,
            social_reach: 30.0,
            ..ScenarioConfig::default()
        };
        let mut ledger = ledger_for(&cfg);
        let torus = Torus::new(ledger.space_size);
        // Everyone within reach + 10 of everyone: first growth pass
        // overshoots and the surplus must be revoked.
        let mut households = grid_households(100, 0.1);
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        build_circles(&mut ledger, &mut households, &torus);
        assign_thresholds_and_seed_innovators(&mut ledger, &mut households, &torus, &mut rng);

        assert_eq!(ledger.count_of_innovators, 25);
        assert_eq!(households.iter().filter(|h| h.has_adopted()).count(), 25);
        let revoked = households
            .iter()
            .filter(|h| !h.has_adopted())
            .all(|h| h.origin == OriginTag::None && h.time_adopted.is_none());
        assert!(revoked);
    }

    #[test]
    fn uniform_thresholds_lie_in_range_and_lowest_seed() {
        let cfg = ScenarioConfig {
            population: 200,
            innovators_percent: 2.5,
            threshold_mode: ThresholdMode::HeterogeneousUniform,
            ..ScenarioConfig::default()
        };
        let mut ledger = ledger_for(&cfg);
        let torus = Torus::new(ledger.space_size);
        let mut households = grid_households(200, 2.0);
        let mut rng = ChaCha8Rng::seed_from_u64(12);
        build_circles(&mut ledger, &mut households, &torus);
        assign_thresholds_and_seed_innovators(&mut ledger, &mut households, &torus, &mut rng);

        assert!(households
            .iter()
            .all(|h| (1.0..=100.0).contains(&h.threshold)));
        assert!(ledger.min_threshold >= 1.0);
        assert!(ledger.max_threshold <= 100.0);
        assert!(ledger.median_threshold >= ledger.min_threshold);

        // The 25 adopters must hold the lowest thresholds.
        let max_adopted = households
            .iter()
            .filter(|h| h.has_adopted())
            .map(|h| h.threshold)
            .fold(f64::NEG_INFINITY, f64::max);
        let min_holdout = households
            .iter()
            .filter(|h| !h.has_adopted())
            .map(|h| h.threshold)
            .fold(f64::INFINITY, f64::min);
        assert_eq!(households.iter().filter(|h| h.has_adopted()).count(), 25);
        assert!(max_adopted <= min_holdout);
    }

    #[test]
    fn normal_thresholds_out_of_range_fall_back_to_mean() {
        let cfg = ScenarioConfig {
            population: 500,
            threshold_mode: ThresholdMode::HeterogeneousNormal,
            mean_threshold: 50.0,
            ..ScenarioConfig::default()
        };
        let mut ledger = ledger_for(&cfg);
        let torus = Torus::new(ledger.space_size);
        let mut households = grid_households(500, 1.0);
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        build_circles(&mut ledger, &mut households, &torus);
        assign_thresholds_and_seed_innovators(&mut ledger, &mut households, &torus, &mut rng);

        assert!(households
            .iter()
            .all(|h| (0.0..=100.0).contains(&h.threshold)));
        // sd = mean = 50 guarantees replaced draws; the fallback is exact.
        assert!(households.iter().any(|h| h.threshold == 50.0));
    }

    #[test]
    fn infection_needs_an_adopting_neighbor_and_a_circle() {
        let cfg = ScenarioConfig {
            population: 100,
            social_reach: 5.0,
            ..ScenarioConfig::default()
        };
        let mut ledger = ledger_for(&cfg);
        let torus = Torus::new(100.0);
        let mut households = vec![
            Household::new(0, 10.0, 10.0), // adopter
            Household::new(1, 13.0, 10.0), // neighbor, adopts
            Household::new(2, 30.0, 10.0), // out of reach
            Household::new(3, 80.0, 80.0), // no circle at all
        ];
        build_circles(&mut ledger, &mut households, &torus);
        households[0].adopt(1);
        ledger.month_counter = 2;
        spread(&mut ledger, &mut households, &torus);

        assert!(households[1].has_adopted());
        assert_eq!(households[1].time_adopted, Some(2));
        assert!(!households[2].has_adopted());
        assert!(!households[3].has_adopted());
        assert_eq!(ledger.adoption_percent_record.len(), 1);
    }

    #[test]
    fn spread_commits_in_a_second_pass() {
        // Chain a-b-c: b is in a's reach, c only in b's. A same-month read
        // of b's new status would infect c immediately; the two-pass commit
        // must not.
        let cfg = ScenarioConfig {
            population: 100,
            social_reach: 5.0,
            ..ScenarioConfig::default()
        };
        let mut ledger = ledger_for(&cfg);
        let torus = Torus::new(100.0);
        let mut households = vec![
            Household::new(0, 10.0, 10.0),
            Household::new(1, 14.0, 10.0),
            Household::new(2, 18.0, 10.0),
        ];
        build_circles(&mut ledger, &mut households, &torus);
        households[0].adopt(1);
        ledger.month_counter = 2;
        spread(&mut ledger, &mut households, &torus);
        assert!(households[1].has_adopted());
        assert!(!households[2].has_adopted());

        ledger.month_counter = 3;
        spread(&mut ledger, &mut households, &torus);
        assert!(households[2].has_adopted());
        assert_eq!(households[2].time_adopted, Some(3));
    }

    #[test]
    fn marking_pass_is_idempotent_within_a_month() {
        let cfg = ScenarioConfig {
            population: 100,
            social_reach: 5.0,
            ..ScenarioConfig::default()
        };
        let mut ledger = ledger_for(&cfg);
        let torus = Torus::new(100.0);
        let mut households = vec![
            Household::new(0, 10.0, 10.0),
            Household::new(1, 14.0, 10.0),
            Household::new(2, 18.0, 10.0),
        ];
        build_circles(&mut ledger, &mut households, &torus);
        households[0].adopt(1);

        spread_by_infection(&ledger, &mut households, &torus);
        let pending_once: Vec<AdoptionStatus> =
            households.iter().map(|h| h.adoption).collect();
        spread_by_infection(&ledger, &mut households, &torus);
        let pending_twice: Vec<AdoptionStatus> =
            households.iter().map(|h| h.adoption).collect();
        assert_eq!(pending_once, pending_twice);
    }

    #[test]
    fn influence_uses_population_percent_for_empty_circles() {
        let cfg = ScenarioConfig {
            population: 100,
            social_reach: 5.0,
            threshold_mode: ThresholdMode::HeterogeneousUniform,
            ..ScenarioConfig::default()
        };
        let mut ledger = ledger_for(&cfg);
        let torus = Torus::new(100.0);
        let mut households = vec![
            Household::new(0, 10.0, 10.0),
            Household::new(1, 80.0, 80.0), // isolated
        ];
        build_circles(&mut ledger, &mut households, &torus);
        households[1].threshold = 40.0;
        ledger.adopters_percent = 45.0;
        ledger.month_counter = 2;
        spread(&mut ledger, &mut households, &torus);
        // 45% population adoption meets the isolated household's threshold.
        assert!(households[1].has_adopted());
        assert_eq!(households[1].friends_adoption_percent, 45.0);
    }

    #[test]
    fn influence_compares_circle_percentage_to_threshold() {
        let cfg = ScenarioConfig {
            population: 100,
            social_reach: 5.0,
            threshold_mode: ThresholdMode::HeterogeneousUniform,
            ..ScenarioConfig::default()
        };
        let mut ledger = ledger_for(&cfg);
        let torus = Torus::new(100.0);
        // Center household with two neighbors, one adopting => 50%.
        let mut households = vec![
            Household::new(0, 10.0, 10.0),
            Household::new(1, 13.0, 10.0),
            Household::new(2, 7.0, 10.0),
        ];
        build_circles(&mut ledger, &mut households, &torus);
        households[1].adopt(1);
        households[0].threshold = 50.0;
        households[2].threshold = 80.0;
        ledger.month_counter = 2;
        spread(&mut ledger, &mut households, &torus);

        assert!(households[0].has_adopted());
        assert_eq!(households[0].friends_adoption_percent, 50.0);
        // 7.0 is within 5 of 10.0 only; its circle is {0, 1}? No: distance
        // to household 1 is 6, so its circle is {0} and 0 had not adopted
        // at marking time => 0% < 80.
        assert!(!households[2].has_adopted());
    }

    #[test]
    fn shifting_moves_one_clamped_step() {
        let cfg = ScenarioConfig {
            population: 100,
            social_shift_percent: 100.0,
            ..ScenarioConfig::default()
        };
        let mut ledger = ledger_for(&cfg);
        let torus = Torus::new(ledger.space_size);
        let mut households = grid_households(100, 1.0);
        let before: Vec<(f64, f64)> = households.iter().map(|h| h.pos()).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(17);
        shift(&mut ledger, &mut households, &torus, &mut rng);

        assert_eq!(ledger.n_of_shifters, 100);
        let max = ledger.space_size - 1.0;
        for (h, b) in households.iter().zip(&before) {
            assert!((h.x - b.0).abs() <= 1.0 && (h.y - b.1).abs() <= 1.0);
            assert!((0.0..=max).contains(&h.x) && (0.0..=max).contains(&h.y));
        }
        assert!(households.iter().zip(&before).any(|(h, b)| h.pos() != *b));
    }

    #[test]
    fn adoption_rate_uses_population_1000_basis() {
        let cfg = ScenarioConfig::default();
        let mut ledger = ledger_for(&cfg);
        let mut households = grid_households(1000, 0.3);
        for h in households.iter_mut().take(25) {
            h.adopt(1);
        }
        record_adoption_rate(&mut ledger, &households);
        assert_eq!(ledger.adopters_percent, 2.5);
        assert_eq!(ledger.adoption_percent_record, vec![2.5]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn adoption_is_monotonic_under_spread(seed in 0u64..200, months in 1u32..6) {
            let cfg = ScenarioConfig {
                population: 100,
                innovators_percent: 2.5,
                social_reach: 10.0,
                ..ScenarioConfig::default()
            };
            let mut ledger = ledger_for(&cfg);
            let torus = Torus::new(ledger.space_size);
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut households: Vec<Household> = (0..100)
                .map(|i| {
                    let x = rng.gen_range(0..ledger.space_size as u32) as f64;
                    let y = rng.gen_range(0..ledger.space_size as u32) as f64;
                    Household::new(i, x, y)
                })
                .collect();
            build_circles(&mut ledger, &mut households, &torus);
            assign_thresholds_and_seed_innovators(&mut ledger, &mut households, &torus, &mut rng);

            let mut adopted: Vec<bool> = households.iter().map(|h| h.has_adopted()).collect();
            for m in 0..months {
                ledger.month_counter = 2 + m;
                shift(&mut ledger, &mut households, &torus, &mut rng);
                build_circles(&mut ledger, &mut households, &torus);
                spread(&mut ledger, &mut households, &torus);
                for (h, was) in households.iter().zip(&adopted) {
                    prop_assert!(h.has_adopted() >= *was, "adoption reverted");
                }
                adopted = households.iter().map(|h| h.has_adopted()).collect();
            }
        }
    }
}

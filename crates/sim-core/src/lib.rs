#![deny(warnings)]

//! Core domain models and invariants for the bank-run simulation.
//!
//! This crate defines the household and bank records, the model-wide ledger,
//! scenario configuration with validation, the toroidal space helper, and the
//! per-month reporting snapshot shared across the simulation crates.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Configuration errors, all fatal at setup.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// Loan product name not recognized.
    #[error("unknown loan type: {0}")]
    UnknownLoanType(String),
    /// Threshold mode name not recognized.
    #[error("unknown threshold mode: {0}")]
    UnknownThresholdMode(String),
    /// A numeric parameter is outside its valid range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Round half to even at `dp` decimal places.
///
/// The ledger arithmetic rounds at fixed points (0, 1, 2, 3 or 6 decimals)
/// and later phases feed the rounded figures into ratio thresholds, so the
/// rounding rule is load-bearing.
pub fn round_dp(value: f64, dp: u32) -> f64 {
    let factor = 10f64.powi(dp as i32);
    let scaled = value * factor;
    let floor = scaled.floor();
    let frac = scaled - floor;
    let rounded = if (frac - 0.5).abs() < 1e-9 {
        if (floor as i64).rem_euclid(2) == 0 {
            floor
        } else {
            floor + 1.0
        }
    } else {
        scaled.round()
    };
    rounded / factor
}

/// Arithmetic mean, 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Median, 0.0 for an empty slice. Averages the two middle values for even
/// lengths.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("non-finite value"));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Loan products offered by the bank. The product fixes term, size and the
/// regulatory risk weight.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanType {
    #[default]
    #[serde(rename = "mortgages")]
    Mortgages,
    #[serde(rename = "consumer loans")]
    ConsumerLoans,
}

impl LoanType {
    pub fn term_months(&self) -> u32 {
        match self {
            LoanType::Mortgages => 300,
            LoanType::ConsumerLoans => 36,
        }
    }

    pub fn size(&self) -> f64 {
        match self {
            LoanType::Mortgages => 100.0,
            LoanType::ConsumerLoans => 5.0,
        }
    }

    pub fn risk_weight_percent(&self) -> f64 {
        match self {
            LoanType::Mortgages => 50.0,
            LoanType::ConsumerLoans => 100.0,
        }
    }
}

impl FromStr for LoanType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mortgages" => Ok(LoanType::Mortgages),
            "consumer loans" => Ok(LoanType::ConsumerLoans),
            other => Err(ConfigError::UnknownLoanType(other.to_string())),
        }
    }
}

/// Threshold assignment mode. The mode also fixes the spread rule: the
/// `One-*` modes spread by infection, the heterogeneous modes by influence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThresholdMode {
    #[default]
    #[serde(rename = "One-scattered")]
    OneScattered,
    #[serde(rename = "One-clustered")]
    OneClustered,
    #[serde(rename = "Heterogeneous-uniform")]
    HeterogeneousUniform,
    #[serde(rename = "Heterogeneous-normal")]
    HeterogeneousNormal,
}

impl ThresholdMode {
    pub fn spreads_by_infection(&self) -> bool {
        matches!(
            self,
            ThresholdMode::OneScattered | ThresholdMode::OneClustered
        )
    }
}

impl FromStr for ThresholdMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "One-scattered" => Ok(ThresholdMode::OneScattered),
            "One-clustered" => Ok(ThresholdMode::OneClustered),
            "Heterogeneous-uniform" => Ok(ThresholdMode::HeterogeneousUniform),
            "Heterogeneous-normal" => Ok(ThresholdMode::HeterogeneousNormal),
            other => Err(ConfigError::UnknownThresholdMode(other.to_string())),
        }
    }
}

/// Diffusion state of a household.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdoptionStatus {
    #[default]
    NotAdopted,
    /// Marked in the first spread pass, committed in the second.
    PendingAdopt,
    Adopted,
}

/// How a household came to adopt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OriginTag {
    #[default]
    None,
    /// Seeded at setup, independent of the spread rules.
    Innovator,
}

/// Per-household financial and diffusion state.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Household {
    pub id: usize,
    pub x: f64,
    pub y: f64,

    // Economic state
    pub budget: f64,
    pub own_total_savings: f64,
    pub own_outstanding_borrowing: f64,
    /// Original principal, immutable while the loan is open.
    pub own_loan: f64,
    pub monthly_repayment: f64,
    pub capital_repayment: f64,
    pub borrowers_interest_payment: f64,
    pub savers_interest_payment: f64,
    /// Loan proceeds received this month, realized as savings next month.
    pub spent_loan: f64,
    pub own_expenditure_this_month: f64,
    pub defaulter: bool,

    // Per-month flags
    pub potential_borrower: bool,
    pub new_loan: bool,
    pub seller: bool,

    // Diffusion state
    pub circle_size: usize,
    pub threshold: f64,
    pub adoption: AdoptionStatus,
    pub time_adopted: Option<u32>,
    pub origin: OriginTag,
    pub adopting_friends: usize,
    pub friends_adoption_percent: f64,
}

impl Household {
    pub fn new(id: usize, x: f64, y: f64) -> Self {
        Household {
            id,
            x,
            y,
            ..Household::default()
        }
    }

    pub fn pos(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    pub fn has_adopted(&self) -> bool {
        self.adoption == AdoptionStatus::Adopted
    }

    /// Transition to adopted, recording the adoption month.
    pub fn adopt(&mut self, month: u32) {
        self.adoption = AdoptionStatus::Adopted;
        self.time_adopted = Some(month);
    }

    /// Revert a surplus setup-time innovator to not-adopted.
    pub fn revoke_adoption(&mut self) {
        self.adoption = AdoptionStatus::NotAdopted;
        self.time_adopted = None;
        self.origin = OriginTag::None;
    }

    /// Zero every loan-related field. Loan state is all-or-nothing: a closed
    /// loan leaves no residual repayment obligations.
    pub fn clear_loan(&mut self) {
        self.own_outstanding_borrowing = 0.0;
        self.own_loan = 0.0;
        self.monthly_repayment = 0.0;
        self.capital_repayment = 0.0;
        self.borrowers_interest_payment = 0.0;
    }

    /// `outstanding == 0 ⇔ own_loan == 0 ⇔ monthly_repayment == 0`.
    pub fn loan_state_consistent(&self) -> bool {
        let closed = self.own_outstanding_borrowing == 0.0;
        closed == (self.own_loan == 0.0) && closed == (self.monthly_repayment == 0.0)
    }
}

/// Aggregate bank state. The reference configuration runs a single bank;
/// the ledger totals are derived from it at month close.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Bank {
    pub initial_deposits: f64,
    /// Equity capital, set once at setup.
    pub capital: f64,
    /// Reset every month; written by the shock path of debt collection.
    pub bad_debts: f64,
    pub risk_weighted_exposure: f64,
}

impl Bank {
    pub fn new(num_savers: usize, initial_savings: f64, equity_capital: f64) -> Self {
        Bank {
            initial_deposits: num_savers as f64 * initial_savings,
            capital: equity_capital,
            bad_debts: 0.0,
            risk_weighted_exposure: 0.0,
        }
    }
}

/// Run parameters as supplied by the modeler. All fields default to the
/// reference scenario.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub population: usize,
    pub loan_type: LoanType,
    pub annual_loan_rate_percent: f64,
    pub num_savers: usize,
    pub initial_savings: f64,
    pub equity_capital: f64,
    pub target_reserve_ratio_percent: f64,
    pub shock: bool,
    pub shock_month: u32,
    pub defaulters_percent: f64,
    pub annual_savers_rate_percent: f64,
    pub target_capital_adequacy_ratio_percent: f64,
    pub affordability_test: bool,
    pub bank_run: bool,
    pub social_shifting: bool,
    pub social_shift_percent: f64,
    pub social_reach: f64,
    pub innovators_percent: f64,
    pub threshold_mode: ThresholdMode,
    pub mean_threshold: f64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        ScenarioConfig {
            population: 1000,
            loan_type: LoanType::Mortgages,
            annual_loan_rate_percent: 5.0,
            num_savers: 100,
            initial_savings: 10.0,
            equity_capital: 1000.0,
            target_reserve_ratio_percent: 10.0,
            shock: false,
            shock_month: 12,
            defaulters_percent: 1.0,
            annual_savers_rate_percent: 2.0,
            target_capital_adequacy_ratio_percent: 10.0,
            affordability_test: true,
            bank_run: true,
            social_shifting: true,
            social_shift_percent: 5.0,
            social_reach: 30.0,
            innovators_percent: 2.5,
            threshold_mode: ThresholdMode::OneScattered,
            mean_threshold: 50.0,
        }
    }
}

impl ScenarioConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population == 0 {
            return Err(ConfigError::InvalidParameter(
                "population must be > 0".into(),
            ));
        }
        if self.num_savers > self.population {
            return Err(ConfigError::InvalidParameter(
                "num_savers exceeds population".into(),
            ));
        }
        for (name, pct) in [
            ("defaulters_percent", self.defaulters_percent),
            ("social_shift_percent", self.social_shift_percent),
            ("innovators_percent", self.innovators_percent),
        ] {
            if !(0.0..=100.0).contains(&pct) {
                return Err(ConfigError::InvalidParameter(format!(
                    "{name} must be within [0, 100]"
                )));
            }
        }
        if !(0.0..=100.0).contains(&self.mean_threshold) {
            return Err(ConfigError::InvalidParameter(
                "mean_threshold must be within [0, 100]".into(),
            ));
        }
        if self.annual_loan_rate_percent < 0.0 || self.annual_savers_rate_percent < 0.0 {
            return Err(ConfigError::InvalidParameter(
                "interest rates must be non-negative".into(),
            ));
        }
        if self.social_reach <= 0.0 {
            return Err(ConfigError::InvalidParameter(
                "social_reach must be > 0".into(),
            ));
        }
        if (self.innovators_percent * 10.0) as usize > self.population {
            return Err(ConfigError::InvalidParameter(
                "innovator count exceeds population".into(),
            ));
        }
        Ok(())
    }
}

/// Side length keeping agent density at roughly 1% for the reference
/// population sizes.
pub fn space_size_for(population: usize) -> f64 {
    match population {
        1000 => 316.0,
        5000 => 706.0,
        _ => 1000.0,
    }
}

/// Bounded 2-D space with toroidal distance. Distance wraps around the
/// edges; movement does not — out-of-range steps clamp to the boundary.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Torus {
    pub size: f64,
}

impl Torus {
    pub fn new(size: f64) -> Self {
        Torus { size }
    }

    /// Euclidean distance with wrap-around on both axes.
    pub fn distance(&self, a: (f64, f64), b: (f64, f64)) -> f64 {
        let dx = (a.0 - b.0).abs();
        let dx = dx.min(self.size - dx);
        let dy = (a.1 - b.1).abs();
        let dy = dy.min(self.size - dy);
        (dx * dx + dy * dy).sqrt()
    }

    /// Indices of households within `radius` of `origin`'s position.
    /// `include_self` controls whether the origin itself may appear.
    pub fn neighbors_within(
        &self,
        households: &[Household],
        origin: usize,
        radius: f64,
        include_self: bool,
    ) -> Vec<usize> {
        let center = households[origin].pos();
        households
            .iter()
            .enumerate()
            .filter(|(i, h)| {
                (*i != origin || include_self) && self.distance(center, h.pos()) <= radius
            })
            .map(|(i, _)| i)
            .collect()
    }

    /// Apply a one-cell step, reverting an axis that would leave
    /// `[0, size - 1]`.
    pub fn step_clamped(&self, pos: (f64, f64), dx: f64, dy: f64) -> (f64, f64) {
        let max = self.size - 1.0;
        let nx = pos.0 + dx;
        let ny = pos.1 + dy;
        (
            if (0.0..=max).contains(&nx) { nx } else { pos.0 },
            if (0.0..=max).contains(&ny) { ny } else { pos.1 },
        )
    }
}

/// Process-wide simulation state: resolved run parameters plus every running
/// aggregate. Phase functions mutate it in place; there is no hidden state.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelLedger {
    // Resolved run parameters, fixed for the run
    pub population: usize,
    pub num_savers: usize,
    pub initial_savings: f64,
    pub loan_type: LoanType,
    pub loan_term_months: u32,
    pub loan_size: f64,
    pub risk_weight_loan_percent: f64,
    pub annual_loan_rate_percent: f64,
    pub monthly_loan_rate: f64,
    pub annual_savers_rate_percent: f64,
    pub monthly_savers_rate: f64,
    /// Fixed monthly cost of one loan, annuity formula at 3 decimals.
    pub monthly_cost: f64,
    pub equity_capital: f64,
    pub target_reserve_ratio_percent: f64,
    pub shock: bool,
    pub shock_month: u32,
    pub defaulters_percent: f64,
    pub target_capital_adequacy_ratio_percent: f64,
    pub affordability_test: bool,
    pub bank_run: bool,
    pub social_shifting: bool,
    pub social_shift_percent: f64,
    pub social_reach: f64,
    pub innovators_percent: f64,
    pub threshold_mode: ThresholdMode,
    pub mean_threshold: f64,
    pub space_size: f64,
    pub n_of_innovators: usize,

    pub month_counter: u32,

    // Running aggregates, recomputed every month
    pub total_initial_deposits: f64,
    pub total_deposits_at_start_of_month: f64,
    pub total_lending_at_start_of_month: f64,
    pub total_current_profit: f64,
    pub total_borrowers_interest_payments: f64,
    pub income_on_liquid_assets: f64,
    pub total_savers_interest_payments: f64,
    pub total_bad_debts: f64,
    pub total_retained_profit: f64,
    pub total_repayments: f64,
    pub total_capital_repayments: f64,
    pub total_capital: f64,
    pub total_banks_liquidity: f64,
    pub total_banks_required_liquidity: f64,
    pub banks_spare_cash: f64,
    pub total_capital_at_end_of_month: f64,
    pub total_assets_at_end_of_month: f64,
    pub total_lending_at_end_of_month: f64,
    pub total_deposits_at_end_of_month: f64,
    pub total_liabilities_at_end_of_month: f64,
    pub overall_balance_at_start_of_month: f64,
    pub overall_balance_at_end_of_month: f64,
    pub max_rwa: f64,
    pub total_risk_weighted_exposure: f64,
    pub max_lending_allowed: f64,
    pub new_loan_supply: f64,
    pub new_loans_available: f64,
    pub num_loans: usize,
    pub num_new_borrowers: usize,
    /// First month in which zero loans were issued (0 = has not happened).
    pub month_loans_stop: u32,
    pub potential_borrowers: usize,
    pub total_new_loans: f64,
    /// Spare cash went negative after issuance. Recorded, never fatal.
    pub loan_error: bool,
    /// Residual of `lending_end - (lending_start + new_loans)`.
    pub check: f64,
    pub bank_deposit_multiplier: f64,
    pub reserve_ratio_percent: f64,
    pub capital_adequacy_ratio_percent: f64,
    pub car_constraint_indicator: bool,
    pub total_expenditure: f64,
    pub num_defaulters: usize,
    pub count_borrowers: usize,
    pub count_savers: usize,
    pub count_potential_borrowers: usize,
    pub count_defaulters: usize,
    pub average_amount_borrowed: f64,
    pub average_amount_saved: f64,

    // Bank-run control state
    pub amount_withdrawn: f64,
    pub bank_liquid_assets: f64,
    /// Sticky: once true, no further month processing executes.
    pub liquidity_event: bool,
    pub liquidity_event_month: u32,

    // Diffusion control state
    pub count_of_innovators: usize,
    pub min_circle_size: f64,
    pub av_circle_size: f64,
    pub max_circle_size: f64,
    pub n_with_no_circle: usize,
    pub n_of_shifters: usize,
    pub adopters_percent: f64,
    pub adoption_percent_record: Vec<f64>,
    pub min_threshold: f64,
    pub median_threshold: f64,
    pub mean_threshold_observed: f64,
    pub max_threshold: f64,
}

impl ModelLedger {
    /// Resolve a scenario into the run-time ledger. Fails on any
    /// configuration error; nothing is silently defaulted.
    pub fn from_config(cfg: &ScenarioConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;

        let monthly_loan_rate = cfg.annual_loan_rate_percent / 12.0 / 100.0;
        let term = cfg.loan_type.term_months();
        let size = cfg.loan_type.size();
        let monthly_cost = if monthly_loan_rate > 0.0 {
            round_dp(
                size * monthly_loan_rate
                    / (1.0 - (1.0 + monthly_loan_rate).powi(-(term as i32))),
                3,
            )
        } else {
            round_dp(size / term as f64, 3)
        };

        Ok(ModelLedger {
            population: cfg.population,
            num_savers: cfg.num_savers,
            initial_savings: cfg.initial_savings,
            loan_type: cfg.loan_type,
            loan_term_months: term,
            loan_size: size,
            risk_weight_loan_percent: cfg.loan_type.risk_weight_percent(),
            annual_loan_rate_percent: cfg.annual_loan_rate_percent,
            monthly_loan_rate,
            annual_savers_rate_percent: cfg.annual_savers_rate_percent,
            monthly_cost,
            equity_capital: cfg.equity_capital,
            target_reserve_ratio_percent: cfg.target_reserve_ratio_percent,
            shock: cfg.shock,
            shock_month: cfg.shock_month,
            defaulters_percent: cfg.defaulters_percent,
            target_capital_adequacy_ratio_percent: cfg.target_capital_adequacy_ratio_percent,
            affordability_test: cfg.affordability_test,
            bank_run: cfg.bank_run,
            social_shifting: cfg.social_shifting,
            social_shift_percent: cfg.social_shift_percent,
            social_reach: cfg.social_reach,
            innovators_percent: cfg.innovators_percent,
            threshold_mode: cfg.threshold_mode,
            mean_threshold: cfg.mean_threshold,
            space_size: space_size_for(cfg.population),
            // Population-1000 basis, as the reference model
            n_of_innovators: (cfg.innovators_percent * 10.0) as usize,
            month_counter: 1,
            ..ModelLedger::default()
        })
    }
}

/// Flat per-month snapshot of the ledger aggregates, exposed to the
/// reporting sink after every month.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonthSnapshot {
    pub month: u32,
    pub capital_adequacy_ratio_percent: f64,
    pub reserve_ratio_percent: f64,
    pub total_capital: f64,
    pub total_deposits: f64,
    pub total_retained_profit: f64,
    pub total_liabilities: f64,
    pub total_liquidity: f64,
    pub total_lending: f64,
    pub total_assets: f64,
    pub overall_balance: f64,
    pub bank_deposit_multiplier: f64,
    pub car_constraint_indicator: u8,
    pub count_borrowers: usize,
    pub count_savers: usize,
    pub count_potential_borrowers: usize,
    pub count_defaulters: usize,
    pub loan_size: f64,
    pub average_amount_borrowed: f64,
    pub average_amount_saved: f64,
    pub borrowers_interest_payments: f64,
    pub liquid_asset_income: f64,
    pub savers_interest_payments: f64,
    pub bad_debts: f64,
    pub current_profit: f64,
    pub deposits_at_start_of_month: f64,
    pub required_liquidity: f64,
    pub lending_at_start_of_month: f64,
    pub new_loan_supply: f64,
    pub new_loans_made: f64,
    pub capital_repayments: f64,
    pub total_repayments: f64,
    pub total_expenditure: f64,
    pub risk_weighted_exposure: f64,
    pub adopters_percent: f64,
    pub liquid_assets: f64,
    pub liquidity_event: bool,
    pub liquidity_event_month: u32,
}

impl MonthSnapshot {
    pub fn capture(ledger: &ModelLedger) -> Self {
        MonthSnapshot {
            month: ledger.month_counter,
            capital_adequacy_ratio_percent: ledger.capital_adequacy_ratio_percent,
            reserve_ratio_percent: ledger.reserve_ratio_percent,
            total_capital: ledger.total_capital_at_end_of_month,
            total_deposits: ledger.total_deposits_at_end_of_month,
            total_retained_profit: ledger.total_retained_profit,
            total_liabilities: ledger.total_liabilities_at_end_of_month,
            total_liquidity: ledger.total_banks_liquidity,
            total_lending: ledger.total_lending_at_end_of_month,
            total_assets: ledger.total_assets_at_end_of_month,
            overall_balance: ledger.overall_balance_at_end_of_month,
            bank_deposit_multiplier: ledger.bank_deposit_multiplier,
            car_constraint_indicator: ledger.car_constraint_indicator as u8,
            count_borrowers: ledger.count_borrowers,
            count_savers: ledger.count_savers,
            count_potential_borrowers: ledger.count_potential_borrowers,
            count_defaulters: ledger.count_defaulters,
            loan_size: ledger.loan_size,
            average_amount_borrowed: ledger.average_amount_borrowed,
            average_amount_saved: ledger.average_amount_saved,
            borrowers_interest_payments: ledger.total_borrowers_interest_payments,
            liquid_asset_income: ledger.income_on_liquid_assets,
            savers_interest_payments: ledger.total_savers_interest_payments,
            bad_debts: ledger.total_bad_debts,
            current_profit: ledger.total_current_profit,
            deposits_at_start_of_month: ledger.total_deposits_at_start_of_month,
            required_liquidity: ledger.total_banks_required_liquidity,
            lending_at_start_of_month: ledger.total_lending_at_start_of_month,
            new_loan_supply: ledger.new_loan_supply,
            new_loans_made: ledger.total_new_loans,
            capital_repayments: ledger.total_capital_repayments,
            total_repayments: ledger.total_repayments,
            total_expenditure: ledger.total_expenditure,
            risk_weighted_exposure: ledger.total_risk_weighted_exposure,
            adopters_percent: ledger.adopters_percent,
            liquid_assets: ledger.bank_liquid_assets,
            liquidity_event: ledger.liquidity_event,
            liquidity_event_month: ledger.liquidity_event_month,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn round_half_to_even() {
        assert_eq!(round_dp(0.5, 0), 0.0);
        assert_eq!(round_dp(1.5, 0), 2.0);
        assert_eq!(round_dp(2.5, 0), 2.0);
        assert_eq!(round_dp(0.0625, 3), 0.062);
        assert_eq!(round_dp(0.0635, 3), 0.064);
        assert_eq!(round_dp(1.2345678, 6), 1.234568);
        assert_eq!(round_dp(-1.5, 0), -2.0);
        assert_eq!(round_dp(-2.5, 0), -2.0);
    }

    #[test]
    fn mean_and_median_of_empty_are_zero() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(median(&[]), 0.0);
    }

    #[test]
    fn median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
    }

    #[test]
    fn mortgage_monthly_cost_annuity() {
        let ledger = ModelLedger::from_config(&ScenarioConfig::default()).unwrap();
        assert_eq!(ledger.loan_term_months, 300);
        assert_eq!(ledger.loan_size, 100.0);
        assert_eq!(ledger.risk_weight_loan_percent, 50.0);
        assert!((ledger.monthly_cost - 0.585).abs() < 1e-9);
    }

    #[test]
    fn zero_rate_monthly_cost_is_pro_rata() {
        let cfg = ScenarioConfig {
            annual_loan_rate_percent: 0.0,
            loan_type: LoanType::ConsumerLoans,
            ..ScenarioConfig::default()
        };
        let ledger = ModelLedger::from_config(&cfg).unwrap();
        assert!((ledger.monthly_cost - round_dp(5.0 / 36.0, 3)).abs() < 1e-9);
    }

    #[test]
    fn unknown_names_are_fatal() {
        assert_eq!(
            "payday loans".parse::<LoanType>(),
            Err(ConfigError::UnknownLoanType("payday loans".into()))
        );
        assert_eq!(
            "Two-scattered".parse::<ThresholdMode>(),
            Err(ConfigError::UnknownThresholdMode("Two-scattered".into()))
        );
    }

    #[test]
    fn config_rejects_out_of_range_parameters() {
        let cfg = ScenarioConfig {
            num_savers: 2000,
            ..ScenarioConfig::default()
        };
        assert!(matches!(
            ModelLedger::from_config(&cfg),
            Err(ConfigError::InvalidParameter(_))
        ));

        let cfg = ScenarioConfig {
            innovators_percent: 150.0,
            ..ScenarioConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn space_size_tracks_density() {
        assert_eq!(space_size_for(1000), 316.0);
        assert_eq!(space_size_for(5000), 706.0);
        assert_eq!(space_size_for(250), 1000.0);
    }

    #[test]
    fn toroidal_distance_wraps() {
        let torus = Torus::new(100.0);
        assert_eq!(torus.distance((1.0, 50.0), (99.0, 50.0)), 2.0);
        assert_eq!(torus.distance((50.0, 1.0), (50.0, 99.0)), 2.0);
        assert_eq!(torus.distance((10.0, 10.0), (13.0, 14.0)), 5.0);
    }

    #[test]
    fn step_clamps_instead_of_wrapping() {
        let torus = Torus::new(100.0);
        // At the origin a south-west step reverts both axes.
        assert_eq!(torus.step_clamped((0.0, 0.0), -1.0, -1.0), (0.0, 0.0));
        // Only the out-of-range axis reverts.
        assert_eq!(torus.step_clamped((0.0, 50.0), -1.0, 1.0), (0.0, 51.0));
        assert_eq!(torus.step_clamped((99.0, 99.0), 1.0, -1.0), (99.0, 98.0));
    }

    #[test]
    fn neighbors_exclude_self_unless_asked() {
        let torus = Torus::new(100.0);
        let households = vec![
            Household::new(0, 10.0, 10.0),
            Household::new(1, 12.0, 10.0),
            Household::new(2, 90.0, 90.0),
        ];
        let excl = torus.neighbors_within(&households, 0, 5.0, false);
        assert_eq!(excl, vec![1]);
        let incl = torus.neighbors_within(&households, 0, 5.0, true);
        assert_eq!(incl, vec![0, 1]);
    }

    #[test]
    fn loan_invariant_detects_partial_state() {
        let mut h = Household::new(0, 0.0, 0.0);
        assert!(h.loan_state_consistent());
        h.own_loan = 100.0;
        assert!(!h.loan_state_consistent());
        h.own_outstanding_borrowing = 100.0;
        h.monthly_repayment = 0.585;
        assert!(h.loan_state_consistent());
        h.clear_loan();
        assert!(h.loan_state_consistent());
    }

    #[test]
    fn scenario_field_names_roundtrip() {
        let cfg = ScenarioConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains("\"loan_type\":\"mortgages\""));
        assert!(json.contains("\"threshold_mode\":\"One-scattered\""));
        let back: ScenarioConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.population, 1000);
        assert_eq!(back.threshold_mode, ThresholdMode::OneScattered);
    }

    proptest! {
        #[test]
        fn round_dp_is_idempotent(v in -10_000.0f64..10_000.0, dp in 0u32..6) {
            let once = round_dp(v, dp);
            prop_assert_eq!(round_dp(once, dp), once);
        }

        #[test]
        fn round_dp_stays_within_half_step(v in -10_000.0f64..10_000.0, dp in 0u32..6) {
            let factor = 10f64.powi(dp as i32);
            prop_assert!((round_dp(v, dp) - v).abs() <= 0.5 / factor + 1e-9);
        }

        #[test]
        fn toroidal_distance_symmetric(ax in 0.0f64..316.0, ay in 0.0f64..316.0,
                                       bx in 0.0f64..316.0, by in 0.0f64..316.0) {
            let torus = Torus::new(316.0);
            let d1 = torus.distance((ax, ay), (bx, by));
            let d2 = torus.distance((bx, by), (ax, ay));
            prop_assert!((d1 - d2).abs() < 1e-9);
            // Never farther than half the diagonal
            prop_assert!(d1 <= (2.0f64).sqrt() * 158.0 + 1e-9);
        }
    }
}

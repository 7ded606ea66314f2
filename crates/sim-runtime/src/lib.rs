#![deny(warnings)]

//! Simulation controller: owns the scenario state and the seeded RNG, wires
//! the banking and diffusion phases in their fixed monthly order, enforces
//! the liquidity-event circuit breaker, and records a snapshot per month.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sim_core::{
    Bank, ConfigError, Household, ModelLedger, MonthSnapshot, ScenarioConfig, Torus,
};
use tracing::{debug, info};

pub struct Simulation {
    pub cfg: ScenarioConfig,
    pub ledger: ModelLedger,
    pub households: Vec<Household>,
    pub bank: Bank,
    pub space: Torus,
    pub snapshots: Vec<MonthSnapshot>,
    rng: ChaCha8Rng,
    steps: u32,
}

impl Simulation {
    /// Validate the scenario, resolve the ledger parameters, and scatter the
    /// population at integer positions on the torus.
    pub fn new(cfg: ScenarioConfig, seed: u64) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let ledger = ModelLedger::from_config(&cfg)?;
        let space = Torus::new(ledger.space_size);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let side = ledger.space_size as u32;
        let households = (0..ledger.population)
            .map(|id| {
                let x = rng.gen_range(0..side) as f64;
                let y = rng.gen_range(0..side) as f64;
                Household::new(id, x, y)
            })
            .collect();
        let bank = Bank::new(cfg.num_savers, cfg.initial_savings, cfg.equity_capital);

        info!(
            population = ledger.population,
            space = ledger.space_size,
            seed,
            "simulation initialized"
        );
        Ok(Self {
            cfg,
            ledger,
            households,
            bank,
            space,
            snapshots: Vec::new(),
            rng,
            steps: 0,
        })
    }

    pub fn month(&self) -> u32 {
        self.ledger.month_counter
    }

    /// Advance one month. The first call runs the setup month; later calls
    /// run the regular cycle, which freezes entirely once the liquidity
    /// event has fired. A snapshot is recorded either way.
    pub fn step(&mut self) {
        if self.steps == 0 {
            self.setup_month();
        } else {
            self.monthly_step();
        }
        self.steps += 1;
        self.snapshots.push(MonthSnapshot::capture(&self.ledger));
    }

    pub fn run(&mut self, months: u32) {
        for _ in 0..months {
            self.step();
        }
    }

    fn setup_month(&mut self) {
        sim_banking::set_initial_deposits(&mut self.ledger, &self.bank);
        sim_banking::allocate_budgets(&mut self.households, &mut self.rng);
        sim_banking::choose_savers(&self.ledger, &mut self.households, &mut self.rng);

        if self.ledger.bank_run {
            sim_diffusion::build_circles(&mut self.ledger, &mut self.households, &self.space);
            sim_diffusion::assign_thresholds_and_seed_innovators(
                &mut self.ledger,
                &mut self.households,
                &self.space,
                &mut self.rng,
            );
        }

        sim_banking::originate_loans(
            &mut self.ledger,
            &mut self.households,
            &self.bank,
            &mut self.rng,
        );
        sim_banking::spend_loans(&mut self.households, &mut self.rng);
        sim_diffusion::record_adoption_rate(&mut self.ledger, &self.households);
        sim_banking::close_month(&mut self.ledger, &self.households, &mut self.bank);
    }

    fn monthly_step(&mut self) {
        if self.ledger.liquidity_event {
            debug!(
                month = self.ledger.month_counter,
                event_month = self.ledger.liquidity_event_month,
                "liquidity event active, month skipped"
            );
            return;
        }

        sim_banking::month_reset(&mut self.ledger, &mut self.households, &mut self.bank);
        sim_banking::collect_debts(
            &mut self.ledger,
            &mut self.households,
            &mut self.bank,
            &mut self.rng,
        );
        if self.ledger.annual_savers_rate_percent > 0.0 {
            sim_banking::pay_savers_interest(&mut self.ledger, &mut self.households);
            sim_banking::accrue_liquid_asset_income(&mut self.ledger);
        }
        sim_banking::make_deposits(&mut self.households);
        sim_banking::originate_loans(
            &mut self.ledger,
            &mut self.households,
            &self.bank,
            &mut self.rng,
        );
        sim_banking::spend_loans(&mut self.households, &mut self.rng);

        if self.ledger.bank_run {
            sim_banking::make_withdrawals(&mut self.ledger, &mut self.households);
        }
        if self.ledger.social_shifting {
            sim_diffusion::shift(
                &mut self.ledger,
                &mut self.households,
                &self.space,
                &mut self.rng,
            );
            sim_diffusion::build_circles(&mut self.ledger, &mut self.households, &self.space);
        }
        sim_diffusion::spread(&mut self.ledger, &mut self.households, &self.space);

        sim_banking::close_month(&mut self.ledger, &self.households, &mut self.bank);
    }
}

#![deny(warnings)]

//! Monthly banking-ledger cycle: budget allocation, debt collection,
//! interest accrual, deposits, loan rationing, loan spending, withdrawals
//! and the balance-sheet close.
//!
//! Every phase is a free function of `(ledger, households, bank)` plus a
//! seeded RNG where sampling is involved. Phases must run in the order the
//! controller wires them: later phases read accumulators written by earlier
//! ones, and the capital-adequacy gate reads the *previous* month's close.

use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Exp};
use sim_core::{mean, round_dp, Bank, Household, ModelLedger};
use tracing::{debug, info, warn};

/// Record the bank's opening deposit book as the run's baseline. The
/// deposit multiplier reported at every close is relative to this figure.
pub fn set_initial_deposits(ledger: &mut ModelLedger, bank: &Bank) {
    ledger.total_initial_deposits += bank.initial_deposits;
}

/// Draw each household's monthly budget as 350 + Exp(mean 650), then
/// normalize by the 3-dp-rounded sample mean so the population averages
/// 1.0 unit.
pub fn allocate_budgets<R: Rng>(households: &mut [Household], rng: &mut R) {
    // Mean 650 on top of the 350 floor gives a raw mean of 1000.
    let draw = Exp::new(1.0 / 650.0).expect("rate is positive");
    for h in households.iter_mut() {
        h.budget = 350.0 + draw.sample(rng);
    }

    let budgets: Vec<f64> = households.iter().map(|h| h.budget).collect();
    let sample_mean = round_dp(mean(&budgets), 3);
    for h in households.iter_mut() {
        h.budget = round_dp(h.budget * (1000.0 / sample_mean) / 1000.0, 3);
    }
}

/// Pick the configured number of savers uniformly without replacement and
/// endow each with the initial savings amount.
pub fn choose_savers<R: Rng>(ledger: &ModelLedger, households: &mut [Household], rng: &mut R) {
    for i in rand::seq::index::sample(rng, households.len(), ledger.num_savers) {
        households[i].own_total_savings = ledger.initial_savings;
    }
}

/// Zero the per-month accumulators and flags. Runs first in every month
/// after the setup month.
pub fn month_reset(ledger: &mut ModelLedger, households: &mut [Household], bank: &mut Bank) {
    ledger.month_counter += 1;
    ledger.max_lending_allowed = 0.0;
    ledger.new_loan_supply = 0.0;
    ledger.total_current_profit = 0.0;
    ledger.total_expenditure = 0.0;
    ledger.car_constraint_indicator = false;
    ledger.total_bad_debts = 0.0;

    for h in households.iter_mut() {
        h.potential_borrower = false;
        h.own_expenditure_this_month = 0.0;
        h.seller = false;
        h.new_loan = false;
    }

    bank.bad_debts = 0.0;
}

/// Collect scheduled repayments from borrowers, write off the defaulters
/// under a configured shock, and total the flows.
pub fn collect_debts<R: Rng>(
    ledger: &mut ModelLedger,
    households: &mut [Household],
    bank: &mut Bank,
    rng: &mut R,
) {
    if ledger.shock && ledger.month_counter == ledger.shock_month {
        let borrowers: Vec<usize> = households
            .iter()
            .enumerate()
            .filter(|(_, h)| h.own_outstanding_borrowing > 0.0)
            .map(|(i, _)| i)
            .collect();
        ledger.num_defaulters = round_dp(
            ledger.defaulters_percent / 100.0 * borrowers.len() as f64,
            0,
        ) as usize;

        let defaulted: Vec<usize> = borrowers
            .choose_multiple(rng, ledger.num_defaulters)
            .copied()
            .collect();
        let mut written_off = 0.0;
        for &i in &defaulted {
            let h = &mut households[i];
            h.defaulter = true;
            h.monthly_repayment = 0.0;
            h.borrowers_interest_payment = 0.0;
            h.capital_repayment = 0.0;
            written_off += h.own_outstanding_borrowing;
            h.own_outstanding_borrowing = 0.0;
        }
        bank.bad_debts = round_dp(written_off, 0);
        ledger.total_bad_debts = bank.bad_debts;
        if !defaulted.is_empty() {
            warn!(
                month = ledger.month_counter,
                defaulters = defaulted.len(),
                bad_debts = ledger.total_bad_debts,
                "shock: borrowers defaulted"
            );
        }
    }

    for h in households
        .iter_mut()
        .filter(|h| h.own_outstanding_borrowing > 0.0 && !h.defaulter)
    {
        h.borrowers_interest_payment =
            round_dp(h.own_outstanding_borrowing * ledger.monthly_loan_rate, 3);
        h.capital_repayment = round_dp(h.monthly_repayment - h.borrowers_interest_payment, 3);
        h.own_outstanding_borrowing =
            round_dp(h.own_outstanding_borrowing - h.capital_repayment, 3);
    }

    for h in households.iter_mut() {
        h.own_expenditure_this_month = round_dp(h.budget - h.monthly_repayment, 3);
    }

    // Households that have paid off all of their debt drop every
    // loan-related obligation at once.
    for h in households
        .iter_mut()
        .filter(|h| h.own_outstanding_borrowing <= 0.0)
    {
        h.clear_loan();
    }

    ledger.total_repayments = round_dp(
        households.iter().map(|h| h.monthly_repayment).sum::<f64>(),
        0,
    );
    ledger.total_capital_repayments = round_dp(
        households.iter().map(|h| h.capital_repayment).sum::<f64>(),
        0,
    );
    ledger.total_borrowers_interest_payments = round_dp(
        households
            .iter()
            .map(|h| h.borrowers_interest_payment)
            .sum::<f64>(),
        0,
    );
}

/// Compound one month of interest into every positive savings balance.
/// Paid in arrears, so the controller skips this in the setup month.
pub fn pay_savers_interest(ledger: &mut ModelLedger, households: &mut [Household]) {
    ledger.monthly_savers_rate = round_dp(ledger.annual_savers_rate_percent / (12.0 * 100.0), 6);

    let mut total = 0.0;
    for h in households.iter_mut() {
        if h.own_total_savings > 0.0 {
            h.savers_interest_payment =
                round_dp(h.own_total_savings * ledger.monthly_savers_rate, 6);
            h.own_total_savings += h.savers_interest_payment;
        } else {
            h.savers_interest_payment = 0.0;
        }
        total += h.savers_interest_payment;
    }
    ledger.total_savers_interest_payments = round_dp(total, 0);
}

/// Income on the bank's liquid assets, at the savers rate on the *prior*
/// month's total liquidity.
pub fn accrue_liquid_asset_income(ledger: &mut ModelLedger) {
    ledger.income_on_liquid_assets =
        round_dp(ledger.total_banks_liquidity * ledger.monthly_savers_rate, 0);
}

/// Loan proceeds received last month become savings this month.
pub fn make_deposits(households: &mut [Household]) {
    for h in households.iter_mut().filter(|h| h.spent_loan > 0.0) {
        h.own_total_savings += h.spent_loan;
        h.spent_loan = 0.0;
    }
}

/// The rationing algorithm: compute loan supply from deposits net of the
/// reserve requirement and outstanding lending, gate it on last month's
/// capital-adequacy ratio, floor to whole loans, select eligible borrowers
/// and issue.
pub fn originate_loans<R: Rng>(
    ledger: &mut ModelLedger,
    households: &mut [Household],
    bank: &Bank,
    rng: &mut R,
) {
    ledger.total_deposits_at_start_of_month =
        households.iter().map(|h| h.own_total_savings).sum::<f64>();
    ledger.total_banks_required_liquidity = round_dp(
        ledger.total_deposits_at_start_of_month * ledger.target_reserve_ratio_percent / 100.0,
        0,
    );
    ledger.total_lending_at_start_of_month = round_dp(
        households
            .iter()
            .map(|h| h.own_outstanding_borrowing)
            .sum::<f64>(),
        0,
    );
    ledger.total_capital = bank.capital;
    ledger.overall_balance_at_start_of_month = ledger.overall_balance_at_end_of_month;

    // Spare cash is included by definition: it was part of deposits not lent.
    ledger.new_loan_supply = round_dp(
        ledger.total_deposits_at_start_of_month
            - ledger.total_banks_required_liquidity
            - ledger.total_lending_at_start_of_month,
        0,
    )
    .max(0.0);

    // The capital-adequacy gate compares against the ratio computed at the
    // *previous* month's close, so it cannot bind in month 1. The one-month
    // lag is load-bearing for the rationing sequence.
    if ledger.month_counter == 1
        || ledger.capital_adequacy_ratio_percent >= ledger.target_capital_adequacy_ratio_percent
    {
        ledger.new_loans_available = ledger.new_loan_supply;
    } else {
        ledger.car_constraint_indicator = true;
        ledger.max_rwa = (ledger.total_capital + ledger.total_retained_profit)
            / (ledger.target_capital_adequacy_ratio_percent / 100.0);
        ledger.max_lending_allowed = ledger.max_rwa / (ledger.risk_weight_loan_percent / 100.0);
        ledger.new_loans_available = round_dp(
            ledger.max_lending_allowed - ledger.total_lending_at_start_of_month,
            0,
        );
        debug!(
            month = ledger.month_counter,
            car = ledger.capital_adequacy_ratio_percent,
            available = ledger.new_loans_available,
            "capital-adequacy cap binds"
        );
    }

    // Below one loan size nothing can be issued; negative available supply
    // clamps to zero loans, never a negative allocation.
    let mut num_loans = 0usize;
    if ledger.new_loans_available < ledger.loan_size {
        ledger.new_loans_available = 0.0;
    }
    if ledger.new_loans_available > 0.0 {
        num_loans = (ledger.new_loans_available / ledger.loan_size).floor() as usize;
        ledger.new_loans_available = num_loans as f64 * ledger.loan_size;
    }
    ledger.num_loans = num_loans;
    if num_loans == 0 && ledger.month_loans_stop == 0 {
        ledger.month_loans_stop = ledger.month_counter;
        info!(month = ledger.month_counter, "lending stopped");
    }

    // Eligibility: debt-free and (when the affordability test is on) half
    // the monthly budget covers the fixed monthly cost. A household that
    // defaulted this month sits the month out; it may borrow again later.
    let defaulted_this_month = ledger.shock && ledger.month_counter == ledger.shock_month;
    for h in households.iter_mut() {
        h.potential_borrower = h.own_outstanding_borrowing == 0.0
            && !(defaulted_this_month && h.defaulter)
            && (!ledger.affordability_test || 0.5 * h.budget >= ledger.monthly_cost);
    }
    let eligible: Vec<usize> = households
        .iter()
        .enumerate()
        .filter(|(_, h)| h.potential_borrower)
        .map(|(i, _)| i)
        .collect();
    ledger.potential_borrowers = eligible.len();

    // One loan each; demand is capped by supply or by eligibility.
    ledger.num_new_borrowers = num_loans.min(eligible.len());
    let takers: Vec<usize> = eligible
        .choose_multiple(rng, ledger.num_new_borrowers)
        .copied()
        .collect();
    let mut issued = 0.0;
    for &i in &takers {
        let h = &mut households[i];
        h.own_loan = ledger.loan_size;
        h.own_outstanding_borrowing = h.own_loan;
        h.monthly_repayment = ledger.monthly_cost;
        h.new_loan = true;
        issued += h.own_loan;
    }
    ledger.total_new_loans = issued;

    // Spare cash is not cumulative: whatever supply was not allocated.
    ledger.banks_spare_cash = ledger.new_loan_supply - ledger.total_new_loans;
    if ledger.banks_spare_cash < 0.0 {
        ledger.loan_error = true;
        warn!(
            month = ledger.month_counter,
            spare_cash = ledger.banks_spare_cash,
            "loan allocation error: spare cash negative"
        );
    }
}

/// Each new borrower's proceeds are credited in full to one uniformly
/// random household (possibly itself), realized as savings next month.
pub fn spend_loans<R: Rng>(households: &mut [Household], rng: &mut R) {
    let proceeds: Vec<f64> = households
        .iter()
        .filter(|h| h.new_loan)
        .map(|h| h.own_loan)
        .collect();
    for amount in proceeds {
        let recipient = rng.gen_range(0..households.len());
        households[recipient].spent_loan += amount;
        households[recipient].seller = true;
    }
}

/// Adopters drain their savings. Withdrawals are funded from spare cash
/// first, then from required liquidity, which may go negative; combined
/// liquid assets below zero trigger the sticky liquidity event.
pub fn make_withdrawals(ledger: &mut ModelLedger, households: &mut [Household]) {
    ledger.amount_withdrawn = 0.0;
    for h in households
        .iter_mut()
        .filter(|h| h.has_adopted() && h.own_total_savings > 0.0)
    {
        ledger.amount_withdrawn += h.own_total_savings;
        h.own_total_savings = 0.0;
        h.spent_loan = 0.0;
    }

    let buffer = ledger.banks_spare_cash - ledger.amount_withdrawn;
    if buffer >= 0.0 {
        ledger.banks_spare_cash = buffer;
    } else {
        ledger.banks_spare_cash = 0.0;
        ledger.total_banks_required_liquidity += buffer;
    }

    ledger.bank_liquid_assets = round_dp(
        ledger.total_banks_required_liquidity + ledger.banks_spare_cash,
        1,
    );
    if ledger.bank_liquid_assets < 0.0 && !ledger.liquidity_event {
        ledger.liquidity_event = true;
        ledger.liquidity_event_month = ledger.month_counter;
        info!(
            month = ledger.month_counter,
            liquid_assets = ledger.bank_liquid_assets,
            withdrawn = ledger.amount_withdrawn,
            "liquidity event: withdrawals exhausted liquid assets"
        );
    }
}

/// Month close: profit, end-of-month balance sheet, ratios, the `check`
/// residual, and borrower/saver statistics. Degenerate denominators
/// resolve to zero, never raise.
pub fn close_month(ledger: &mut ModelLedger, households: &[Household], bank: &mut Bank) {
    ledger.total_current_profit = ledger.total_borrowers_interest_payments
        + ledger.income_on_liquid_assets
        - ledger.total_savers_interest_payments
        - ledger.total_bad_debts;
    ledger.total_retained_profit += ledger.total_current_profit;

    ledger.total_deposits_at_end_of_month = round_dp(
        households.iter().map(|h| h.own_total_savings).sum::<f64>(),
        0,
    );
    ledger.total_lending_at_end_of_month = round_dp(
        households
            .iter()
            .map(|h| h.own_outstanding_borrowing)
            .sum::<f64>(),
        0,
    );
    ledger.total_expenditure = round_dp(
        households
            .iter()
            .map(|h| h.own_expenditure_this_month)
            .sum::<f64>(),
        0,
    );

    ledger.total_capital_at_end_of_month = bank.capital;
    ledger.total_liabilities_at_end_of_month = ledger.total_deposits_at_end_of_month
        + ledger.total_capital_at_end_of_month
        + ledger.total_retained_profit;
    ledger.total_banks_liquidity = ledger.total_banks_required_liquidity
        + ledger.banks_spare_cash
        + ledger.total_retained_profit
        + ledger.total_capital_at_end_of_month;
    ledger.total_assets_at_end_of_month =
        ledger.total_banks_liquidity + ledger.total_lending_at_end_of_month;
    ledger.overall_balance_at_end_of_month = round_dp(
        ledger.total_assets_at_end_of_month - ledger.total_liabilities_at_end_of_month,
        0,
    );

    // Start-of-month lending already reflects this month's repayments, so
    // the residual is capital repayments plus defaults, within rounding.
    ledger.check = ledger.total_lending_at_end_of_month
        - (ledger.total_lending_at_start_of_month + ledger.total_new_loans);

    ledger.reserve_ratio_percent = if ledger.total_deposits_at_end_of_month > 0.0 {
        round_dp(
            ledger.total_banks_liquidity / ledger.total_deposits_at_end_of_month * 100.0,
            3,
        )
    } else {
        0.0
    };

    bank.risk_weighted_exposure =
        ledger.total_lending_at_end_of_month * ledger.risk_weight_loan_percent / 100.0;
    ledger.total_risk_weighted_exposure = bank.risk_weighted_exposure;
    ledger.capital_adequacy_ratio_percent = if ledger.total_risk_weighted_exposure > 0.0 {
        round_dp(
            (ledger.total_capital + ledger.total_retained_profit)
                / ledger.total_risk_weighted_exposure
                * 100.0,
            2,
        )
        .max(0.0)
    } else {
        0.0
    };

    // Households hold no cash, so the deposit and money multipliers agree.
    ledger.bank_deposit_multiplier = if ledger.total_initial_deposits > 0.0 {
        ledger.total_deposits_at_end_of_month / ledger.total_initial_deposits
    } else {
        0.0
    };

    let mut amounts_borrowed = Vec::new();
    let mut amounts_saved = Vec::new();
    ledger.count_borrowers = 0;
    ledger.count_savers = 0;
    ledger.count_potential_borrowers = 0;
    ledger.count_defaulters = 0;
    for h in households {
        if h.own_outstanding_borrowing > 0.0 {
            ledger.count_borrowers += 1;
            amounts_borrowed.push(h.own_outstanding_borrowing);
        }
        if h.own_total_savings >= ledger.initial_savings {
            ledger.count_savers += 1;
            amounts_saved.push(h.own_total_savings);
        }
        if h.potential_borrower {
            ledger.count_potential_borrowers += 1;
        }
        if h.defaulter {
            ledger.count_defaulters += 1;
        }
    }
    ledger.average_amount_borrowed = mean(&amounts_borrowed);
    ledger.average_amount_saved = mean(&amounts_saved);

    debug!(
        month = ledger.month_counter,
        assets = ledger.total_assets_at_end_of_month,
        liabilities = ledger.total_liabilities_at_end_of_month,
        lending = ledger.total_lending_at_end_of_month,
        deposits = ledger.total_deposits_at_end_of_month,
        "month closed"
    );
}

#![deny(warnings)]

//! Headless CLI: run a bank-run scenario for a number of months and dump the
//! monthly snapshots as JSON.

use anyhow::{Context, Result};
use sim_core::ScenarioConfig;
use sim_runtime::Simulation;
use tracing::info;
use tracing_subscriber::EnvFilter;

struct Args {
    scenario: Option<String>,
    months: u32,
    seed: u64,
    out: Option<String>,
}

fn parse_args() -> Args {
    let mut args = Args {
        scenario: None,
        months: 60,
        seed: 42,
        out: None,
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--scenario" => args.scenario = it.next(),
            "--months" => {
                args.months = it.next().and_then(|s| s.parse().ok()).unwrap_or(args.months)
            }
            "--seed" => args.seed = it.next().and_then(|s| s.parse().ok()).unwrap_or(args.seed),
            "--out" => args.out = it.next(),
            "--version" => {
                println!(
                    "bankrun {} ({})",
                    env!("CARGO_PKG_VERSION"),
                    env!("GIT_SHA")
                );
                std::process::exit(0);
            }
            _ => {}
        }
    }
    args
}

fn load_scenario(path: Option<&str>) -> Result<ScenarioConfig> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading scenario file {path}"))?;
            serde_yaml::from_str(&text).with_context(|| format!("parsing scenario file {path}"))
        }
        None => Ok(ScenarioConfig::default()),
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = parse_args();
    let cfg = load_scenario(args.scenario.as_deref())?;
    info!(
        months = args.months,
        seed = args.seed,
        scenario = args.scenario.as_deref().unwrap_or("<default>"),
        "starting run"
    );

    let mut sim = Simulation::new(cfg, args.seed)?;
    sim.run(args.months);

    let last = sim.snapshots.last().context("no months simulated")?;
    println!(
        "Run | months: {} | CAR: {:.2}% | reserve: {:.3}% | lending: {} | deposits: {} | retained profit: {}",
        last.month,
        last.capital_adequacy_ratio_percent,
        last.reserve_ratio_percent,
        last.total_lending,
        last.total_deposits,
        last.total_retained_profit
    );
    println!(
        "Diffusion | adoption: {:.1}% | innovators: {} | avg circle: {:.2}",
        sim.ledger.adopters_percent,
        sim.ledger.count_of_innovators,
        sim.ledger.av_circle_size
    );
    if last.liquidity_event {
        println!(
            "Liquidity event in month {} (withdrawn: {})",
            last.liquidity_event_month, sim.ledger.amount_withdrawn
        );
    }

    if let Some(out) = &args.out {
        let json = serde_json::to_string_pretty(&sim.snapshots)?;
        std::fs::write(out, json).with_context(|| format!("writing snapshots to {out}"))?;
        info!(path = %out, snapshots = sim.snapshots.len(), "snapshots written");
    }

    Ok(())
}

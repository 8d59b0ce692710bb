/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info};

use cpusim::config::Scenario;
use cpusim::kernel::SimTime;
use cpusim::scenario::{ScenarioReport, ScenarioRunner};
use cpusim::scheduler::SchedulerPolicy;

// ── CLI argument definition ───────────────────────────────────────────────────

/// Simulated CPU resource engine.
///
/// Example:
///   cpusim -s demos/fifo_two_processes.yaml -s demos/mlfq_mixed_load.yaml --slots 2
#[derive(Debug, Parser)]
#[command(
    name = "cpusim",
    about = "Simulated CPU resource engine – runs YAML scenarios",
    long_about = None,
)]
struct Cli {
    /// Scenario file to run.  May be given several times; the scenarios run
    /// in parallel, each in its own simulation.
    #[arg(short = 's', long = "scenario", required = true)]
    scenarios: Vec<PathBuf>,

    /// Override the scheduler policy (fifo, lifo, spn, roundrobin, mlfq, mlfq:<n>).
    #[arg(short = 'p', long = "policy")]
    policy: Option<String>,

    /// Override the CPU capacity (work units per time unit per slot).
    #[arg(short = 'c', long = "capacity")]
    capacity: Option<f64>,

    /// Override the number of active slots.
    #[arg(short = 'n', long = "slots")]
    slots: Option<usize>,

    /// Override the run horizon, in time units.
    #[arg(short = 't', long = "horizon")]
    horizon: Option<f64>,
}

/// Command-line overrides applied on top of every scenario file.
#[derive(Debug, Clone, Copy, Default)]
struct Overrides {
    policy: Option<SchedulerPolicy>,
    capacity: Option<f64>,
    slots: Option<usize>,
    horizon: Option<SimTime>,
}

impl Overrides {
    fn from_cli(cli: &Cli) -> Result<Self> {
        let policy = cli
            .policy
            .as_deref()
            .map(str::parse::<SchedulerPolicy>)
            .transpose()
            .context("Invalid --policy")?;
        let horizon = match cli.horizon {
            Some(h) => match SimTime::try_from_units(h) {
                Some(t) => Some(t),
                None => bail!("--horizon must be a finite, non-negative time (got {h})"),
            },
            None => None,
        };
        Ok(Self {
            policy,
            capacity: cli.capacity,
            slots: cli.slots,
            horizon,
        })
    }

    fn apply(&self, scenario: &mut Scenario) -> Result<()> {
        if let Some(policy) = self.policy {
            scenario.cpu.policy = policy;
        }
        if let Some(capacity) = self.capacity {
            scenario.cpu.capacity = capacity;
        }
        if let Some(slots) = self.slots {
            scenario.cpu.active_slots = slots;
        }
        if self.horizon.is_some() {
            scenario.horizon = self.horizon;
        }
        scenario
            .cpu
            .validate()
            .context("Command-line overrides produce an invalid CPU")?;
        Ok(())
    }
}

// ── Scenario execution ────────────────────────────────────────────────────────

/// Load, adjust and simulate one scenario file.
fn run_scenario(path: &Path, overrides: Overrides) -> Result<ScenarioReport> {
    let mut scenario = Scenario::load_from_file(path)?;
    overrides.apply(&mut scenario)?;
    ScenarioRunner::run(&scenario)
        .with_context(|| format!("Simulation of {} failed", path.display()))
}

fn print_report(report: &ScenarioReport) {
    info!(
        "[{name}]  policy={policy}  completed={done}/{total}  end={end}  events={events}",
        name = report.scenario,
        policy = report.policy,
        done = report.completed(),
        total = report.entries.len(),
        end = report.end_time,
        events = report.events_fired,
    );
    for entry in &report.entries {
        let outcome = match (entry.completed_at, entry.canceled) {
            (Some(t), _) => format!("completed at {t}"),
            (None, true) => String::from("canceled"),
            (None, false) => String::from("unfinished"),
        };
        info!(
            "  {name:<16} demand={demand:<8} arrival={arrival}  {outcome}",
            name = entry.name,
            demand = entry.demand,
            arrival = entry.arrival,
        );
    }
    if let Some(peak) = report
        .samples
        .iter()
        .map(|s| s.binned_utilization)
        .reduce(f64::max)
    {
        info!(
            "  utilisation: {} samples, peak binned utilisation {:.2}",
            report.samples.len(),
            peak
        );
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Initialise structured logging.
    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=debug).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Parse CLI arguments ───────────────────────────────────────────────────
    let cli = Cli::parse();

    info!(
        scenarios = cli.scenarios.len(),
        policy    = ?cli.policy,
        capacity  = ?cli.capacity,
        slots     = ?cli.slots,
        horizon   = ?cli.horizon,
        "Configuration"
    );

    let overrides = match Overrides::from_cli(&cli) {
        Ok(o) => o,
        Err(e) => {
            error!("{:#}", e);
            process::exit(2);
        }
    };

    // ── Run every scenario in its own blocking task ───────────────────────────
    // A simulation is single-threaded and !Send, so each one is built and run
    // entirely inside its task.
    let handles: Vec<_> = cli
        .scenarios
        .iter()
        .cloned()
        .map(|path| {
            let task = tokio::task::spawn_blocking({
                let path = path.clone();
                move || run_scenario(&path, overrides)
            });
            (path, task)
        })
        .collect();

    let mut failures = 0usize;
    for (path, handle) in handles {
        match handle.await {
            Ok(Ok(report)) => print_report(&report),
            Ok(Err(e)) => {
                error!("{}: {:#}", path.display(), e);
                failures += 1;
            }
            Err(e) => {
                error!("{}: simulation task panicked: {}", path.display(), e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        error!("{} of {} scenario(s) failed", failures, cli.scenarios.len());
        process::exit(1);
    }
}

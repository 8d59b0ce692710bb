/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Scenario runner.
//!
//! Turns a loaded [`Scenario`] into one simulation: a fresh [`Kernel`], one
//! [`Cpu`], an arrival event per process and a cancellation event per
//! cancellation.  Arrivals run at [`Priority::HIGH`] so that everything
//! arriving at `t` is queued before the CPU dispatches at `t`.
//!
//! The result is a [`ScenarioReport`]: one [`TraceEntry`] per process, sorted
//! by completion time (unfinished and canceled processes last), then by name.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, info};

use crate::config::Scenario;
use crate::cpu::{Cpu, UtilizationSample, WeakCpu};
use crate::error::SimResult;
use crate::kernel::{Event, Kernel, Priority, SimTime};
use crate::process::{Process, ProcessId};
use crate::request::{Completion, ComputationObserver};
use crate::scheduler::SchedulerPolicy;

// ── Report ────────────────────────────────────────────────────────────────────

/// Fate of one scenario process.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEntry {
    pub name: String,
    pub demand: u64,
    pub arrival: SimTime,
    /// `None` if the process was canceled or had not finished at the horizon.
    pub completed_at: Option<SimTime>,
    pub canceled: bool,
}

impl TraceEntry {
    /// Completion minus arrival, for finished processes.
    pub fn response_time(&self) -> Option<SimTime> {
        self.completed_at.map(|done| done.saturating_sub(self.arrival))
    }
}

/// Outcome of [`ScenarioRunner::run`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioReport {
    pub scenario: String,
    pub policy: SchedulerPolicy,
    pub entries: Vec<TraceEntry>,
    pub end_time: SimTime,
    pub events_fired: u64,
    pub samples: Vec<UtilizationSample>,
}

impl ScenarioReport {
    pub fn entry(&self, name: &str) -> Option<&TraceEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Names of the finished processes in completion order.
    pub fn completion_order(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.completed_at.is_some())
            .map(|e| e.name.as_str())
            .collect()
    }

    pub fn completed(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.completed_at.is_some())
            .count()
    }
}

// ── Trace recording ───────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Trace {
    entries: Vec<TraceEntry>,
    /// Entry index → process id, once arrived.
    ids: Vec<Option<ProcessId>>,
    by_id: HashMap<ProcessId, usize>,
}

impl Trace {
    fn all_resolved(&self) -> bool {
        self.entries
            .iter()
            .all(|e| e.canceled || e.completed_at.is_some())
    }
}

/// Observer that stamps completions into the shared trace and stops the
/// utilisation probe once nothing is left to happen.
struct TraceRecorder {
    trace: Rc<RefCell<Trace>>,
    cpu: WeakCpu,
}

impl ComputationObserver for TraceRecorder {
    fn computation_completed(&self, kernel: &mut Kernel, completion: &Completion) {
        let resolved = {
            let mut trace = self.trace.borrow_mut();
            if let Some(&index) = trace.by_id.get(&completion.process) {
                trace.entries[index].completed_at = Some(completion.completed_at);
            }
            trace.all_resolved()
        };
        if resolved {
            if let Some(cpu) = self.cpu.upgrade() {
                cpu.stop_utilization_probe(kernel);
            }
        }
    }
}

// ── ScenarioRunner ────────────────────────────────────────────────────────────

/// Runs scenarios.  Each call is an independent simulation.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScenarioRunner;

impl ScenarioRunner {
    /// Simulate `scenario` to completion, or to its horizon if it has one.
    ///
    /// # Errors
    /// [`ConfigError`](crate::error::ConfigError) for an invalid CPU, plus
    /// any kernel or process invariant violation raised during the run.
    pub fn run(scenario: &Scenario) -> SimResult<ScenarioReport> {
        let cpu = Cpu::new(scenario.cpu.clone())?;
        let mut kernel = Kernel::new();

        let trace = Rc::new(RefCell::new(Trace {
            entries: scenario
                .processes
                .iter()
                .map(|p| TraceEntry {
                    name: p.name.clone(),
                    demand: p.demand,
                    arrival: p.arrival,
                    completed_at: None,
                    canceled: false,
                })
                .collect(),
            ids: vec![None; scenario.processes.len()],
            by_id: HashMap::new(),
        }));

        cpu.add_observer(Rc::new(TraceRecorder {
            trace: Rc::clone(&trace),
            cpu: cpu.downgrade(),
        }));

        // ── Arrivals ──────────────────────────────────────────────────────────
        for (index, spec) in scenario.processes.iter().enumerate() {
            let cpu = cpu.clone();
            let trace = Rc::clone(&trace);
            let demand = spec.demand;
            kernel.schedule_at(
                spec.arrival,
                Event::new("arrival", move |k| {
                    if trace.borrow().entries[index].canceled {
                        return Ok(());
                    }
                    let id = cpu.submit(k, Process::from_demand(demand))?;
                    let mut trace = trace.borrow_mut();
                    trace.ids[index] = Some(id);
                    trace.by_id.insert(id, index);
                    Ok(())
                })
                .with_priority(Priority::HIGH),
            )?;
        }

        // ── Cancellations ─────────────────────────────────────────────────────
        let index_of: HashMap<&str, usize> = scenario
            .processes
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name.as_str(), i))
            .collect();

        for spec in &scenario.cancellations {
            let Some(&index) = index_of.get(spec.name.as_str()) else {
                continue;
            };
            let cpu = cpu.clone();
            let trace = Rc::clone(&trace);
            kernel.schedule_at(
                spec.at,
                Event::new("cancellation", move |k| {
                    let id = trace.borrow().ids[index];
                    let canceled = match id {
                        Some(id) => cpu.cancel(k, id)?,
                        // Not arrived yet: the arrival will be skipped.
                        None => true,
                    };
                    let resolved = {
                        let mut trace = trace.borrow_mut();
                        if canceled {
                            trace.entries[index].canceled = true;
                        }
                        trace.all_resolved()
                    };
                    if resolved {
                        cpu.stop_utilization_probe(k);
                    }
                    Ok(())
                }),
            )?;
        }

        if let Some(interval) = scenario.probe_interval {
            if !scenario.processes.is_empty() {
                cpu.start_utilization_probe(&mut kernel, interval)?;
            }
        }

        let summary = match scenario.horizon {
            Some(horizon) => kernel.run_until(horizon)?,
            None => kernel.run()?,
        };
        cpu.stop_utilization_probe(&mut kernel);

        let mut entries = std::mem::take(&mut trace.borrow_mut().entries);
        entries.sort_by(|a, b| {
            let key = |e: &TraceEntry| e.completed_at.map_or((1, SimTime::ZERO), |t| (0, t));
            key(a).cmp(&key(b)).then_with(|| a.name.cmp(&b.name))
        });

        for entry in &entries {
            debug!(
                scenario = %scenario.name,
                process = %entry.name,
                completed_at = ?entry.completed_at.map(SimTime::as_units),
                canceled = entry.canceled,
                "trace entry"
            );
        }

        let report = ScenarioReport {
            scenario: scenario.name.clone(),
            policy: cpu.policy(),
            entries,
            end_time: summary.end_time,
            events_fired: summary.events_fired,
            samples: cpu.utilization_samples(),
        };

        info!(
            scenario = %report.scenario,
            policy = %report.policy,
            completed = report.completed(),
            processes = report.entries.len(),
            end_time = %report.end_time,
            events = report.events_fired,
            "Scenario finished"
        );

        Ok(report)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(yaml: &str) -> Scenario {
        Scenario::from_yaml_str("test", yaml).unwrap()
    }

    fn t(units: f64) -> SimTime {
        SimTime::from_units(units)
    }

    #[test]
    fn fifo_single_slot_runs_in_arrival_order() {
        let report = ScenarioRunner::run(&scenario(
            r#"
cpu: { capacity: 10, active_slots: 1, scheduler: fifo }
processes:
  - { name: A, demand: 20 }
  - { name: B, demand: 5 }
"#,
        ))
        .unwrap();

        assert_eq!(report.completion_order(), vec!["A", "B"]);
        assert_eq!(report.entry("A").unwrap().completed_at, Some(t(2.0)));
        assert_eq!(report.entry("B").unwrap().completed_at, Some(t(2.5)));
        assert_eq!(report.end_time, t(2.5));
    }

    #[test]
    fn spn_runs_the_shorter_process_first() {
        let report = ScenarioRunner::run(&scenario(
            r#"
cpu: { capacity: 10, active_slots: 1, scheduler: spn }
processes:
  - { name: A, demand: 20 }
  - { name: B, demand: 5 }
"#,
        ))
        .unwrap();

        assert_eq!(report.completion_order(), vec!["B", "A"]);
        assert_eq!(report.entry("A").unwrap().completed_at, Some(t(2.5)));
    }

    #[test]
    fn canceled_process_never_completes() {
        let report = ScenarioRunner::run(&scenario(
            r#"
cpu: { capacity: 10, active_slots: 1 }
processes:
  - { name: A, demand: 100 }
cancellations:
  - { name: A, at: 3.0 }
"#,
        ))
        .unwrap();

        let a = report.entry("A").unwrap();
        assert!(a.canceled);
        assert_eq!(a.completed_at, None);
        assert_eq!(report.end_time, t(3.0));
    }

    #[test]
    fn cancellation_before_arrival_skips_the_process() {
        let report = ScenarioRunner::run(&scenario(
            r#"
cpu: { capacity: 1 }
processes:
  - { name: late, demand: 1, arrival: 5.0 }
cancellations:
  - { name: late, at: 1.0 }
"#,
        ))
        .unwrap();

        assert!(report.entry("late").unwrap().canceled);
        assert_eq!(report.completed(), 0);
    }

    #[test]
    fn cancellation_after_completion_changes_nothing() {
        let report = ScenarioRunner::run(&scenario(
            r#"
cpu: { capacity: 10 }
processes:
  - { name: A, demand: 10 }
cancellations:
  - { name: A, at: 4.0 }
"#,
        ))
        .unwrap();

        let a = report.entry("A").unwrap();
        assert!(!a.canceled);
        assert_eq!(a.completed_at, Some(t(1.0)));
    }

    #[test]
    fn horizon_leaves_unfinished_processes_open() {
        let report = ScenarioRunner::run(&scenario(
            r#"
cpu: { capacity: 1, active_slots: 1, scheduler: fifo }
processes:
  - { name: A, demand: 2 }
  - { name: B, demand: 100 }
horizon: 10.0
"#,
        ))
        .unwrap();

        assert_eq!(report.completion_order(), vec!["A"]);
        assert_eq!(report.entry("B").unwrap().completed_at, None);
        assert_eq!(report.end_time, t(10.0));
    }

    #[test]
    fn probe_stops_when_every_process_is_resolved() {
        let report = ScenarioRunner::run(&scenario(
            r#"
cpu: { capacity: 10, active_slots: 1 }
processes:
  - { name: A, demand: 10 }
probe_interval: 0.25
"#,
        ))
        .unwrap();

        // Samples at 0, 0.25, 0.5 and 0.75; the probe is canceled when A
        // completes at 1.0, before the t=1.0 sample fires.
        assert_eq!(report.samples.len(), 4);
        assert_eq!(report.end_time, t(1.0));
    }

    #[test]
    fn late_arrival_waits_for_its_time() {
        let report = ScenarioRunner::run(&scenario(
            r#"
cpu: { capacity: 10, active_slots: 1 }
processes:
  - { name: A, demand: 10, arrival: 2.0 }
"#,
        ))
        .unwrap();

        let a = report.entry("A").unwrap();
        assert_eq!(a.completed_at, Some(t(3.0)));
        assert_eq!(a.response_time(), Some(t(1.0)));
    }
}

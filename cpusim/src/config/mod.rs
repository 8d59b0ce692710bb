/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! CPU configuration and scenario file loading.
//!
//! [`CpuConfig`] is the construction-time configuration of a single CPU and is
//! validated by [`Cpu::new`](crate::cpu::Cpu::new).  [`Scenario`] is a whole
//! simulation run read from YAML:
//!
//! ```yaml
//! cpu:
//!   name: "orders-1"
//!   capacity: 10
//!   active_slots: 1
//!   scheduler: "fifo"
//! processes:
//!   - name: "A"
//!     demand: 20
//!   - name: "B"
//!     demand: 5
//!     arrival: 0.0
//! cancellations:
//!   - name: "A"
//!     at: 3.0
//! horizon: 100.0
//! probe_interval: 0.1
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ProcessError};
use crate::kernel::SimTime;
use crate::scheduler::SchedulerPolicy;

/// Active slot limit used when none is configured.
pub const DEFAULT_ACTIVE_SLOTS: usize = 3;

// ── Private YAML deserialization types ────────────────────────────────────────

/// Top-level wrapper that maps directly onto the YAML file layout.
///
/// Kept private; callers work with [`Scenario`] instead.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScenarioFile {
    cpu: CpuEntry,
    #[serde(default)]
    processes: Vec<ProcessEntry>,
    #[serde(default)]
    cancellations: Vec<CancellationEntry>,
    horizon: Option<f64>,
    probe_interval: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CpuEntry {
    #[serde(default = "default_cpu_name")]
    name: String,
    capacity: f64,
    #[serde(default = "default_active_slots")]
    active_slots: usize,
    scheduler: Option<String>,
    mlfq_levels: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProcessEntry {
    name: String,
    demand: i64,
    #[serde(default)]
    arrival: f64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CancellationEntry {
    name: String,
    at: f64,
}

fn default_cpu_name() -> String {
    String::from("cpu")
}

fn default_active_slots() -> usize {
    DEFAULT_ACTIVE_SLOTS
}

// ── CpuConfig ─────────────────────────────────────────────────────────────────

/// Construction-time parameters of one CPU.
#[derive(Debug, Clone, PartialEq)]
pub struct CpuConfig {
    pub name: String,
    /// Work units drained per time unit by each active slot.
    pub capacity: f64,
    /// Maximum number of processes bursting at the same time.
    pub active_slots: usize,
    pub policy: SchedulerPolicy,
}

impl CpuConfig {
    /// `active_slots` and `policy` start at their defaults.
    pub fn new(name: impl Into<String>, capacity: f64) -> Self {
        Self {
            name: name.into(),
            capacity,
            active_slots: DEFAULT_ACTIVE_SLOTS,
            policy: SchedulerPolicy::default(),
        }
    }

    pub fn with_active_slots(mut self, active_slots: usize) -> Self {
        self.active_slots = active_slots;
        self
    }

    pub fn with_policy(mut self, policy: SchedulerPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// # Errors
    /// * [`ConfigError::NonPositiveCapacity`] unless capacity is finite and > 0.
    /// * [`ConfigError::ZeroActiveSlots`] if `active_slots == 0`.
    /// * [`ConfigError::ZeroMlfqLevels`] for an MLFQ policy without levels.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.capacity.is_finite() && self.capacity > 0.0) {
            return Err(ConfigError::NonPositiveCapacity(self.capacity));
        }
        if self.active_slots == 0 {
            return Err(ConfigError::ZeroActiveSlots);
        }
        if let SchedulerPolicy::Mlfq { levels: 0 } = self.policy {
            return Err(ConfigError::ZeroMlfqLevels);
        }
        Ok(())
    }
}

// ── Scenario ──────────────────────────────────────────────────────────────────

/// A process arriving at the CPU during a scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSpec {
    pub name: String,
    pub demand: u64,
    pub arrival: SimTime,
}

/// Cancellation of a named process at a fixed time.
#[derive(Debug, Clone, PartialEq)]
pub struct CancellationSpec {
    pub name: String,
    pub at: SimTime,
}

/// One complete, validated simulation run.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    /// Display name, the file stem when loaded from disk.
    pub name: String,
    pub cpu: CpuConfig,
    pub processes: Vec<ProcessSpec>,
    pub cancellations: Vec<CancellationSpec>,
    /// Stop the run here instead of draining the event queue.
    pub horizon: Option<SimTime>,
    /// Record a utilisation sample at this interval.
    pub probe_interval: Option<SimTime>,
}

impl Scenario {
    /// Read and validate a scenario file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is not valid YAML, or
    /// fails validation (see [`Scenario::from_yaml_str`]).
    pub fn load_from_file(path: &Path) -> Result<Self> {
        info!("Loading scenario from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open scenario file: {}", path.display()))?;

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Self::from_yaml_str(name, &content)
            .with_context(|| format!("Invalid scenario file: {}", path.display()))
    }

    /// Parse and validate a scenario from YAML text.
    ///
    /// Rejected: CPU parameters [`CpuConfig::validate`] refuses, negative
    /// demands, negative or non-finite times, duplicate process names, and
    /// cancellations naming unknown processes.
    pub fn from_yaml_str(name: impl Into<String>, content: &str) -> Result<Self> {
        let name = name.into();
        let file: ScenarioFile =
            serde_yaml::from_str(content).context("Failed to parse scenario YAML")?;

        let cpu = cpu_config(file.cpu)?;

        let mut seen = BTreeSet::new();
        let mut processes = Vec::with_capacity(file.processes.len());
        for entry in file.processes {
            if !seen.insert(entry.name.clone()) {
                bail!("duplicate process name '{}'", entry.name);
            }
            let demand = u64::try_from(entry.demand)
                .map_err(|_| ProcessError::InvalidArgument {
                    demand: entry.demand,
                })
                .with_context(|| format!("process '{}'", entry.name))?;
            let arrival = time_field(&format!("arrival of '{}'", entry.name), entry.arrival)?;

            debug!(process = %entry.name, demand, arrival = %arrival, "scenario process");
            processes.push(ProcessSpec {
                name: entry.name,
                demand,
                arrival,
            });
        }

        let mut cancellations = Vec::with_capacity(file.cancellations.len());
        for entry in file.cancellations {
            if !seen.contains(&entry.name) {
                bail!("cancellation names unknown process '{}'", entry.name);
            }
            let at = time_field(&format!("cancellation of '{}'", entry.name), entry.at)?;
            cancellations.push(CancellationSpec {
                name: entry.name,
                at,
            });
        }

        let horizon = file
            .horizon
            .map(|h| time_field("horizon", h))
            .transpose()?;
        let probe_interval = file
            .probe_interval
            .map(|p| time_field("probe_interval", p))
            .transpose()?;
        if probe_interval == Some(SimTime::ZERO) {
            bail!("probe_interval must be > 0");
        }

        info!(
            scenario = %name,
            cpu = %cpu.name,
            policy = %cpu.policy,
            processes = processes.len(),
            cancellations = cancellations.len(),
            "Scenario loaded"
        );

        Ok(Self {
            name,
            cpu,
            processes,
            cancellations,
            horizon,
            probe_interval,
        })
    }
}

fn cpu_config(entry: CpuEntry) -> Result<CpuConfig> {
    let mut policy = match entry.scheduler.as_deref() {
        Some(s) => s.parse::<SchedulerPolicy>()?,
        None => SchedulerPolicy::default(),
    };

    if let Some(levels) = entry.mlfq_levels {
        match &mut policy {
            SchedulerPolicy::Mlfq { levels: l } => *l = levels,
            other => warn!(policy = %other, "mlfq_levels ignored for non-MLFQ scheduler"),
        }
    }

    let config = CpuConfig {
        name: entry.name,
        capacity: entry.capacity,
        active_slots: entry.active_slots,
        policy,
    };
    config
        .validate()
        .with_context(|| format!("cpu '{}'", config.name))?;
    Ok(config)
}

fn time_field(what: &str, units: f64) -> Result<SimTime> {
    match SimTime::try_from_units(units) {
        Some(t) => Ok(t),
        None => bail!("{what} must be a finite, non-negative time (got {units})"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Helper: write a YAML string to a temp file and return it.
    fn yaml_tempfile(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    // ── CpuConfig ─────────────────────────────────────────────────────────────

    #[test]
    fn new_uses_defaults() {
        let cfg = CpuConfig::new("c", 10.0);
        assert_eq!(cfg.active_slots, DEFAULT_ACTIVE_SLOTS);
        assert_eq!(cfg.policy, SchedulerPolicy::RoundRobin);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_capacity() {
        for capacity in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                CpuConfig::new("c", capacity).validate(),
                Err(ConfigError::NonPositiveCapacity(_))
            ));
        }
    }

    #[test]
    fn validate_rejects_zero_slots_and_levels() {
        assert_eq!(
            CpuConfig::new("c", 1.0).with_active_slots(0).validate(),
            Err(ConfigError::ZeroActiveSlots)
        );
        assert_eq!(
            CpuConfig::new("c", 1.0)
                .with_policy(SchedulerPolicy::Mlfq { levels: 0 })
                .validate(),
            Err(ConfigError::ZeroMlfqLevels)
        );
    }

    // ── Scenario: load_from_file ──────────────────────────────────────────────

    #[test]
    fn load_full_scenario() {
        let yaml = r#"
cpu:
  name: "orders-1"
  capacity: 10
  active_slots: 1
  scheduler: "fifo"
processes:
  - name: "A"
    demand: 20
  - name: "B"
    demand: 5
    arrival: 0.5
cancellations:
  - name: "A"
    at: 3.0
horizon: 100.0
probe_interval: 0.1
"#;
        let f = yaml_tempfile(yaml);
        let s = Scenario::load_from_file(f.path()).unwrap();

        assert_eq!(s.cpu.name, "orders-1");
        assert_eq!(s.cpu.capacity, 10.0);
        assert_eq!(s.cpu.active_slots, 1);
        assert_eq!(s.cpu.policy, SchedulerPolicy::Fifo);
        assert_eq!(
            s.processes,
            vec![
                ProcessSpec {
                    name: "A".into(),
                    demand: 20,
                    arrival: SimTime::ZERO
                },
                ProcessSpec {
                    name: "B".into(),
                    demand: 5,
                    arrival: SimTime::from_units(0.5)
                },
            ]
        );
        assert_eq!(s.cancellations[0].at, SimTime::from_units(3.0));
        assert_eq!(s.horizon, Some(SimTime::from_units(100.0)));
        assert_eq!(s.probe_interval, Some(SimTime::from_units(0.1)));
    }

    #[test]
    fn optional_fields_use_defaults_when_absent() {
        let s = Scenario::from_yaml_str("minimal", "cpu:\n  capacity: 2\n").unwrap();
        assert_eq!(s.name, "minimal");
        assert_eq!(s.cpu.name, "cpu");
        assert_eq!(s.cpu.active_slots, 3);
        assert_eq!(s.cpu.policy, SchedulerPolicy::RoundRobin);
        assert!(s.processes.is_empty());
        assert_eq!(s.horizon, None);
    }

    #[test]
    fn mlfq_levels_override_default_levels() {
        let yaml = "cpu:\n  capacity: 1\n  scheduler: mlfq\n  mlfq_levels: 5\n";
        let s = Scenario::from_yaml_str("s", yaml).unwrap();
        assert_eq!(s.cpu.policy, SchedulerPolicy::Mlfq { levels: 5 });
    }

    #[test]
    fn scenario_name_is_file_stem() {
        let f = tempfile::Builder::new()
            .prefix("burst-test")
            .suffix(".yaml")
            .tempfile()
            .unwrap();
        std::fs::write(f.path(), "cpu:\n  capacity: 1\n").unwrap();
        let s = Scenario::load_from_file(f.path()).unwrap();
        assert!(s.name.starts_with("burst-test"));
        assert!(!s.name.ends_with(".yaml"));
    }

    // ── Scenario: validation ──────────────────────────────────────────────────

    #[test]
    fn missing_file_returns_error() {
        assert!(Scenario::load_from_file(Path::new("/nonexistent/scenario.yaml")).is_err());
    }

    #[test]
    fn malformed_yaml_returns_error() {
        let f = yaml_tempfile("this is: not: valid: yaml: content:::");
        assert!(Scenario::load_from_file(f.path()).is_err());
    }

    #[test]
    fn invalid_cpu_is_rejected() {
        let err = Scenario::from_yaml_str("s", "cpu:\n  capacity: 0\n").unwrap_err();
        assert!(format!("{err:#}").contains("capacity must be > 0"));

        assert!(Scenario::from_yaml_str("s", "cpu:\n  capacity: 1\n  scheduler: edf\n").is_err());
    }

    #[test]
    fn negative_demand_is_rejected() {
        let yaml = "cpu:\n  capacity: 1\nprocesses:\n  - name: A\n    demand: -4\n";
        let err = Scenario::from_yaml_str("s", yaml).unwrap_err();
        assert!(format!("{err:#}").contains("demand must be >= 0"));
    }

    #[test]
    fn negative_times_are_rejected() {
        let arrival = "cpu:\n  capacity: 1\nprocesses:\n  - name: A\n    demand: 1\n    arrival: -1\n";
        assert!(Scenario::from_yaml_str("s", arrival).is_err());

        let horizon = "cpu:\n  capacity: 1\nhorizon: -5\n";
        assert!(Scenario::from_yaml_str("s", horizon).is_err());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let yaml = r#"
cpu: { capacity: 1 }
processes:
  - { name: A, demand: 1 }
  - { name: A, demand: 2 }
"#;
        let err = Scenario::from_yaml_str("s", yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate process name 'A'"));
    }

    #[test]
    fn unknown_cancellation_target_is_rejected() {
        let yaml = r#"
cpu: { capacity: 1 }
processes:
  - { name: A, demand: 1 }
cancellations:
  - { name: Z, at: 1.0 }
"#;
        let err = Scenario::from_yaml_str("s", yaml).unwrap_err();
        assert!(err.to_string().contains("unknown process 'Z'"));
    }

    #[test]
    fn zero_probe_interval_is_rejected() {
        let yaml = "cpu:\n  capacity: 1\nprobe_interval: 0\n";
        assert!(Scenario::from_yaml_str("s", yaml).is_err());
    }
}

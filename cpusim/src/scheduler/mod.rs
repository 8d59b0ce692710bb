/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Pluggable scheduling disciplines for a simulated CPU.
//!
//! A scheduler decides **which** queued process runs next and **how much**
//! demand it is granted for that burst.  It never touches time: the CPU turns
//! a [`Grant`] into a burst of `quantum / capacity` time units.
//!
//! | Policy | Order | Grant |
//! |---|---|---|
//! | [`Fifo`] | arrival | whole remaining demand |
//! | [`Lifo`] | most recent arrival | whole remaining demand |
//! | [`ShortestProcessNext`] | least remaining demand, ties by id | whole remaining demand |
//! | [`RoundRobin`] | rotation | `min(remaining, quantum)`, quantum = `max(25, median)` |
//! | [`MultiLevelFeedbackQueue`] | highest non-empty level | as round robin, demotes on overrun |
//!
//! Schedulers only hold [`ProcessId`]s; the demand itself is read from the
//! [`ProcessTable`] passed into every call.
//!
//! The set of policies is closed, so [`Scheduler`] is an enum that delegates
//! to the concrete strategy instead of a `Box<dyn SchedulingStrategy>`.

pub mod fifo;
pub mod lifo;
pub mod mlfq;
mod queue;
pub mod round_robin;
pub mod spn;

pub use fifo::Fifo;
pub use lifo::Lifo;
pub use mlfq::{MultiLevelFeedbackQueue, DEFAULT_MLFQ_LEVELS};
pub use round_robin::{RoundRobin, MINIMUM_QUANTUM};
pub use spn::ShortestProcessNext;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ProcessError};
use crate::process::{ProcessId, ProcessTable};

// ── Grant ─────────────────────────────────────────────────────────────────────

/// One scheduling decision: run `process` for `quantum` work units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant {
    pub process: ProcessId,
    pub quantum: u64,
}

impl Grant {
    /// Grant `id` everything it has left.
    ///
    /// # Errors
    /// [`ProcessError::UnknownProcess`] if `id` left the table while queued.
    pub fn full(id: ProcessId, procs: &ProcessTable) -> Result<Self, ProcessError> {
        Ok(Self {
            process: id,
            quantum: procs.remaining_of(id)?,
        })
    }
}

/// Schedulers only accept processes that live in the table.
pub(crate) fn ensure_known(id: ProcessId, procs: &ProcessTable) -> Result<(), ProcessError> {
    if procs.contains(id) {
        Ok(())
    } else {
        Err(ProcessError::UnknownProcess(id))
    }
}

// ── SchedulingStrategy ────────────────────────────────────────────────────────

/// Capability shared by every scheduling discipline.
pub trait SchedulingStrategy {
    /// Queue `id`.  Entering a process that is already queued is a no-op.
    ///
    /// # Errors
    /// [`ProcessError::UnknownProcess`] if `id` is not in `procs`.
    fn enter(&mut self, id: ProcessId, procs: &ProcessTable) -> Result<(), ProcessError>;

    /// Next process and its grant, `None` when nothing is queued.  Policies
    /// with partial grants put an unfinished process back into their own
    /// queue.
    ///
    /// # Errors
    /// [`ProcessError::UnknownProcess`] if a queued id is no longer in
    /// `procs`.
    fn retrieve_next(&mut self, procs: &ProcessTable) -> Result<Option<Grant>, ProcessError>;

    /// Like [`retrieve_next`](Self::retrieve_next), but the process is never
    /// re-queued; the caller re-submits it after the burst.
    fn retrieve_next_no_requeue(
        &mut self,
        procs: &ProcessTable,
    ) -> Result<Option<Grant>, ProcessError>;

    fn has_ready(&self) -> bool {
        self.len() > 0
    }

    /// Number of queued processes.
    fn len(&self) -> usize;

    fn contains(&self, id: ProcessId) -> bool;

    /// Drop a queued process without serving it.  `false` if it was not
    /// queued.
    fn remove(&mut self, id: ProcessId) -> bool;

    /// Sum of the remaining demand of every queued process.  Widened so a
    /// queue of huge demands cannot overflow.
    fn total_remaining_demand(&self, procs: &ProcessTable) -> u128;

    fn clear(&mut self);
}

// ── SchedulerPolicy ───────────────────────────────────────────────────────────

/// Which discipline a CPU uses.
///
/// Parses from `fifo`, `lifo`, `spn`, `roundrobin` (alias `rr`), `mlfq` and
/// `mlfq:<levels>`, case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SchedulerPolicy {
    Fifo,
    Lifo,
    Spn,
    #[default]
    RoundRobin,
    Mlfq {
        levels: usize,
    },
}

impl FromStr for SchedulerPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "fifo" => Ok(Self::Fifo),
            "lifo" => Ok(Self::Lifo),
            "spn" => Ok(Self::Spn),
            "roundrobin" | "round_robin" | "rr" => Ok(Self::RoundRobin),
            "mlfq" => Ok(Self::Mlfq {
                levels: DEFAULT_MLFQ_LEVELS,
            }),
            other => {
                let levels = other
                    .strip_prefix("mlfq:")
                    .and_then(|n| n.parse::<usize>().ok())
                    .ok_or_else(|| ConfigError::UnknownPolicy(s.to_string()))?;
                if levels == 0 {
                    return Err(ConfigError::ZeroMlfqLevels);
                }
                Ok(Self::Mlfq { levels })
            }
        }
    }
}

impl TryFrom<String> for SchedulerPolicy {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SchedulerPolicy> for String {
    fn from(policy: SchedulerPolicy) -> Self {
        policy.to_string()
    }
}

impl fmt::Display for SchedulerPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fifo => f.write_str("fifo"),
            Self::Lifo => f.write_str("lifo"),
            Self::Spn => f.write_str("spn"),
            Self::RoundRobin => f.write_str("roundrobin"),
            Self::Mlfq { levels } => write!(f, "mlfq:{levels}"),
        }
    }
}

// ── Scheduler ─────────────────────────────────────────────────────────────────

/// A concrete scheduling strategy selected by [`SchedulerPolicy`].
#[derive(Debug, Clone)]
pub enum Scheduler {
    Fifo(Fifo),
    Lifo(Lifo),
    Spn(ShortestProcessNext),
    RoundRobin(RoundRobin),
    Mlfq(MultiLevelFeedbackQueue),
}

impl Scheduler {
    /// Build an empty scheduler for `policy`.
    ///
    /// # Errors
    /// [`ConfigError::ZeroMlfqLevels`] for `Mlfq { levels: 0 }`.
    pub fn from_policy(policy: SchedulerPolicy) -> Result<Self, ConfigError> {
        Ok(match policy {
            SchedulerPolicy::Fifo => Self::Fifo(Fifo::new()),
            SchedulerPolicy::Lifo => Self::Lifo(Lifo::new()),
            SchedulerPolicy::Spn => Self::Spn(ShortestProcessNext::new()),
            SchedulerPolicy::RoundRobin => Self::RoundRobin(RoundRobin::new()),
            SchedulerPolicy::Mlfq { levels } => Self::Mlfq(MultiLevelFeedbackQueue::new(levels)?),
        })
    }

    pub fn policy(&self) -> SchedulerPolicy {
        match self {
            Self::Fifo(_) => SchedulerPolicy::Fifo,
            Self::Lifo(_) => SchedulerPolicy::Lifo,
            Self::Spn(_) => SchedulerPolicy::Spn,
            Self::RoundRobin(_) => SchedulerPolicy::RoundRobin,
            Self::Mlfq(m) => SchedulerPolicy::Mlfq {
                levels: m.level_count(),
            },
        }
    }

    fn strategy(&self) -> &dyn SchedulingStrategy {
        match self {
            Self::Fifo(s) => s,
            Self::Lifo(s) => s,
            Self::Spn(s) => s,
            Self::RoundRobin(s) => s,
            Self::Mlfq(s) => s,
        }
    }

    fn strategy_mut(&mut self) -> &mut dyn SchedulingStrategy {
        match self {
            Self::Fifo(s) => s,
            Self::Lifo(s) => s,
            Self::Spn(s) => s,
            Self::RoundRobin(s) => s,
            Self::Mlfq(s) => s,
        }
    }
}

impl SchedulingStrategy for Scheduler {
    fn enter(&mut self, id: ProcessId, procs: &ProcessTable) -> Result<(), ProcessError> {
        self.strategy_mut().enter(id, procs)
    }

    fn retrieve_next(&mut self, procs: &ProcessTable) -> Result<Option<Grant>, ProcessError> {
        self.strategy_mut().retrieve_next(procs)
    }

    fn retrieve_next_no_requeue(
        &mut self,
        procs: &ProcessTable,
    ) -> Result<Option<Grant>, ProcessError> {
        self.strategy_mut().retrieve_next_no_requeue(procs)
    }

    fn has_ready(&self) -> bool {
        self.strategy().has_ready()
    }

    fn len(&self) -> usize {
        self.strategy().len()
    }

    fn contains(&self, id: ProcessId) -> bool {
        self.strategy().contains(id)
    }

    fn remove(&mut self, id: ProcessId) -> bool {
        self.strategy_mut().remove(id)
    }

    fn total_remaining_demand(&self, procs: &ProcessTable) -> u128 {
        self.strategy().total_remaining_demand(procs)
    }

    fn clear(&mut self) {
        self.strategy_mut().clear()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Process;

    const ALL: [SchedulerPolicy; 5] = [
        SchedulerPolicy::Fifo,
        SchedulerPolicy::Lifo,
        SchedulerPolicy::Spn,
        SchedulerPolicy::RoundRobin,
        SchedulerPolicy::Mlfq { levels: 3 },
    ];

    fn table_with(demands: &[u64]) -> (ProcessTable, Vec<ProcessId>) {
        let mut table = ProcessTable::new();
        let ids = demands
            .iter()
            .map(|d| table.insert(Process::from_demand(*d)))
            .collect();
        (table, ids)
    }

    // ── Policy parsing ────────────────────────────────────────────────────────

    #[test]
    fn policy_parses_all_names() {
        assert_eq!("fifo".parse(), Ok(SchedulerPolicy::Fifo));
        assert_eq!("LIFO".parse(), Ok(SchedulerPolicy::Lifo));
        assert_eq!("spn".parse(), Ok(SchedulerPolicy::Spn));
        assert_eq!("rr".parse(), Ok(SchedulerPolicy::RoundRobin));
        assert_eq!("roundrobin".parse(), Ok(SchedulerPolicy::RoundRobin));
        assert_eq!("mlfq".parse(), Ok(SchedulerPolicy::Mlfq { levels: 3 }));
        assert_eq!("mlfq:5".parse(), Ok(SchedulerPolicy::Mlfq { levels: 5 }));
    }

    #[test]
    fn policy_rejects_unknown_and_zero_levels() {
        assert_eq!(
            "edf".parse::<SchedulerPolicy>(),
            Err(ConfigError::UnknownPolicy("edf".into()))
        );
        assert_eq!(
            "mlfq:0".parse::<SchedulerPolicy>(),
            Err(ConfigError::ZeroMlfqLevels)
        );
        assert!("mlfq:x".parse::<SchedulerPolicy>().is_err());
    }

    #[test]
    fn policy_display_parses_back() {
        for policy in ALL {
            assert_eq!(policy.to_string().parse(), Ok(policy));
        }
    }

    #[test]
    fn default_policy_is_round_robin() {
        assert_eq!(SchedulerPolicy::default(), SchedulerPolicy::RoundRobin);
    }

    #[test]
    fn policy_deserializes_from_yaml_string() {
        let p: SchedulerPolicy = serde_yaml::from_str("\"mlfq:4\"").unwrap();
        assert_eq!(p, SchedulerPolicy::Mlfq { levels: 4 });
        assert!(serde_yaml::from_str::<SchedulerPolicy>("\"bogus\"").is_err());
    }

    // ── Scheduler enum ────────────────────────────────────────────────────────

    #[test]
    fn from_policy_round_trips_policy() {
        for policy in ALL {
            assert_eq!(Scheduler::from_policy(policy).unwrap().policy(), policy);
        }
    }

    #[test]
    fn zero_level_mlfq_is_rejected() {
        assert_eq!(
            Scheduler::from_policy(SchedulerPolicy::Mlfq { levels: 0 }).unwrap_err(),
            ConfigError::ZeroMlfqLevels
        );
    }

    #[test]
    fn double_enter_never_duplicates_demand_for_any_policy() {
        for policy in ALL {
            let (table, ids) = table_with(&[30, 70]);
            let mut s = Scheduler::from_policy(policy).unwrap();
            s.enter(ids[0], &table).unwrap();
            s.enter(ids[0], &table).unwrap();
            s.enter(ids[1], &table).unwrap();

            assert_eq!(s.len(), 2, "{policy}");
            assert_eq!(s.total_remaining_demand(&table), 100, "{policy}");
        }
    }

    #[test]
    fn order_only_policies_always_grant_everything() {
        for policy in [SchedulerPolicy::Fifo, SchedulerPolicy::Lifo, SchedulerPolicy::Spn] {
            let (table, ids) = table_with(&[500, 3, 80]);
            let mut s = Scheduler::from_policy(policy).unwrap();
            for id in &ids {
                s.enter(*id, &table).unwrap();
            }
            while let Some(g) = s.retrieve_next(&table).unwrap() {
                assert_eq!(g.quantum, table.remaining(g.process), "{policy}");
            }
            assert!(!s.has_ready());
        }
    }

    #[test]
    fn empty_scheduler_returns_none() {
        let table = ProcessTable::new();
        for policy in ALL {
            let mut s = Scheduler::from_policy(policy).unwrap();
            assert_eq!(s.retrieve_next(&table), Ok(None));
            assert_eq!(s.retrieve_next_no_requeue(&table), Ok(None));
        }
    }

    #[test]
    fn departed_process_fails_retrieval_for_any_policy() {
        for policy in ALL {
            let (mut table, ids) = table_with(&[10]);
            let mut s = Scheduler::from_policy(policy).unwrap();
            s.enter(ids[0], &table).unwrap();
            table.remove(ids[0]);

            assert_eq!(
                s.retrieve_next_no_requeue(&table),
                Err(ProcessError::UnknownProcess(ids[0])),
                "{policy}"
            );
        }
    }

    #[test]
    fn remove_drops_only_the_named_process() {
        for policy in ALL {
            let (table, ids) = table_with(&[10, 20]);
            let mut s = Scheduler::from_policy(policy).unwrap();
            s.enter(ids[0], &table).unwrap();
            s.enter(ids[1], &table).unwrap();

            assert!(s.remove(ids[0]), "{policy}");
            assert!(!s.contains(ids[0]), "{policy}");
            assert!(s.contains(ids[1]), "{policy}");
            assert_eq!(s.total_remaining_demand(&table), 20, "{policy}");
        }
    }
}

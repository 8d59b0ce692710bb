/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Self-adjusting round robin with a median-based quantum.
//!
//! The quantum is the median remaining demand of the queued processes,
//! floored at [`MINIMUM_QUANTUM`].  It is recomputed lazily, right before the
//! next retrieval, whenever
//!
//! 1. a process was entered (new arrival or a returning process), or
//! 2. every process currently in the queue has had one turn under the current
//!    quantum (one full cycle).
//!
//! Rule 2 is evaluated against the whole queue after each turn, not against
//! the next process in line, so a quantum lives for exactly one cycle.
//!
//! | Queue (remaining) | Median | Quantum |
//! |---|---|---|
//! | empty | n/a | 25 |
//! | 10, 30, 70 | 30 | 30 |
//! | 5, 10, 30, 70 | ⌈(10 + 30) / 2⌉ = 20 | 25 |

use std::collections::HashSet;

use tracing::trace;

use crate::error::ProcessError;
use crate::process::{ProcessId, ProcessTable};

use super::queue::ReadyQueue;
use super::{ensure_known, Grant, SchedulingStrategy};

// ── Constants ─────────────────────────────────────────────────────────────────

/// Lower bound on the quantum, to avoid excessive context switching when the
/// queue only holds tiny processes.
pub const MINIMUM_QUANTUM: u64 = 25;

// ── RoundRobin ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RoundRobin {
    queue: ReadyQueue,
    quantum: u64,
    /// Processes served under the current quantum.
    served: HashSet<ProcessId>,
    /// Recompute the quantum before the next retrieval.
    stale: bool,
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self {
            queue: ReadyQueue::default(),
            quantum: MINIMUM_QUANTUM,
            served: HashSet::new(),
            stale: true,
        }
    }
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// The quantum the next retrieval will use (recomputing it first if it is
    /// due).
    ///
    /// # Errors
    /// [`ProcessError::UnknownProcess`] if a queued id left `procs`.
    pub fn quantum(&mut self, procs: &ProcessTable) -> Result<u64, ProcessError> {
        if self.stale {
            self.refresh_quantum(procs)?;
        }
        Ok(self.quantum)
    }

    /// Enqueue a process already known to be in the table.
    pub(crate) fn admit(&mut self, id: ProcessId) {
        if self.queue.push_back(id) {
            self.stale = true;
        }
    }

    fn refresh_quantum(&mut self, procs: &ProcessTable) -> Result<(), ProcessError> {
        let ids: Vec<ProcessId> = self.queue.iter().collect();
        self.quantum = median_remaining(&ids, procs)?
            .map_or(MINIMUM_QUANTUM, |m| m.max(MINIMUM_QUANTUM));
        self.served.clear();
        self.stale = false;
        trace!(queued = ids.len(), quantum = self.quantum, "round robin quantum updated");
        Ok(())
    }

    /// One round-robin turn.  With `requeue` the unfinished process goes back
    /// to the tail; without it the caller takes ownership.
    fn turn(
        &mut self,
        procs: &ProcessTable,
        requeue: bool,
    ) -> Result<Option<Grant>, ProcessError> {
        if self.stale {
            self.refresh_quantum(procs)?;
        }

        let Some(id) = self.queue.pop_front() else {
            return Ok(None);
        };
        self.served.insert(id);

        let remaining = procs.remaining_of(id)?;
        let grant = if remaining <= self.quantum {
            Grant {
                process: id,
                quantum: remaining,
            }
        } else {
            if requeue {
                self.queue.push_back(id);
            }
            Grant {
                process: id,
                quantum: self.quantum,
            }
        };

        self.check_cycle_complete();
        Ok(Some(grant))
    }

    fn check_cycle_complete(&mut self) {
        if self.queue.iter().all(|id| self.served.contains(&id)) {
            self.stale = true;
        }
    }
}

impl SchedulingStrategy for RoundRobin {
    fn enter(&mut self, id: ProcessId, procs: &ProcessTable) -> Result<(), ProcessError> {
        ensure_known(id, procs)?;
        self.admit(id);
        Ok(())
    }

    fn retrieve_next(&mut self, procs: &ProcessTable) -> Result<Option<Grant>, ProcessError> {
        self.turn(procs, true)
    }

    fn retrieve_next_no_requeue(
        &mut self,
        procs: &ProcessTable,
    ) -> Result<Option<Grant>, ProcessError> {
        self.turn(procs, false)
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn contains(&self, id: ProcessId) -> bool {
        self.queue.contains(id)
    }

    fn remove(&mut self, id: ProcessId) -> bool {
        if !self.queue.remove(id) {
            return false;
        }
        self.served.remove(&id);
        self.check_cycle_complete();
        true
    }

    fn total_remaining_demand(&self, procs: &ProcessTable) -> u128 {
        self.queue.total_remaining(procs)
    }

    fn clear(&mut self) {
        self.queue.clear();
        self.served.clear();
        self.stale = true;
    }
}

// ── Median ────────────────────────────────────────────────────────────────────

/// Median remaining demand of `ids`; `None` when empty.
///
/// For an even count the two middle values are averaged and rounded up.
///
/// # Errors
/// [`ProcessError::UnknownProcess`] if any id is missing from `procs`.
pub fn median_remaining(
    ids: &[ProcessId],
    procs: &ProcessTable,
) -> Result<Option<u64>, ProcessError> {
    let mut demands = ids
        .iter()
        .map(|id| procs.remaining_of(*id))
        .collect::<Result<Vec<_>, _>>()?;
    if demands.is_empty() {
        return Ok(None);
    }
    demands.sort_unstable();

    let n = demands.len();
    let median = if n % 2 == 0 {
        ceil_midpoint(demands[n / 2 - 1], demands[n / 2])
    } else {
        demands[n / 2]
    };
    Ok(Some(median))
}

/// `ceil((a + b) / 2)` without overflowing `u64`.
fn ceil_midpoint(a: u64, b: u64) -> u64 {
    a / 2 + b / 2 + (a % 2 + b % 2).div_ceil(2)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Multi-level feedback queue.
//!
//! `levels` nested [`RoundRobin`] queues, level 0 being the highest priority.
//! New processes enter level 0.  A process that does not finish within the
//! quantum granted on its level drops one level; on the lowest level it is
//! served by plain round robin and never drops further.  Short and freshly
//! arrived processes are therefore favoured, and fairness is not guaranteed.
//!
//! Which level a process belongs to is tracked in a `ProcessId → level` map
//! kept next to the queues, so a process handed out by
//! [`retrieve_next_no_requeue`](SchedulingStrategy::retrieve_next_no_requeue)
//! re-enters on its demoted level when the caller submits it again.

use std::collections::HashMap;

use tracing::trace;

use crate::error::{ConfigError, ProcessError};
use crate::process::{ProcessId, ProcessTable};

use super::round_robin::RoundRobin;
use super::{ensure_known, Grant, SchedulingStrategy};

/// Level count used when none is configured.
pub const DEFAULT_MLFQ_LEVELS: usize = 3;

#[derive(Debug, Clone)]
pub struct MultiLevelFeedbackQueue {
    levels: Vec<RoundRobin>,
    level_of: HashMap<ProcessId, usize>,
}

impl Default for MultiLevelFeedbackQueue {
    fn default() -> Self {
        Self::with_levels(DEFAULT_MLFQ_LEVELS)
    }
}

impl MultiLevelFeedbackQueue {
    /// Create a scheduler with `levels` queues.
    ///
    /// # Errors
    /// [`ConfigError::ZeroMlfqLevels`] if `levels == 0`.
    pub fn new(levels: usize) -> Result<Self, ConfigError> {
        if levels == 0 {
            return Err(ConfigError::ZeroMlfqLevels);
        }
        Ok(Self::with_levels(levels))
    }

    fn with_levels(levels: usize) -> Self {
        Self {
            levels: (0..levels).map(|_| RoundRobin::new()).collect(),
            level_of: HashMap::new(),
        }
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Level `id` is queued on, or will re-enter on.  `None` for processes
    /// that are unknown or were handed out with a finishing grant.
    pub fn level_of(&self, id: ProcessId) -> Option<usize> {
        self.level_of.get(&id).copied()
    }

    /// Number of processes queued on `level`.
    pub fn queued_on(&self, level: usize) -> usize {
        self.levels.get(level).map_or(0, |q| q.len())
    }

    fn lowest(&self) -> usize {
        self.levels.len() - 1
    }

    fn retrieve(
        &mut self,
        procs: &ProcessTable,
        requeue: bool,
    ) -> Result<Option<Grant>, ProcessError> {
        let lowest = self.lowest();

        for level in 0..lowest {
            let Some(grant) = self.levels[level].retrieve_next_no_requeue(procs)? else {
                continue;
            };

            if grant.quantum < procs.remaining_of(grant.process)? {
                if requeue {
                    self.levels[level + 1].admit(grant.process);
                }
                self.level_of.insert(grant.process, level + 1);
                trace!(
                    process = %grant.process,
                    from = level,
                    to = level + 1,
                    "process demoted"
                );
            } else {
                self.level_of.remove(&grant.process);
            }
            return Ok(Some(grant));
        }

        let next = if requeue {
            self.levels[lowest].retrieve_next(procs)?
        } else {
            self.levels[lowest].retrieve_next_no_requeue(procs)?
        };
        let Some(grant) = next else {
            return Ok(None);
        };

        if grant.quantum < procs.remaining_of(grant.process)? {
            self.level_of.insert(grant.process, lowest);
        } else {
            self.level_of.remove(&grant.process);
        }
        Ok(Some(grant))
    }
}

impl SchedulingStrategy for MultiLevelFeedbackQueue {
    fn enter(&mut self, id: ProcessId, procs: &ProcessTable) -> Result<(), ProcessError> {
        ensure_known(id, procs)?;
        if self.contains(id) {
            return Ok(());
        }
        let level = self
            .level_of
            .get(&id)
            .copied()
            .unwrap_or(0)
            .min(self.lowest());
        self.levels[level].admit(id);
        self.level_of.insert(id, level);
        Ok(())
    }

    fn retrieve_next(&mut self, procs: &ProcessTable) -> Result<Option<Grant>, ProcessError> {
        self.retrieve(procs, true)
    }

    fn retrieve_next_no_requeue(
        &mut self,
        procs: &ProcessTable,
    ) -> Result<Option<Grant>, ProcessError> {
        self.retrieve(procs, false)
    }

    fn has_ready(&self) -> bool {
        self.levels.iter().any(|q| q.has_ready())
    }

    fn len(&self) -> usize {
        self.levels.iter().map(|q| q.len()).sum()
    }

    fn contains(&self, id: ProcessId) -> bool {
        self.levels.iter().any(|q| q.contains(id))
    }

    fn remove(&mut self, id: ProcessId) -> bool {
        self.level_of.remove(&id);
        self.levels.iter_mut().any(|q| q.remove(id))
    }

    fn total_remaining_demand(&self, procs: &ProcessTable) -> u128 {
        self.levels
            .iter()
            .map(|q| q.total_remaining_demand(procs))
            .sum()
    }

    fn clear(&mut self) {
        self.levels.iter_mut().for_each(RoundRobin::clear);
        self.level_of.clear();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

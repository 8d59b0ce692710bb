/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! First-come, first-served.

use crate::error::ProcessError;
use crate::process::{ProcessId, ProcessTable};

use super::queue::ReadyQueue;
use super::{ensure_known, Grant, SchedulingStrategy};

/// Serves processes in arrival order and grants each its whole remaining
/// demand, so every process completes in a single burst.
#[derive(Debug, Default, Clone)]
pub struct Fifo {
    queue: ReadyQueue,
}

impl Fifo {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SchedulingStrategy for Fifo {
    fn enter(&mut self, id: ProcessId, procs: &ProcessTable) -> Result<(), ProcessError> {
        ensure_known(id, procs)?;
        self.queue.push_back(id);
        Ok(())
    }

    fn retrieve_next(&mut self, procs: &ProcessTable) -> Result<Option<Grant>, ProcessError> {
        self.queue
            .pop_front()
            .map(|id| Grant::full(id, procs))
            .transpose()
    }

    fn retrieve_next_no_requeue(
        &mut self,
        procs: &ProcessTable,
    ) -> Result<Option<Grant>, ProcessError> {
        // A full grant never needs re-queueing.
        self.retrieve_next(procs)
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn contains(&self, id: ProcessId) -> bool {
        self.queue.contains(id)
    }

    fn remove(&mut self, id: ProcessId) -> bool {
        self.queue.remove(id)
    }

    fn total_remaining_demand(&self, procs: &ProcessTable) -> u128 {
        self.queue.total_remaining(procs)
    }

    fn clear(&mut self) {
        self.queue.clear();
    }
}

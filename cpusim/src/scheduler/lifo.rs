/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Last-come, first-served.

use crate::error::ProcessError;
use crate::process::{ProcessId, ProcessTable};

use super::queue::ReadyQueue;
use super::{ensure_known, Grant, SchedulingStrategy};

/// Stack discipline: the most recently entered process runs next, with its
/// whole remaining demand.
#[derive(Debug, Default, Clone)]
pub struct Lifo {
    stack: ReadyQueue,
}

impl Lifo {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SchedulingStrategy for Lifo {
    fn enter(&mut self, id: ProcessId, procs: &ProcessTable) -> Result<(), ProcessError> {
        ensure_known(id, procs)?;
        self.stack.push_back(id);
        Ok(())
    }

    fn retrieve_next(&mut self, procs: &ProcessTable) -> Result<Option<Grant>, ProcessError> {
        self.stack
            .pop_back()
            .map(|id| Grant::full(id, procs))
            .transpose()
    }

    fn retrieve_next_no_requeue(
        &mut self,
        procs: &ProcessTable,
    ) -> Result<Option<Grant>, ProcessError> {
        self.retrieve_next(procs)
    }

    fn len(&self) -> usize {
        self.stack.len()
    }

    fn contains(&self, id: ProcessId) -> bool {
        self.stack.contains(id)
    }

    fn remove(&mut self, id: ProcessId) -> bool {
        self.stack.remove(id)
    }

    fn total_remaining_demand(&self, procs: &ProcessTable) -> u128 {
        self.stack.total_remaining(procs)
    }

    fn clear(&mut self) {
        self.stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Process;

    #[test]
    fn newest_process_runs_first() {
        let mut table = ProcessTable::new();
        let a = table.insert(Process::from_demand(20));
        let b = table.insert(Process::from_demand(5));
        let c = table.insert(Process::from_demand(70));

        let mut s = Lifo::new();
        for id in [a, b, c] {
            s.enter(id, &table).unwrap();
        }

        let order: Vec<_> = std::iter::from_fn(|| s.retrieve_next(&table).unwrap()).collect();
        assert_eq!(
            order,
            vec![
                Grant { process: c, quantum: 70 },
                Grant { process: b, quantum: 5 },
                Grant { process: a, quantum: 20 },
            ]
        );
    }

    #[test]
    fn re_entering_a_queued_process_does_not_move_it_to_the_top() {
        let mut table = ProcessTable::new();
        let a = table.insert(Process::from_demand(1));
        let b = table.insert(Process::from_demand(2));

        let mut s = Lifo::new();
        s.enter(a, &table).unwrap();
        s.enter(b, &table).unwrap();
        s.enter(a, &table).unwrap();

        assert_eq!(s.len(), 2);
        assert_eq!(s.retrieve_next(&table).unwrap().map(|g| g.process), Some(b));
    }
}

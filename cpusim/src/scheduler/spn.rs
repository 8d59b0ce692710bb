/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Shortest process next.

use crate::error::ProcessError;
use crate::process::{ProcessId, ProcessTable};

use super::queue::ReadyQueue;
use super::{ensure_known, Grant, SchedulingStrategy};

/// Always serves the queued process with the least remaining demand (ties by
/// arrival), granting all of it.
///
/// Long processes can starve while short ones keep arriving.
#[derive(Debug, Default, Clone)]
pub struct ShortestProcessNext {
    queue: ReadyQueue,
}

impl ShortestProcessNext {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SchedulingStrategy for ShortestProcessNext {
    fn enter(&mut self, id: ProcessId, procs: &ProcessTable) -> Result<(), ProcessError> {
        ensure_known(id, procs)?;
        self.queue.push_back(id);
        Ok(())
    }

    fn retrieve_next(&mut self, procs: &ProcessTable) -> Result<Option<Grant>, ProcessError> {
        let order = procs.demand_order();
        let next = self
            .queue
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| order(a, b))
            .map(|(index, _)| index);
        next.and_then(|index| self.queue.remove_at(index))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Process;

    #[test]
    fn least_remaining_demand_first_ties_by_arrival() {
        let mut table = ProcessTable::new();
        let big = table.insert(Process::from_demand(70));
        let tie_a = table.insert(Process::from_demand(10));
        let small = table.insert(Process::from_demand(5));
        let tie_b = table.insert(Process::from_demand(10));

        let mut s = ShortestProcessNext::new();
        for id in [big, tie_a, small, tie_b] {
            s.enter(id, &table).unwrap();
        }

        let order: Vec<_> = std::iter::from_fn(|| s.retrieve_next(&table).unwrap())
            .map(|g| (g.process, g.quantum))
            .collect();
        assert_eq!(
            order,
            vec![(small, 5), (tie_a, 10), (tie_b, 10), (big, 70)]
        );
    }

    #[test]
    fn picks_up_reduced_demand_of_returning_process() {
        let mut table = ProcessTable::new();
        let a = table.insert(Process::from_demand(50));
        let b = table.insert(Process::from_demand(30));

        let mut s = ShortestProcessNext::new();
        s.enter(b, &table).unwrap();
        table.get_mut(a).unwrap().reduce_remaining(45).unwrap();
        s.enter(a, &table).unwrap();

        assert_eq!(s.retrieve_next(&table), Ok(Some(Grant { process: a, quantum: 5 })));
    }
}

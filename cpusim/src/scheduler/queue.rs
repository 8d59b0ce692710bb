/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Ordered ready queue with O(1) membership checks.
//!
//! Shared by every policy so that `enter` is idempotent in one place: a
//! process id is in the queue at most once.

use std::collections::{HashSet, VecDeque};

use crate::process::{ProcessId, ProcessTable};

#[derive(Debug, Default, Clone)]
pub(crate) struct ReadyQueue {
    order: VecDeque<ProcessId>,
    members: HashSet<ProcessId>,
}

impl ReadyQueue {
    /// Append `id`.  Returns `false` if it was already queued.
    pub(crate) fn push_back(&mut self, id: ProcessId) -> bool {
        if !self.members.insert(id) {
            return false;
        }
        self.order.push_back(id);
        true
    }

    pub(crate) fn pop_front(&mut self) -> Option<ProcessId> {
        let id = self.order.pop_front()?;
        self.members.remove(&id);
        Some(id)
    }

    pub(crate) fn pop_back(&mut self) -> Option<ProcessId> {
        let id = self.order.pop_back()?;
        self.members.remove(&id);
        Some(id)
    }

    /// Remove the entry at `index` (queue order).
    pub(crate) fn remove_at(&mut self, index: usize) -> Option<ProcessId> {
        let id = self.order.remove(index)?;
        self.members.remove(&id);
        Some(id)
    }

    pub(crate) fn remove(&mut self, id: ProcessId) -> bool {
        if !self.members.remove(&id) {
            return false;
        }
        self.order.retain(|p| *p != id);
        true
    }

    pub(crate) fn contains(&self, id: ProcessId) -> bool {
        self.members.contains(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = ProcessId> + '_ {
        self.order.iter().copied()
    }

    pub(crate) fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }

    pub(crate) fn total_remaining(&self, procs: &ProcessTable) -> u128 {
        self.order
            .iter()
            .map(|id| u128::from(procs.remaining(*id)))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Process;

    #[test]
    fn push_back_is_idempotent() {
        let mut table = ProcessTable::new();
        let a = table.insert(Process::from_demand(3));
        let mut q = ReadyQueue::default();

        assert!(q.push_back(a));
        assert!(!q.push_back(a));
        assert_eq!(q.len(), 1);
        assert_eq!(q.total_remaining(&table), 3);
    }

    #[test]
    fn total_remaining_does_not_wrap_on_huge_demands() {
        let mut table = ProcessTable::new();
        let mut q = ReadyQueue::default();
        for _ in 0..3 {
            q.push_back(table.insert(Process::from_demand(u64::MAX)));
        }
        assert_eq!(q.total_remaining(&table), 3 * u128::from(u64::MAX));
    }

    #[test]
    fn removal_keeps_order_of_the_rest() {
        let mut table = ProcessTable::new();
        let ids: Vec<_> = (0..4).map(|_| table.insert(Process::from_demand(1))).collect();
        let mut q = ReadyQueue::default();
        for id in &ids {
            q.push_back(*id);
        }

        assert!(q.remove(ids[1]));
        assert!(!q.remove(ids[1]));
        assert_eq!(q.remove_at(1), Some(ids[2]));
        assert_eq!(q.iter().collect::<Vec<_>>(), vec![ids[0], ids[3]]);
        assert_eq!(q.pop_back(), Some(ids[3]));
        assert_eq!(q.pop_front(), Some(ids[0]));
        assert_eq!(q.len(), 0);
        assert!(!q.contains(ids[0]));
    }
}

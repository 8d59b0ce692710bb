/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Processes: the units of computational work a CPU multiplexes.
//!
//! ```text
//! Request ──(demand)──►  Process  ──(ProcessTable::insert)──►  ProcessId
//!                          ↑ owned by the table                 ↑ used by schedulers,
//!                            mutated only by bursts               the CPU and the kernel
//! ```
//!
//! # Ownership model
//! A [`Process`] lives in exactly one [`ProcessTable`] (an arena).  Scheduler
//! queues, the CPU's active set and burst-completion events only ever hold
//! the stable [`ProcessId`], never the process itself, so queue membership is
//! not stored inside the process.
//!
//! # Natural order
//! Ordering by remaining demand is a scheduling concern, so it is **not** an
//! `Ord` impl on `Process`.  Policies that need it pass
//! [`ProcessTable::demand_order`] to their sort / min routines.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::ProcessError;
use crate::kernel::SimTime;
use crate::request::Request;

// ── ProcessId ─────────────────────────────────────────────────────────────────

/// Stable identifier of a process inside its [`ProcessTable`].
///
/// Ids are handed out in strictly increasing order, so comparing ids compares
/// insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(u64);

impl ProcessId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

// ── Process ───────────────────────────────────────────────────────────────────

/// Demand-tracking unit of work.
///
/// A demand of `0` is allowed: such a process completes on its first burst
/// without consuming time.
#[derive(Clone)]
pub struct Process {
    total_demand: u64,
    remaining_demand: u64,
    burst_started: Option<SimTime>,
    submitted_at: Option<SimTime>,
    request: Option<Weak<dyn Request>>,
}

impl Process {
    /// Create a process with `total_demand` work units.
    ///
    /// # Errors
    /// [`ProcessError::InvalidArgument`] if `total_demand` is negative.
    pub fn new(total_demand: i64) -> Result<Self, ProcessError> {
        let demand = u64::try_from(total_demand).map_err(|_| ProcessError::InvalidArgument {
            demand: total_demand,
        })?;
        Ok(Self::from_demand(demand))
    }

    /// Infallible constructor for callers that already hold an unsigned demand.
    pub fn from_demand(demand: u64) -> Self {
        Self {
            total_demand: demand,
            remaining_demand: demand,
            burst_started: None,
            submitted_at: None,
            request: None,
        }
    }

    /// Wrap `request.demand()` and keep a weak back-reference to the request
    /// so the completion can be reported to it.
    pub fn for_request<R>(request: &Rc<R>) -> Self
    where
        R: Request + 'static,
    {
        let weak: Weak<R> = Rc::downgrade(request);
        let weak: Weak<dyn Request> = weak;
        Self {
            request: Some(weak),
            ..Self::from_demand(request.demand())
        }
    }

    pub fn total_demand(&self) -> u64 {
        self.total_demand
    }

    /// Remaining demand as of the start of the latest burst.
    pub fn remaining_demand(&self) -> u64 {
        self.remaining_demand
    }

    pub fn is_finished(&self) -> bool {
        self.remaining_demand == 0
    }

    pub fn burst_started(&self) -> Option<SimTime> {
        self.burst_started
    }

    pub fn submitted_at(&self) -> Option<SimTime> {
        self.submitted_at
    }

    /// The owning request, if any and still alive.
    pub fn request(&self) -> Option<Rc<dyn Request>> {
        self.request.as_ref().and_then(Weak::upgrade)
    }

    /// Subtract `amount` from the remaining demand.
    ///
    /// # Errors
    /// [`ProcessError::OverReduction`] if `amount` exceeds the remaining
    /// demand.  Nothing is clamped.
    pub fn reduce_remaining(&mut self, amount: u64) -> Result<(), ProcessError> {
        if amount > self.remaining_demand {
            return Err(ProcessError::OverReduction {
                remaining: self.remaining_demand,
                amount,
            });
        }
        self.remaining_demand -= amount;
        Ok(())
    }

    /// Remaining demand extrapolated to `peek_time`, assuming the process has
    /// been draining at `capacity_share` work units per time unit since its
    /// current burst started.
    ///
    /// `remaining − (peek_time − burst_start) × capacity_share`
    ///
    /// Pure: the process is not modified.  Without a burst in progress this is
    /// just the remaining demand.
    pub fn projected_remaining(&self, peek_time: SimTime, capacity_share: f64) -> f64 {
        let remaining = self.remaining_demand as f64;
        match self.burst_started {
            Some(start) => {
                let running = peek_time.as_units() - start.as_units();
                remaining - running * capacity_share
            }
            None => remaining,
        }
    }

    pub fn stamp_burst_started(&mut self, start: SimTime) {
        self.burst_started = Some(start);
    }

    pub fn clear_burst(&mut self) {
        self.burst_started = None;
    }

    pub(crate) fn stamp_submitted(&mut self, at: SimTime) {
        if self.submitted_at.is_none() {
            self.submitted_at = Some(at);
        }
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("total_demand", &self.total_demand)
            .field("remaining_demand", &self.remaining_demand)
            .field("burst_started", &self.burst_started)
            .field("submitted_at", &self.submitted_at)
            .field("has_request", &self.request.is_some())
            .finish()
    }
}

// ── ProcessTable ──────────────────────────────────────────────────────────────

/// Arena of live processes, keyed by [`ProcessId`].
///
/// `BTreeMap` so iteration is always in id (= insertion) order, which keeps
/// every derived sum and listing deterministic.
#[derive(Debug, Default)]
pub struct ProcessTable {
    processes: BTreeMap<ProcessId, Process>,
    next_id: u64,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move `process` into the table and return its new id.
    pub fn insert(&mut self, process: Process) -> ProcessId {
        let id = ProcessId(self.next_id);
        self.next_id += 1;
        self.processes.insert(id, process);
        id
    }

    pub fn get(&self, id: ProcessId) -> Option<&Process> {
        self.processes.get(&id)
    }

    pub fn get_mut(&mut self, id: ProcessId) -> Option<&mut Process> {
        self.processes.get_mut(&id)
    }

    /// Like [`ProcessTable::get_mut`] but unknown ids are an error.
    pub fn expect_mut(&mut self, id: ProcessId) -> Result<&mut Process, ProcessError> {
        self.processes
            .get_mut(&id)
            .ok_or(ProcessError::UnknownProcess(id))
    }

    pub fn remove(&mut self, id: ProcessId) -> Option<Process> {
        self.processes.remove(&id)
    }

    pub fn contains(&self, id: ProcessId) -> bool {
        self.processes.contains_key(&id)
    }

    /// Remaining demand of `id`, or `0` for ids not in the table.
    pub fn remaining(&self, id: ProcessId) -> u64 {
        self.processes
            .get(&id)
            .map(Process::remaining_demand)
            .unwrap_or(0)
    }

    /// Remaining demand of `id`; unknown ids are an error.
    pub fn remaining_of(&self, id: ProcessId) -> Result<u64, ProcessError> {
        self.processes
            .get(&id)
            .map(Process::remaining_demand)
            .ok_or(ProcessError::UnknownProcess(id))
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = ProcessId> + '_ {
        self.processes.keys().copied()
    }

    /// Comparator implementing the natural process order: ascending remaining
    /// demand, ties broken by id (insertion order).
    pub fn demand_order(&self) -> impl Fn(&ProcessId, &ProcessId) -> Ordering + '_ {
        move |a, b| {
            self.remaining(*a)
                .cmp(&self.remaining(*b))
                .then_with(|| a.cmp(b))
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

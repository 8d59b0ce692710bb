/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Seam towards the request / network layer.
//!
//! The request layer lives outside this crate.  It hands work to a CPU via
//! [`Cpu::submit_request`](crate::cpu::Cpu::submit_request) and learns about
//! finished computations through [`Request::computation_completed`], which is
//! called exactly once per process that drains to zero demand.  Canceled
//! processes never report.

use crate::kernel::{Kernel, SimTime};
use crate::process::ProcessId;

/// Record of one finished computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub process: ProcessId,
    pub total_demand: u64,
    /// When the process was handed to the CPU.
    pub submitted_at: SimTime,
    /// When its last burst finished.
    pub completed_at: SimTime,
}

impl Completion {
    /// Time between submission and completion.
    pub fn response_time(&self) -> SimTime {
        self.completed_at.saturating_sub(self.submitted_at)
    }
}

/// A request whose computation runs on a simulated CPU.
///
/// Only a weak reference is kept by the process, so a request that is
/// dropped (e.g. timed out upstream) simply never hears back.
pub trait Request {
    /// Work units this request needs.
    fn demand(&self) -> u64;

    /// Called once the request's process has no demand left.
    ///
    /// The CPU has already released its internal state at this point, so the
    /// implementation may submit follow-up work or schedule new events.
    fn computation_completed(&self, kernel: &mut Kernel, completion: &Completion);
}

/// Non-owning listener that sees every completion of a CPU.
pub trait ComputationObserver {
    fn computation_completed(&self, kernel: &mut Kernel, completion: &Completion);
}

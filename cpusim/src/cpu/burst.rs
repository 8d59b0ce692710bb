/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Burst completion.
//!
//! Fired by the kernel when a burst's time is up.  The process is charged
//! exactly the granted quantum, whatever time actually elapsed, and then
//! either goes back to the scheduler or completes.
//!
//! A completion is raised exactly once per process.  Notification happens
//! after the CPU state is updated and its borrow released, so a request may
//! submit follow-up work to the same CPU from inside the callback.

use tracing::{debug, warn};

use crate::error::{ProcessError, SimResult};
use crate::kernel::{EventId, Kernel, SimTime};
use crate::process::ProcessId;
use crate::request::Completion;
use crate::scheduler::SchedulingStrategy;

use super::{Cpu, CpuInner};

/// Bookkeeping for one process occupying an active slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveBurst {
    /// Pending burst-completion event.
    pub event: EventId,
    /// Demand granted for this burst.
    pub quantum: u64,
    pub started: SimTime,
}

/// Handle the end of `process`'s current burst.
pub(super) fn complete(cpu: &Cpu, kernel: &mut Kernel, process: ProcessId) -> SimResult<()> {
    let now = kernel.now();

    let finished = {
        let mut inner = cpu.inner().borrow_mut();
        let Some(burst) = inner.active.remove(&process) else {
            warn!(cpu = %inner.name, process = %process, "burst completion for inactive process ignored");
            return Ok(());
        };

        let p = inner.procs.expect_mut(process)?;
        p.reduce_remaining(burst.quantum)?;
        p.clear_burst();
        let remaining = p.remaining_demand();

        let finished = if remaining > 0 {
            let CpuInner {
                scheduler, procs, ..
            } = &mut *inner;
            scheduler.enter(process, procs)?;
            debug!(
                cpu = %inner.name,
                process = %process,
                granted = burst.quantum,
                remaining,
                now = %now,
                "burst finished, process re-queued"
            );
            None
        } else {
            let p = inner
                .procs
                .remove(process)
                .ok_or(ProcessError::UnknownProcess(process))?;
            inner.completed += 1;
            let completion = Completion {
                process,
                total_demand: p.total_demand(),
                submitted_at: p.submitted_at().unwrap_or(burst.started),
                completed_at: now,
            };
            debug!(
                cpu = %inner.name,
                process = %process,
                demand = completion.total_demand,
                response = %completion.response_time(),
                now = %now,
                "process completed"
            );
            Some((completion, p.request(), inner.observers.clone()))
        };

        inner.record_usage(now);
        finished
    };

    cpu.request_dispatch(kernel)?;

    if let Some((completion, request, observers)) = finished {
        if let Some(request) = request {
            request.computation_completed(kernel, &completion);
        }
        for observer in observers {
            observer.computation_completed(kernel, &completion);
        }
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

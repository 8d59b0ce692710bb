/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured error types for the CPU resource engine.
//!
//! Three enums model the three failure layers, and [`SimError`] wraps them for
//! anything that crosses a kernel callback:
//!
//! * [`ConfigError`]: rejected construction-time parameters.  Fatal: no
//!   partially built CPU or scheduler ever escapes.
//! * [`KernelError`]: misuse of the event kernel (scheduling in the past,
//!   rescheduling an event that is no longer pending, delays past the end of
//!   virtual time).
//! * [`ProcessError`]: misuse of a process (negative demand, reducing the
//!   remaining demand below zero).
//!
//! Kernel and process errors are invariant violations: a caller bug.  They
//! abort the run and are never clamped or retried, since a silent correction
//! would make traces irreproducible.
//!
//! A full active-slot set or an empty scheduler are **not** errors; those are
//! ordinary states reported through `Option` / `bool` returns.

use thiserror::Error;

use crate::kernel::{EventId, SimTime};
use crate::process::ProcessId;

// ── Configuration ─────────────────────────────────────────────────────────────

/// A construction-time parameter was out of range.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Capacity must be a finite, strictly positive number of work units per
    /// time unit.
    #[error("CPU capacity must be > 0 (got {0})")]
    NonPositiveCapacity(f64),

    /// A CPU needs at least one active slot to ever run anything.
    #[error("active slot limit must be > 0")]
    ZeroActiveSlots,

    /// An MLFQ scheduler needs at least one level.
    #[error("MLFQ level count must be > 0")]
    ZeroMlfqLevels,

    /// The scheduler policy string is not recognised.
    #[error("unknown scheduler policy: '{0}' (valid: fifo, lifo, spn, roundrobin, mlfq, mlfq:<levels>)")]
    UnknownPolicy(String),
}

// ── Kernel ────────────────────────────────────────────────────────────────────

/// Misuse of the event kernel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelError {
    /// The requested firing time lies before the current virtual time.
    #[error("cannot schedule at {requested}: current time is {now}")]
    InvalidTime { requested: SimTime, now: SimTime },

    /// The event already fired or was canceled.
    #[error("event {event} is not scheduled (already fired or canceled)")]
    NotScheduled { event: EventId },

    /// A delay of `delay_units` from `now` lies past the end of virtual time.
    #[error("a delay of {delay_units} time units from {now} overflows the virtual clock")]
    TimeOverflow { delay_units: String, now: SimTime },
}

// ── Process ───────────────────────────────────────────────────────────────────

/// Misuse of a [`Process`](crate::process::Process).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessError {
    /// A process was created with a negative demand.
    #[error("process demand must be >= 0 (got {demand})")]
    InvalidArgument { demand: i64 },

    /// A burst tried to drain more demand than the process has left.
    #[error("cannot reduce remaining demand (which is {remaining}) by {amount}")]
    OverReduction { remaining: u64, amount: u64 },

    /// The process id is not (or no longer) present in the process table.
    #[error("unknown process {0}")]
    UnknownProcess(ProcessId),
}

// ── Top level ─────────────────────────────────────────────────────────────────

/// Error returned by kernel callbacks and by [`Kernel::run`].
///
/// [`Kernel::run`]: crate::kernel::Kernel::run
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error(transparent)]
    Process(#[from] ProcessError),
}

pub type SimResult<T> = Result<T, SimError>;

/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Virtual time.
//!
//! [`SimTime`] wraps a [`Duration`] measured from the start of the simulation.
//! One simulation *time unit* (the unit in which capacities and scenario times
//! are expressed) maps to one second of `SimTime`, which gives nanosecond
//! resolution and a total order without comparing floats inside the event
//! queue.

use std::fmt;
use std::ops::{Add, Sub};
use std::time::Duration;

/// A point (or span) of virtual time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimTime(Duration);

impl SimTime {
    /// Start of the simulation.
    pub const ZERO: SimTime = SimTime(Duration::ZERO);

    /// Build from a (fractional) number of time units.
    ///
    /// Negative, NaN and infinite inputs are not representable; callers must
    /// validate first (see [`SimTime::try_from_units`]).
    pub fn from_units(units: f64) -> Self {
        SimTime(Duration::from_secs_f64(units))
    }

    pub const fn from_millis(millis: u64) -> Self {
        SimTime(Duration::from_millis(millis))
    }

    /// Checked variant of [`SimTime::from_units`].
    pub fn try_from_units(units: f64) -> Option<Self> {
        Duration::try_from_secs_f64(units).ok().map(SimTime)
    }

    /// Value in (fractional) time units.
    pub fn as_units(self) -> f64 {
        self.0.as_secs_f64()
    }

    pub fn as_duration(self) -> Duration {
        self.0
    }

    /// `self + rhs`, or `None` if the result is past the end of virtual time.
    pub fn checked_add(self, rhs: SimTime) -> Option<SimTime> {
        self.0.checked_add(rhs.0).map(SimTime)
    }

    /// `self - earlier`, or [`SimTime::ZERO`] if `earlier` is later.
    pub fn saturating_sub(self, earlier: SimTime) -> SimTime {
        SimTime(self.0.saturating_sub(earlier.0))
    }
}

impl From<Duration> for SimTime {
    fn from(d: Duration) -> Self {
        SimTime(d)
    }
}

impl Add for SimTime {
    type Output = SimTime;

    fn add(self, rhs: SimTime) -> SimTime {
        SimTime(self.0 + rhs.0)
    }
}

impl Sub for SimTime {
    type Output = SimTime;

    /// # Panics
    /// Panics if `rhs > self`; use [`SimTime::saturating_sub`] when that can
    /// happen.
    fn sub(self, rhs: SimTime) -> SimTime {
        SimTime(self.0 - rhs.0)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={}", self.as_units())
    }
}

/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Binned CPU utilisation.
//!
//! The CPU's usage (`active / slots`) is a step function of virtual time.
//! [`UtilizationTracker`] keeps the steps that still overlap the most recent
//! bin and integrates them:
//!
//! ```text
//!            usage
//!   1.0 ─┐        ┌──────
//!        │        │
//!   0.0  └────────┘
//!        ├─────── bin ──────┤
//!      now−bin             now     binned = ∫ usage dt / bin
//! ```
//!
//! The window is clamped at `t = 0`, but the integral is always divided by the
//! full bin length, so early samples read low.

use std::collections::VecDeque;

use crate::kernel::SimTime;

/// Default integration window: half a time unit.
pub const DEFAULT_BIN: SimTime = SimTime::from_millis(500);

/// Default spacing of utilisation probe samples.
pub const DEFAULT_PROBE_INTERVAL: SimTime = SimTime::from_millis(100);

/// One utilisation probe reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UtilizationSample {
    pub at: SimTime,
    pub binned_utilization: f64,
    pub relative_load: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct UsageStep {
    usage: f64,
    start: SimTime,
    /// `None` for the step that is still current.
    end: Option<SimTime>,
}

impl UsageStep {
    fn work_in(&self, from: SimTime, to: SimTime) -> f64 {
        if self.usage == 0.0 {
            return 0.0;
        }
        let start = self.start.max(from);
        let end = self.end.map_or(to, |e| e.min(to));
        if end <= start {
            return 0.0;
        }
        (end - start).as_units() * self.usage
    }
}

/// Step-function history of a CPU's usage.
#[derive(Debug, Clone)]
pub struct UtilizationTracker {
    history: VecDeque<UsageStep>,
    bin: SimTime,
}

impl Default for UtilizationTracker {
    fn default() -> Self {
        Self::new(DEFAULT_BIN)
    }
}

impl UtilizationTracker {
    /// Start idle at `t = 0`.
    pub fn new(bin: SimTime) -> Self {
        let mut history = VecDeque::new();
        history.push_back(UsageStep {
            usage: 0.0,
            start: SimTime::ZERO,
            end: None,
        });
        Self { history, bin }
    }

    pub fn bin(&self) -> SimTime {
        self.bin
    }

    /// Usage of the current step.
    pub fn current(&self) -> f64 {
        self.history.back().map_or(0.0, |s| s.usage)
    }

    /// Record that usage became `usage` at `now`.  Unchanged usage is not a
    /// new step.
    pub fn record(&mut self, now: SimTime, usage: f64) {
        match self.history.back_mut() {
            Some(last) if last.usage == usage => {}
            Some(last) => {
                last.end = Some(now);
                self.history.push_back(UsageStep {
                    usage,
                    start: now,
                    end: None,
                });
            }
            None => self.history.push_back(UsageStep {
                usage,
                start: now,
                end: None,
            }),
        }
        self.prune(now);
    }

    /// Average usage over `[now − bin, now]`.
    pub fn binned_utilization(&mut self, now: SimTime) -> f64 {
        self.prune(now);
        if self.bin == SimTime::ZERO {
            return self.current();
        }
        let from = now.saturating_sub(self.bin);
        let work: f64 = self.history.iter().map(|s| s.work_in(from, now)).sum();
        work / self.bin.as_units()
    }

    /// Number of steps currently retained.
    pub fn retained(&self) -> usize {
        self.history.len()
    }

    fn prune(&mut self, now: SimTime) {
        let from = now.saturating_sub(self.bin);
        while self
            .history
            .front()
            .is_some_and(|s| s.end.is_some_and(|end| end < from))
        {
            self.history.pop_front();
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Discrete-event kernel.
//!
//! [`Kernel`] owns the virtual clock and a time-ordered queue of pending
//! [`Event`]s.  Each event carries a one-shot callback that receives
//! `&mut Kernel`, so handlers can schedule, reschedule or cancel further
//! events while they run.  There are no fibers or coroutines: every wait is
//! expressed as an event scheduled in the future.
//!
//! # Ordering
//! Pending events are keyed by `(time, priority, sequence)`:
//!
//! | Field | Order |
//! |---|---|
//! | `time` | earliest first |
//! | `priority` | higher [`Priority`] first |
//! | `sequence` | insertion order (a reschedule counts as a fresh insertion) |
//!
//! The key is a plain `BTreeMap` key, so the tie-break is exact and traces
//! are reproducible run after run.
//!
//! # Example
//! ```rust,ignore
//! let mut kernel = Kernel::new();
//! kernel.schedule_in(SimTime::from_units(1.0), Event::new("hello", |k| {
//!     info!(now = %k.now(), "fired");
//!     Ok(())
//! }))?;
//! kernel.run()?;
//! ```

pub mod time;

pub use time::SimTime;

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use tracing::{debug, trace};

use crate::error::{KernelError, SimResult};

// ── Identifiers ───────────────────────────────────────────────────────────────

/// Stable handle of a scheduled event.
///
/// The id survives [`Kernel::reschedule`]; it stops being valid once the event
/// fires or is canceled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event#{}", self.0)
    }
}

/// Scheduling priority used to order events stamped with the same time.
///
/// Higher values fire first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Priority(pub i8);

impl Priority {
    pub const VERY_LOW: Priority = Priority(-2);
    pub const LOW: Priority = Priority(-1);
    pub const NORMAL: Priority = Priority(0);
    pub const HIGH: Priority = Priority(1);
    pub const VERY_HIGH: Priority = Priority(2);
}

// ── Event ─────────────────────────────────────────────────────────────────────

type Callback = Box<dyn FnOnce(&mut Kernel) -> SimResult<()>>;

/// A unit of work to run at some virtual time.
pub struct Event {
    label: &'static str,
    priority: Priority,
    callback: Callback,
}

impl Event {
    /// Create an event with [`Priority::NORMAL`].
    ///
    /// `label` only shows up in trace logs.
    pub fn new<F>(label: &'static str, callback: F) -> Self
    where
        F: FnOnce(&mut Kernel) -> SimResult<()> + 'static,
    {
        Self {
            label,
            priority: Priority::NORMAL,
            callback: Box::new(callback),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("label", &self.label)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Queue key.  Field order *is* the firing order (derived `Ord`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct EventKey {
    time: SimTime,
    priority: Reverse<Priority>,
    sequence: u64,
}

#[derive(Debug)]
struct PendingEvent {
    id: EventId,
    event: Event,
}

// ── RunSummary ────────────────────────────────────────────────────────────────

/// Outcome of [`Kernel::run`] / [`Kernel::run_until`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Virtual time when the loop ended.
    pub end_time: SimTime,
    /// Events fired during this call.
    pub events_fired: u64,
    /// `true` if a callback called [`Kernel::stop`].
    pub stopped: bool,
}

// ── Kernel ────────────────────────────────────────────────────────────────────

/// Virtual clock plus pending-event queue.
///
/// Single-threaded by construction: callbacks are `'static` but not `Send`, so
/// simulation state is usually shared between them through `Rc<RefCell<_>>`.
#[derive(Debug, Default)]
pub struct Kernel {
    now: SimTime,
    queue: BTreeMap<EventKey, PendingEvent>,
    /// Pending event id → its current queue key.
    index: HashMap<EventId, EventKey>,
    next_sequence: u64,
    next_event_id: u64,
    events_fired: u64,
    stop_requested: bool,
}

impl Kernel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Number of events still pending.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Total number of events fired since the kernel was created.
    pub fn events_fired(&self) -> u64 {
        self.events_fired
    }

    /// Returns `true` while `id` is waiting in the queue.
    pub fn is_scheduled(&self, id: EventId) -> bool {
        self.index.contains_key(&id)
    }

    /// Firing time of a pending event.
    pub fn scheduled_time(&self, id: EventId) -> Option<SimTime> {
        self.index.get(&id).map(|k| k.time)
    }

    // ── Scheduling ────────────────────────────────────────────────────────────

    /// Schedule `event` to fire `delay` after the current time.
    ///
    /// # Errors
    /// [`KernelError::TimeOverflow`] if `now + delay` is not representable.
    pub fn schedule_in(&mut self, delay: SimTime, event: Event) -> Result<EventId, KernelError> {
        let time = self
            .now
            .checked_add(delay)
            .ok_or_else(|| KernelError::TimeOverflow {
                delay_units: delay.as_units().to_string(),
                now: self.now,
            })?;
        Ok(self.insert(time, event))
    }

    /// Schedule `event` to fire at the absolute virtual `time`.
    ///
    /// # Errors
    /// [`KernelError::InvalidTime`] if `time` is before [`Kernel::now`].
    pub fn schedule_at(&mut self, time: SimTime, event: Event) -> Result<EventId, KernelError> {
        self.check_not_past(time)?;
        Ok(self.insert(time, event))
    }

    /// Move a pending event to `new_time`.
    ///
    /// The event keeps its id and priority but gets a fresh sequence number,
    /// so it fires after events already pending at the same time and priority.
    ///
    /// # Errors
    /// * [`KernelError::NotScheduled`] if the event already fired or was
    ///   canceled.
    /// * [`KernelError::InvalidTime`] if `new_time` is in the past.
    pub fn reschedule(&mut self, id: EventId, new_time: SimTime) -> Result<(), KernelError> {
        let old_key = *self
            .index
            .get(&id)
            .ok_or(KernelError::NotScheduled { event: id })?;
        self.check_not_past(new_time)?;

        let pending = self
            .queue
            .remove(&old_key)
            .ok_or(KernelError::NotScheduled { event: id })?;
        let new_key = EventKey {
            time: new_time,
            priority: old_key.priority,
            sequence: self.take_sequence(),
        };
        self.index.insert(id, new_key);
        self.queue.insert(new_key, pending);

        trace!(event = %id, from = %old_key.time, to = %new_time, "event rescheduled");
        Ok(())
    }

    /// Remove a pending event.
    ///
    /// Returns `false` (and does nothing) if the event already fired or was
    /// canceled before.
    pub fn cancel(&mut self, id: EventId) -> bool {
        let Some(key) = self.index.remove(&id) else {
            return false;
        };
        let removed = self.queue.remove(&key);
        if let Some(pending) = &removed {
            trace!(event = %id, label = pending.event.label, at = %key.time, "event canceled");
        }
        removed.is_some()
    }

    // ── Execution ─────────────────────────────────────────────────────────────

    /// Ask the running [`Kernel::run`] loop to return after the current event.
    pub fn stop(&mut self) {
        self.stop_requested = true;
    }

    /// Fire the earliest pending event.
    ///
    /// Returns `Ok(false)` if nothing was pending.
    ///
    /// # Errors
    /// Whatever the callback returned.  The event is consumed either way.
    pub fn step(&mut self) -> SimResult<bool> {
        let Some((key, pending)) = self.queue.pop_first() else {
            return Ok(false);
        };
        self.index.remove(&pending.id);

        debug_assert!(key.time >= self.now, "event queue went back in time");
        self.now = key.time;
        self.events_fired += 1;

        trace!(
            event = %pending.id,
            label = pending.event.label,
            at = %key.time,
            priority = key.priority.0 .0,
            "firing event"
        );

        (pending.event.callback)(self)?;
        Ok(true)
    }

    /// Fire events until the queue is empty or a callback calls
    /// [`Kernel::stop`].
    pub fn run(&mut self) -> SimResult<RunSummary> {
        let fired_before = self.events_fired;
        self.stop_requested = false;

        while !self.stop_requested && self.step()? {}

        Ok(self.summary(fired_before))
    }

    /// Like [`Kernel::run`] but never advances past `horizon`.
    ///
    /// Events stamped later than `horizon` stay pending.  Unless stopped
    /// early, the clock is left at `horizon`.
    ///
    /// # Errors
    /// [`KernelError::InvalidTime`] if `horizon` is already in the past, plus
    /// anything a callback returns.
    pub fn run_until(&mut self, horizon: SimTime) -> SimResult<RunSummary> {
        self.check_not_past(horizon)?;
        let fired_before = self.events_fired;
        self.stop_requested = false;

        while !self.stop_requested {
            let next_time = self.queue.first_key_value().map(|(key, _)| key.time);
            match next_time {
                Some(time) if time <= horizon => {
                    self.step()?;
                }
                _ => break,
            }
        }

        if !self.stop_requested {
            self.now = horizon;
        }

        Ok(self.summary(fired_before))
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn insert(&mut self, time: SimTime, event: Event) -> EventId {
        let id = EventId(self.next_event_id);
        self.next_event_id += 1;

        let key = EventKey {
            time,
            priority: Reverse(event.priority),
            sequence: self.take_sequence(),
        };

        trace!(event = %id, label = event.label, at = %time, "event scheduled");

        self.index.insert(id, key);
        self.queue.insert(key, PendingEvent { id, event });
        id
    }

    fn take_sequence(&mut self) -> u64 {
        let seq = self.next_sequence;
        self.next_sequence += 1;
        seq
    }

    fn check_not_past(&self, time: SimTime) -> Result<(), KernelError> {
        if time < self.now {
            return Err(KernelError::InvalidTime {
                requested: time,
                now: self.now,
            });
        }
        Ok(())
    }

    fn summary(&self, fired_before: u64) -> RunSummary {
        let summary = RunSummary {
            end_time: self.now,
            events_fired: self.events_fired - fired_before,
            stopped: self.stop_requested,
        };
        debug!(
            end_time = %summary.end_time,
            events_fired = summary.events_fired,
            stopped = summary.stopped,
            pending = self.queue.len(),
            "kernel run finished"
        );
        summary
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProcessError, SimError};
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    /// Helper: event that appends `tag` and the firing time to `log`.
    fn recorder(log: &Rc<RefCell<Vec<(&'static str, SimTime)>>>, tag: &'static str) -> Event {
        let log = Rc::clone(log);
        Event::new(tag, move |k| {
            log.borrow_mut().push((tag, k.now()));
            Ok(())
        })
    }

    fn tags(log: &Rc<RefCell<Vec<(&'static str, SimTime)>>>) -> Vec<&'static str> {
        log.borrow().iter().map(|(t, _)| *t).collect()
    }

    fn t(units: f64) -> SimTime {
        SimTime::from_units(units)
    }

    // ── Ordering ──────────────────────────────────────────────────────────────

    #[test]
    fn events_fire_in_time_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut k = Kernel::new();
        k.schedule_at(t(3.0), recorder(&log, "c")).unwrap();
        k.schedule_at(t(1.0), recorder(&log, "a")).unwrap();
        k.schedule_at(t(2.0), recorder(&log, "b")).unwrap();

        let summary = k.run().unwrap();

        assert_eq!(tags(&log), vec!["a", "b", "c"]);
        assert_eq!(summary.end_time, t(3.0));
        assert_eq!(summary.events_fired, 3);
        assert!(!summary.stopped);
    }

    #[test]
    fn same_time_same_priority_fires_in_submission_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut k = Kernel::new();
        k.schedule_at(t(5.0), recorder(&log, "x")).unwrap();
        k.schedule_at(t(5.0), recorder(&log, "y")).unwrap();
        k.schedule_at(t(5.0), recorder(&log, "z")).unwrap();

        k.run().unwrap();

        assert_eq!(tags(&log), vec!["x", "y", "z"]);
    }

    #[test]
    fn higher_priority_wins_ties() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut k = Kernel::new();
        k.schedule_at(t(1.0), recorder(&log, "low").with_priority(Priority::LOW))
            .unwrap();
        k.schedule_at(t(1.0), recorder(&log, "normal")).unwrap();
        k.schedule_at(t(1.0), recorder(&log, "high").with_priority(Priority::HIGH))
            .unwrap();

        k.run().unwrap();

        assert_eq!(tags(&log), vec!["high", "normal", "low"]);
    }

    #[test]
    fn events_scheduled_from_callbacks_at_same_time_run_after_existing_ones() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut k = Kernel::new();

        let inner_log = Rc::clone(&log);
        k.schedule_at(
            t(1.0),
            Event::new("spawner", move |k| {
                inner_log.borrow_mut().push(("spawner", k.now()));
                k.schedule_in(SimTime::ZERO, recorder(&inner_log, "child"))?;
                Ok(())
            }),
        )
        .unwrap();
        k.schedule_at(t(1.0), recorder(&log, "sibling")).unwrap();

        k.run().unwrap();

        assert_eq!(tags(&log), vec!["spawner", "sibling", "child"]);
        assert!(log.borrow().iter().all(|(_, at)| *at == t(1.0)));
    }

    // ── schedule / reschedule / cancel ────────────────────────────────────────

    #[test]
    fn scheduling_in_the_past_is_rejected() {
        let mut k = Kernel::new();
        k.schedule_at(t(2.0), Event::new("noop", |_| Ok(()))).unwrap();
        k.run().unwrap();

        let err = k
            .schedule_at(t(1.0), Event::new("late", |_| Ok(())))
            .unwrap_err();
        assert_eq!(
            err,
            KernelError::InvalidTime {
                requested: t(1.0),
                now: t(2.0)
            }
        );
        assert_eq!(k.pending(), 0);
    }

    #[test]
    fn reschedule_moves_event_and_keeps_id() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut k = Kernel::new();
        let a = k.schedule_at(t(1.0), recorder(&log, "a")).unwrap();
        k.schedule_at(t(2.0), recorder(&log, "b")).unwrap();

        k.reschedule(a, t(3.0)).unwrap();
        assert_eq!(k.scheduled_time(a), Some(t(3.0)));

        k.run().unwrap();
        assert_eq!(*log.borrow(), vec![("b", t(2.0)), ("a", t(3.0))]);
    }

    #[test]
    fn reschedule_to_same_time_queues_behind_peers() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut k = Kernel::new();
        let a = k.schedule_at(t(1.0), recorder(&log, "a")).unwrap();
        k.schedule_at(t(1.0), recorder(&log, "b")).unwrap();

        k.reschedule(a, t(1.0)).unwrap();
        k.run().unwrap();

        assert_eq!(tags(&log), vec!["b", "a"]);
    }

    #[test]
    fn reschedule_of_fired_event_fails() {
        let mut k = Kernel::new();
        let id = k.schedule_in(t(1.0), Event::new("once", |_| Ok(()))).unwrap();
        k.run().unwrap();

        assert_eq!(
            k.reschedule(id, t(5.0)),
            Err(KernelError::NotScheduled { event: id })
        );
    }

    #[test]
    fn reschedule_into_the_past_fails_and_leaves_event_untouched() {
        let mut k = Kernel::new();
        k.schedule_at(t(2.0), Event::new("advance", |_| Ok(()))).unwrap();
        let id = k.schedule_at(t(4.0), Event::new("later", |_| Ok(()))).unwrap();
        k.step().unwrap();

        assert!(matches!(
            k.reschedule(id, t(1.0)),
            Err(KernelError::InvalidTime { .. })
        ));
        assert_eq!(k.scheduled_time(id), Some(t(4.0)));
    }

    #[test]
    fn delay_past_the_end_of_time_is_an_error() {
        let mut k = Kernel::new();
        k.schedule_at(SimTime::from(Duration::MAX), Event::new("last", |_| Ok(())))
            .unwrap();
        k.run().unwrap();

        let err = k
            .schedule_in(t(1.0), Event::new("never", |_| Ok(())))
            .unwrap_err();
        assert!(matches!(err, KernelError::TimeOverflow { .. }));
        assert_eq!(k.pending(), 0);
    }

    #[test]
    fn cancel_is_idempotent() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut k = Kernel::new();
        let id = k.schedule_at(t(1.0), recorder(&log, "doomed")).unwrap();

        assert!(k.cancel(id));
        assert!(!k.cancel(id), "second cancel is a no-op");
        assert!(!k.is_scheduled(id));

        k.run().unwrap();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn cancel_after_fire_is_a_no_op() {
        let mut k = Kernel::new();
        let id = k.schedule_in(SimTime::ZERO, Event::new("quick", |_| Ok(()))).unwrap();
        k.run().unwrap();
        assert!(!k.cancel(id));
    }

    // ── run / run_until / stop ────────────────────────────────────────────────

    #[test]
    fn stop_ends_run_after_current_event() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut k = Kernel::new();
        k.schedule_at(t(1.0), Event::new("stopper", |k| {
            k.stop();
            Ok(())
        }))
        .unwrap();
        k.schedule_at(t(2.0), recorder(&log, "after")).unwrap();

        let summary = k.run().unwrap();
        assert!(summary.stopped);
        assert_eq!(summary.end_time, t(1.0));
        assert_eq!(k.pending(), 1);

        // A new run picks up where the stopped one left off.
        let summary = k.run().unwrap();
        assert!(!summary.stopped);
        assert_eq!(tags(&log), vec!["after"]);
    }

    #[test]
    fn run_until_leaves_later_events_pending() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut k = Kernel::new();
        k.schedule_at(t(1.0), recorder(&log, "early")).unwrap();
        k.schedule_at(t(5.0), recorder(&log, "boundary")).unwrap();
        k.schedule_at(t(9.0), recorder(&log, "late")).unwrap();

        let summary = k.run_until(t(5.0)).unwrap();

        assert_eq!(tags(&log), vec!["early", "boundary"]);
        assert_eq!(summary.end_time, t(5.0));
        assert_eq!(k.now(), t(5.0));
        assert_eq!(k.pending(), 1);
    }

    #[test]
    fn run_until_advances_clock_on_empty_queue() {
        let mut k = Kernel::new();
        let summary = k.run_until(t(7.5)).unwrap();
        assert_eq!(summary.events_fired, 0);
        assert_eq!(k.now(), t(7.5));
        assert!(k.run_until(t(1.0)).is_err());
    }

    #[test]
    fn callback_error_aborts_run() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut k = Kernel::new();
        k.schedule_at(t(1.0), Event::new("bug", |_| {
            Err(ProcessError::InvalidArgument { demand: -1 }.into())
        }))
        .unwrap();
        k.schedule_at(t(2.0), recorder(&log, "never")).unwrap();

        let err = k.run().unwrap_err();
        assert!(matches!(err, SimError::Process(_)));
        assert!(log.borrow().is_empty());
        assert_eq!(k.now(), t(1.0));
    }

    #[test]
    fn step_on_empty_queue_returns_false() {
        let mut k = Kernel::new();
        assert!(!k.step().unwrap());
        assert_eq!(k.events_fired(), 0);
    }
}

/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Simulated CPU resource.
//!
//! A [`Cpu`] owns a [`Scheduler`], a [`ProcessTable`] and a fixed number of
//! *active slots*.  Submitted processes wait in the scheduler; whenever a slot
//! is free a dispatch event pulls the next [`Grant`](crate::scheduler::Grant)
//! and turns it into a burst:
//!
//! ```text
//! submit ─► scheduler ─(dispatch event)─► active slot ─(burst event)─┐
//!              ▲                                                    │
//!              └──────────── remaining > 0 ◄────────────────────────┤
//!                                                                   ▼
//!                                             remaining == 0 ─► Completion
//! ```
//!
//! A burst granted `quantum` work units lasts `quantum / capacity` time units.
//! At most `active_slots` processes burst at the same time.
//!
//! # Handles
//! `Cpu` is a cheap clonable handle over `Rc<RefCell<_>>`.  Events scheduled
//! by the CPU only hold a weak reference, so dropping every handle turns any
//! still-pending CPU event into a no-op.  The inner state is never borrowed
//! while a request or observer is being notified.

pub mod burst;
pub mod tracker;

pub use burst::ActiveBurst;
pub use tracker::{UtilizationSample, UtilizationTracker, DEFAULT_BIN, DEFAULT_PROBE_INTERVAL};

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, info, trace, warn};

use crate::config::CpuConfig;
use crate::error::{ConfigError, KernelError, SimResult};
use crate::kernel::{Event, EventId, Kernel, Priority, SimTime};
use crate::process::{Process, ProcessId, ProcessTable};
use crate::request::{ComputationObserver, Request};
use crate::scheduler::{Scheduler, SchedulerPolicy, SchedulingStrategy};

// ── Inner state ───────────────────────────────────────────────────────────────

pub(crate) struct CpuInner {
    pub(crate) name: String,
    pub(crate) capacity: f64,
    pub(crate) active_slots: usize,
    pub(crate) scheduler: Scheduler,
    pub(crate) procs: ProcessTable,
    /// Processes currently bursting, keyed by id for a stable listing.
    pub(crate) active: BTreeMap<ProcessId, ActiveBurst>,
    /// Pending dispatch event, if any.
    pub(crate) dispatch: Option<EventId>,
    pub(crate) completed: u64,
    pub(crate) observers: Vec<Rc<dyn ComputationObserver>>,
    pub(crate) tracker: UtilizationTracker,
    pub(crate) samples: Vec<UtilizationSample>,
    pub(crate) probe: Option<EventId>,
}

impl CpuInner {
    fn usage(&self) -> f64 {
        self.active.len() as f64 / self.active_slots as f64
    }

    /// Push the current usage into the utilisation history.
    pub(crate) fn record_usage(&mut self, now: SimTime) {
        let usage = self.usage();
        self.tracker.record(now, usage);
    }

    fn relative_load(&self, now: SimTime) -> f64 {
        let active: f64 = self
            .active
            .keys()
            .filter_map(|id| self.procs.get(*id))
            .map(|p| p.projected_remaining(now, self.capacity))
            .sum();
        let queued = self.scheduler.total_remaining_demand(&self.procs) as f64;
        (active + queued) / (self.active_slots as f64 * self.capacity)
    }

    fn wants_dispatch(&self) -> bool {
        self.active.len() < self.active_slots && self.scheduler.has_ready()
    }
}

// ── Cpu ───────────────────────────────────────────────────────────────────────

/// Weak counterpart of [`Cpu`].
#[derive(Clone)]
pub struct WeakCpu(Weak<RefCell<CpuInner>>);

impl WeakCpu {
    pub fn upgrade(&self) -> Option<Cpu> {
        self.0.upgrade().map(|inner| Cpu { inner })
    }
}

/// Handle to a simulated CPU.
#[derive(Clone)]
pub struct Cpu {
    inner: Rc<RefCell<CpuInner>>,
}

impl fmt::Debug for Cpu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Cpu")
            .field("name", &inner.name)
            .field("capacity", &inner.capacity)
            .field("active_slots", &inner.active_slots)
            .field("policy", &inner.scheduler.policy())
            .field("active", &inner.active.len())
            .field("queued", &inner.scheduler.len())
            .finish()
    }
}

impl Cpu {
    /// Build a CPU from a validated configuration.
    ///
    /// # Errors
    /// Whatever [`CpuConfig::validate`] rejects.  No CPU is created then.
    pub fn new(config: CpuConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let scheduler = Scheduler::from_policy(config.policy)?;

        info!(
            cpu = %config.name,
            capacity = config.capacity,
            active_slots = config.active_slots,
            policy = %config.policy,
            "CPU created"
        );

        Ok(Self {
            inner: Rc::new(RefCell::new(CpuInner {
                name: config.name,
                capacity: config.capacity,
                active_slots: config.active_slots,
                scheduler,
                procs: ProcessTable::new(),
                active: BTreeMap::new(),
                dispatch: None,
                completed: 0,
                observers: Vec::new(),
                tracker: UtilizationTracker::default(),
                samples: Vec::new(),
                probe: None,
            })),
        })
    }

    /// Non-owning handle, for collaborators the CPU itself keeps alive.
    pub fn downgrade(&self) -> WeakCpu {
        WeakCpu(Rc::downgrade(&self.inner))
    }

    pub(crate) fn inner(&self) -> &RefCell<CpuInner> {
        &self.inner
    }

    // ── Submission ────────────────────────────────────────────────────────────

    /// Hand `process` to the CPU at the current virtual time.
    ///
    /// If a slot is free the process may start bursting at this very instant
    /// (after the events already pending for `now`).
    pub fn submit(&self, kernel: &mut Kernel, mut process: Process) -> SimResult<ProcessId> {
        process.stamp_submitted(kernel.now());
        let demand = process.total_demand();

        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.procs.insert(process);
            let CpuInner {
                scheduler, procs, ..
            } = &mut *inner;
            scheduler.enter(id, procs)?;
            debug!(cpu = %inner.name, process = %id, demand, now = %kernel.now(), "process submitted");
            id
        };

        self.request_dispatch(kernel)?;
        Ok(id)
    }

    /// Submit the computation of `request`.  Its
    /// [`computation_completed`](Request::computation_completed) is called
    /// once the process drains.
    pub fn submit_request<R>(&self, kernel: &mut Kernel, request: &Rc<R>) -> SimResult<ProcessId>
    where
        R: Request + 'static,
    {
        self.submit(kernel, Process::for_request(request))
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    /// Force a dispatch if a slot is free and work is waiting.
    pub(crate) fn request_dispatch(&self, kernel: &mut Kernel) -> SimResult<()> {
        if self.inner.borrow().wants_dispatch() {
            self.force_dispatch(kernel)?;
        }
        Ok(())
    }

    /// Make sure exactly one dispatch event is pending for the current time.
    ///
    /// A dispatch that is already pending is moved to `now` rather than
    /// doubled.
    fn force_dispatch(&self, kernel: &mut Kernel) -> SimResult<()> {
        let now = kernel.now();
        let mut inner = self.inner.borrow_mut();

        if let Some(event) = inner.dispatch {
            if kernel.is_scheduled(event) {
                kernel.reschedule(event, now)?;
                trace!(cpu = %inner.name, event = %event, "dispatch moved to now");
                return Ok(());
            }
        }

        let weak = self.downgrade();
        let event = kernel.schedule_in(
            SimTime::ZERO,
            Event::new("cpu-dispatch", move |k| match weak.upgrade() {
                Some(cpu) => cpu.dispatch(k),
                None => Ok(()),
            }),
        )?;
        inner.dispatch = Some(event);
        Ok(())
    }

    /// Fill free slots from the scheduler.
    fn dispatch(&self, kernel: &mut Kernel) -> SimResult<()> {
        let now = kernel.now();
        let mut inner = self.inner.borrow_mut();
        inner.dispatch = None;

        while inner.active.len() < inner.active_slots {
            let CpuInner {
                scheduler, procs, ..
            } = &mut *inner;
            let Some(grant) = scheduler.retrieve_next_no_requeue(procs)? else {
                break;
            };

            let units = grant.quantum as f64 / inner.capacity;
            let duration =
                SimTime::try_from_units(units).ok_or_else(|| KernelError::TimeOverflow {
                    delay_units: units.to_string(),
                    now,
                })?;
            inner
                .procs
                .expect_mut(grant.process)?
                .stamp_burst_started(now);

            let weak = self.downgrade();
            let process = grant.process;
            let event = kernel.schedule_in(
                duration,
                Event::new("burst-complete", move |k| match weak.upgrade() {
                    Some(cpu) => burst::complete(&cpu, k, process),
                    None => Ok(()),
                }),
            )?;

            debug!(
                cpu = %inner.name,
                process = %process,
                quantum = grant.quantum,
                due = %(now + duration),
                "burst started"
            );
            inner.active.insert(
                process,
                ActiveBurst {
                    event,
                    quantum: grant.quantum,
                    started: now,
                },
            );
        }

        inner.record_usage(now);
        Ok(())
    }

    // ── Cancellation ──────────────────────────────────────────────────────────

    /// Withdraw a process, bursting or queued.  No completion is ever raised
    /// for it.  Returns `false` if the CPU does not know `id`.
    pub fn cancel(&self, kernel: &mut Kernel, id: ProcessId) -> SimResult<bool> {
        let now = kernel.now();
        {
            let mut inner = self.inner.borrow_mut();

            if let Some(burst) = inner.active.remove(&id) {
                kernel.cancel(burst.event);
                // Not queued, but MLFQ still remembers its demoted level.
                inner.scheduler.remove(id);
                inner.procs.remove(id);
                inner.record_usage(now);
                debug!(cpu = %inner.name, process = %id, now = %now, "active burst canceled");
            } else if inner.scheduler.remove(id) {
                inner.procs.remove(id);
                debug!(cpu = %inner.name, process = %id, now = %now, "queued process canceled");
            } else {
                warn!(cpu = %inner.name, process = %id, "cancel of unknown process ignored");
                return Ok(false);
            }
        }

        self.request_dispatch(kernel)?;
        Ok(true)
    }

    /// Drop every process, bursting or queued, without completions.
    pub fn clear(&self, kernel: &mut Kernel) {
        let now = kernel.now();
        let mut inner = self.inner.borrow_mut();

        for burst in std::mem::take(&mut inner.active).into_values() {
            kernel.cancel(burst.event);
        }
        if let Some(event) = inner.dispatch.take() {
            kernel.cancel(event);
        }
        inner.scheduler.clear();
        let ids: Vec<ProcessId> = inner.procs.ids().collect();
        for id in ids {
            inner.procs.remove(id);
        }
        inner.record_usage(now);
        info!(cpu = %inner.name, now = %now, "CPU cleared");
    }

    // ── Observers ─────────────────────────────────────────────────────────────

    /// Deliver every future completion of this CPU to `observer` as well.
    pub fn add_observer(&self, observer: Rc<dyn ComputationObserver>) {
        self.inner.borrow_mut().observers.push(observer);
    }

    // ── Load & utilisation ────────────────────────────────────────────────────

    /// Outstanding work relative to what the CPU drains per time unit.
    ///
    /// `(Σ projected remaining of active + Σ remaining of queued) /
    /// (active_slots × capacity)`.  Active processes are extrapolated to `now`
    /// from their burst start, so the value falls smoothly during a burst.
    pub fn current_relative_load(&self, now: SimTime) -> f64 {
        self.inner.borrow().relative_load(now)
    }

    /// Fraction of active slots in use.
    pub fn current_usage(&self) -> f64 {
        self.inner.borrow().usage()
    }

    /// Average usage over the last utilisation bin ending at `now`.
    pub fn binned_utilization(&self, now: SimTime) -> f64 {
        self.inner.borrow_mut().tracker.binned_utilization(now)
    }

    /// Record a [`UtilizationSample`] now and then every `interval`.
    ///
    /// Probe events run at [`Priority::VERY_LOW`], after everything else
    /// happening at the same instant.  Starting an already running probe
    /// restarts it.
    pub fn start_utilization_probe(
        &self,
        kernel: &mut Kernel,
        interval: SimTime,
    ) -> Result<(), KernelError> {
        self.stop_utilization_probe(kernel);
        let event = schedule_probe(kernel, self.downgrade(), SimTime::ZERO, interval)?;
        self.inner.borrow_mut().probe = Some(event);
        Ok(())
    }

    pub fn stop_utilization_probe(&self, kernel: &mut Kernel) {
        if let Some(event) = self.inner.borrow_mut().probe.take() {
            kernel.cancel(event);
        }
    }

    pub fn utilization_samples(&self) -> Vec<UtilizationSample> {
        self.inner.borrow().samples.clone()
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    /// Ids of the processes currently bursting, in id order.
    pub fn active_processes(&self) -> Vec<ProcessId> {
        self.inner.borrow().active.keys().copied().collect()
    }

    pub fn active_count(&self) -> usize {
        self.inner.borrow().active.len()
    }

    pub fn queued_count(&self) -> usize {
        self.inner.borrow().scheduler.len()
    }

    /// Processes known to the CPU, bursting or queued.
    pub fn process_count(&self) -> usize {
        self.inner.borrow().procs.len()
    }

    pub fn completed_count(&self) -> u64 {
        self.inner.borrow().completed
    }

    pub fn is_active(&self, id: ProcessId) -> bool {
        self.inner.borrow().active.contains_key(&id)
    }

    pub fn contains(&self, id: ProcessId) -> bool {
        self.inner.borrow().procs.contains(id)
    }

    /// Remaining demand of `id` as of its latest burst start.
    pub fn remaining_demand(&self, id: ProcessId) -> Option<u64> {
        self.inner
            .borrow()
            .procs
            .get(id)
            .map(Process::remaining_demand)
    }

    pub fn capacity(&self) -> f64 {
        self.inner.borrow().capacity
    }

    pub fn active_slots(&self) -> usize {
        self.inner.borrow().active_slots
    }

    pub fn policy(&self) -> SchedulerPolicy {
        self.inner.borrow().scheduler.policy()
    }

    pub fn name(&self) -> String {
        self.inner.borrow().name.clone()
    }
}

fn schedule_probe(
    kernel: &mut Kernel,
    weak: WeakCpu,
    delay: SimTime,
    interval: SimTime,
) -> Result<EventId, KernelError> {
    let event = Event::new("utilization-probe", move |k| {
        let Some(cpu) = weak.upgrade() else {
            return Ok(());
        };
        let now = k.now();
        let mut inner = cpu.inner.borrow_mut();
        let sample = UtilizationSample {
            at: now,
            binned_utilization: inner.tracker.binned_utilization(now),
            relative_load: inner.relative_load(now),
        };
        trace!(cpu = %inner.name, at = %now, utilization = sample.binned_utilization, "utilization sample");
        inner.samples.push(sample);
        inner.probe = Some(schedule_probe(k, cpu.downgrade(), interval, interval)?);
        Ok(())
    })
    .with_priority(Priority::VERY_LOW);
    kernel.schedule_in(delay, event)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

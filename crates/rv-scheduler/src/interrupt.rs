//! Interrupt queue
//!
//! Pending interrupts for one session, measured in scheduler ticks. The
//! queue is pure bookkeeping: the tick task feeds it requests and asks it
//! for at most one routine to dispatch per tick.
//!
//! Selection order:
//!
//! 1. `Immediate` requests, lowest priority value first, then oldest
//! 2. `Delayed` requests whose delay has elapsed, lowest priority value first
//! 3. `Interval` entries that are due and enabled, lowest priority value first

use rv_config::IntervalConfig;
use rv_core::{InterruptClass, InterruptRequest, RoutineName};
use std::time::Duration;
use tracing::{debug, trace};

/// A routine chosen for dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub routine: RoutineName,
    pub class: InterruptClass,
    pub priority: i32,
}

#[derive(Debug, Clone)]
struct Pending {
    routine: RoutineName,
    priority: i32,
    /// Tick the request was raised (immediate) or becomes due (delayed)
    tick: u64,
}

#[derive(Debug, Clone)]
struct Interval {
    routine: RoutineName,
    every_ticks: u64,
    priority: i32,
    enabled: Option<String>,
    last_tick: u64,
}

/// Pending interrupts of one session
#[derive(Debug)]
pub struct InterruptQueue {
    period: Duration,
    immediate: Vec<Pending>,
    delayed: Vec<Pending>,
    intervals: Vec<Interval>,
}

impl InterruptQueue {
    /// Create an empty queue for a scheduler ticking every `period`
    pub fn new(period: Duration) -> Self {
        assert!(!period.is_zero(), "scheduler period must not be zero");
        Self {
            period,
            immediate: Vec::new(),
            delayed: Vec::new(),
            intervals: Vec::new(),
        }
    }

    /// Register an interval interrupt; its first dispatch is one full
    /// interval after `now`
    pub fn add_interval(&mut self, config: &IntervalConfig, now: u64) {
        debug!(
            routine = %config.routine,
            every_ticks = config.every_ticks,
            "Registering interval interrupt"
        );
        self.intervals.retain(|i| i.routine != config.routine);
        self.intervals.push(Interval {
            routine: config.routine.clone(),
            every_ticks: config.every_ticks.max(1),
            priority: config.priority,
            enabled: config.enabled.clone(),
            last_tick: now,
        });
    }

    /// Queue a request raised at tick `now`
    ///
    /// Requests for a routine that is already pending in the same class
    /// coalesce: the earliest due tick and the lowest priority value win.
    /// An `Interval` request registers an interval whose length is its
    /// `min_delay` rounded up to whole ticks.
    pub fn push(&mut self, request: InterruptRequest, now: u64) {
        trace!(routine = %request.routine, class = ?request.class, now, "Queueing interrupt");
        match request.class {
            InterruptClass::Immediate => {
                coalesce(&mut self.immediate, request.routine, request.priority, now)
            }
            InterruptClass::Delayed => {
                let due = now + self.ticks(request.min_delay);
                coalesce(&mut self.delayed, request.routine, request.priority, due)
            }
            InterruptClass::Interval => {
                if self.intervals.iter().any(|i| i.routine == request.routine) {
                    return;
                }
                let every_ticks = self.ticks(request.min_delay).max(1);
                self.add_interval(
                    &IntervalConfig {
                        routine: request.routine,
                        every_ticks,
                        priority: request.priority,
                        enabled: None,
                    },
                    now,
                );
            }
        }
    }

    /// Pick the routine to dispatch at tick `now`, if any
    ///
    /// `enabled` resolves the settings path gating an interval interrupt.
    pub fn next(&mut self, now: u64, enabled: impl Fn(&str) -> bool) -> Option<Dispatch> {
        if let Some(i) = pick(&self.immediate, |_| true) {
            let p = self.immediate.remove(i);
            return Some(Dispatch {
                routine: p.routine,
                class: InterruptClass::Immediate,
                priority: p.priority,
            });
        }

        if let Some(i) = pick(&self.delayed, |p| p.tick <= now) {
            let p = self.delayed.remove(i);
            return Some(Dispatch {
                routine: p.routine,
                class: InterruptClass::Delayed,
                priority: p.priority,
            });
        }

        let due = self
            .intervals
            .iter_mut()
            .filter(|i| now.saturating_sub(i.last_tick) >= i.every_ticks)
            .filter(|i| i.enabled.as_deref().map_or(true, &enabled))
            .min_by_key(|i| (i.priority, i.last_tick))?;
        due.last_tick = now;
        Some(Dispatch {
            routine: due.routine.clone(),
            class: InterruptClass::Interval,
            priority: due.priority,
        })
    }

    /// Drop every pending immediate and delayed request
    pub fn clear(&mut self) {
        self.immediate.clear();
        self.delayed.clear();
    }

    /// Number of pending immediate and delayed requests
    pub fn pending(&self) -> usize {
        self.immediate.len() + self.delayed.len()
    }

    fn ticks(&self, delay: Duration) -> u64 {
        let period = self.period.as_nanos();
        delay.as_nanos().div_ceil(period) as u64
    }
}

fn coalesce(queue: &mut Vec<Pending>, routine: RoutineName, priority: i32, tick: u64) {
    match queue.iter_mut().find(|p| p.routine == routine) {
        Some(existing) => {
            existing.priority = existing.priority.min(priority);
            existing.tick = existing.tick.min(tick);
        }
        None => queue.push(Pending {
            routine,
            priority,
            tick,
        }),
    }
}

/// Index of the lowest (priority, tick) entry passing `ready`; ties keep
/// queue order
fn pick(queue: &[Pending], ready: impl Fn(&Pending) -> bool) -> Option<usize> {
    queue
        .iter()
        .enumerate()
        .filter(|(_, p)| ready(p))
        .min_by_key(|(i, p)| (p.priority, p.tick, *i))
        .map(|(i, _)| i)
}

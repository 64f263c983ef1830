//! Tick scheduler
//!
//! Each session owns one [`Scheduler`]. Its tick task wakes on a fixed
//! period, independent of how long the running step takes, and on every
//! tick:
//!
//! 1. drains interrupt requests raised since the last tick
//! 2. does nothing further while the session is paused or stopping
//! 3. checks the session window; when it is unavailable, dispatch is skipped
//!    and the recovery routine (if any) is requested instead
//! 4. dispatches at most one interrupt as a redirect
//!
//! The tick task never touches the session directly. It reads the session's
//! published window and active routine, and acts through [`SessionControl`],
//! so a redirect always lands at the interpreter's next step boundary.

#![allow(clippy::too_many_arguments)]

use chrono::Utc;
use rv_config::{ConfigStore, EngineConfig, IntervalConfig};
use rv_core::{InterruptClass, InterruptRequest, RoutineName, CLOCK_PERIOD};
use rv_script::{SessionControl, WindowSlot};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::interrupt::{Dispatch, InterruptQueue};

/// Scheduler settings for one session
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Tick period
    pub tick: Duration,
    /// Routine redirected to while the window is unavailable
    pub recovery_routine: Option<RoutineName>,
    /// Treat a session without any window as unavailable
    pub require_window: bool,
    /// Interval interrupts registered at start
    pub intervals: Vec<IntervalConfig>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick: CLOCK_PERIOD,
            recovery_routine: None,
            require_window: false,
            intervals: Vec::new(),
        }
    }
}

impl SchedulerConfig {
    /// Derive scheduler settings from the engine configuration
    ///
    /// A configured recovery routine implies the session needs a window.
    pub fn from_engine(config: &EngineConfig) -> Self {
        Self {
            tick: config.tick(),
            recovery_routine: config.recovery_routine.clone(),
            require_window: config.recovery_routine.is_some(),
            intervals: config.intervals.clone(),
        }
    }
}

/// Fixed-period clock driving interrupts for one session
pub struct Scheduler {
    /// Tick state, taken by `start`
    ticker: Option<Ticker>,
    /// Close signal, consumed by `close`
    close_tx: Option<oneshot::Sender<()>>,
    close_rx: Option<oneshot::Receiver<()>>,
    task: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        control: SessionControl,
        interrupts: mpsc::UnboundedReceiver<InterruptRequest>,
        window: watch::Receiver<WindowSlot>,
        active: watch::Receiver<Option<RoutineName>>,
        settings: Arc<ConfigStore>,
        state: Arc<ConfigStore>,
    ) -> Self {
        let (close_tx, close_rx) = oneshot::channel();
        let mut queue = InterruptQueue::new(config.tick);
        for interval in &config.intervals {
            queue.add_interval(interval, 0);
        }

        let ticker = Ticker {
            period: config.tick,
            tick: 0,
            queue,
            recovery_routine: config.recovery_routine,
            require_window: config.require_window,
            recovering: false,
            control,
            interrupts,
            window,
            active,
            settings,
            state,
        };

        Self {
            ticker: Some(ticker),
            close_tx: Some(close_tx),
            close_rx: Some(close_rx),
            task: None,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Begin ticking
    ///
    /// # Panics
    ///
    /// If the scheduler was already started or closed.
    pub fn start(&mut self) {
        let (Some(mut ticker), Some(mut close_rx)) = (self.ticker.take(), self.close_rx.take())
        else {
            panic!("scheduler already started");
        };

        info!(period_ms = ticker.period.as_millis() as u64, "Starting scheduler");
        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();

        self.task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(ticker.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => ticker.on_tick(),
                    _ = &mut close_rx => {
                        debug!("Received close signal");
                        break;
                    }
                }
            }

            running.store(false, Ordering::SeqCst);
            info!(ticks = ticker.tick, "Scheduler stopped");
        }));
    }

    /// Stop ticking and wait for the tick task to finish
    ///
    /// # Panics
    ///
    /// If the scheduler was already closed: the close signal is consumed
    /// exactly once.
    pub async fn close(&mut self) {
        let Some(close_tx) = self.close_tx.take() else {
            panic!("scheduler already closed");
        };
        let _ = close_tx.send(());
        self.ticker = None;
        self.close_rx = None;

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Scheduler task failed");
            }
        }
    }

    /// Check if the tick task is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// State owned by the tick task
struct Ticker {
    period: Duration,
    tick: u64,
    queue: InterruptQueue,
    recovery_routine: Option<RoutineName>,
    require_window: bool,
    /// A recovery redirect was requested and has not started yet
    recovering: bool,
    control: SessionControl,
    interrupts: mpsc::UnboundedReceiver<InterruptRequest>,
    window: watch::Receiver<WindowSlot>,
    active: watch::Receiver<Option<RoutineName>>,
    settings: Arc<ConfigStore>,
    state: Arc<ConfigStore>,
}

impl Ticker {
    fn on_tick(&mut self) {
        self.tick += 1;
        while let Ok(request) = self.interrupts.try_recv() {
            self.queue.push(request, self.tick);
        }

        let run_state = self.control.state();
        if run_state.interrupts() {
            trace!(tick = self.tick, ?run_state, "Session not running, skipping tick");
            return;
        }

        let active = self.active.borrow().clone();
        if !self.window_available() {
            self.recover(active.as_ref());
            return;
        }
        self.recovering = false;

        let settings = &self.settings;
        let Some(dispatch) = self.queue.next(self.tick, |path| {
            settings.get::<bool>(path).unwrap_or(false)
        }) else {
            return;
        };
        self.dispatch(dispatch, active.as_ref());
    }

    fn window_available(&self) -> bool {
        match self.window.borrow().as_ref() {
            Some(window) => window.is_live(),
            None => !self.require_window,
        }
    }

    fn recover(&mut self, active: Option<&RoutineName>) {
        let Some(recovery) = &self.recovery_routine else {
            trace!(tick = self.tick, "Window unavailable, skipping dispatch");
            return;
        };
        if active == Some(recovery) {
            self.recovering = false;
            return;
        }
        if self.recovering {
            return;
        }

        warn!(tick = self.tick, routine = %recovery, "Window unavailable, redirecting to recovery");
        self.recovering = self.control.redirect(recovery.clone());
    }

    fn dispatch(&mut self, dispatch: Dispatch, active: Option<&RoutineName>) {
        if active == Some(&dispatch.routine) {
            debug!(routine = %dispatch.routine, "Interrupt target already active");
        } else {
            info!(
                tick = self.tick,
                routine = %dispatch.routine,
                class = ?dispatch.class,
                priority = dispatch.priority,
                "Dispatching interrupt"
            );
            self.control.redirect(dispatch.routine.clone());
        }

        if dispatch.class == InterruptClass::Interval {
            let path = format!("interrupts.{}.last_run", dispatch.routine);
            if let Err(e) = self.state.set(&path, Utc::now().timestamp()) {
                warn!(error = %e, %path, "Failed to record interval dispatch");
            }
        }
    }
}

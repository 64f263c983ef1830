//! Session context
//!
//! A [`Session`] is one independently pausable and stoppable run for one
//! account. It owns the scratch store and the collaborator handles steps act
//! on, and it is the only thing the interpreter task mutates. Everything
//! outside that task (the scheduler, a UI) talks to it through the
//! [`SessionControl`] and the channels in [`SessionLink`].

use rv_config::ConfigStore;
use rv_core::{InterruptRequest, RoutineName, RunState, SessionId};
use rv_device::{InputBackend, SleepOutcome, WindowHandle, WindowManager};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::error::StepError;
use crate::logger::{LogSink, Logger};
use crate::scratch::Scratch;
use crate::signal::Signal;

/// Shared slot holding the session's live window, if any
pub type WindowSlot = Option<Arc<dyn WindowHandle>>;

/// Cloneable handle that drives a session from outside its task
#[derive(Clone)]
pub struct SessionControl {
    run_state: Arc<watch::Sender<RunState>>,
    redirects: mpsc::UnboundedSender<RoutineName>,
    interrupts: mpsc::UnboundedSender<InterruptRequest>,
}

impl SessionControl {
    /// Ask the session to pause at its next suspension point
    ///
    /// Returns false if the session was not running.
    pub fn pause(&self) -> bool {
        self.run_state.send_if_modified(|state| {
            if *state == RunState::Running {
                *state = RunState::PauseRequested;
                true
            } else {
                false
            }
        })
    }

    /// Resume a paused (or pause-requested) session
    pub fn resume(&self) -> bool {
        self.run_state.send_if_modified(|state| {
            if state.is_paused() {
                *state = RunState::Running;
                true
            } else {
                false
            }
        })
    }

    /// Ask the session to stop; it unwinds at its next suspension point
    pub fn stop(&self) -> bool {
        self.run_state.send_if_modified(|state| {
            if state.is_stopping() {
                false
            } else {
                *state = RunState::StopRequested;
                true
            }
        })
    }

    pub fn state(&self) -> RunState {
        *self.run_state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.run_state.subscribe()
    }

    /// Redirect the session to `routine` before its next step
    ///
    /// Returns false once the session has gone away.
    pub fn redirect(&self, routine: RoutineName) -> bool {
        self.redirects.send(routine).is_ok()
    }

    /// Queue an interrupt for the session's scheduler
    pub fn interrupt(&self, request: InterruptRequest) -> bool {
        self.interrupts.send(request).is_ok()
    }
}

/// The receiving ends a session's supervisor consumes
pub struct SessionLink {
    pub control: SessionControl,
    /// Error descriptions reported by steps
    pub errors: mpsc::UnboundedReceiver<String>,
    /// Status line updates
    pub status: mpsc::UnboundedReceiver<String>,
    /// Interrupts raised by routines or via [`SessionControl::interrupt`]
    pub interrupts: mpsc::UnboundedReceiver<InterruptRequest>,
    /// The session's live window
    pub window: watch::Receiver<WindowSlot>,
    /// Routine currently running at the top level
    pub active: watch::Receiver<Option<RoutineName>>,
}

/// Builder for a [`Session`] and its [`SessionLink`]
pub struct SessionBuilder {
    account: String,
    target: u32,
    input: Arc<dyn InputBackend>,
    windows: Option<Arc<dyn WindowManager>>,
    window: WindowSlot,
    settings: Arc<ConfigStore>,
    state: Arc<ConfigStore>,
    sink: Option<Arc<dyn LogSink>>,
    verbosity: u8,
}

impl SessionBuilder {
    pub fn new(account: impl Into<String>, input: Arc<dyn InputBackend>) -> Self {
        Self {
            account: account.into(),
            target: 0,
            input,
            windows: None,
            window: None,
            settings: Arc::new(ConfigStore::new()),
            state: Arc::new(ConfigStore::new()),
            sink: None,
            verbosity: 0,
        }
    }

    /// Input target (client process ID)
    pub fn target(mut self, target: u32) -> Self {
        self.target = target;
        self
    }

    pub fn windows(mut self, windows: Arc<dyn WindowManager>) -> Self {
        self.windows = Some(windows);
        self
    }

    /// Start with an already open window
    pub fn window(mut self, window: Arc<dyn WindowHandle>) -> Self {
        self.window = Some(window);
        self
    }

    pub fn settings(mut self, settings: Arc<ConfigStore>) -> Self {
        self.settings = settings;
        self
    }

    pub fn state(mut self, state: Arc<ConfigStore>) -> Self {
        self.state = state;
        self
    }

    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn build(self) -> (Session, SessionLink) {
        let (run_state, run_state_rx) = watch::channel(RunState::Running);
        let run_state = Arc::new(run_state);
        let (redirect_tx, redirect_rx) = mpsc::unbounded_channel();
        let (interrupt_tx, interrupt_rx) = mpsc::unbounded_channel();
        let (error_tx, error_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        let (window_tx, window_rx) = watch::channel(self.window);
        let (active_tx, active_rx) = watch::channel(None);

        let mut logger = Logger::new(self.account.clone(), status_tx).with_verbosity(self.verbosity);
        if let Some(sink) = self.sink {
            logger = logger.with_sink(sink);
        }

        let control = SessionControl {
            run_state: run_state.clone(),
            redirects: redirect_tx,
            interrupts: interrupt_tx.clone(),
        };

        let session = Session {
            id: SessionId::new(),
            account: self.account,
            target: self.target,
            scratch: Scratch::new(),
            input: self.input,
            windows: self.windows,
            window: window_tx,
            logger,
            settings: self.settings,
            state: self.state,
            run_state,
            run_state_rx,
            redirects: redirect_rx,
            interrupts: interrupt_tx,
            errors: error_tx,
            active: active_tx,
            pending: None,
        };

        let link = SessionLink {
            control,
            errors: error_rx,
            status: status_rx,
            interrupts: interrupt_rx,
            window: window_rx,
            active: active_rx,
        };

        (session, link)
    }
}

/// One automation run for one account
pub struct Session {
    id: SessionId,
    account: String,
    target: u32,
    /// Variables, loop frames and call stack
    pub scratch: Scratch,
    input: Arc<dyn InputBackend>,
    windows: Option<Arc<dyn WindowManager>>,
    window: watch::Sender<WindowSlot>,
    logger: Logger,
    settings: Arc<ConfigStore>,
    state: Arc<ConfigStore>,
    run_state: Arc<watch::Sender<RunState>>,
    run_state_rx: watch::Receiver<RunState>,
    redirects: mpsc::UnboundedReceiver<RoutineName>,
    interrupts: mpsc::UnboundedSender<InterruptRequest>,
    errors: mpsc::UnboundedSender<String>,
    active: watch::Sender<Option<RoutineName>>,
    /// Jump raised by a predicate effect, taken by the next construct
    pending: Option<Signal>,
}

impl Session {
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn target(&self) -> u32 {
        self.target
    }

    pub fn input(&self) -> &Arc<dyn InputBackend> {
        &self.input
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Swap in a new logger, returning the previous one
    pub fn replace_logger(&mut self, logger: Logger) -> Logger {
        std::mem::replace(&mut self.logger, logger)
    }

    pub fn settings(&self) -> &ConfigStore {
        &self.settings
    }

    pub fn state(&self) -> &ConfigStore {
        &self.state
    }

    /// Read a typed setting
    pub fn setting<T: DeserializeOwned>(&self, path: &str) -> Result<T, StepError> {
        Ok(self.settings.get(path)?)
    }

    /// Write a value to the persisted account state
    pub fn set_state(&self, path: &str, value: impl Serialize) -> Result<(), StepError> {
        Ok(self.state.set(path, value)?)
    }

    pub fn window(&self) -> WindowSlot {
        self.window.borrow().clone()
    }

    pub fn set_window(&self, window: WindowSlot) {
        self.window.send_replace(window);
    }

    pub fn window_manager(&self) -> Option<&Arc<dyn WindowManager>> {
        self.windows.as_ref()
    }

    pub fn run_state(&self) -> RunState {
        *self.run_state_rx.borrow()
    }

    pub fn is_stopping(&self) -> bool {
        self.run_state().is_stopping()
    }

    /// Record that the interpreter has fully unwound after a stop request
    pub fn mark_stopped(&self) {
        self.run_state.send_replace(RunState::Stopped);
    }

    /// Routine currently running at the top level
    pub fn active(&self) -> Option<RoutineName> {
        self.active.borrow().clone()
    }

    pub fn set_active(&self, routine: RoutineName) {
        self.active.send_replace(Some(routine));
    }

    /// Queue an interrupt for the scheduler
    pub fn raise_interrupt(&self, request: InterruptRequest) {
        debug!(routine = %request.routine, class = ?request.class, "Raising interrupt");
        let _ = self.interrupts.send(request);
    }

    /// Hold a jump raised while evaluating a predicate
    ///
    /// The first jump wins until it is taken.
    pub(crate) fn defer_signal(&mut self, signal: Signal) {
        if self.pending.is_none() {
            self.pending = Some(signal);
        }
    }

    pub(crate) fn has_pending_signal(&self) -> bool {
        self.pending.is_some()
    }

    pub(crate) fn take_pending_signal(&mut self) -> Option<Signal> {
        self.pending.take()
    }

    /// Forward a step failure to the error channel
    pub fn report_error(&mut self, err: &StepError) {
        let stack = self.scratch.print_stack();
        let message = if stack.is_empty() {
            err.to_string()
        } else {
            format!("{stack}: {err}")
        };
        self.logger.error(message.clone());
        self.scratch.set_last_error(err.to_string());
        let _ = self.errors.send(message);
    }

    /// Observe stop, pause and external redirects between steps
    ///
    /// Blocks while paused. Returns the signal the interpreter should unwind
    /// with, if any.
    pub async fn checkpoint(&mut self) -> Option<Signal> {
        if self.wait_while_paused().await {
            return Some(Signal::Terminate);
        }
        if let Some(signal) = self.pending.take() {
            return Some(signal);
        }

        while let Ok(routine) = self.redirects.try_recv() {
            if self.active().as_ref() == Some(&routine) {
                debug!(%routine, "Ignoring redirect to the active routine");
                continue;
            }
            info!(account = %self.account, %routine, "Redirect requested");
            return Some(Signal::Redirect(routine));
        }
        None
    }

    /// Block until the session is running again
    ///
    /// Returns true if the session is stopping.
    async fn wait_while_paused(&mut self) -> bool {
        let state = self.run_state();
        if state.is_stopping() {
            return true;
        }
        if !state.is_paused() {
            return false;
        }

        self.run_state.send_if_modified(|state| {
            if *state == RunState::PauseRequested {
                *state = RunState::Paused;
                true
            } else {
                false
            }
        });
        info!(account = %self.account, "Session paused");

        let resumed = self
            .run_state_rx
            .wait_for(|state| !state.is_paused())
            .await
            .map(|state| *state)
            .unwrap_or(RunState::StopRequested);

        if resumed.is_stopping() {
            true
        } else {
            info!(account = %self.account, "Session resumed");
            false
        }
    }

    /// Sleep for `duration`, honoring pause and stop
    ///
    /// A pause suspends the countdown; after resuming only the remaining
    /// time is slept. A stop aborts with [`StepError::Interrupted`].
    pub async fn sleep(&mut self, duration: Duration) -> Result<(), StepError> {
        let input = self.input.clone();
        let mut remaining = duration;
        loop {
            match input.sleep(remaining, self.run_state_rx.clone()).await {
                SleepOutcome::Completed => return Ok(()),
                SleepOutcome::Interrupted { remaining: left } => {
                    remaining = left;
                    if self.wait_while_paused().await {
                        return Err(StepError::Interrupted);
                    }
                    if remaining.is_zero() {
                        return Ok(());
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("account", &self.account)
            .field("target", &self.target)
            .field("run_state", &self.run_state())
            .finish()
    }
}

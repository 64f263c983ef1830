//! Session runner
//!
//! [`MacroRunner`] starts one session per configured account. Each session
//! runs in its own task together with its supervisor: the interpreter future
//! and the supervisor's channel handling are polled by the same task, so
//! no two steps of a session ever run concurrently, while the scheduler
//! ticks in a task of its own.

use dashmap::DashMap;
use rv_config::{AccountConfig, ConfigStore, EngineConfig};
use rv_core::{InterruptRequest, RoutineName, RunState};
use rv_device::{InputBackend, WindowManager};
use rv_script::{
    Interpreter, LogSink, Outcome, RoutineRegistry, Session, SessionBuilder, SessionControl,
    SessionLink,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::{SchedulerError, SchedulerResult};
use crate::scheduler::{Scheduler, SchedulerConfig};

/// Handle to one running session
#[derive(Clone)]
pub struct SessionHandle {
    account: String,
    control: SessionControl,
    registry: Arc<RoutineRegistry>,
    state: Arc<ConfigStore>,
    outcome: watch::Receiver<Option<Outcome>>,
}

impl SessionHandle {
    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn run_state(&self) -> RunState {
        self.control.state()
    }

    /// Persisted state of the account
    pub fn state(&self) -> &Arc<ConfigStore> {
        &self.state
    }

    pub fn pause(&self) -> bool {
        self.control.pause()
    }

    pub fn resume(&self) -> bool {
        self.control.resume()
    }

    pub fn stop(&self) -> bool {
        self.control.stop()
    }

    /// Redirect the session to a registered routine before its next step
    pub fn redirect(&self, routine: &str) -> SchedulerResult<()> {
        let routine = self.registered(routine)?;
        if !self.control.redirect(routine.clone()) {
            debug!(account = %self.account, %routine, "Session gone, redirect dropped");
        }
        Ok(())
    }

    /// Queue an interrupt for the session's scheduler
    pub fn interrupt(&self, request: InterruptRequest) -> SchedulerResult<()> {
        self.registered(request.routine.as_str())?;
        if !self.control.interrupt(request) {
            debug!(account = %self.account, "Session gone, interrupt dropped");
        }
        Ok(())
    }

    /// Outcome of the session, once it has finished
    pub fn outcome(&self) -> Option<Outcome> {
        *self.outcome.borrow()
    }

    /// Wait for the session to finish
    ///
    /// A session task that died without an outcome (a routine authoring
    /// defect panicked it) counts as stopped.
    pub async fn wait(&self) -> Outcome {
        let mut outcome = self.outcome.clone();
        let finished = outcome.wait_for(Option::is_some).await.map(|done| *done);
        match finished {
            Ok(done) => done.unwrap_or(Outcome::Stopped),
            Err(_) => {
                error!(account = %self.account, "Session task ended without an outcome");
                Outcome::Stopped
            }
        }
    }

    fn registered(&self, routine: &str) -> SchedulerResult<RoutineName> {
        let routine = RoutineName::new(routine)?;
        if !self.registry.contains(routine.as_str()) {
            return Err(SchedulerError::UnknownRoutine(routine));
        }
        Ok(routine)
    }
}

/// Starts and tracks one session per account
pub struct MacroRunner {
    config: Arc<EngineConfig>,
    interpreter: Interpreter,
    input: Arc<dyn InputBackend>,
    windows: Option<Arc<dyn WindowManager>>,
    settings: Arc<ConfigStore>,
    sink: Option<Arc<dyn LogSink>>,
    sessions: Arc<DashMap<String, SessionHandle>>,
}

impl MacroRunner {
    pub fn new(
        config: EngineConfig,
        registry: Arc<RoutineRegistry>,
        input: Arc<dyn InputBackend>,
    ) -> Self {
        let interpreter = Interpreter::new(registry).repeat_entry(config.repeat_entry);
        Self {
            config: Arc::new(config),
            interpreter,
            input,
            windows: None,
            settings: Arc::new(ConfigStore::new()),
            sink: None,
            sessions: Arc::new(DashMap::new()),
        }
    }

    pub fn with_windows(mut self, windows: Arc<dyn WindowManager>) -> Self {
        self.windows = Some(windows);
        self
    }

    /// Settings shared by every session
    pub fn with_settings(mut self, settings: Arc<ConfigStore>) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start the session of a configured account
    pub fn start_account(&self, name: &str) -> SchedulerResult<SessionHandle> {
        let account = self
            .config
            .accounts
            .iter()
            .find(|a| a.name == name)
            .ok_or_else(|| SchedulerError::UnknownAccount(name.to_string()))?;
        self.start(account)
    }

    /// Start a session for every configured account
    pub fn start_all(&self) -> SchedulerResult<Vec<SessionHandle>> {
        self.config
            .accounts
            .iter()
            .map(|account| self.start(account))
            .collect()
    }

    pub fn session(&self, account: &str) -> Option<SessionHandle> {
        self.sessions.get(account).map(|h| h.clone())
    }

    /// Handles of all running sessions, sorted by account
    pub fn sessions(&self) -> Vec<SessionHandle> {
        let mut handles: Vec<_> = self.sessions.iter().map(|h| h.clone()).collect();
        handles.sort_by(|a, b| a.account.cmp(&b.account));
        handles
    }

    /// Stop every session and wait for all of them to unwind
    pub async fn stop_all(&self) -> Vec<(String, Outcome)> {
        let handles = self.sessions();
        info!(sessions = handles.len(), "Stopping all sessions");
        for handle in &handles {
            handle.stop();
        }
        let outcomes = futures::future::join_all(handles.iter().map(|h| h.wait())).await;
        handles
            .into_iter()
            .map(|h| h.account)
            .zip(outcomes)
            .collect()
    }

    /// Every routine the configuration names must be registered
    pub fn validate(&self) -> SchedulerResult<()> {
        let registry = self.interpreter.registry();
        let named = std::iter::once(&self.config.entry_routine)
            .chain(self.config.recovery_routine.as_ref())
            .chain(self.config.intervals.iter().map(|i| &i.routine));
        for routine in named {
            if !registry.contains(routine.as_str()) {
                return Err(SchedulerError::UnknownRoutine(routine.clone()));
            }
        }
        Ok(())
    }

    fn start(&self, account: &AccountConfig) -> SchedulerResult<SessionHandle> {
        if self.sessions.contains_key(&account.name) {
            return Err(SchedulerError::AlreadyRunning(account.name.clone()));
        }
        self.validate()?;
        let entry = self.config.entry_routine.clone();

        let state = Arc::new(ConfigStore::load(self.config.state_path(&account.name))?);
        let mut builder = SessionBuilder::new(account.name.clone(), self.input.clone())
            .target(account.target)
            .settings(self.settings.clone())
            .state(state.clone());
        if let Some(windows) = &self.windows {
            builder = builder.windows(windows.clone());
        }
        if let Some(sink) = &self.sink {
            builder = builder.sink(sink.clone());
        }
        let (session, link) = builder.build();

        let (outcome_tx, outcome_rx) = watch::channel(None);
        let handle = SessionHandle {
            account: account.name.clone(),
            control: link.control.clone(),
            registry: self.interpreter.registry().clone(),
            state,
            outcome: outcome_rx,
        };
        self.sessions.insert(account.name.clone(), handle.clone());

        info!(account = %account.name, target = account.target, %entry, "Starting session");
        let supervisor = Supervisor {
            interpreter: self.interpreter.clone(),
            scheduler: SchedulerConfig::from_engine(&self.config),
            settings: self.settings.clone(),
            pause_on_error: self.config.pause_on_error,
        };
        let sessions = self.sessions.clone();
        let state = handle.state.clone();
        tokio::spawn(async move {
            let account = session.account().to_string();
            let outcome = supervisor.run(session, link, state, entry).await;
            sessions.remove(&account);
            let _ = outcome_tx.send(Some(outcome));
        });

        Ok(handle)
    }
}

/// Runs one session and reacts to what it reports
struct Supervisor {
    interpreter: Interpreter,
    scheduler: SchedulerConfig,
    settings: Arc<ConfigStore>,
    pause_on_error: bool,
}

impl Supervisor {
    async fn run(
        self,
        mut session: Session,
        link: SessionLink,
        state: Arc<ConfigStore>,
        entry: RoutineName,
    ) -> Outcome {
        let SessionLink {
            control,
            mut errors,
            mut status,
            interrupts,
            window,
            active,
        } = link;
        let account = session.account().to_string();

        let mut scheduler = Scheduler::new(
            self.scheduler.clone(),
            control.clone(),
            interrupts,
            window,
            active,
            self.settings.clone(),
            state.clone(),
        );
        scheduler.start();

        let mut run_state = control.subscribe();
        record_run_state(&state, RunState::Running);

        let outcome = {
            let run = self.interpreter.run(&mut session, entry);
            tokio::pin!(run);
            loop {
                tokio::select! {
                    outcome = &mut run => break outcome,
                    Some(message) = errors.recv() => {
                        self.on_error(&account, &control, &state, message);
                    }
                    Some(line) = status.recv() => on_status(&state, line),
                    Ok(()) = run_state.changed() => {
                        let current = *run_state.borrow_and_update();
                        record_run_state(&state, current);
                    }
                }
            }
        };

        while let Ok(message) = errors.try_recv() {
            warn!(%account, error = %message, "Routine error");
            set_state(&state, "last_error", &message);
        }
        while let Ok(line) = status.try_recv() {
            on_status(&state, line);
        }

        scheduler.close().await;
        set_state(&state, "running", false);
        set_state(&state, "paused", false);
        if state.file().is_some() {
            if let Err(e) = state.save() {
                warn!(%account, error = %e, "Failed to save account state");
            }
        }

        info!(%account, ?outcome, "Session finished");
        outcome
    }

    fn on_error(&self, account: &str, control: &SessionControl, state: &ConfigStore, message: String) {
        warn!(account, error = %message, "Routine error");
        set_state(state, "last_error", &message);
        if self.pause_on_error && control.pause() {
            info!(account, "Pausing session after error");
        }
    }
}

fn on_status(state: &ConfigStore, line: String) {
    debug!(status = %line, "Status");
    set_state(state, "status", line);
}

fn record_run_state(state: &ConfigStore, run_state: RunState) {
    set_state(state, "running", !run_state.is_stopping());
    set_state(state, "paused", run_state.is_paused());
}

fn set_state(state: &ConfigStore, path: &str, value: impl Serialize) {
    if let Err(e) = state.set(path, value) {
        warn!(path, error = %e, "Failed to write account state");
    }
}

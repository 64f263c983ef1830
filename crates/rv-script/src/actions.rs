//! Built-in effect steps
//!
//! Variable mutation, device input, sleeping, logging, persisted state and
//! window management. Scratch and state mutations are synchronous logic
//! steps; anything that waits is an [`Action`].

use async_trait::async_trait;
use rv_core::{InterruptRequest, Key, KEY_PRESS_DELAY};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::accessor::{IntoOperand, Operand};
use crate::error::StepError;
use crate::logger::LogLevel;
use crate::scratch::Variable;
use crate::session::Session;
use crate::step::{Action, Step};

/// Set a scratch variable
pub fn set<T>(name: &str, value: impl IntoOperand<T>) -> Step
where
    T: Into<Variable> + Clone + Send + Sync + 'static,
{
    let name = name.to_string();
    let value = value.into_operand();
    Step::logic("set", move |session| {
        let value = value.resolve(session);
        session.scratch.set(&name, value);
        Ok(())
    })
}

pub fn increment(name: &str) -> Step {
    let name = name.to_string();
    Step::logic("increment", move |session| {
        session.scratch.increment(&name);
        Ok(())
    })
}

pub fn decrement(name: &str) -> Step {
    let name = name.to_string();
    Step::logic("decrement", move |session| {
        session.scratch.decrement(&name);
        Ok(())
    })
}

pub fn add(name: &str, n: impl IntoOperand<i64>) -> Step {
    let name = name.to_string();
    let n = n.into_operand();
    Step::logic("add", move |session| {
        let n = n.resolve(session);
        session.scratch.add(&name, n);
        Ok(())
    })
}

pub fn subtract(name: &str, n: impl IntoOperand<i64>) -> Step {
    let name = name.to_string();
    let n = n.into_operand();
    Step::logic("subtract", move |session| {
        let n = n.resolve(session);
        session.scratch.subtract(&name, n);
        Ok(())
    })
}

/// Reset a scratch variable to the zero value of its kind
pub fn reset(name: &str) -> Step {
    let name = name.to_string();
    Step::logic("reset", move |session| {
        session.scratch.reset(&name);
        Ok(())
    })
}

/// Remove a scratch variable
pub fn clear(name: &str) -> Step {
    let name = name.to_string();
    Step::logic("clear", move |session| {
        session.scratch.clear(&name);
        Ok(())
    })
}

/// Write a value into the persisted account state
pub fn set_state<T>(path: &str, value: impl IntoOperand<T>) -> Step
where
    T: Serialize + Clone + Send + Sync + 'static,
{
    let path = path.to_string();
    let value = value.into_operand();
    Step::logic("set_state", move |session| {
        let value = value.resolve(session);
        session.set_state(&path, value)
    })
}

/// Flush the persisted account state to its file
pub fn save_state() -> Step {
    Step::logic("save_state", |session| Ok(session.state().save()?))
}

/// Queue an interrupt for the session's scheduler
pub fn raise_interrupt(request: InterruptRequest) -> Step {
    Step::logic("raise_interrupt", move |session| {
        session.raise_interrupt(request.clone());
        Ok(())
    })
}

/// A log line, optionally also published as the status line
///
/// `{}` placeholders in the message are filled from the arguments in order.
#[derive(Clone)]
pub struct LogStep {
    level: LogLevel,
    verbosity: u8,
    message: String,
    args: Vec<Arc<dyn Fn(&Session) -> String + Send + Sync>>,
    status: bool,
}

impl LogStep {
    fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            verbosity: 0,
            message: message.into(),
            args: Vec::new(),
            status: false,
        }
    }

    pub fn arg<T>(mut self, value: impl IntoOperand<T>) -> Self
    where
        T: fmt::Display + Clone + Send + Sync + 'static,
    {
        let value = value.into_operand();
        self.args
            .push(Arc::new(move |session| value.resolve(session).to_string()));
        self
    }

    pub fn verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Also replace the session's status line
    pub fn status(mut self) -> Self {
        self.status = true;
        self
    }

    fn render(&self, session: &Session) -> String {
        let mut out = String::with_capacity(self.message.len());
        let mut args = self.args.iter();
        let mut rest = self.message.as_str();
        while let Some(pos) = rest.find("{}") {
            out.push_str(&rest[..pos]);
            match args.next() {
                Some(arg) => out.push_str(&arg(session)),
                None => out.push_str("{}"),
            }
            rest = &rest[pos + 2..];
        }
        out.push_str(rest);
        out
    }
}

impl From<LogStep> for Step {
    fn from(log: LogStep) -> Self {
        Step::logic("log", move |session| {
            let message = log.render(session);
            let logger = session.logger();
            logger.log(log.level, log.verbosity, message.clone());
            if log.status {
                logger.status(message);
            }
            Ok(())
        })
    }
}

pub fn log(level: LogLevel, message: impl Into<String>) -> LogStep {
    LogStep::new(level, message)
}

pub fn info(message: impl Into<String>) -> LogStep {
    LogStep::new(LogLevel::Info, message)
}

pub fn success(message: impl Into<String>) -> LogStep {
    LogStep::new(LogLevel::Success, message)
}

pub fn warning(message: impl Into<String>) -> LogStep {
    LogStep::new(LogLevel::Warning, message)
}

/// Log at info level and publish as the status line
pub fn status(message: impl Into<String>) -> LogStep {
    LogStep::new(LogLevel::Info, message).status()
}

#[derive(Debug, Clone, Copy)]
enum InputOp {
    Press(Key),
    Down(Key),
    Up(Key),
    Move(i32, i32),
    Scroll(i32, i32),
}

struct Input(InputOp);

#[async_trait]
impl Action for Input {
    fn name(&self) -> &str {
        match self.0 {
            InputOp::Press(_) => "key_press",
            InputOp::Down(_) => "key_down",
            InputOp::Up(_) => "key_up",
            InputOp::Move(..) => "move_mouse",
            InputOp::Scroll(..) => "scroll_mouse",
        }
    }

    async fn execute(&self, session: &mut Session) -> Result<(), StepError> {
        let input = session.input().clone();
        let target = session.target();
        match self.0 {
            InputOp::Press(key) => {
                input.key_down(target, key).await?;
                let held = session.sleep(KEY_PRESS_DELAY).await;
                // Release even when the hold was cut short by a stop
                input.key_up(target, key).await?;
                held
            }
            InputOp::Down(key) => Ok(input.key_down(target, key).await?),
            InputOp::Up(key) => Ok(input.key_up(target, key).await?),
            InputOp::Move(x, y) => Ok(input.move_mouse(x, y).await?),
            InputOp::Scroll(dx, dy) => Ok(input.scroll_mouse(dx, dy).await?),
        }
    }
}

/// Press and release a key
pub fn key_press(key: Key) -> Step {
    Step::action(Input(InputOp::Press(key)))
}

pub fn key_down(key: Key) -> Step {
    Step::action(Input(InputOp::Down(key)))
}

pub fn key_up(key: Key) -> Step {
    Step::action(Input(InputOp::Up(key)))
}

pub fn move_mouse(x: i32, y: i32) -> Step {
    Step::action(Input(InputOp::Move(x, y)))
}

pub fn scroll_mouse(dx: i32, dy: i32) -> Step {
    Step::action(Input(InputOp::Scroll(dx, dy)))
}

struct Sleep(Operand<Duration>);

#[async_trait]
impl Action for Sleep {
    fn name(&self) -> &str {
        "sleep"
    }

    async fn execute(&self, session: &mut Session) -> Result<(), StepError> {
        let duration = self.0.resolve(session);
        session.sleep(duration).await
    }
}

/// Sleep, honoring pause and stop
pub fn sleep(duration: Duration) -> Step {
    Step::action(Sleep(Operand::Literal(duration)))
}

pub fn sleep_ms(ms: u64) -> Step {
    sleep(Duration::from_millis(ms))
}

/// Sleep for a duration read from the session when the step runs
pub fn sleep_for(duration: impl IntoOperand<Duration>) -> Step {
    Step::action(Sleep(duration.into_operand()))
}

struct OpenWindow {
    public_server: Operand<bool>,
}

#[async_trait]
impl Action for OpenWindow {
    fn name(&self) -> &str {
        "open_window"
    }

    async fn execute(&self, session: &mut Session) -> Result<(), StepError> {
        let manager = session
            .window_manager()
            .cloned()
            .ok_or(StepError::NoWindowManager)?;
        let public_server = self.public_server.resolve(session);
        let account = session.account().to_string();
        let window = manager.open(&account, public_server).await?;
        debug!(%account, ?window, "Window opened");
        session.set_window(Some(window));
        Ok(())
    }
}

/// Open the account's window and make it the session's window
pub fn open_window(public_server: impl IntoOperand<bool>) -> Step {
    Step::action(OpenWindow {
        public_server: public_server.into_operand(),
    })
}

struct CloseWindow;

#[async_trait]
impl Action for CloseWindow {
    fn name(&self) -> &str {
        "close_window"
    }

    async fn execute(&self, session: &mut Session) -> Result<(), StepError> {
        if let Some(window) = session.window() {
            session.set_window(None);
            window.close().await?;
        }
        Ok(())
    }
}

/// Close the session's window, if any
pub fn close_window() -> Step {
    Step::action(CloseWindow)
}

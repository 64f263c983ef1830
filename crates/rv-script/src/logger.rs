//! Session logger
//!
//! Steps report progress through a [`Logger`] rather than by printing. Every
//! record goes to `tracing` with the account and routine attached; records at
//! or below the configured verbosity are also handed to an optional
//! [`LogSink`] (a UI console, a file). Status lines additionally go to the
//! session's status channel.

use rv_core::RoutineName;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Severity of a log record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Info => "info",
            LogLevel::Success => "success",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        };
        f.write_str(s)
    }
}

/// A record handed to a [`LogSink`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    pub account: String,
    pub routine: Option<RoutineName>,
    pub level: LogLevel,
    pub verbosity: u8,
    pub message: String,
}

/// Destination for user-facing log records
pub trait LogSink: Send + Sync {
    fn record(&self, record: LogRecord);
}

/// Leveled logger bound to one session
#[derive(Clone)]
pub struct Logger {
    account: String,
    routine: Option<RoutineName>,
    verbosity: u8,
    sink: Option<Arc<dyn LogSink>>,
    status: mpsc::UnboundedSender<String>,
}

impl Logger {
    pub fn new(account: impl Into<String>, status: mpsc::UnboundedSender<String>) -> Self {
        Self {
            account: account.into(),
            routine: None,
            verbosity: 0,
            sink: None,
            status,
        }
    }

    /// Forward records to `sink`
    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Highest verbosity forwarded to the sink
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Logger for a routine running under this one
    pub fn child(&self, routine: &RoutineName) -> Self {
        Self {
            routine: Some(routine.clone()),
            ..self.clone()
        }
    }

    pub fn routine(&self) -> Option<&RoutineName> {
        self.routine.as_ref()
    }

    pub fn log(&self, level: LogLevel, verbosity: u8, message: impl Into<String>) {
        let message = message.into();
        let routine = self.routine.as_ref().map(RoutineName::as_str).unwrap_or("-");

        if verbosity > self.verbosity {
            debug!(account = %self.account, routine, %level, verbosity, "{}", message);
            return;
        }

        match level {
            LogLevel::Info | LogLevel::Success => {
                info!(account = %self.account, routine, %level, "{}", message)
            }
            LogLevel::Warning => warn!(account = %self.account, routine, "{}", message),
            LogLevel::Error => error!(account = %self.account, routine, "{}", message),
        }

        if let Some(sink) = &self.sink {
            sink.record(LogRecord {
                account: self.account.clone(),
                routine: self.routine.clone(),
                level,
                verbosity,
                message,
            });
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, 0, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.log(LogLevel::Success, 0, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.log(LogLevel::Warning, 0, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, 0, message);
    }

    /// Replace the session's status line
    pub fn status(&self, message: impl Into<String>) {
        let message = message.into();
        debug!(account = %self.account, "Status: {}", message);
        // The receiver only goes away during shutdown
        let _ = self.status.send(message);
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("account", &self.account)
            .field("routine", &self.routine)
            .field("verbosity", &self.verbosity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CaptureSink(Mutex<Vec<LogRecord>>);

    impl LogSink for CaptureSink {
        fn record(&self, record: LogRecord) {
            self.0.lock().unwrap().push(record);
        }
    }

    #[test]
    fn test_sink_receives_records_up_to_verbosity() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let sink = Arc::new(CaptureSink::default());
        let logger = Logger::new("main", tx)
            .with_sink(sink.clone())
            .with_verbosity(1);

        logger.info("shown");
        logger.log(LogLevel::Warning, 1, "also shown");
        logger.log(LogLevel::Info, 2, "hidden");

        let records = sink.0.lock().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].level, LogLevel::Warning);
        assert_eq!(records[0].account, "main");
    }

    #[test]
    fn test_child_carries_routine() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let sink = Arc::new(CaptureSink::default());
        let logger = Logger::new("main", tx).with_sink(sink.clone());
        let child = logger.child(&RoutineName::from("ClaimHive"));

        child.success("claimed");
        assert_eq!(child.routine().map(RoutineName::as_str), Some("ClaimHive"));
        assert!(logger.routine().is_none());
        assert_eq!(
            sink.0.lock().unwrap()[0].routine,
            Some(RoutineName::from("ClaimHive"))
        );
    }

    #[test]
    fn test_status_goes_to_channel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let logger = Logger::new("main", tx);
        logger.status("Idling");
        assert_eq!(rx.try_recv().unwrap(), "Idling");
    }
}

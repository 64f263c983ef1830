//! Control signals
//!
//! Every step produces exactly one `Signal`. The interpreter resolves each
//! signal at the innermost construct that owns it: loops consume `Break` and
//! `ContinueLoop`, sequences consume the cursor signals, routine calls absorb
//! `Terminate`, and the top-level run loop consumes `Redirect`.

use rv_core::RoutineName;

use crate::error::StepError;

/// Outcome of executing a step
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// Advance to the next step
    Continue,

    /// Exit the enclosing loop plus this many further enclosing loops
    Break(usize),

    /// Skip to the next iteration of the loop this many levels out
    ContinueLoop(usize),

    /// End the current routine
    Terminate,

    /// Abandon everything and run this routine at the top level
    Redirect(RoutineName),

    /// Re-execute the previous step of the enclosing sequence
    StepBack,

    /// Re-execute the current step of the enclosing sequence
    Retry,

    /// Start the enclosing sequence over from its first step
    Restart,

    /// The step failed
    Error(StepError),
}

impl Signal {
    /// Whether the signal moves the cursor of the enclosing sequence
    pub fn is_cursor(&self) -> bool {
        matches!(self, Signal::StepBack | Signal::Retry | Signal::Restart)
    }
}

impl From<StepError> for Signal {
    fn from(err: StepError) -> Self {
        match err {
            StepError::Interrupted => Signal::Terminate,
            other => Signal::Error(other),
        }
    }
}

impl From<Result<(), StepError>> for Signal {
    fn from(result: Result<(), StepError>) -> Self {
        match result {
            Ok(()) => Signal::Continue,
            Err(err) => err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupted_becomes_terminate() {
        assert_eq!(Signal::from(StepError::Interrupted), Signal::Terminate);
        assert_eq!(
            Signal::from(StepError::failed("boom")),
            Signal::Error(StepError::failed("boom"))
        );
        assert_eq!(Signal::from(Ok(())), Signal::Continue);
    }

    #[test]
    fn test_cursor_signals() {
        assert!(Signal::StepBack.is_cursor());
        assert!(Signal::Restart.is_cursor());
        assert!(!Signal::Break(0).is_cursor());
    }
}

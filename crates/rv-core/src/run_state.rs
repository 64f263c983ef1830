//! Cooperative run state of a session

use serde::{Deserialize, Serialize};

/// Suspension state observed by the interpreter between steps and by every
/// step that waits on real time.
///
/// Transitions:
///
/// ```text
/// Running -> PauseRequested -> Paused -> Running
/// Running | PauseRequested | Paused -> StopRequested -> Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Running,
    PauseRequested,
    Paused,
    StopRequested,
    Stopped,
}

impl RunState {
    /// A pause has been requested or is in effect
    pub fn is_paused(&self) -> bool {
        matches!(self, RunState::PauseRequested | RunState::Paused)
    }

    /// A stop has been requested or has completed
    pub fn is_stopping(&self) -> bool {
        matches!(self, RunState::StopRequested | RunState::Stopped)
    }

    /// Anything other than `Running` interrupts a wait
    pub fn interrupts(&self) -> bool {
        !matches!(self, RunState::Running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_predicates() {
        assert!(!RunState::Running.interrupts());
        assert!(RunState::PauseRequested.is_paused());
        assert!(RunState::Paused.is_paused());
        assert!(!RunState::Paused.is_stopping());
        assert!(RunState::StopRequested.is_stopping());
        assert!(RunState::Stopped.interrupts());
    }
}

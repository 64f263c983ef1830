//! Core types for Revolution
//!
//! This crate provides the vocabulary shared by every other crate in the
//! workspace: routine names, input keys, the cooperative run state observed at
//! every suspension point, interrupt requests, and session identifiers.

mod interrupt;
mod key;
mod routine_name;
mod run_state;
mod session_id;

use std::time::Duration;

pub use interrupt::{InterruptClass, InterruptRequest};
pub use key::Key;
pub use routine_name::{RoutineName, RoutineNameError};
pub use run_state::RunState;
pub use session_id::SessionId;

/// Fixed scheduler period
pub const CLOCK_PERIOD: Duration = Duration::from_millis(50);

/// Hold time between key down and key up for a key press
pub const KEY_PRESS_DELAY: Duration = Duration::from_millis(50);

/// Well-known routine names
pub mod routines {
    /// Entry routine of every session unless configured otherwise
    pub const MAIN: &str = "Main";
}

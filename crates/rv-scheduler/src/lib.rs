//! Scheduling and supervision for Revolution sessions
//!
//! # Key Types
//!
//! - [`InterruptQueue`] - Pending interrupts of one session, by class and priority
//! - [`Scheduler`] - Fixed-period tick task that dispatches interrupts as redirects
//! - [`MacroRunner`] - Starts one supervised session per configured account
//! - [`SessionHandle`] - Pause, resume, stop and redirect a running session

pub mod error;
pub mod interrupt;
pub mod runner;
pub mod scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use interrupt::{Dispatch, InterruptQueue};
pub use runner::{MacroRunner, SessionHandle};
pub use scheduler::{Scheduler, SchedulerConfig};

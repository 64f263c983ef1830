//! Routine engine
//!
//! This crate provides the control-flow interpreter that drives a macro
//! session. Routines are named lists of steps registered once at startup;
//! a session runs them against its own scratch store, observing pause, stop
//! and redirect requests between every step.
//!
//! # Step Types
//!
//! - Conditions with `else if` arms and a fallback
//! - Loops: counted, ranged, forever, and pre-tested `until`
//! - Subroutines (inline step lists, transparent to loop depth)
//! - Routine calls and redirects
//! - Control signals: terminate, break, continue, step back, retry, restart
//! - Effects: variables, input, sleeps, logging, state, windows, interrupts
//!
//! # Key Types
//!
//! - [`Step`] - One step of a routine
//! - [`Predicate`] - A test over the session
//! - [`RoutineRegistry`] - All registered routines
//! - [`Session`] - One run for one account
//! - [`Interpreter`] - Executes routines against a session
//!
//! # Example
//!
//! ```ignore
//! use rv_script::prelude::*;
//!
//! let mut registry = RoutineRegistry::new();
//! registry.register("Main", steps![
//!     set("attempts", 0),
//!     repeat(for_n(3), steps![
//!         if_then(exec_no_error(open_window(false)), steps![break_()]),
//!         increment("attempts"),
//!         sleep_ms(500),
//!     ]),
//!     status("Ready"),
//! ])?;
//! ```

pub mod accessor;
pub mod actions;
pub mod error;
pub mod interpreter;
pub mod logger;
pub mod predicate;
pub mod registry;
pub mod scratch;
pub mod session;
pub mod signal;
pub mod step;

pub use accessor::{Accessor, Identity, IntoOperand, Operand};
pub use error::{RegistryError, RegistryResult, StepError};
pub use interpreter::{Interpreter, Outcome};
pub use logger::{LogLevel, LogRecord, LogSink, Logger};
pub use predicate::{Comparable, Effect, Numeric, Predicate, Test};
pub use registry::{Routine, RoutineRegistry};
pub use scratch::{Frame, FromVariable, LoopFrame, Scratch, Variable};
pub use session::{Session, SessionBuilder, SessionControl, SessionLink, WindowSlot};
pub use signal::Signal;
pub use step::{Action, Clause, Condition, ErrorPolicy, LogicFn, Loop, LoopKind, Step};

/// Everything needed to author routines
pub mod prelude {
    pub use crate::accessor::{
        account, index, index_at, last_error, setting, state, var, window, window_identity,
        window_live, Accessor, Identity,
    };
    pub use crate::actions::{
        add, clear, close_window, decrement, increment, info, key_down, key_press, key_up, log,
        move_mouse, open_window, raise_interrupt, reset, save_state, scroll_mouse, set,
        set_state, sleep, sleep_for, sleep_ms, status, subtract, success, warning,
    };
    pub use crate::predicate::{
        and, equal, exec_error, exec_no_error, greater_than, greater_than_eq, is_false, is_true,
        less_than, less_than_eq, nil, not, not_equal, not_nil, or, Effect, Predicate,
    };
    pub use crate::registry::RoutineRegistry;
    pub use crate::step::{
        break_, break_n, call, continue_, continue_n, for_n, for_range, for_step, forever,
        if_then, if_then_else, logic, redirect, repeat, restart, retry, step_back, subroutine,
        terminate, until, Condition, Step,
    };
    pub use crate::steps;
    pub use rv_core::{InterruptRequest, Key, RoutineName};
}

//! Revolution macro runner
//!
//! Command line parsing and the routines the `revolution` binary registers.

pub mod cli;
pub mod routines;

//! Routines registered by the `revolution` binary
//!
//! Every routine module exposes a `register` function; [`register_all`]
//! calls them in turn and validates the result.

use rv_script::{RegistryResult, RoutineRegistry};

mod client;
mod entry;
mod upkeep;

/// Routine names
pub mod names {
    pub const MAIN: &str = rv_core::routines::MAIN;
    pub const OPEN_CLIENT: &str = "OpenClient";
    pub const SAVE_STATE: &str = "SaveState";
}

/// Scratch variables shared between routines
pub(crate) mod vars {
    pub const INITIALIZED: &str = "initialized";
    pub const CLIENT_STARTED: &str = "clientStarted";
    pub const USE_PUBLIC_SERVER: &str = "usePublicServer";
}

/// Register every routine and check their call and redirect targets
pub fn register_all(registry: &mut RoutineRegistry) -> RegistryResult<()> {
    entry::register(registry)?;
    client::register(registry)?;
    upkeep::register(registry)?;
    registry.validate()
}

/// Registry holding every routine
pub fn registry() -> RegistryResult<RoutineRegistry> {
    let mut registry = RoutineRegistry::new();
    register_all(&mut registry)?;
    Ok(registry)
}

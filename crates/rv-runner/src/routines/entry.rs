//! Entry routine

use rv_script::prelude::*;
use rv_script::{RegistryResult, Session, StepError};

use super::names::{MAIN, OPEN_CLIENT};
use super::vars::{CLIENT_STARTED, INITIALIZED, USE_PUBLIC_SERVER};

/// Seed the variables routines read, once per session
pub(super) fn initialize(session: &mut Session) -> Result<(), StepError> {
    if session.scratch.contains(INITIALIZED) {
        return Ok(());
    }
    session.scratch.set(CLIENT_STARTED, false);
    session.scratch.set(USE_PUBLIC_SERVER, false);
    session.scratch.set(INITIALIZED, true);
    Ok(())
}

pub(super) fn register(registry: &mut RoutineRegistry) -> RegistryResult<()> {
    registry.register(
        MAIN,
        steps![
            Step::logic("initialize", initialize),
            if_then(
                is_false(var::<bool>(CLIENT_STARTED)),
                steps![redirect(OPEN_CLIENT)]
            ),
            status("Idling"),
            sleep_ms(1_000),
        ],
    )
}

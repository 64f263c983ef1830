//! Periodic housekeeping, dispatched by interval interrupts

use rv_script::prelude::*;
use rv_script::RegistryResult;

use super::names::SAVE_STATE;

pub(super) fn register(registry: &mut RoutineRegistry) -> RegistryResult<()> {
    registry.register(
        SAVE_STATE,
        steps![save_state(), success("Saved account state").verbosity(2)],
    )
}

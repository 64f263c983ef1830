//! Client window lifecycle

use rv_script::prelude::*;
use rv_script::{LogLevel, RegistryResult};
use std::time::Duration;

use super::entry::initialize;
use super::names::OPEN_CLIENT;
use super::vars::{CLIENT_STARTED, USE_PUBLIC_SERVER};

/// Attempts before giving up and waiting
const OPEN_ATTEMPTS: i64 = 10;

/// Attempt after which a public server may be used instead
const FALLBACK_ATTEMPT: i64 = 5;

pub(super) fn register(registry: &mut RoutineRegistry) -> RegistryResult<()> {
    registry.register(
        OPEN_CLIENT,
        steps![
            Step::logic("initialize", initialize),
            if_then(
                is_true(var::<bool>(CLIENT_STARTED)),
                steps![sleep(Duration::from_secs(5))]
            ),
            set(USE_PUBLIC_SERVER, false),
            if_then(
                not_nil(window()),
                steps![
                    info("Attempting to close the client").status(),
                    close_window(),
                    sleep(Duration::from_secs(3)),
                ]
            ),
            info("Opening the client").status(),
            repeat(
                for_range(1, OPEN_ATTEMPTS + 1),
                steps![if_then_else(
                    exec_error(open_window(var::<bool>(USE_PUBLIC_SERVER))),
                    steps![
                        log(LogLevel::Error, "Failed to open the client! Attempt: {}")
                            .arg(index())
                            .status(),
                        sleep(Duration::from_secs(5)),
                        Condition::when(
                            and([
                                greater_than_eq(index(), FALLBACK_ATTEMPT),
                                is_true(setting::<bool>("window.fallbackToPublicServer")),
                            ]),
                            steps![set(USE_PUBLIC_SERVER, true)],
                        )
                        .else_if(
                            equal(index(), FALLBACK_ATTEMPT),
                            steps![break_()]
                        ),
                    ],
                    steps![break_()],
                )]
            ),
            if_then(
                nil(window()),
                steps![
                    log(LogLevel::Error, "Waiting 30 seconds before retrying").status(),
                    sleep(Duration::from_secs(30)),
                    restart(),
                ]
            ),
            success("Client opened").status(),
            set(CLIENT_STARTED, true),
        ],
    )
}

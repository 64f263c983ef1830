//! Input backend contract

use async_trait::async_trait;
use rv_core::{Key, RunState};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::DeviceResult;

/// One input event as dispatched to a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    KeyDown { target: u32, key: Key },
    KeyUp { target: u32, key: Key },
    MoveMouse { x: i32, y: i32 },
    ScrollMouse { dx: i32, dy: i32 },
}

impl InputEvent {
    /// Apply this event to a backend
    pub async fn apply(self, backend: &dyn InputBackend) -> DeviceResult<()> {
        match self {
            InputEvent::KeyDown { target, key } => backend.key_down(target, key).await,
            InputEvent::KeyUp { target, key } => backend.key_up(target, key).await,
            InputEvent::MoveMouse { x, y } => backend.move_mouse(x, y).await,
            InputEvent::ScrollMouse { dx, dy } => backend.scroll_mouse(dx, dy).await,
        }
    }
}

/// How an interruptible sleep ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepOutcome {
    /// The full duration elapsed
    Completed,
    /// The interrupt signal fired first
    Interrupted {
        /// Time that was left when the sleep was cut short
        remaining: Duration,
    },
}

/// Platform input backend
///
/// Implementations inject key and mouse events into the target process.
/// Every wait honors the interrupt signal: it returns early as soon as the
/// observed run state leaves `Running`.
#[async_trait]
pub trait InputBackend: Send + Sync {
    /// Press a key in the target process
    async fn key_down(&self, target: u32, key: Key) -> DeviceResult<()>;

    /// Release a key in the target process
    async fn key_up(&self, target: u32, key: Key) -> DeviceResult<()>;

    /// Move the mouse to absolute screen coordinates
    async fn move_mouse(&self, x: i32, y: i32) -> DeviceResult<()>;

    /// Scroll the mouse wheel
    async fn scroll_mouse(&self, dx: i32, dy: i32) -> DeviceResult<()>;

    /// Sleep for `duration`, returning early when `interrupt` leaves `Running`
    async fn sleep(
        &self,
        duration: Duration,
        mut interrupt: watch::Receiver<RunState>,
    ) -> SleepOutcome {
        let start = Instant::now();
        if interrupt.borrow_and_update().interrupts() {
            return SleepOutcome::Interrupted {
                remaining: duration,
            };
        }

        let sleep = tokio::time::sleep(duration);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return SleepOutcome::Completed,
                changed = interrupt.changed() => {
                    if changed.is_err() {
                        // Nobody can interrupt us any more
                        (&mut sleep).await;
                        return SleepOutcome::Completed;
                    }
                    if interrupt.borrow_and_update().interrupts() {
                        return SleepOutcome::Interrupted {
                            remaining: duration.saturating_sub(start.elapsed()),
                        };
                    }
                }
            }
        }
    }
}

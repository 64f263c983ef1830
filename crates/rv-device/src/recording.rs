//! Headless input backend

use async_trait::async_trait;
use rv_core::Key;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::trace;

use crate::backend::{InputBackend, InputEvent};
use crate::error::{DeviceError, DeviceResult};

/// Backend that records events instead of injecting them
///
/// Used by tests and by dry runs of the binary.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    events: Mutex<Vec<InputEvent>>,
    failing: AtomicBool,
}

impl RecordingBackend {
    /// Create an empty recording backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent event fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Events recorded so far
    pub async fn events(&self) -> Vec<InputEvent> {
        self.events.lock().await.clone()
    }

    /// Drop all recorded events
    pub async fn clear(&self) {
        self.events.lock().await.clear();
    }

    async fn record(&self, event: InputEvent) -> DeviceResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DeviceError::Backend(format!("rejected {event:?}")));
        }
        trace!(?event, "Recording input event");
        self.events.lock().await.push(event);
        Ok(())
    }
}

#[async_trait]
impl InputBackend for RecordingBackend {
    async fn key_down(&self, target: u32, key: Key) -> DeviceResult<()> {
        self.record(InputEvent::KeyDown { target, key }).await
    }

    async fn key_up(&self, target: u32, key: Key) -> DeviceResult<()> {
        self.record(InputEvent::KeyUp { target, key }).await
    }

    async fn move_mouse(&self, x: i32, y: i32) -> DeviceResult<()> {
        self.record(InputEvent::MoveMouse { x, y }).await
    }

    async fn scroll_mouse(&self, dx: i32, dy: i32) -> DeviceResult<()> {
        self.record(InputEvent::ScrollMouse { dx, dy }).await
    }
}

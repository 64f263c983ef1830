//! Ordered input bus
//!
//! Sessions run concurrently, but the operating system sees one stream of
//! input. The bus funnels every event through a single queue consumed by one
//! dispatcher task, and acknowledges each event only after the backend has
//! completed it.

use async_trait::async_trait;
use rv_core::Key;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::backend::{InputBackend, InputEvent};
use crate::error::{DeviceError, DeviceResult};

/// Default queue capacity
const DEFAULT_QUEUE_CAPACITY: usize = 256;

struct InputRequest {
    event: InputEvent,
    ack: oneshot::Sender<DeviceResult<()>>,
}

/// Cloneable handle to the ordered input queue
///
/// `InputBus` is itself an [`InputBackend`], so sessions use it exactly like
/// a direct backend.
#[derive(Clone)]
pub struct InputBus {
    tx: mpsc::Sender<InputRequest>,
}

impl InputBus {
    /// Spawn the dispatcher task in front of `backend`
    pub fn spawn(backend: Arc<dyn InputBackend>) -> (Self, JoinHandle<()>) {
        Self::with_capacity(backend, DEFAULT_QUEUE_CAPACITY)
    }

    /// Spawn the dispatcher task with a specific queue capacity
    pub fn with_capacity(
        backend: Arc<dyn InputBackend>,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<InputRequest>(capacity);

        let handle = tokio::spawn(async move {
            debug!("Input bus dispatcher started");
            while let Some(request) = rx.recv().await {
                trace!(event = ?request.event, "Dispatching input event");
                let result = request.event.apply(backend.as_ref()).await;
                if let Err(e) = &result {
                    warn!(event = ?request.event, error = %e, "Input event failed");
                }
                // The submitter may have gone away; the event still happened
                let _ = request.ack.send(result);
            }
            debug!("Input bus dispatcher stopped");
        });

        (Self { tx }, handle)
    }

    /// Queue an event and wait until the backend has applied it
    pub async fn submit(&self, event: InputEvent) -> DeviceResult<()> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(InputRequest { event, ack })
            .await
            .map_err(|_| DeviceError::BusClosed)?;
        done.await.map_err(|_| DeviceError::BusClosed)?
    }
}

#[async_trait]
impl InputBackend for InputBus {
    async fn key_down(&self, target: u32, key: Key) -> DeviceResult<()> {
        self.submit(InputEvent::KeyDown { target, key }).await
    }

    async fn key_up(&self, target: u32, key: Key) -> DeviceResult<()> {
        self.submit(InputEvent::KeyUp { target, key }).await
    }

    async fn move_mouse(&self, x: i32, y: i32) -> DeviceResult<()> {
        self.submit(InputEvent::MoveMouse { x, y }).await
    }

    async fn scroll_mouse(&self, dx: i32, dy: i32) -> DeviceResult<()> {
        self.submit(InputEvent::ScrollMouse { dx, dy }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecordingBackend;

    #[tokio::test]
    async fn test_events_reach_backend_in_order() {
        let backend = Arc::new(RecordingBackend::new());
        let (bus, _handle) = InputBus::spawn(backend.clone());

        bus.key_down(1, Key::Forward).await.unwrap();
        bus.move_mouse(10, 20).await.unwrap();
        bus.key_up(1, Key::Forward).await.unwrap();

        assert_eq!(
            backend.events().await,
            vec![
                InputEvent::KeyDown {
                    target: 1,
                    key: Key::Forward
                },
                InputEvent::MoveMouse { x: 10, y: 20 },
                InputEvent::KeyUp {
                    target: 1,
                    key: Key::Forward
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_concurrent_submitters_do_not_interleave_pairs() {
        let backend = Arc::new(RecordingBackend::new());
        let (bus, _handle) = InputBus::spawn(backend.clone());

        let mut tasks = Vec::new();
        for target in 0..4u32 {
            let bus = bus.clone();
            tasks.push(tokio::spawn(async move {
                for _ in 0..10 {
                    bus.key_down(target, Key::E).await.unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(backend.events().await.len(), 40);
    }

    #[tokio::test]
    async fn test_backend_error_is_acknowledged() {
        let backend = Arc::new(RecordingBackend::new());
        backend.set_failing(true);
        let (bus, _handle) = InputBus::spawn(backend.clone());

        let result = bus.key_down(1, Key::Esc).await;
        assert!(matches!(result, Err(DeviceError::Backend(_))));
    }

    #[tokio::test]
    async fn test_closed_bus() {
        let backend = Arc::new(RecordingBackend::new());
        let (bus, handle) = InputBus::spawn(backend);
        handle.abort();
        let _ = handle.await;

        assert_eq!(bus.key_down(1, Key::E).await, Err(DeviceError::BusClosed));
    }
}

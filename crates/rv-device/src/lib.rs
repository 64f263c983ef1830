//! Device collaborators for Revolution
//!
//! The interpreter never touches the platform directly. It drives devices
//! through the narrow contracts defined here:
//!
//! - [`InputBackend`] - key, mouse and interruptible sleep operations
//! - [`WindowHandle`] / [`WindowManager`] - liveness and lifecycle of the
//!   game window a session drives
//!
//! [`InputBus`] serializes input events from many sessions through a single
//! ordered queue so events for distinct targets never interleave at the OS
//! level. [`RecordingBackend`] and [`StaticWindowManager`] are headless
//! implementations for tests and dry runs.

mod backend;
mod bus;
mod error;
mod recording;
mod window;

pub use backend::{InputBackend, InputEvent, SleepOutcome};
pub use bus::InputBus;
pub use error::{DeviceError, DeviceResult};
pub use recording::RecordingBackend;
pub use window::{StaticWindow, StaticWindowManager, WindowHandle, WindowManager};

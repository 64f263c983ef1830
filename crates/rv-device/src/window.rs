//! Window contracts

use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::error::{DeviceError, DeviceResult};

/// Handle to the window a session drives
#[async_trait]
pub trait WindowHandle: Send + Sync + fmt::Debug {
    /// Whether the window currently exists and can receive input
    fn is_live(&self) -> bool;

    /// Close the window
    async fn close(&self) -> DeviceResult<()>;
}

/// Opens windows for accounts
#[async_trait]
pub trait WindowManager: Send + Sync {
    /// Open (or attach to) the window of `account`
    async fn open(&self, account: &str, public_server: bool)
        -> DeviceResult<Arc<dyn WindowHandle>>;
}

/// Window whose liveness is set explicitly
#[derive(Debug)]
pub struct StaticWindow {
    live: AtomicBool,
}

impl StaticWindow {
    /// Create a live window
    pub fn new() -> Self {
        Self {
            live: AtomicBool::new(true),
        }
    }

    /// Mark the window live or dead (simulates a crash)
    pub fn set_live(&self, live: bool) {
        self.live.store(live, Ordering::SeqCst);
    }
}

impl Default for StaticWindow {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WindowHandle for StaticWindow {
    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    async fn close(&self) -> DeviceResult<()> {
        if !self.live.swap(false, Ordering::SeqCst) {
            return Err(DeviceError::CloseFailed("window already closed".to_string()));
        }
        Ok(())
    }
}

/// Window manager handing out [`StaticWindow`]s
///
/// The first `failures` open attempts fail, which lets tests exercise retry
/// routines.
#[derive(Debug, Default)]
pub struct StaticWindowManager {
    failures: AtomicUsize,
    opened: AtomicUsize,
}

impl StaticWindowManager {
    /// Manager whose opens always succeed
    pub fn new() -> Self {
        Self::default()
    }

    /// Manager whose first `failures` opens fail
    pub fn failing(failures: usize) -> Self {
        Self {
            failures: AtomicUsize::new(failures),
            opened: AtomicUsize::new(0),
        }
    }

    /// Number of successful opens
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WindowManager for StaticWindowManager {
    async fn open(
        &self,
        account: &str,
        public_server: bool,
    ) -> DeviceResult<Arc<dyn WindowHandle>> {
        let pending = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if pending.is_ok() {
            return Err(DeviceError::OpenFailed(format!(
                "simulated failure for {account}"
            )));
        }
        debug!(account, public_server, "Opening static window");
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(StaticWindow::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_window_close() {
        let window = StaticWindow::new();
        assert!(window.is_live());
        window.close().await.unwrap();
        assert!(!window.is_live());
        assert!(window.close().await.is_err());
    }

    #[tokio::test]
    async fn test_failing_manager() {
        let manager = StaticWindowManager::failing(2);
        assert!(manager.open("main", false).await.is_err());
        assert!(manager.open("main", false).await.is_err());
        let window = manager.open("main", false).await.unwrap();
        assert!(window.is_live());
        assert_eq!(manager.opened(), 1);
    }
}

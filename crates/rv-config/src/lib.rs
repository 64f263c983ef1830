//! Configuration for Revolution
//!
//! This crate provides:
//!
//! - [`EngineConfig`] - the top-level YAML file (tick period, accounts,
//!   interval interrupts, recovery routine)
//! - [`ConfigStore`] - a path-addressed (`a.b.c`) value store used for user
//!   settings and for persisted per-account state
//! - [`load_yaml`] - YAML loading with `!include` and `!env_var` tags
//!
//! # Example
//!
//! ```ignore
//! use rv_config::{ConfigStore, EngineConfig};
//!
//! let engine = EngineConfig::load("/config/revolution.yaml")?;
//! let settings = ConfigStore::load("/config/settings.yaml")?;
//! let fallback: bool = settings.get("window.fallbackToPublicServer")?;
//! ```

mod engine;
mod error;
mod loader;
mod store;

pub use engine::{AccountConfig, EngineConfig, IntervalConfig};
pub use error::{ConfigError, ConfigResult};
pub use loader::{load_yaml, load_yaml_string};
pub use store::ConfigStore;

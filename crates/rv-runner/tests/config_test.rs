//! The shipped configuration loads and names only registered routines

use rv_config::{ConfigStore, EngineConfig};
use rv_device::RecordingBackend;
use rv_runner::routines;
use rv_scheduler::{MacroRunner, SchedulerError};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

fn shipped(file: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../config").join(file)
}

#[test]
fn test_shipped_config_is_valid() {
    let config = EngineConfig::load(shipped("revolution.yaml")).unwrap();
    assert_eq!(config.accounts.len(), 1);
    assert!(config.data_dir.ends_with("data"));

    let settings = ConfigStore::load(config.settings_path()).unwrap();
    assert!(settings.get::<bool>("window.fallbackToPublicServer").unwrap());

    let registry = Arc::new(routines::registry().unwrap());
    MacroRunner::new(config, registry, Arc::new(RecordingBackend::new()))
        .validate()
        .unwrap();
}

#[test]
fn test_unregistered_interval_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("revolution.yaml");
    fs::write(
        &path,
        "accounts:\n  - name: main\nintervals:\n  - routine: Sprinkler\n    every_ticks: 20\n",
    )
    .unwrap();
    let config = EngineConfig::load(&path).unwrap();

    let registry = Arc::new(routines::registry().unwrap());
    let runner = MacroRunner::new(config, registry, Arc::new(RecordingBackend::new()));
    match runner.validate() {
        Err(SchedulerError::UnknownRoutine(name)) => assert_eq!(name.as_str(), "Sprinkler"),
        other => panic!("unexpected result {other:?}"),
    }
}

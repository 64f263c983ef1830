//! Runner tests: per-account sessions, supervision, and external control

use rv_config::{AccountConfig, ConfigStore, EngineConfig};
use rv_core::{RoutineName, RunState};
use rv_device::{InputEvent, RecordingBackend};
use rv_scheduler::{MacroRunner, SchedulerError};
use rv_script::prelude::*;
use rv_script::Outcome;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn registry(routines: Vec<(&'static str, Vec<Step>)>) -> Arc<RoutineRegistry> {
    let mut registry = RoutineRegistry::new();
    for (name, steps) in routines {
        registry.register(name, steps).unwrap();
    }
    Arc::new(registry)
}

fn config(dir: &TempDir, accounts: &[(&str, u32)]) -> EngineConfig {
    EngineConfig {
        pause_on_error: false,
        data_dir: dir.path().to_path_buf(),
        accounts: accounts
            .iter()
            .map(|(name, target)| AccountConfig {
                name: name.to_string(),
                target: *target,
            })
            .collect(),
        ..EngineConfig::default()
    }
}

fn idle() -> Vec<(&'static str, Vec<Step>)> {
    vec![
        (
            "Main",
            steps![key_press(Key::E), status("Idle"), sleep_ms(100)],
        ),
        ("Other", steps![status("Other"), sleep_ms(100)]),
    ]
}

// ============================================================================
// Sessions
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_sessions_run_per_account() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(RecordingBackend::new());
    let runner = MacroRunner::new(
        config(&dir, &[("alpha", 1), ("beta", 2)]),
        registry(idle()),
        backend.clone(),
    );

    let handles = runner.start_all().unwrap();
    assert_eq!(handles.len(), 2);
    assert_eq!(runner.sessions().len(), 2);

    tokio::time::sleep(Duration::from_millis(550)).await;
    let outcomes = runner.stop_all().await;

    assert_eq!(
        outcomes,
        vec![
            ("alpha".to_string(), Outcome::Stopped),
            ("beta".to_string(), Outcome::Stopped),
        ]
    );
    assert!(runner.sessions().is_empty());

    let events = backend.events().await;
    for target in [1, 2] {
        let presses = events
            .iter()
            .filter(|e| matches!(e, InputEvent::KeyDown { target: t, key: Key::E } if *t == target))
            .count();
        assert!(presses >= 3, "target {target} pressed {presses} times");
    }

    let saved = ConfigStore::load(dir.path().join("state.alpha.yaml")).unwrap();
    assert_eq!(saved.get::<String>("status").unwrap(), "Idle");
    assert!(!saved.get::<bool>("running").unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_completed_session_without_repeat() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir, &[("alpha", 1)]);
    config.repeat_entry = false;
    let runner = MacroRunner::new(
        config,
        registry(idle()),
        Arc::new(RecordingBackend::new()),
    );

    let handle = runner.start_account("alpha").unwrap();
    assert_eq!(handle.wait().await, Outcome::Completed);
    assert_eq!(handle.outcome(), Some(Outcome::Completed));
    assert!(runner.session("alpha").is_none());
}

#[tokio::test]
async fn test_start_errors() {
    let dir = TempDir::new().unwrap();
    let runner = MacroRunner::new(
        config(&dir, &[("alpha", 1)]),
        registry(idle()),
        Arc::new(RecordingBackend::new()),
    );

    assert!(matches!(
        runner.start_account("gamma"),
        Err(SchedulerError::UnknownAccount(_))
    ));
    let handle = runner.start_account("alpha").unwrap();
    assert!(matches!(
        runner.start_account("alpha"),
        Err(SchedulerError::AlreadyRunning(_))
    ));
    handle.stop();
    handle.wait().await;

    let mut missing = config(&dir, &[("alpha", 1)]);
    missing.recovery_routine = Some(RoutineName::from("Recover"));
    let runner = MacroRunner::new(missing, registry(idle()), Arc::new(RecordingBackend::new()));
    match runner.start_all() {
        Err(SchedulerError::UnknownRoutine(name)) => assert_eq!(name.as_str(), "Recover"),
        other => panic!("unexpected result {:?}", other.map(|h| h.len())),
    }
}

// ============================================================================
// External control
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_redirect_validated_against_registry() {
    let dir = TempDir::new().unwrap();
    let runner = MacroRunner::new(
        config(&dir, &[("alpha", 1)]),
        registry(idle()),
        Arc::new(RecordingBackend::new()),
    );
    let handle = runner.start_account("alpha").unwrap();

    assert!(matches!(
        handle.redirect("Nowhere"),
        Err(SchedulerError::UnknownRoutine(_))
    ));
    assert!(matches!(
        handle.redirect("not a name"),
        Err(SchedulerError::InvalidRoutineName(_))
    ));
    assert!(matches!(
        handle.interrupt(InterruptRequest::immediate("Nowhere")),
        Err(SchedulerError::UnknownRoutine(_))
    ));

    handle.redirect("Other").unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(handle.state().get::<String>("status").unwrap(), "Other");

    handle.stop();
    assert_eq!(handle.wait().await, Outcome::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_pause_and_resume_flags() {
    let dir = TempDir::new().unwrap();
    let runner = MacroRunner::new(
        config(&dir, &[("alpha", 1)]),
        registry(idle()),
        Arc::new(RecordingBackend::new()),
    );
    let handle = runner.start_account("alpha").unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(handle.state().get::<bool>("running").unwrap());

    assert!(handle.pause());
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(handle.run_state(), RunState::Paused);
    assert!(handle.state().get::<bool>("paused").unwrap());

    assert!(handle.resume());
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!handle.state().get::<bool>("paused").unwrap());

    let mut waiting = tokio_test::task::spawn(handle.wait());
    tokio_test::assert_pending!(waiting.poll());
    assert_eq!(handle.outcome(), None);
    drop(waiting);

    handle.stop();
    handle.wait().await;
}

#[tokio::test(start_paused = true)]
async fn test_error_pauses_session() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir, &[("alpha", 1)]);
    config.pause_on_error = true;
    let backend = Arc::new(RecordingBackend::new());
    backend.set_failing(true);
    let runner = MacroRunner::new(
        config,
        registry(vec![("Main", steps![move_mouse(5, 5), sleep_ms(100)])]),
        backend,
    );

    let handle = runner.start_account("alpha").unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(handle.run_state(), RunState::Paused);
    let last_error = handle.state().get::<String>("last_error").unwrap();
    assert!(last_error.starts_with("Main: Device error"), "{last_error}");

    handle.stop();
    assert_eq!(handle.wait().await, Outcome::Stopped);
}

//! Session tests: effect steps, collaborators, and run control

use rv_core::{InterruptClass, RunState};
use rv_device::{InputEvent, RecordingBackend, StaticWindow, StaticWindowManager, WindowManager};
use rv_script::prelude::*;
use rv_script::{
    Interpreter, LogLevel, LogRecord, LogSink, Outcome, Session, SessionBuilder, SessionLink,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct CaptureSink(Mutex<Vec<LogRecord>>);

impl LogSink for CaptureSink {
    fn record(&self, record: LogRecord) {
        self.0.lock().unwrap().push(record);
    }
}

fn interpreter(routines: Vec<(&'static str, Vec<Step>)>) -> Interpreter {
    let mut registry = RoutineRegistry::new();
    for (name, steps) in routines {
        registry.register(name, steps).unwrap();
    }
    Interpreter::new(Arc::new(registry))
}

fn build(backend: Arc<RecordingBackend>) -> (Session, SessionLink) {
    SessionBuilder::new("main", backend).target(4242).build()
}

// ============================================================================
// Effects
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_input_steps_reach_backend() {
    let backend = Arc::new(RecordingBackend::new());
    let (mut session, _link) = build(backend.clone());
    let interpreter = interpreter(vec![(
        "Main",
        steps![
            key_press(Key::E),
            key_down(Key::Forward),
            sleep_ms(200),
            key_up(Key::Forward),
            move_mouse(100, 200),
            scroll_mouse(0, -3),
        ],
    )]);

    interpreter.run(&mut session, RoutineName::from("Main")).await;

    assert_eq!(
        backend.events().await,
        vec![
            InputEvent::KeyDown { target: 4242, key: Key::E },
            InputEvent::KeyUp { target: 4242, key: Key::E },
            InputEvent::KeyDown { target: 4242, key: Key::Forward },
            InputEvent::KeyUp { target: 4242, key: Key::Forward },
            InputEvent::MoveMouse { x: 100, y: 200 },
            InputEvent::ScrollMouse { dx: 0, dy: -3 },
        ]
    );
}

#[tokio::test]
async fn test_device_failure_is_reported() {
    let backend = Arc::new(RecordingBackend::new());
    backend.set_failing(true);
    let (mut session, mut link) = build(backend);
    let interpreter = interpreter(vec![("Main", steps![move_mouse(1, 1), set("after", true)])]);

    interpreter.run(&mut session, RoutineName::from("Main")).await;

    assert!(link.errors.try_recv().unwrap().starts_with("Main: Device error"));
    assert!(session.scratch.get_as::<bool>("after"));
}

#[tokio::test]
async fn test_log_and_status_steps() {
    let sink = Arc::new(CaptureSink::default());
    let (mut session, mut link) = SessionBuilder::new("main", Arc::new(RecordingBackend::new()))
        .sink(sink.clone())
        .build();
    let interpreter = interpreter(vec![(
        "Main",
        steps![
            repeat(
                for_n(2),
                steps![info("Attempt {} of {}").arg(index()).arg(2)]
            ),
            warning("Hive {} taken").arg(var::<String>("hive")),
            status("Idling"),
            log(LogLevel::Info, "too chatty").verbosity(3),
        ],
    )]);
    session.scratch.set("hive", "4");

    interpreter.run(&mut session, RoutineName::from("Main")).await;

    let records = sink.0.lock().unwrap();
    let messages: Vec<_> = records.iter().map(|r| r.message.as_str()).collect();
    assert_eq!(
        messages,
        vec!["Attempt 0 of 2", "Attempt 1 of 2", "Hive 4 taken", "Idling"]
    );
    assert_eq!(records[2].level, LogLevel::Warning);
    assert_eq!(records[0].routine, Some(RoutineName::from("Main")));
    assert_eq!(link.status.try_recv().unwrap(), "Idling");
}

#[tokio::test]
async fn test_state_steps() {
    let (mut session, _link) = build(Arc::new(RecordingBackend::new()));
    let interpreter = interpreter(vec![(
        "Main",
        steps![
            set("hive", 3),
            set_state("counters.claimedHive", var::<i64>("hive")),
            set_state("status", "Claimed"),
        ],
    )]);

    interpreter.run(&mut session, RoutineName::from("Main")).await;

    assert_eq!(session.state().get::<i64>("counters.claimedHive").unwrap(), 3);
    assert_eq!(session.state().get::<String>("status").unwrap(), "Claimed");
}

#[tokio::test]
async fn test_settings_accessor() {
    let settings = rv_config::ConfigStore::from_value(serde_json::json!({
        "window": {"fallbackToPublicServer": true}
    }));
    let (mut session, _link) = SessionBuilder::new("main", Arc::new(RecordingBackend::new()))
        .settings(Arc::new(settings))
        .build();
    let interpreter = interpreter(vec![(
        "Main",
        steps![
            if_then(
                is_true(setting::<bool>("window.fallbackToPublicServer")),
                steps![set("public", true)]
            ),
            if_then(
                is_true(setting::<bool>("window.missing")),
                steps![set("missing", true)]
            ),
        ],
    )]);

    interpreter.run(&mut session, RoutineName::from("Main")).await;

    assert!(session.scratch.get_as::<bool>("public"));
    assert!(!session.scratch.contains("missing"));
}

#[tokio::test]
async fn test_window_open_retry_and_close() {
    let manager = Arc::new(StaticWindowManager::failing(2));
    let (mut session, mut link) = SessionBuilder::new("main", Arc::new(RecordingBackend::new()))
        .windows(manager.clone())
        .build();
    let interpreter = interpreter(vec![(
        "Main",
        steps![
            set("attempts", 0),
            repeat(
                for_n(5),
                steps![
                    increment("attempts"),
                    if_then(exec_no_error(open_window(false)), steps![break_()]),
                ]
            ),
            if_then(not_nil(window()), steps![set("opened", true)]),
            if_then(is_true(window_live()), steps![set("live", true)]),
        ],
    )]);

    interpreter.run(&mut session, RoutineName::from("Main")).await;

    assert_eq!(session.scratch.get_as::<i64>("attempts"), 3);
    assert!(session.scratch.get_as::<bool>("opened"));
    assert!(session.scratch.get_as::<bool>("live"));
    assert!(session.scratch.last_error().is_some());
    assert!(link.window.borrow_and_update().is_some());
    // Expected failures inside exec predicates are not reported
    assert!(link.errors.try_recv().is_err());

    let interpreter = interpreter_with_close();
    interpreter.run(&mut session, RoutineName::from("Close")).await;
    assert!(session.window().is_none());
    assert!(link.window.borrow().is_none());
}

fn interpreter_with_close() -> Interpreter {
    interpreter(vec![("Close", steps![close_window()])])
}

#[tokio::test]
async fn test_open_window_without_manager_fails() {
    let (mut session, mut link) = build(Arc::new(RecordingBackend::new()));
    let interpreter = interpreter(vec![("Main", steps![open_window(true)])]);

    interpreter.run(&mut session, RoutineName::from("Main")).await;
    assert_eq!(
        link.errors.try_recv().unwrap(),
        "Main: No window manager configured"
    );
}

#[tokio::test]
async fn test_preopened_window_identity() {
    let window = Arc::new(StaticWindow::new());
    let manager = StaticWindowManager::new();
    let other = manager.open("main", false).await.unwrap();
    let (mut session, _link) = SessionBuilder::new("main", Arc::new(RecordingBackend::new()))
        .window(window.clone())
        .build();
    let interpreter = interpreter(vec![("Main", steps![])]);

    let same = equal(window_identity(), Identity::of(&window));
    let different = equal(window_identity(), Identity::of(&other));
    assert!(interpreter.test(&same, &mut session).await);
    assert!(!interpreter.test(&different, &mut session).await);
}

#[tokio::test]
async fn test_raise_interrupt() {
    let (mut session, mut link) = build(Arc::new(RecordingBackend::new()));
    let interpreter = interpreter(vec![(
        "Main",
        steps![raise_interrupt(
            InterruptRequest::delayed("Gather", Duration::from_secs(1)).with_priority(2)
        )],
    )]);

    interpreter.run(&mut session, RoutineName::from("Main")).await;

    let request = link.interrupts.try_recv().unwrap();
    assert_eq!(request.routine.as_str(), "Gather");
    assert_eq!(request.class, InterruptClass::Delayed);
    assert_eq!(request.priority, 2);
}

// ============================================================================
// Run control
// ============================================================================

fn idle_forever() -> Vec<(&'static str, Vec<Step>)> {
    vec![
        (
            "Main",
            steps![
                set("ticks", 0),
                repeat(forever(), steps![increment("ticks"), sleep_ms(100)]),
            ],
        ),
        ("Other", steps![set("other", true), terminate()]),
    ]
}

#[tokio::test(start_paused = true)]
async fn test_stop_unwinds_session() {
    let (mut session, link) = build(Arc::new(RecordingBackend::new()));
    let interpreter = interpreter(idle_forever());

    let control = link.control.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(550)).await;
        control.stop();
    });

    let outcome = interpreter.run(&mut session, RoutineName::from("Main")).await;

    assert_eq!(outcome, Outcome::Stopped);
    assert_eq!(link.control.state(), RunState::Stopped);
    assert_eq!(session.scratch.get_as::<i64>("ticks"), 6);
    assert_eq!(session.scratch.loop_depth(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_external_redirect() {
    let (mut session, link) = build(Arc::new(RecordingBackend::new()));
    let interpreter = interpreter(idle_forever());

    let control = link.control.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(250)).await;
        control.redirect(RoutineName::from("Other"));
    });

    let outcome = interpreter.run(&mut session, RoutineName::from("Main")).await;

    assert_eq!(outcome, Outcome::Terminated);
    assert!(session.scratch.get_as::<bool>("other"));
    assert_eq!(session.scratch.get_as::<i64>("ticks"), 3);
}

#[tokio::test(start_paused = true)]
async fn test_pause_is_invisible_to_control_flow() {
    let (mut session, link) = build(Arc::new(RecordingBackend::new()));
    let interpreter = interpreter(vec![(
        "Main",
        steps![
            set("ticks", 0),
            repeat(for_n(5), steps![increment("ticks"), sleep_ms(100)]),
        ],
    )]);

    let control = link.control.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        control.pause();
        tokio::time::sleep(Duration::from_secs(10)).await;
        control.resume();
    });

    let started = tokio::time::Instant::now();
    let outcome = interpreter.run(&mut session, RoutineName::from("Main")).await;

    assert_eq!(outcome, Outcome::Completed);
    assert_eq!(session.scratch.get_as::<i64>("ticks"), 5);
    assert!(started.elapsed() >= Duration::from_millis(10_500));
}

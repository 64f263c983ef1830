//! Routine interpreter
//!
//! Executes step lists against a [`Session`]. Every step yields a
//! [`Signal`], resolved at the innermost construct that owns it:
//!
//! - sequences (routine bodies, subroutines, loop bodies) consume
//!   `StepBack`, `Retry` and `Restart` by moving their cursor; condition arms
//!   forward them to the sequence around the condition
//! - loops consume `Break(0)` and `ContinueLoop(0)` and decrement deeper ones
//! - routine calls absorb `Terminate`
//! - the top-level run loop consumes `Redirect`
//!
//! Errors are reported and execution continues, unless the failing step is
//! marked fatal. Between every two steps the session's checkpoint observes
//! pause, stop and external redirects.

use rv_core::RoutineName;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info, trace};

use crate::predicate::{Effect, Predicate};
use crate::registry::RoutineRegistry;
use crate::session::Session;
use crate::signal::Signal;
use crate::step::{Condition, ErrorPolicy, Loop, LoopKind, Step};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// How a step list treats cursor signals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    /// Resolves cursor signals
    Sequence,
    /// Forwards cursor signals to the enclosing sequence
    Block,
}

/// How a session's run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The entry routine ran out of steps and is not repeated
    Completed,
    /// A top-level routine terminated
    Terminated,
    /// The session was stopped
    Stopped,
}

/// Executes routines from a shared registry
#[derive(Debug, Clone)]
pub struct Interpreter {
    registry: Arc<RoutineRegistry>,
    repeat_entry: bool,
}

impl Interpreter {
    pub fn new(registry: Arc<RoutineRegistry>) -> Self {
        Self {
            registry,
            repeat_entry: false,
        }
    }

    /// Start the entry routine over each time a top-level routine completes
    pub fn repeat_entry(mut self, repeat: bool) -> Self {
        self.repeat_entry = repeat;
        self
    }

    pub fn registry(&self) -> &Arc<RoutineRegistry> {
        &self.registry
    }

    /// Run a session starting at `entry` until it terminates or stops
    ///
    /// A redirect replaces the running routine with a fresh frame stack and
    /// the same variables. When a top-level routine runs out of steps the
    /// session either completes or, with `repeat_entry`, goes back to `entry`.
    pub async fn run(&self, session: &mut Session, entry: RoutineName) -> Outcome {
        let mut routine = entry.clone();
        loop {
            session.scratch.discard_frames();
            session.set_active(routine.clone());
            info!(account = session.account(), %routine, "Running routine");

            let signal = match self.run_routine(&routine, session).await {
                Signal::Continue => session.take_pending_signal().unwrap_or(Signal::Continue),
                other => other,
            };

            if session.is_stopping() {
                session.mark_stopped();
                info!(account = session.account(), "Session stopped");
                return Outcome::Stopped;
            }

            match signal {
                Signal::Redirect(next) => {
                    debug!(from = %routine, to = %next, "Redirecting");
                    routine = next;
                }
                Signal::Terminate => {
                    info!(account = session.account(), %routine, "Session terminated");
                    return Outcome::Terminated;
                }
                _ if self.repeat_entry => {
                    routine = entry.clone();
                    tokio::task::yield_now().await;
                }
                _ => return Outcome::Completed,
            }
        }
    }

    /// Run a routine in place of the current step
    ///
    /// `Terminate` ends only the called routine.
    pub async fn call_routine(&self, name: &RoutineName, session: &mut Session) -> Signal {
        match self.run_routine(name, session).await {
            Signal::Terminate if !session.is_stopping() => Signal::Continue,
            other => other,
        }
    }

    fn run_routine<'a>(
        &'a self,
        name: &'a RoutineName,
        session: &'a mut Session,
    ) -> BoxFuture<'a, Signal> {
        Box::pin(async move {
            let Some(routine) = self.registry.get(name.as_str()) else {
                panic!("routine {name} is not registered");
            };

            session.scratch.push_routine(name.clone());
            let child = session.logger().child(name);
            let parent = session.replace_logger(child);
            debug!(stack = %session.scratch.print_stack(), "Entering routine");

            let signal = self
                .execute_steps(routine.steps(), session, Scope::Sequence)
                .await;

            session.replace_logger(parent);
            session.scratch.pop_routine();

            if let Signal::Break(_) | Signal::ContinueLoop(_) = signal {
                panic!("{signal:?} escaped routine {name}");
            }
            signal
        })
    }

    /// Execute a step list
    pub fn execute<'a>(&'a self, steps: &'a [Step], session: &'a mut Session) -> BoxFuture<'a, Signal> {
        self.execute_steps(steps, session, Scope::Sequence)
    }

    fn execute_steps<'a>(
        &'a self,
        steps: &'a [Step],
        session: &'a mut Session,
        scope: Scope,
    ) -> BoxFuture<'a, Signal> {
        Box::pin(async move {
            let mut cursor = 0;
            while cursor < steps.len() {
                if let Some(signal) = session.checkpoint().await {
                    return signal;
                }

                let step = &steps[cursor];
                trace!(cursor, step = step.name(), "Executing step");

                match self.execute_step(step, session).await {
                    Signal::Continue => cursor += 1,
                    Signal::Error(err) => {
                        session.report_error(&err);
                        if step.policy() == ErrorPolicy::Fatal {
                            return Signal::Terminate;
                        }
                        cursor += 1;
                    }
                    Signal::StepBack if scope == Scope::Sequence => {
                        assert!(cursor > 0, "step_back at the first step of a sequence");
                        cursor -= 1;
                    }
                    Signal::Retry if scope == Scope::Sequence => {}
                    Signal::Restart if scope == Scope::Sequence => cursor = 0,
                    other => return other,
                }
            }
            Signal::Continue
        })
    }

    async fn execute_step(&self, step: &Step, session: &mut Session) -> Signal {
        match step {
            Step::Action { action, .. } => action.execute(session).await.into(),
            Step::Logic { logic, .. } => logic(session).into(),
            Step::Condition(condition) => self.execute_condition(condition, session).await,
            Step::Loop(looped) => self.execute_loop(looped, session).await,
            Step::Subroutine(steps) => {
                session.scratch.push_subroutine();
                let signal = self.execute_steps(steps, session, Scope::Sequence).await;
                session.scratch.pop_subroutine();
                signal
            }
            Step::Call(name) => self.call_routine(name, session).await,
            Step::Redirect(name) => Signal::Redirect(name.clone()),
            Step::Terminate => Signal::Terminate,
            Step::Break(depth) => {
                check_depth(session, "break", *depth);
                Signal::Break(*depth)
            }
            Step::Continue(depth) => {
                check_depth(session, "continue", *depth);
                Signal::ContinueLoop(*depth)
            }
            Step::StepBack => Signal::StepBack,
            Step::Retry => Signal::Retry,
            Step::Restart => Signal::Restart,
        }
    }

    async fn execute_condition(&self, condition: &Condition, session: &mut Session) -> Signal {
        for clause in condition.clauses() {
            let matched = self.test(&clause.predicate, session).await;
            if let Some(signal) = session.take_pending_signal() {
                return signal;
            }
            if matched {
                return self.execute_steps(&clause.steps, session, Scope::Block).await;
            }
        }
        match condition.fallback() {
            Some(steps) => self.execute_steps(steps, session, Scope::Block).await,
            None => Signal::Continue,
        }
    }

    async fn execute_loop(&self, looped: &Loop, session: &mut Session) -> Signal {
        let mut frame = looped.kind.frame();
        session.scratch.push_loop(frame);

        let signal = loop {
            let proceed = match &looped.kind {
                LoopKind::Range { .. } => frame.in_range(),
                LoopKind::Forever => true,
                LoopKind::Until(predicate) => {
                    let done = self.test(predicate, session).await;
                    if let Some(signal) = session.take_pending_signal() {
                        break signal;
                    }
                    !done
                }
            };
            if !proceed {
                break Signal::Continue;
            }

            session.scratch.set_loop_index(frame.index);
            match self.execute_steps(&looped.body, session, Scope::Sequence).await {
                Signal::Continue | Signal::ContinueLoop(0) => {}
                Signal::Break(0) => break Signal::Continue,
                Signal::Break(depth) => break Signal::Break(depth - 1),
                Signal::ContinueLoop(depth) => break Signal::ContinueLoop(depth - 1),
                other => break other,
            }

            match frame.index.checked_add(frame.step) {
                Some(next) => frame.index = next,
                // The next index would lie past any bound
                None if frame.stop.is_some() => break Signal::Continue,
                None => {}
            }
            if frame.stop.is_none() {
                // Unbounded loops may spin on state another task changes
                tokio::task::yield_now().await;
            }
        };

        session.scratch.pop_loop();
        signal
    }

    /// Evaluate a predicate
    ///
    /// Pure tests read the session without changing it. An `exec_error` or
    /// `exec_no_error` predicate runs its effect exactly once per evaluation;
    /// a failure is recorded as the session's last error but not reported.
    /// A redirect or terminate raised by the effect stops evaluation and is
    /// taken by the enclosing condition or loop instead of any arm.
    pub fn test<'a>(&'a self, predicate: &'a Predicate, session: &'a mut Session) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            match predicate {
                Predicate::Test(test) => test.test(session),
                Predicate::And(all) => {
                    for p in all {
                        if !self.test(p, session).await || session.has_pending_signal() {
                            return false;
                        }
                    }
                    true
                }
                Predicate::Or(any) => {
                    for p in any {
                        if self.test(p, session).await {
                            return true;
                        }
                        if session.has_pending_signal() {
                            return false;
                        }
                    }
                    false
                }
                Predicate::Not(inner) => !self.test(inner, session).await,
                Predicate::Exec {
                    effect,
                    expect_error,
                } => self.run_effect(effect, session).await == *expect_error,
            }
        })
    }

    /// Run an effect; true if it failed
    async fn run_effect(&self, effect: &Effect, session: &mut Session) -> bool {
        let result = match effect {
            Effect::Logic(logic) => logic(session),
            Effect::Step(step) => match self.execute_step(step, session).await {
                Signal::Continue => Ok(()),
                Signal::Error(err) => Err(err),
                jump @ (Signal::Redirect(_) | Signal::Terminate) => {
                    session.defer_signal(jump);
                    Ok(())
                }
                other => panic!("{other:?} raised inside a predicate effect"),
            },
        };
        match result {
            Ok(()) => false,
            Err(err) => {
                debug!(error = %err, "Effect failed");
                session.scratch.set_last_error(err.to_string());
                true
            }
        }
    }
}

fn check_depth(session: &Session, what: &str, depth: usize) {
    let active = session.scratch.loop_depth();
    assert!(
        depth < active,
        "{what}({depth}) with only {active} active loops"
    );
}

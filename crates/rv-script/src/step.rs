//! Steps
//!
//! A routine is a list of [`Step`]s. Control-flow steps (conditions, loops,
//! subroutines, calls and the bare signals) are interpreted directly; effect
//! steps are either async [`Action`]s or synchronous logic closures.

use async_trait::async_trait;
use rv_core::RoutineName;
use std::fmt;
use std::sync::Arc;

use crate::error::StepError;
use crate::predicate::Predicate;
use crate::scratch::LoopFrame;
use crate::session::Session;

/// A synchronous effect on the session
pub type LogicFn = Arc<dyn Fn(&mut Session) -> Result<(), StepError> + Send + Sync>;

/// An asynchronous effect step
#[async_trait]
pub trait Action: Send + Sync {
    /// Short name used in traces
    fn name(&self) -> &str;

    async fn execute(&self, session: &mut Session) -> Result<(), StepError>;
}

/// What the interpreter does when an effect step fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Report the error and continue with the next step
    #[default]
    LogAndContinue,
    /// Report the error and terminate the routine
    Fatal,
}

/// One step of a routine
#[derive(Clone)]
pub enum Step {
    Action {
        action: Arc<dyn Action>,
        policy: ErrorPolicy,
    },
    Logic {
        name: &'static str,
        logic: LogicFn,
        policy: ErrorPolicy,
    },
    Condition(Condition),
    Loop(Loop),
    /// Inline step list, transparent to loop depth
    Subroutine(Vec<Step>),
    /// Run a registered routine and return here
    Call(RoutineName),
    /// Abandon everything and continue in a registered routine
    Redirect(RoutineName),
    Terminate,
    Break(usize),
    Continue(usize),
    StepBack,
    Retry,
    Restart,
}

impl Step {
    pub fn action(action: impl Action + 'static) -> Self {
        Step::Action {
            action: Arc::new(action),
            policy: ErrorPolicy::default(),
        }
    }

    pub fn logic(
        name: &'static str,
        logic: impl Fn(&mut Session) -> Result<(), StepError> + Send + Sync + 'static,
    ) -> Self {
        Step::Logic {
            name,
            logic: Arc::new(logic),
            policy: ErrorPolicy::default(),
        }
    }

    /// Terminate the routine if this step fails
    ///
    /// # Panics
    ///
    /// Panics on steps that cannot fail.
    pub fn fatal(mut self) -> Self {
        match &mut self {
            Step::Action { policy, .. } | Step::Logic { policy, .. } => *policy = ErrorPolicy::Fatal,
            other => panic!("{} steps carry no error policy", other.name()),
        }
        self
    }

    pub fn policy(&self) -> ErrorPolicy {
        match self {
            Step::Action { policy, .. } | Step::Logic { policy, .. } => *policy,
            _ => ErrorPolicy::LogAndContinue,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Step::Action { action, .. } => action.name(),
            Step::Logic { name, .. } => *name,
            Step::Condition(_) => "condition",
            Step::Loop(_) => "loop",
            Step::Subroutine(_) => "subroutine",
            Step::Call(_) => "call",
            Step::Redirect(_) => "redirect",
            Step::Terminate => "terminate",
            Step::Break(_) => "break",
            Step::Continue(_) => "continue",
            Step::StepBack => "step_back",
            Step::Retry => "retry",
            Step::Restart => "restart",
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Action { action, policy } => f
                .debug_struct("Action")
                .field("name", &action.name())
                .field("policy", policy)
                .finish(),
            Step::Logic { name, policy, .. } => f
                .debug_struct("Logic")
                .field("name", name)
                .field("policy", policy)
                .finish(),
            Step::Condition(c) => fmt::Debug::fmt(c, f),
            Step::Loop(l) => fmt::Debug::fmt(l, f),
            Step::Subroutine(steps) => f.debug_tuple("Subroutine").field(steps).finish(),
            Step::Call(name) => write!(f, "Call({name})"),
            Step::Redirect(name) => write!(f, "Redirect({name})"),
            Step::Break(n) => write!(f, "Break({n})"),
            Step::Continue(n) => write!(f, "Continue({n})"),
            other => f.write_str(other.name()),
        }
    }
}

/// One `if` or `else if` arm
#[derive(Debug, Clone)]
pub struct Clause {
    pub predicate: Predicate,
    pub steps: Vec<Step>,
}

/// Ordered clauses plus an optional fallback; at most one arm runs
#[derive(Debug, Clone)]
pub struct Condition {
    clauses: Vec<Clause>,
    otherwise: Option<Vec<Step>>,
}

impl Condition {
    pub fn when(predicate: Predicate, steps: Vec<Step>) -> Self {
        Self {
            clauses: vec![Clause { predicate, steps }],
            otherwise: None,
        }
    }

    pub fn else_if(mut self, predicate: Predicate, steps: Vec<Step>) -> Self {
        self.clauses.push(Clause { predicate, steps });
        self
    }

    pub fn otherwise(mut self, steps: Vec<Step>) -> Self {
        self.otherwise = Some(steps);
        self
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn fallback(&self) -> Option<&[Step]> {
        self.otherwise.as_deref()
    }
}

impl From<Condition> for Step {
    fn from(condition: Condition) -> Self {
        Step::Condition(condition)
    }
}

/// How a loop decides whether to run another iteration
#[derive(Debug, Clone)]
pub enum LoopKind {
    /// `start..stop` by `step`
    Range { start: i64, stop: i64, step: i64 },
    Forever,
    /// Checked before every iteration
    Until(Predicate),
}

impl LoopKind {
    pub(crate) fn frame(&self) -> LoopFrame {
        match self {
            LoopKind::Range { start, stop, step } => LoopFrame::new(*start, Some(*stop), *step),
            LoopKind::Forever | LoopKind::Until(_) => LoopFrame::new(0, None, 1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Loop {
    pub kind: LoopKind,
    pub body: Vec<Step>,
}

/// `n` iterations with index `0..n`
pub fn for_n(n: i64) -> LoopKind {
    for_step(0, n, 1)
}

/// Index `start..stop`
pub fn for_range(start: i64, stop: i64) -> LoopKind {
    for_step(start, stop, 1)
}

/// Index `start..stop` advancing by `step`
///
/// # Panics
///
/// Panics if `step` is zero.
pub fn for_step(start: i64, stop: i64, step: i64) -> LoopKind {
    assert!(step != 0, "loop step must not be zero");
    LoopKind::Range { start, stop, step }
}

pub fn forever() -> LoopKind {
    LoopKind::Forever
}

pub fn until(predicate: Predicate) -> LoopKind {
    LoopKind::Until(predicate)
}

pub fn repeat(kind: LoopKind, body: Vec<Step>) -> Step {
    Step::Loop(Loop { kind, body })
}

pub fn if_then(predicate: Predicate, steps: Vec<Step>) -> Step {
    Condition::when(predicate, steps).into()
}

pub fn if_then_else(predicate: Predicate, then: Vec<Step>, otherwise: Vec<Step>) -> Step {
    Condition::when(predicate, then).otherwise(otherwise).into()
}

pub fn subroutine(steps: Vec<Step>) -> Step {
    Step::Subroutine(steps)
}

pub fn call(routine: impl Into<RoutineName>) -> Step {
    Step::Call(routine.into())
}

pub fn redirect(routine: impl Into<RoutineName>) -> Step {
    Step::Redirect(routine.into())
}

pub fn terminate() -> Step {
    Step::Terminate
}

/// Exit the innermost loop
pub fn break_() -> Step {
    Step::Break(0)
}

/// Exit the innermost loop and `depth` further enclosing loops
pub fn break_n(depth: usize) -> Step {
    Step::Break(depth)
}

/// Skip to the next iteration of the innermost loop
pub fn continue_() -> Step {
    Step::Continue(0)
}

/// Skip to the next iteration of the loop `depth` levels out
pub fn continue_n(depth: usize) -> Step {
    Step::Continue(depth)
}

pub fn step_back() -> Step {
    Step::StepBack
}

pub fn retry() -> Step {
    Step::Retry
}

pub fn restart() -> Step {
    Step::Restart
}

pub fn logic(f: impl Fn(&mut Session) -> Result<(), StepError> + Send + Sync + 'static) -> Step {
    Step::logic("logic", f)
}

/// Build a `Vec<Step>` from anything convertible into a step
#[macro_export]
macro_rules! steps {
    ($($step:expr),* $(,)?) => {
        vec![$($crate::Step::from($step)),*]
    };
}

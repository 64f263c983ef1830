//! Predicates
//!
//! A [`Predicate`] is a boolean test over the session. Comparisons are typed:
//! both operands of a comparison resolve to the same kind, and ordering
//! comparisons are only available for numeric kinds, so a mismatched
//! comparison is rejected when the routine is compiled rather than when it
//! runs.
//!
//! Predicates are evaluated by the interpreter (see
//! [`Interpreter::test`](crate::Interpreter::test)) because `exec_error` and
//! `exec_no_error` run an effect step.

use std::fmt;
use std::sync::Arc;

use crate::accessor::{Accessor, Identity, IntoOperand, Operand};
use crate::error::StepError;
use crate::session::Session;
use crate::step::{LogicFn, Step};

/// Kinds that can be compared for equality
pub trait Comparable: PartialEq + Clone + fmt::Debug + Send + Sync + 'static {}

/// Kinds that can also be ordered
pub trait Numeric: Comparable + PartialOrd {}

impl Comparable for bool {}
impl Comparable for String {}
impl Comparable for Identity {}
impl Comparable for i64 {}
impl Comparable for u64 {}
impl Comparable for f32 {}
impl Comparable for f64 {}

impl Numeric for i64 {}
impl Numeric for u64 {}
impl Numeric for f32 {}
impl Numeric for f64 {}

/// A side-effect-free test over the session
pub trait Test: Send + Sync {
    fn test(&self, session: &Session) -> bool;

    fn describe(&self) -> String;
}

struct Comparison<T> {
    op: &'static str,
    lhs: Operand<T>,
    rhs: Operand<T>,
    cmp: fn(&T, &T) -> bool,
}

impl<T: Comparable> Test for Comparison<T> {
    fn test(&self, session: &Session) -> bool {
        let lhs = self.lhs.resolve(session);
        let rhs = self.rhs.resolve(session);
        (self.cmp)(&lhs, &rhs)
    }

    fn describe(&self) -> String {
        format!("{:?} {} {:?}", self.lhs, self.op, self.rhs)
    }
}

struct IsNil<T> {
    value: Accessor<Option<T>>,
    nil: bool,
}

impl<T: 'static> Test for IsNil<T> {
    fn test(&self, session: &Session) -> bool {
        self.value.get(session).is_none() == self.nil
    }

    fn describe(&self) -> String {
        let op = if self.nil { "is nil" } else { "is not nil" };
        format!("{:?} {op}", self.value)
    }
}

/// An effect whose failure a predicate tests
#[derive(Clone)]
pub enum Effect {
    Step(Box<Step>),
    Logic(LogicFn),
}

impl Effect {
    pub fn step(step: impl Into<Step>) -> Self {
        Effect::Step(Box::new(step.into()))
    }

    /// A function of the session
    pub fn logic(f: impl Fn(&mut Session) -> Result<(), StepError> + Send + Sync + 'static) -> Self {
        Effect::Logic(Arc::new(f))
    }

    /// A function of nothing
    pub fn call(f: impl Fn() -> Result<(), StepError> + Send + Sync + 'static) -> Self {
        Effect::logic(move |_| f())
    }
}

impl From<Step> for Effect {
    fn from(step: Step) -> Self {
        Effect::Step(Box::new(step))
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Step(step) => write!(f, "{step:?}"),
            Effect::Logic(_) => f.write_str("logic"),
        }
    }
}

/// A boolean test over the session
#[derive(Clone)]
pub enum Predicate {
    Test(Arc<dyn Test>),
    /// Short-circuits left to right
    And(Vec<Predicate>),
    /// Short-circuits left to right
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    /// Runs `effect` once; true when its failure matches `expect_error`
    Exec { effect: Effect, expect_error: bool },
}

impl Predicate {
    pub fn test(test: impl Test + 'static) -> Self {
        Predicate::Test(Arc::new(test))
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Test(test) => f.write_str(&test.describe()),
            Predicate::And(all) => f.debug_tuple("And").field(all).finish(),
            Predicate::Or(any) => f.debug_tuple("Or").field(any).finish(),
            Predicate::Not(inner) => f.debug_tuple("Not").field(inner).finish(),
            Predicate::Exec {
                effect,
                expect_error,
            } => {
                let name = if *expect_error { "ExecError" } else { "ExecNoError" };
                f.debug_tuple(name).field(effect).finish()
            }
        }
    }
}

fn compare<T: Comparable>(
    op: &'static str,
    lhs: impl IntoOperand<T>,
    rhs: impl IntoOperand<T>,
    cmp: fn(&T, &T) -> bool,
) -> Predicate {
    Predicate::test(Comparison {
        op,
        lhs: lhs.into_operand(),
        rhs: rhs.into_operand(),
        cmp,
    })
}

pub fn equal<T: Comparable>(lhs: impl IntoOperand<T>, rhs: impl IntoOperand<T>) -> Predicate {
    compare("==", lhs, rhs, |a, b| a == b)
}

pub fn not_equal<T: Comparable>(lhs: impl IntoOperand<T>, rhs: impl IntoOperand<T>) -> Predicate {
    compare("!=", lhs, rhs, |a, b| a != b)
}

pub fn greater_than<T: Numeric>(lhs: impl IntoOperand<T>, rhs: impl IntoOperand<T>) -> Predicate {
    compare(">", lhs, rhs, |a, b| a > b)
}

pub fn less_than<T: Numeric>(lhs: impl IntoOperand<T>, rhs: impl IntoOperand<T>) -> Predicate {
    compare("<", lhs, rhs, |a, b| a < b)
}

pub fn greater_than_eq<T: Numeric>(
    lhs: impl IntoOperand<T>,
    rhs: impl IntoOperand<T>,
) -> Predicate {
    compare(">=", lhs, rhs, |a, b| a >= b)
}

pub fn less_than_eq<T: Numeric>(lhs: impl IntoOperand<T>, rhs: impl IntoOperand<T>) -> Predicate {
    compare("<=", lhs, rhs, |a, b| a <= b)
}

/// Sugar for `equal(true, value)`
pub fn is_true(value: impl IntoOperand<bool>) -> Predicate {
    equal(true, value)
}

/// Sugar for `equal(false, value)`
pub fn is_false(value: impl IntoOperand<bool>) -> Predicate {
    equal(false, value)
}

pub fn and(all: impl IntoIterator<Item = Predicate>) -> Predicate {
    Predicate::And(all.into_iter().collect())
}

pub fn or(any: impl IntoIterator<Item = Predicate>) -> Predicate {
    Predicate::Or(any.into_iter().collect())
}

pub fn not(inner: Predicate) -> Predicate {
    Predicate::Not(Box::new(inner))
}

pub fn nil<T: Send + Sync + 'static>(value: Accessor<Option<T>>) -> Predicate {
    Predicate::test(IsNil { value, nil: true })
}

pub fn not_nil<T: Send + Sync + 'static>(value: Accessor<Option<T>>) -> Predicate {
    Predicate::test(IsNil { value, nil: false })
}

/// True when running `effect` now fails
pub fn exec_error(effect: impl Into<Effect>) -> Predicate {
    Predicate::Exec {
        effect: effect.into(),
        expect_error: true,
    }
}

/// True when running `effect` now succeeds
pub fn exec_no_error(effect: impl Into<Effect>) -> Predicate {
    Predicate::Exec {
        effect: effect.into(),
        expect_error: false,
    }
}

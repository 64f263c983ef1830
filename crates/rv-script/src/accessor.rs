//! Lazy operands
//!
//! Predicates and effect steps take their inputs as [`Operand`]s: either a
//! literal fixed when the routine is built, or an [`Accessor`] evaluated
//! against the session each time the step runs.

use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

use crate::scratch::FromVariable;
use crate::session::{Session, WindowSlot};

/// A value read from the session at evaluation time
pub struct Accessor<T>(Arc<dyn Fn(&Session) -> T + Send + Sync>);

impl<T> Accessor<T> {
    pub fn new(f: impl Fn(&Session) -> T + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn get(&self, session: &Session) -> T {
        (self.0)(session)
    }
}

impl<T: 'static> Accessor<T> {
    /// Transform the accessed value
    pub fn map<U>(self, f: impl Fn(T) -> U + Send + Sync + 'static) -> Accessor<U> {
        Accessor::new(move |session| f(self.get(session)))
    }
}

impl<T> Clone for Accessor<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> fmt::Debug for Accessor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Accessor<{}>", std::any::type_name::<T>())
    }
}

/// A literal or an accessor
#[derive(Clone)]
pub enum Operand<T> {
    Literal(T),
    Live(Accessor<T>),
}

impl<T: Clone> Operand<T> {
    pub fn resolve(&self, session: &Session) -> T {
        match self {
            Operand::Literal(value) => value.clone(),
            Operand::Live(accessor) => accessor.get(session),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Operand<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Literal(value) => write!(f, "{value:?}"),
            Operand::Live(accessor) => write!(f, "{accessor:?}"),
        }
    }
}

/// Conversion into an [`Operand`] of a fixed kind
pub trait IntoOperand<T> {
    fn into_operand(self) -> Operand<T>;
}

impl<T> IntoOperand<T> for Operand<T> {
    fn into_operand(self) -> Operand<T> {
        self
    }
}

impl<T> IntoOperand<T> for Accessor<T> {
    fn into_operand(self) -> Operand<T> {
        Operand::Live(self)
    }
}

macro_rules! literal_operand {
    ($($from:ty => $to:ty),* $(,)?) => {
        $(
            impl IntoOperand<$to> for $from {
                fn into_operand(self) -> Operand<$to> {
                    Operand::Literal(self.into())
                }
            }
        )*
    };
}

literal_operand! {
    i64 => i64,
    i32 => i64,
    u64 => u64,
    f32 => f32,
    f64 => f64,
    bool => bool,
    String => String,
    &'static str => String,
    Identity => Identity,
}

/// Reference identity of a shared object
///
/// Two identities are equal when they point at the same allocation, or when
/// both are empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Identity(Option<usize>);

impl Identity {
    pub fn of<T: ?Sized>(value: &Arc<T>) -> Self {
        Self(Some(Arc::as_ptr(value) as *const () as usize))
    }

    pub fn none() -> Self {
        Self(None)
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }
}

/// Index of the innermost active loop
pub fn index() -> Accessor<i64> {
    index_at(0)
}

/// Index of the loop `depth` levels out from the innermost one
pub fn index_at(depth: usize) -> Accessor<i64> {
    Accessor::new(move |session| session.scratch.index(depth))
}

/// A scratch variable
pub fn var<T: FromVariable + 'static>(name: &str) -> Accessor<T> {
    let name = name.to_string();
    Accessor::new(move |session| session.scratch.get_as(&name))
}

/// A user setting; missing or mistyped settings read as `T::default()`
pub fn setting<T: DeserializeOwned + Default + 'static>(path: &str) -> Accessor<T> {
    let path = path.to_string();
    Accessor::new(move |session| {
        session.settings().get(&path).unwrap_or_else(|e| {
            warn!(path = %path, "Setting unavailable, using default: {}", e);
            T::default()
        })
    })
}

/// A value from the persisted account state; missing values read as
/// `T::default()`
pub fn state<T: DeserializeOwned + Default + 'static>(path: &str) -> Accessor<T> {
    let path = path.to_string();
    Accessor::new(move |session| session.state().get(&path).unwrap_or_default())
}

/// The session's window
pub fn window() -> Accessor<WindowSlot> {
    Accessor::new(|session| session.window())
}

/// Identity of the session's window
pub fn window_identity() -> Accessor<Identity> {
    Accessor::new(|session| {
        session
            .window()
            .as_ref()
            .map(Identity::of)
            .unwrap_or_default()
    })
}

/// Whether the session's window exists and is live
pub fn window_live() -> Accessor<bool> {
    Accessor::new(|session| session.window().is_some_and(|w| w.is_live()))
}

/// Description of the most recent step error
pub fn last_error() -> Accessor<Option<String>> {
    Accessor::new(|session| session.scratch.last_error().map(str::to_string))
}

/// Name of the session's account
pub fn account() -> Accessor<String> {
    Accessor::new(|session| session.account().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let a = Arc::new(1);
        let b = Arc::new(1);
        assert_eq!(Identity::of(&a), Identity::of(&a.clone()));
        assert_ne!(Identity::of(&a), Identity::of(&b));
        assert_eq!(Identity::none(), Identity::default());
        assert_ne!(Identity::of(&a), Identity::none());
    }

    #[test]
    fn test_literal_operands() {
        let op: Operand<i64> = 5.into_operand();
        assert!(matches!(op, Operand::Literal(5)));
        let op: Operand<String> = "hive".into_operand();
        assert!(matches!(op, Operand::Literal(ref s) if s == "hive"));
    }
}

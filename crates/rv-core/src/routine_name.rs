//! Routine name type

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for invalid routine names
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RoutineNameError {
    #[error("routine name cannot be empty")]
    Empty,

    #[error("routine name contains invalid characters (must be alphanumeric, '_' or '-')")]
    InvalidChars,
}

/// Name of a registered routine (e.g., "OpenRoblox")
///
/// Names are case sensitive and limited to ASCII alphanumerics, `_` and `-`
/// so they can appear in configuration paths and log fields unquoted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoutineName(String);

impl RoutineName {
    /// Create a new routine name
    pub fn new(name: impl Into<String>) -> Result<Self, RoutineNameError> {
        let name = name.into();
        if name.is_empty() {
            return Err(RoutineNameError::Empty);
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(RoutineNameError::InvalidChars);
        }
        Ok(Self(name))
    }

    /// Get the name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for RoutineName {
    type Err = RoutineNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for RoutineName {
    type Error = RoutineNameError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RoutineName> for String {
    fn from(name: RoutineName) -> Self {
        name.0
    }
}

/// Routine names are written as literals in routine definitions; an invalid
/// literal is an authoring defect.
impl From<&'static str> for RoutineName {
    fn from(s: &'static str) -> Self {
        match Self::new(s) {
            Ok(name) => name,
            Err(e) => panic!("invalid routine name {s:?}: {e}"),
        }
    }
}

impl Borrow<str> for RoutineName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoutineName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

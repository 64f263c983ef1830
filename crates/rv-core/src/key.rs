//! Logical input keys

use serde::{Deserialize, Serialize};
use std::fmt;

/// A logical key understood by every input backend
///
/// Backends translate these into platform key codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Forward,
    Backward,
    Left,
    Right,
    RotLeft,
    RotRight,
    RotUp,
    RotDown,
    ZoomIn,
    ZoomOut,
    E,
    R,
    L,
    Esc,
    Enter,
    LShift,
    Space,
    One,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

//! Interrupt requests

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::RoutineName;

/// Priority class of an interrupt
///
/// Classes are ordered by urgency: `Immediate` beats `Delayed` beats
/// `Interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptClass {
    /// Runs before the next queued step
    Immediate,
    /// Coalesced and dispatched once a minimum delay has elapsed
    Delayed,
    /// Dispatched at most once per fixed number of ticks
    Interval,
}

/// A request to preempt the active routine in favor of `routine`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptRequest {
    /// Routine to redirect to
    pub routine: RoutineName,

    /// Priority class
    pub class: InterruptClass,

    /// Lower values win ties within a class
    #[serde(default)]
    pub priority: i32,

    /// Minimum time between raising and dispatch (delayed interrupts)
    #[serde(default, with = "duration_ms")]
    pub min_delay: Duration,
}

impl InterruptRequest {
    /// Interrupt that preempts before the next step
    pub fn immediate(routine: impl Into<RoutineName>) -> Self {
        Self {
            routine: routine.into(),
            class: InterruptClass::Immediate,
            priority: 0,
            min_delay: Duration::ZERO,
        }
    }

    /// Interrupt that fires once `min_delay` has passed since it was raised
    pub fn delayed(routine: impl Into<RoutineName>, min_delay: Duration) -> Self {
        Self {
            routine: routine.into(),
            class: InterruptClass::Delayed,
            priority: 0,
            min_delay,
        }
    }

    /// Set the tie-breaking priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_ordering() {
        assert!(InterruptClass::Immediate < InterruptClass::Delayed);
        assert!(InterruptClass::Delayed < InterruptClass::Interval);
    }

    #[test]
    fn test_request_serde() {
        let request = InterruptRequest::delayed("Gather", Duration::from_millis(500)).with_priority(3);
        let json = serde_json::to_string(&request).unwrap();
        let back: InterruptRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, request);
        assert_eq!(back.min_delay, Duration::from_millis(500));
    }
}

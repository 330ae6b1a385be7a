//! Message priority mapping.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default priority applied when the caller specifies none.
pub const DEFAULT_PRIORITY: u8 = 5;

/// Minimum accepted priority value.
pub const MIN_PRIORITY: u8 = 1;

/// Maximum accepted priority value.
pub const MAX_PRIORITY: u8 = 10;

/// Named priority level carried on submit requests.
///
/// The mapping to broker priority values is a fixed total function:
/// unrecognized input maps to `Medium`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Broker priority value for this level.
    pub const fn value(&self) -> u8 {
        match self {
            Priority::High => 10,
            Priority::Medium => 5,
            Priority::Low => 1,
        }
    }

    /// Parse a level string. Case-insensitive; anything other than
    /// HIGH/MEDIUM/LOW maps to Medium.
    pub fn from_level(level: &str) -> Self {
        match level.trim().to_ascii_uppercase().as_str() {
            "HIGH" => Priority::High,
            "LOW" => Priority::Low,
            _ => Priority::Medium,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_values() {
        assert_eq!(Priority::High.value(), 10);
        assert_eq!(Priority::Medium.value(), 5);
        assert_eq!(Priority::Low.value(), 1);
        assert_eq!(Priority::Medium.value(), DEFAULT_PRIORITY);
    }

    #[test]
    fn test_from_level_is_total() {
        assert_eq!(Priority::from_level("HIGH"), Priority::High);
        assert_eq!(Priority::from_level("high"), Priority::High);
        assert_eq!(Priority::from_level(" low "), Priority::Low);
        assert_eq!(Priority::from_level("MEDIUM"), Priority::Medium);
        assert_eq!(Priority::from_level("urgent"), Priority::Medium);
        assert_eq!(Priority::from_level(""), Priority::Medium);
    }
}

//! Constraints extracted from a task description.

use serde::{Deserialize, Serialize};

/// One atomic, independently verifiable requirement derived from a task.
///
/// `critical` marks constraints whose violation vetoes the whole
/// constraint-adherence category (prices, ratings, named attributes).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Constraint {
    pub text: String,
    #[serde(default)]
    pub critical: bool,
}

impl Constraint {
    /// A non-critical constraint.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            critical: false,
        }
    }

    /// A constraint whose violation forces automatic failure.
    pub fn critical(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            critical: true,
        }
    }
}

impl std::fmt::Display for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.critical {
            write!(f, "{} [CRITICAL]", self.text)
        } else {
            write!(f, "{}", self.text)
        }
    }
}

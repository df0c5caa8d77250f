//! Violation records extracted from build output.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single analyzer violation reported by the build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViolationRecord {
    /// Analyzer code, normalised to upper case (e.g. `AZC0012`).
    pub code: String,
    /// Message text following the code.
    pub message: String,
}

impl ViolationRecord {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into().to_ascii_uppercase(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ViolationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// How repeated identical violation lines are handled during extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupPolicy {
    /// Collapse identical lines; the first occurrence keeps its position.
    #[default]
    FirstOccurrence,
    /// Keep every matching line, including repeats.
    KeepAll,
}

impl DedupPolicy {
    /// Map the boolean config flag onto a policy.
    pub const fn from_flag(dedup: bool) -> Self {
        if dedup {
            Self::FirstOccurrence
        } else {
            Self::KeepAll
        }
    }
}

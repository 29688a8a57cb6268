//! Cache generation identifiers
//!
//! Bumping either identifier is how a deployment invalidates that cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The pair of generation names a worker version considers current
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generations {
    /// Generation holding the precached static shell
    pub static_name: String,
    /// Generation holding responses captured at runtime
    pub runtime_name: String,
}

impl Generations {
    pub fn new(static_name: impl Into<String>, runtime_name: impl Into<String>) -> Self {
        Self {
            static_name: static_name.into(),
            runtime_name: runtime_name.into(),
        }
    }

    /// Whether a generation name is one of the two current identifiers
    pub fn is_current(&self, name: &str) -> bool {
        name == self.static_name || name == self.runtime_name
    }

    /// Filter a list of generation names down to the stale ones
    pub fn stale<'a>(&self, names: &'a [String]) -> Vec<&'a str> {
        names
            .iter()
            .map(String::as_str)
            .filter(|name| !self.is_current(name))
            .collect()
    }

    /// Classify a generation name
    pub fn status_of(&self, name: &str) -> GenerationStatus {
        if name == self.static_name {
            GenerationStatus::Static
        } else if name == self.runtime_name {
            GenerationStatus::Runtime
        } else {
            GenerationStatus::Stale
        }
    }
}

/// Role of a generation relative to the current deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    /// Current static generation
    Static,
    /// Current runtime generation
    Runtime,
    /// Left over from an earlier deployment
    Stale,
}

impl GenerationStatus {
    pub fn is_current(&self) -> bool {
        !matches!(self, Self::Stale)
    }
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static => write!(f, "static"),
            Self::Runtime => write!(f, "runtime"),
            Self::Stale => write!(f, "stale"),
        }
    }
}

/// Summary of a stored generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationInfo {
    /// Generation name
    pub name: String,
    /// When the generation was first opened
    pub created_at: DateTime<Utc>,
    /// Number of stored entries
    pub entries: usize,
}

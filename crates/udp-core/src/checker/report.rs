use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A configured stream: a unique name and the locator to probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSpec {
    pub name: String,
    pub locator: String,
}

impl StreamSpec {
    pub fn new(name: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locator: locator.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamStatus {
    Active,
    Inactive,
    Invalid,
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Inactive => write!(f, "INACTIVE"),
            Self::Invalid => write!(f, "INVALID"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamResult {
    pub name: String,
    pub locator: String,
    pub status: StreamStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Probe attempts spent on this stream; zero for invalid locators.
    pub attempts: u32,
}

impl StreamResult {
    pub fn is_down(&self) -> bool {
        self.status != StreamStatus::Active
    }
}

/// Outcome of one check cycle, one entry per configured stream in input order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckReport {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<StreamResult>,
}

impl CheckReport {
    pub fn get(&self, name: &str) -> Option<&StreamResult> {
        self.results.iter().find(|r| r.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.results.iter().map(|r| r.name.as_str())
    }

    pub fn down_streams(&self) -> Vec<&StreamResult> {
        self.results.iter().filter(|r| r.is_down()).collect()
    }

    pub fn is_healthy(&self) -> bool {
        self.results.iter().all(|r| !r.is_down())
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn elapsed_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

//! Work item model: one durable queue row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A deferred unit of work stored in the `work_queue` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct WorkItem {
    /// Opaque unique identifier.
    pub id: String,
    /// Job type, the key used to resolve a job from the registry.
    pub job_type: String,
    /// Job-specific payload.
    pub payload: Vec<u8>,
    /// Number of execution attempts made so far.
    pub attempts: i32,
    /// Error text of the last failed attempt.
    pub last_error: Option<String>,
    /// Whether an executor currently holds the item.
    pub locked: bool,
    /// Last-touched timestamp; older items are offered first.
    pub updated_at: DateTime<Utc>,
}

impl WorkItem {
    /// Build an unlocked item with no attempts, mostly useful for in-memory stores.
    pub fn new(id: impl Into<String>, job_type: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            job_type: job_type.into(),
            payload,
            attempts: 0,
            last_error: None,
            locked: false,
            updated_at: Utc::now(),
        }
    }
}

impl std::fmt::Display for WorkItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "WorkItem{{id: {}, type: {}, attempts: {}}}",
            self.id, self.job_type, self.attempts
        )
    }
}

/// Data required to enqueue a new work item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewWorkItem {
    /// Explicit identifier; a UUID is generated when absent.
    pub id: Option<String>,
    /// Job type.
    pub job_type: String,
    /// Job-specific payload.
    pub payload: Vec<u8>,
}

impl NewWorkItem {
    /// Create a new work item request with a generated identifier.
    pub fn new(job_type: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: None,
            job_type: job_type.into(),
            payload: payload.into(),
        }
    }

    /// Use an explicit identifier instead of a generated one.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

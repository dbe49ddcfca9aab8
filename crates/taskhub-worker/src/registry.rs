//! Job registry: maps a work item's type to a job constructor.

use std::collections::HashMap;
use std::sync::Arc;

use taskhub_core::traits::job::Job;
use taskhub_core::types::WorkItem;

/// Builds a job for one work item.
pub type JobConstructor = Arc<dyn Fn(&WorkItem) -> Box<dyn Job> + Send + Sync>;

/// Lookup table from job type to constructor.
///
/// Built once at startup and shared read-only by every executor.
#[derive(Default, Clone)]
pub struct JobRegistry {
    constructors: HashMap<String, JobConstructor>,
}

impl JobRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `constructor` for `job_type`, replacing any previous entry.
    pub fn register<F>(&mut self, job_type: impl Into<String>, constructor: F)
    where
        F: Fn(&WorkItem) -> Box<dyn Job> + Send + Sync + 'static,
    {
        let job_type = job_type.into();
        tracing::debug!(job_type = %job_type, "Registered job type");
        self.constructors.insert(job_type, Arc::new(constructor));
    }

    /// Build the job for `item`, or `None` when its type is unknown.
    pub fn find(&self, item: &WorkItem) -> Option<Box<dyn Job>> {
        self.constructors
            .get(&item.job_type)
            .map(|constructor| constructor(item))
    }

    /// Whether a constructor is registered for `job_type`.
    pub fn has(&self, job_type: &str) -> bool {
        self.constructors.contains_key(job_type)
    }

    /// Registered job types, sorted.
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.constructors.keys().cloned().collect();
        types.sort();
        types
    }
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRegistry")
            .field("types", &self.registered_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::base::BaseJob;

    #[test]
    fn test_find_unknown_type_returns_none() {
        let registry = JobRegistry::new();
        let item = WorkItem::new("1", "missing", Vec::new());
        assert!(registry.find(&item).is_none());
        assert!(!registry.has("missing"));
    }

    #[test]
    fn test_register_and_find() {
        let mut registry = JobRegistry::new();
        registry.register("base", |_| Box::new(BaseJob));
        registry.register("alpha", |_| Box::new(BaseJob));

        let item = WorkItem::new("1", "base", Vec::new());
        assert!(registry.find(&item).is_some());
        assert_eq!(registry.registered_types(), vec!["alpha", "base"]);
    }
}

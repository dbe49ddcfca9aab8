//! Built-in job implementations.

pub mod base;
pub mod log;

pub use base::BaseJob;
pub use log::LogJob;

use crate::registry::JobRegistry;

/// Register every built-in job type on `registry`.
pub fn register_builtin(registry: &mut JobRegistry) {
    registry.register(base::JOB_TYPE, |_| Box::new(BaseJob));
    registry.register(log::JOB_TYPE, |item| Box::new(LogJob::new(item.payload.clone())));
}

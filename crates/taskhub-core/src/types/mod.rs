//! Shared domain types.

pub mod work_item;

pub use work_item::{NewWorkItem, WorkItem};

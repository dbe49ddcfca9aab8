//! # taskhub-core
//!
//! Core crate for TaskHub. Contains the configuration schema, the work item
//! model, the traits that connect the worker engine to its store, transport
//! and jobs, and the unified error system.
//!
//! This crate has **no** internal dependencies on other TaskHub crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;

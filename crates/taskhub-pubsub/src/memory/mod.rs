//! In-process pub/sub broker.

pub mod broker;

pub use broker::MemoryBroker;

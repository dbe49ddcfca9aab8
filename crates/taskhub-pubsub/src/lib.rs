//! # taskhub-pubsub
//!
//! Transports for the wakeup channel that tells workers new work was
//! enqueued. Two implementations of the core pub/sub traits:
//!
//! - **redis**: Redis `SUBSCRIBE`/`PUBLISH` using the [redis](https://crates.io/crates/redis) crate
//! - **memory**: in-process broker with fault injection, used by tests and
//!   single-node setups

#[cfg(feature = "memory")]
pub mod memory;
#[cfg(feature = "redis-backend")]
pub mod redis;

#[cfg(feature = "memory")]
pub use memory::MemoryBroker;
#[cfg(feature = "redis-backend")]
pub use redis::{RedisPublisher, RedisTransport};

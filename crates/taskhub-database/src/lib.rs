//! # taskhub-database
//!
//! PostgreSQL connection management, migrations and the durable work queue:
//! the lock-based queue manager used by workers and the producer used to
//! enqueue new items.

pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
pub use repositories::{PgWorkProducer, PgWorkQueue};

//! Repository implementations for the work queue.

pub mod producer;
pub mod queue;

pub use producer::PgWorkProducer;
pub use queue::PgWorkQueue;

//! In-process queue implementations.

pub mod memory;

pub use memory::MemoryWorkQueue;

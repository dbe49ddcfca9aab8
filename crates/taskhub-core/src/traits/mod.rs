//! Core traits defined in `taskhub-core` and implemented by other crates.

pub mod job;
pub mod producer;
pub mod pubsub;
pub mod queue;

pub use job::{Job, JobContext, JobError};
pub use producer::WorkProducer;
pub use pubsub::{
    PubSubEvent, PubSubTransport, Subscription, SubscriptionControl, SubscriptionStream,
    TransportError, WakeupPublisher,
};
pub use queue::{QueueError, WorkQueue};

//! Consumer-group Kafka source for kafka-dump.
//!
//! This crate owns the transport side of the dumper: it joins a Kafka
//! consumer group, subscribes to the configured topics, and exposes the
//! session as a single stream of events (messages, consumer errors, and
//! rebalance notices) plus an offset-mark operation.
//!
//! The event types in [`message`] carry no rdkafka types, so callers can
//! drive the same consumption logic from an in-memory source in tests.
//!
//! # Modules
//!
//! - [`consumer`] - rdkafka-backed consumer group session
//! - [`message`] - transport-independent event and message types
//! - [`error`] - error types for source operations

pub mod consumer;
pub mod error;
pub mod message;

mod traits;

// Re-export main types for easy access
pub use consumer::{ConsumerConfig, GroupConsumer};
pub use error::{Error, Result};
pub use message::{ConsumedMessage, RebalanceNotice, SourceEvent, TopicPartition};
pub use traits::MessageSource;

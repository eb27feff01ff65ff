//! kafka-dump Library
//!
//! Dumps every message of a set of Kafka topics into a local directory tree
//! partitioned by topic, partition, and UTC day. The tool joins a consumer
//! group, appends each payload verbatim to its dump file, and commits the
//! offset only once the bytes are on disk, so an interrupted session resumes
//! without losing messages.
//!
//! # Features
//!
//! - Consumer groups: committed offsets let sessions resume where they left off
//! - Durable-before-marked: a message's offset is committed only after its
//!   payload is appended and flushed
//! - Day files: one append-only file per topic/partition/UTC day
//! - Fail-fast writes: any write error ends the session immediately
//! - Graceful shutdown: SIGINT/SIGTERM stop the loop and report the counters
//!
//! # Modules
//!
//! - [`config`] - flag/env/config-file resolution and scaffolding
//! - [`dump`] - the consumption loop and the dump file writer
//!
//! The transport itself (rdkafka consumer, rebalance notices, offset marks)
//! lives in the `kafka-dump-source` crate under `crates/source`.
//!
//! # CLI Usage
//!
//! ```bash
//! # Dump two topics, starting from the earliest retained messages
//! kafka-dump run --brokers localhost:9092 --topics orders,audit --output-dir ./dump
//!
//! # Only dump messages produced from now on
//! kafka-dump run --brokers localhost:9092 --topics orders --newest
//!
//! # Start over: clear the output tree and re-read everything
//! kafka-dump run --brokers localhost:9092 --topics orders --overwrite
//!
//! # Write a starter config file to ~/.config/kafka-dump/config.toml
//! kafka-dump init-config
//! ```

pub mod config;
pub mod dump;

pub use config::{Config, DumpArgs};
pub use dump::SessionStats;

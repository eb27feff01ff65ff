//! The dump session: one serialized loop over everything a consumer-group
//! session produces.
//!
//! Messages, consumer errors, rebalance notices, and the shutdown request
//! are multiplexed into a single `tokio::select!`, so exactly one event is
//! handled at a time and writes, offset marks, and counters never race.

use std::path::Path;

use anyhow::Context;
use kafka_dump_source::{ConsumerConfig, GroupConsumer, MessageSource, SourceEvent};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;

pub mod writer;

/// Counters for one dump session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    /// Messages received, with or without a payload
    pub processed: u64,
    /// Consumer errors observed
    pub errors: u64,
}

impl SessionStats {
    /// Total events handled, reported when the session ends.
    pub fn total(&self) -> u64 {
        self.processed + self.errors
    }
}

/// Run a dump session until shutdown is requested.
///
/// Joins the consumer group, then consumes until the token fires. Returns
/// the session counters on a clean shutdown; a failed write aborts the
/// session with an error instead, leaving the message's offset unmarked.
pub async fn run(config: &Config, shutdown: CancellationToken) -> anyhow::Result<SessionStats> {
    let consumer_config = ConsumerConfig {
        brokers: config.brokers.clone(),
        topics: config.topics.clone(),
        group_id: config.group_id.clone(),
        client_id: config.client_id.clone(),
        kafka_version: config.kafka_version.clone(),
        start_from_newest: config.newest,
        ..ConsumerConfig::default()
    };
    let mut source = GroupConsumer::connect(&consumer_config).with_context(|| {
        format!(
            "Failed to start a consumer group session against {}",
            config.brokers.join(",")
        )
    })?;

    info!(
        "Dump session started: group [{}] client [{}] topics {:?} output [{}]",
        config.group_id,
        config.client_id,
        config.topics,
        config.output_dir.display()
    );

    consume(&mut source, &config.output_dir, &shutdown).await
}

/// The consumption loop.
///
/// One event per iteration. A message is appended to its dump file before
/// its offset is marked, so a crash between the two redelivers the message
/// instead of losing it.
async fn consume<S: MessageSource>(
    source: &mut S,
    output_root: &Path,
    shutdown: &CancellationToken,
) -> anyhow::Result<SessionStats> {
    let mut stats = SessionStats::default();

    loop {
        tokio::select! {
            // Once shutdown is requested, no further event is taken.
            biased;

            _ = shutdown.cancelled() => {
                info!(
                    "Total messages processed: {} ({} consumer errors)",
                    stats.total(),
                    stats.errors
                );
                return Ok(stats);
            }

            event = source.next_event() => match event {
                SourceEvent::Message(message) => {
                    stats.processed += 1;

                    if let Some(payload) = message.payload.as_deref() {
                        info!(
                            "Received message from topic [{}]: partition [{}] offset [{}] key [{}]",
                            message.topic,
                            message.partition,
                            message.offset,
                            message.key_display()
                        );
                        let path = writer::append(
                            output_root,
                            &message.topic,
                            message.partition,
                            message.timestamp,
                            payload,
                        )
                        .await?;
                        debug!("Appended {} bytes to {}", payload.len(), path.display());
                    } else {
                        warn!(
                            "Skipping message without payload: topic [{}] partition [{}] offset [{}]",
                            message.topic, message.partition, message.offset
                        );
                    }

                    // A mark failure only widens the at-least-once
                    // redelivery window; the bytes are already on disk.
                    if let Err(e) = source.mark(&message) {
                        error!(
                            "Failed to mark offset {} on {}/{}: {e}",
                            message.offset, message.topic, message.partition
                        );
                    }
                }

                SourceEvent::Error(e) => {
                    stats.errors += 1;
                    error!("Consumer error: {e}");
                }

                SourceEvent::Rebalance(notice) => match serde_json::to_string(&notice) {
                    Ok(json) => info!("Rebalanced: {json}"),
                    Err(e) => error!("Failed to serialize rebalance notice: {e}"),
                },
            }
        }
    }
}

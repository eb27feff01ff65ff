//! rdkafka-backed consumer group session.
//!
//! [`GroupConsumer`] joins the group at construction time and surfaces the
//! whole session through [`MessageSource`]: records, consumer errors, and
//! rebalance notices all arrive through `next_event`, and handled messages
//! are acknowledged with `mark`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rdkafka::client::ClientContext;
use rdkafka::config::{ClientConfig, RDKafkaLogLevel};
use rdkafka::consumer::{
    BaseConsumer, CommitMode, Consumer as RdkafkaConsumer, ConsumerContext, Rebalance,
    StreamConsumer,
};
use rdkafka::error::KafkaResult;
use rdkafka::message::{BorrowedMessage, Message as RdkafkaMessage};
use rdkafka::{Offset, TopicPartitionList};
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::{Error, Result};
use crate::message::{ConsumedMessage, RebalanceNotice, SourceEvent, TopicPartition};
use crate::traits::MessageSource;

/// How long the startup broker probe may take before the session is
/// declared unreachable.
const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for a consumer group session
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Kafka broker addresses
    pub brokers: Vec<String>,
    /// Topics to subscribe to
    pub topics: Vec<String>,
    /// Consumer group ID
    ///
    /// Committed offsets belong to the group, so a fresh group ID re-reads
    /// every retained message while a reused one resumes where it left off.
    pub group_id: String,
    /// Client ID reported to the brokers, for server-side logs and quotas
    pub client_id: String,
    /// Protocol version to fall back to when the brokers are too old to
    /// announce their supported API versions (e.g. "0.10.2.0")
    pub kafka_version: String,
    /// Where to start when the group has no committed offsets
    ///
    /// `false` starts from the earliest retained message, `true` from the
    /// latest, skipping everything produced before the session began.
    pub start_from_newest: bool,
    /// Session timeout in milliseconds
    pub session_timeout_ms: String,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["localhost:9092".to_string()],
            topics: Vec::new(),
            group_id: "kafka-dump".to_string(),
            client_id: "kafka-dump".to_string(),
            kafka_version: "0.10.2.0".to_string(),
            start_from_newest: false,
            session_timeout_ms: "6000".to_string(),
        }
    }
}

fn client_config(config: &ConsumerConfig) -> ClientConfig {
    let offset_reset = if config.start_from_newest {
        "latest"
    } else {
        "earliest"
    };

    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", config.brokers.join(","))
        .set("group.id", &config.group_id)
        .set("client.id", &config.client_id)
        // Offsets are committed only via `mark`, after the message is on disk.
        .set("enable.auto.commit", "false")
        .set("auto.offset.reset", offset_reset)
        .set("session.timeout.ms", &config.session_timeout_ms)
        .set("enable.partition.eof", "false")
        .set("broker.version.fallback", &config.kafka_version)
        .set_log_level(RDKafkaLogLevel::Warning);
    client_config
}

/// Consumer context that forwards rebalance callbacks into the event stream.
///
/// librdkafka invokes these callbacks on its own threads; pushing them into
/// a channel here is what lets the consumption loop observe rebalances as
/// ordinary, serialized events.
struct NotifyingContext {
    notices: mpsc::UnboundedSender<RebalanceNotice>,
}

impl NotifyingContext {
    fn notify(&self, notice: RebalanceNotice) {
        // The receiver only goes away when the whole session is dropped.
        let _ = self.notices.send(notice);
    }
}

impl ClientContext for NotifyingContext {}

impl ConsumerContext for NotifyingContext {
    fn pre_rebalance(&self, _: &BaseConsumer<Self>, rebalance: &Rebalance) {
        self.notify(match rebalance {
            Rebalance::Assign(partitions) => RebalanceNotice::Assigning(partitions_of(partitions)),
            Rebalance::Revoke(partitions) => RebalanceNotice::Revoking(partitions_of(partitions)),
            Rebalance::Error(e) => RebalanceNotice::Failed(e.to_string()),
        });
    }

    fn post_rebalance(&self, _: &BaseConsumer<Self>, rebalance: &Rebalance) {
        self.notify(match rebalance {
            Rebalance::Assign(partitions) => RebalanceNotice::Assigned(partitions_of(partitions)),
            Rebalance::Revoke(partitions) => RebalanceNotice::Revoked(partitions_of(partitions)),
            Rebalance::Error(e) => RebalanceNotice::Failed(e.to_string()),
        });
    }

    fn commit_callback(&self, result: KafkaResult<()>, offsets: &TopicPartitionList) {
        // Async commits report their outcome here rather than at the call site.
        if let Err(e) = result {
            warn!("Offset commit failed for {:?}: {e}", offsets);
        }
    }
}

fn partitions_of(partitions: &TopicPartitionList) -> Vec<TopicPartition> {
    partitions
        .elements()
        .iter()
        .map(|elem| TopicPartition {
            topic: elem.topic().to_string(),
            partition: elem.partition(),
        })
        .collect()
}

fn to_consumed(message: &BorrowedMessage<'_>) -> ConsumedMessage {
    ConsumedMessage {
        topic: message.topic().to_string(),
        partition: message.partition(),
        offset: message.offset(),
        key: message.key().map(|k| k.to_vec()),
        payload: message.payload().map(|p| p.to_vec()),
        timestamp: message
            .timestamp()
            .to_millis()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .unwrap_or_else(Utc::now),
    }
}

/// A live consumer-group session.
pub struct GroupConsumer {
    consumer: StreamConsumer<NotifyingContext>,
    rebalances: mpsc::UnboundedReceiver<RebalanceNotice>,
}

impl GroupConsumer {
    /// Join the consumer group and subscribe to the configured topics.
    ///
    /// The brokers are probed for metadata before this returns, so an
    /// unreachable cluster fails the session at startup instead of
    /// stalling the first `next_event`.
    pub fn connect(config: &ConsumerConfig) -> Result<Self> {
        if config.brokers.is_empty() {
            return Err(Error::InvalidConfig(
                "at least one broker is required".to_string(),
            ));
        }
        if config.topics.is_empty() {
            return Err(Error::InvalidConfig(
                "at least one topic is required".to_string(),
            ));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let consumer: StreamConsumer<NotifyingContext> =
            client_config(config).create_with_context(NotifyingContext { notices: tx })?;

        consumer
            .fetch_metadata(None, METADATA_TIMEOUT)
            .map_err(|source| Error::Connection {
                brokers: config.brokers.join(","),
                source,
            })?;

        let topics: Vec<&str> = config.topics.iter().map(String::as_str).collect();
        consumer.subscribe(&topics)?;

        Ok(Self {
            consumer,
            rebalances: rx,
        })
    }
}

#[async_trait::async_trait]
impl MessageSource for GroupConsumer {
    async fn next_event(&mut self) -> SourceEvent {
        tokio::select! {
            Some(notice) = self.rebalances.recv() => SourceEvent::Rebalance(notice),
            result = self.consumer.recv() => match result {
                Ok(message) => SourceEvent::Message(to_consumed(&message)),
                Err(e) => SourceEvent::Error(Error::Kafka(e)),
            },
        }
    }

    fn mark(&self, message: &ConsumedMessage) -> Result<()> {
        let mut partitions = TopicPartitionList::new();
        // Kafka convention: commit the next offset to be read, not the one
        // just handled.
        partitions.add_partition_offset(
            &message.topic,
            message.partition,
            Offset::Offset(message.offset + 1),
        )?;
        self.consumer.commit(&partitions, CommitMode::Async)?;
        Ok(())
    }
}

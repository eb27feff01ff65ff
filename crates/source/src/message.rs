//! Transport-independent event and message types.
//!
//! Everything the consumption loop handles is expressed with these types.
//! They deliberately contain no rdkafka types, so the loop can be driven by
//! a scripted in-memory source in tests.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Error;

/// A message received from the consumer group session.
///
/// An owned copy of a single record; the transport's borrowed view is
/// released as soon as this is constructed.
#[derive(Debug, Clone)]
pub struct ConsumedMessage {
    /// Topic the message was read from
    pub topic: String,
    /// Partition within the topic
    pub partition: i32,
    /// Offset within the partition
    pub offset: i64,
    /// Message key (if any)
    pub key: Option<Vec<u8>>,
    /// Message payload; `None` for tombstone records with a null value
    pub payload: Option<Vec<u8>>,
    /// Broker timestamp, falling back to the receipt time when the broker
    /// did not record one
    pub timestamp: DateTime<Utc>,
}

impl ConsumedMessage {
    /// Message key rendered for log lines. Keys are opaque bytes; invalid
    /// UTF-8 is replaced rather than rejected.
    pub fn key_display(&self) -> String {
        match &self.key {
            Some(key) => String::from_utf8_lossy(key).into_owned(),
            None => String::new(),
        }
    }
}

/// One event delivered by a message source.
///
/// The group session multiplexes records, consumer-level errors, and
/// rebalance notices into this single stream.
#[derive(Debug)]
pub enum SourceEvent {
    /// A record was received
    Message(ConsumedMessage),
    /// The consumer reported an error; the session itself is still alive
    Error(Error),
    /// Group membership changed
    Rebalance(RebalanceNotice),
}

/// A topic/partition pair named by a rebalance notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicPartition {
    pub topic: String,
    pub partition: i32,
}

/// A consumer-group rebalance notification.
///
/// `Assigning`/`Revoking` are emitted when a rebalance starts,
/// `Assigned`/`Revoked` once the group coordinator has settled it.
/// Serialized to JSON by the caller for logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RebalanceNotice {
    Assigning(Vec<TopicPartition>),
    Assigned(Vec<TopicPartition>),
    Revoking(Vec<TopicPartition>),
    Revoked(Vec<TopicPartition>),
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebalance_notice_serializes_to_json() {
        let notice = RebalanceNotice::Assigned(vec![
            TopicPartition {
                topic: "events".to_string(),
                partition: 0,
            },
            TopicPartition {
                topic: "events".to_string(),
                partition: 1,
            },
        ]);

        let json = serde_json::to_string(&notice).unwrap();
        assert_eq!(
            json,
            r#"{"assigned":[{"topic":"events","partition":0},{"topic":"events","partition":1}]}"#
        );
    }

    #[test]
    fn test_rebalance_failure_serializes_to_json() {
        let notice = RebalanceNotice::Failed("broker went away".to_string());
        let json = serde_json::to_string(&notice).unwrap();
        assert_eq!(json, r#"{"failed":"broker went away"}"#);
    }

    #[test]
    fn test_key_display_tolerates_non_utf8_keys() {
        let message = ConsumedMessage {
            topic: "events".to_string(),
            partition: 0,
            offset: 0,
            key: Some(vec![0xff, 0xfe]),
            payload: Some(b"x".to_vec()),
            timestamp: Utc::now(),
        };
        assert!(!message.key_display().is_empty());

        let keyless = ConsumedMessage {
            key: None,
            ..message
        };
        assert_eq!(keyless.key_display(), "");
    }
}

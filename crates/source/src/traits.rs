//! MessageSource trait definition.
//!
//! This trait is the narrow seam between the consumption loop and the
//! transport: everything the loop needs from a consumer-group session is
//! "give me the next event" and "mark this message as handled".

use crate::error::Result;
use crate::message::{ConsumedMessage, SourceEvent};

/// A group-coordinated partitioned log the dumper can consume from.
///
/// The production implementation is [`crate::GroupConsumer`]; tests drive
/// the same loop with a scripted in-memory source.
///
/// # Usage Pattern
///
/// Consumers use generics for zero-cost dispatch:
///
/// ```ignore
/// pub async fn consume<S: MessageSource>(source: &mut S) -> Result<()> {
///     loop {
///         match source.next_event().await {
///             SourceEvent::Message(message) => {
///                 // handle, then acknowledge
///                 source.mark(&message)?;
///             }
///             // ...
///         }
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait MessageSource: Send {
    /// Wait for the next event from the session.
    ///
    /// Multiplexes records, consumer errors, and rebalance notices into one
    /// await; never returns "end of stream" because a group session has
    /// none.
    async fn next_event(&mut self) -> SourceEvent;

    /// Record that `message` has been fully handled, so a restarted session
    /// resumes after it. Redelivery of marked-but-uncommitted messages is
    /// possible; delivery is at-least-once.
    fn mark(&self, message: &ConsumedMessage) -> Result<()>;
}

use {
    async_trait::async_trait,
    pincer_common::{ChannelMessage, Timestamp},
};

use crate::Result;

/// Durable log of inbound messages, shared by ingest (writes) and dispatch
/// (reads). It is the only channel between the two.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Insert or replace the message with the same `(id, conversation_id)`.
    ///
    /// A replaced message keeps its original insertion position. Also
    /// refreshes the conversation's last-activity marker.
    async fn upsert(&self, message: &ChannelMessage) -> Result<()>;

    /// All messages in `conversation_ids` with `timestamp > since`, ascending
    /// by timestamp, ties in insertion order. One round-trip for any number
    /// of conversations.
    async fn query_after(
        &self,
        conversation_ids: &[String],
        since: &Timestamp,
    ) -> Result<Vec<ChannelMessage>>;

    /// Timestamp of the most recently stored message for a conversation.
    async fn last_activity(&self, conversation_id: &str) -> Result<Option<Timestamp>>;

    /// Number of stored messages for a conversation.
    async fn count(&self, conversation_id: &str) -> Result<u64>;
}

//! Ingest handler: transport events → message store.

use std::sync::{Arc, Mutex};

use {
    async_trait::async_trait,
    pincer_channels::{InboundEvent, InboundSink, MessageStore},
    pincer_common::preview,
    pincer_sessions::ConversationRegistry,
    tracing::{debug, error},
};

#[cfg(feature = "metrics")]
use pincer_metrics::{counter, ingest as ingest_metrics, labels};

use crate::{Error, Result};

/// Stores inbound messages for registered conversations.
///
/// Holds its own registry view, refreshed from disk on change, so it shares
/// nothing with the dispatch loop except the message store.
pub struct IngestHandler {
    store: Arc<dyn MessageStore>,
    registry: Mutex<ConversationRegistry>,
}

impl IngestHandler {
    pub fn new(store: Arc<dyn MessageStore>, registry: ConversationRegistry) -> Self {
        Self {
            store,
            registry: Mutex::new(registry),
        }
    }

    fn is_registered(&self, conversation_id: &str) -> bool {
        let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        registry.refresh();
        registry.is_registered(conversation_id)
    }

    /// Store `event` if it belongs to a registered conversation and carries
    /// text. Returns whether it was stored.
    pub async fn ingest(&self, event: &InboundEvent) -> Result<bool> {
        if !self.is_registered(&event.conversation_id) {
            debug!(
                conversation_id = %event.conversation_id,
                message_id = %event.id,
                "dropping message from unregistered conversation"
            );
            #[cfg(feature = "metrics")]
            counter!(ingest_metrics::MESSAGES_DROPPED_TOTAL, labels::REASON => "unregistered")
                .increment(1);
            return Ok(false);
        }

        let Some(message) = event.to_message() else {
            debug!(
                conversation_id = %event.conversation_id,
                message_id = %event.id,
                "dropping message without text content"
            );
            #[cfg(feature = "metrics")]
            counter!(ingest_metrics::MESSAGES_DROPPED_TOTAL, labels::REASON => "no_text")
                .increment(1);
            return Ok(false);
        };

        self.store.upsert(&message).await.map_err(Error::Store)?;
        debug!(
            conversation_id = %message.conversation_id,
            message_id = %message.id,
            timestamp = %message.timestamp,
            "stored message: {}",
            preview(&message.content, 100)
        );
        #[cfg(feature = "metrics")]
        counter!(ingest_metrics::MESSAGES_STORED_TOTAL).increment(1);
        Ok(true)
    }
}

#[async_trait]
impl InboundSink for IngestHandler {
    async fn on_event(&self, event: InboundEvent) {
        if let Err(e) = self.ingest(&event).await {
            #[cfg(feature = "metrics")]
            counter!(ingest_metrics::STORE_ERRORS_TOTAL).increment(1);
            error!(
                conversation_id = %event.conversation_id,
                message_id = %event.id,
                error = %e,
                "failed to store inbound message"
            );
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        chrono::{TimeZone, Utc},
        pincer_channels::{InMemoryMessageStore, MessageContent},
        pincer_common::Timestamp,
    };

    fn event(conversation_id: &str, id: &str, text: &str) -> InboundEvent {
        InboundEvent {
            id: id.into(),
            conversation_id: conversation_id.into(),
            sender_id: "u1".into(),
            sender_name: Some("Alice".into()),
            content: MessageContent::text(text),
            sent_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            is_self: false,
        }
    }

    fn handler(dir: &tempfile::TempDir) -> (IngestHandler, Arc<InMemoryMessageStore>) {
        let path = dir.path().join("registered_groups.json");
        let mut registry = ConversationRegistry::load(path);
        registry.register("registered", "Ops", None).unwrap();
        let store = Arc::new(InMemoryMessageStore::new());
        (IngestHandler::new(store.clone(), registry), store)
    }

    #[tokio::test]
    async fn unregistered_conversation_is_not_stored() {
        let dir = tempfile::tempdir().unwrap();
        let (handler, store) = handler(&dir);

        handler.on_event(event("stranger", "m1", "@Pincer hi")).await;

        let all = store
            .query_after(&["stranger".to_string()], &Timestamp::empty())
            .await
            .unwrap();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn duplicate_delivery_stores_one_row() {
        let dir = tempfile::tempdir().unwrap();
        let (handler, store) = handler(&dir);

        assert!(handler.ingest(&event("registered", "m1", "first")).await.unwrap());
        assert!(handler.ingest(&event("registered", "m1", "edited")).await.unwrap());

        let all = store
            .query_after(&["registered".to_string()], &Timestamp::empty())
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].content, "edited");
    }

    #[tokio::test]
    async fn media_without_caption_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let (handler, _store) = handler(&dir);
        let mut ev = event("registered", "m1", "");
        ev.content = MessageContent::Unsupported;
        assert!(!handler.ingest(&ev).await.unwrap());
    }

    #[tokio::test]
    async fn registration_by_another_process_is_picked_up() {
        let dir = tempfile::tempdir().unwrap();
        let (handler, _store) = handler(&dir);
        assert!(!handler.ingest(&event("late", "m1", "hi")).await.unwrap());

        let mut cli = ConversationRegistry::load(dir.path().join("registered_groups.json"));
        cli.register("late", "Late", None).unwrap();

        assert!(handler.ingest(&event("late", "m2", "hi")).await.unwrap());
    }
}

//! In-memory message store for tests and dry runs.

use std::{collections::HashMap, sync::Mutex};

use {
    async_trait::async_trait,
    pincer_common::{ChannelMessage, Timestamp},
};

use crate::{Result, message_store::MessageStore};

#[derive(Default)]
struct Inner {
    /// Messages in insertion order.
    rows: Vec<ChannelMessage>,
    /// `(id, conversation_id)` → index into `rows`.
    index: HashMap<(String, String), usize>,
    last_activity: HashMap<String, Timestamp>,
}

/// `MessageStore` backed by a `Vec`. No persistence.
#[derive(Default)]
pub struct InMemoryMessageStore {
    inner: Mutex<Inner>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn upsert(&self, message: &ChannelMessage) -> Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let key = (message.id.clone(), message.conversation_id.clone());
        match inner.index.get(&key).copied() {
            Some(pos) => inner.rows[pos] = message.clone(),
            None => {
                let pos = inner.rows.len();
                inner.rows.push(message.clone());
                inner.index.insert(key, pos);
            },
        }
        inner
            .last_activity
            .entry(message.conversation_id.clone())
            .and_modify(|t| {
                if message.timestamp > *t {
                    *t = message.timestamp.clone();
                }
            })
            .or_insert_with(|| message.timestamp.clone());
        Ok(())
    }

    async fn query_after(
        &self,
        conversation_ids: &[String],
        since: &Timestamp,
    ) -> Result<Vec<ChannelMessage>> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut found: Vec<ChannelMessage> = inner
            .rows
            .iter()
            .filter(|m| &m.timestamp > since && conversation_ids.contains(&m.conversation_id))
            .cloned()
            .collect();
        // Stable sort keeps insertion order among equal timestamps.
        found.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(found)
    }

    async fn last_activity(&self, conversation_id: &str) -> Result<Option<Timestamp>> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(inner.last_activity.get(conversation_id).cloned())
    }

    async fn count(&self, conversation_id: &str) -> Result<u64> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(inner
            .rows
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .count() as u64)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: &str, conv: &str, ms: i64, content: &str) -> ChannelMessage {
        ChannelMessage {
            id: id.into(),
            conversation_id: conv.into(),
            sender_id: "u1".into(),
            sender_name: "Alice".into(),
            content: content.into(),
            timestamp: Timestamp::from_unix_millis(ms).unwrap(),
            is_self: false,
        }
    }

    #[tokio::test]
    async fn upsert_same_identity_keeps_one_row() {
        let store = InMemoryMessageStore::new();
        store.upsert(&msg("1", "a", 1_000, "first")).await.unwrap();
        store.upsert(&msg("1", "a", 1_000, "second")).await.unwrap();

        let all = store
            .query_after(&["a".into()], &Timestamp::empty())
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].content, "second");
        assert_eq!(store.count("a").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn same_id_in_other_conversation_is_distinct() {
        let store = InMemoryMessageStore::new();
        store.upsert(&msg("1", "a", 1_000, "x")).await.unwrap();
        store.upsert(&msg("1", "b", 1_000, "y")).await.unwrap();

        let all = store
            .query_after(&["a".into(), "b".into()], &Timestamp::empty())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn query_filters_and_orders() {
        let store = InMemoryMessageStore::new();
        store.upsert(&msg("3", "a", 3_000, "c")).await.unwrap();
        store.upsert(&msg("1", "a", 1_000, "a")).await.unwrap();
        store.upsert(&msg("2", "b", 2_000, "b")).await.unwrap();
        store.upsert(&msg("9", "z", 2_500, "other")).await.unwrap();

        let since = Timestamp::from_unix_millis(1_000).unwrap();
        let found = store
            .query_after(&["a".into(), "b".into()], &since)
            .await
            .unwrap();
        let ids: Vec<&str> = found.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3"]);
    }

    #[tokio::test]
    async fn ties_keep_insertion_order() {
        let store = InMemoryMessageStore::new();
        store.upsert(&msg("b", "a", 1_000, "")).await.unwrap();
        store.upsert(&msg("a", "a", 1_000, "")).await.unwrap();

        let found = store
            .query_after(&["a".into()], &Timestamp::empty())
            .await
            .unwrap();
        assert_eq!(found[0].id, "b");
        assert_eq!(found[1].id, "a");
    }

    #[tokio::test]
    async fn last_activity_tracks_latest_upsert() {
        let store = InMemoryMessageStore::new();
        assert!(store.last_activity("a").await.unwrap().is_none());
        store.upsert(&msg("1", "a", 5_000, "")).await.unwrap();
        assert_eq!(
            store.last_activity("a").await.unwrap(),
            Timestamp::from_unix_millis(5_000)
        );
    }

    #[tokio::test]
    async fn last_activity_ignores_older_upsert() {
        let store = InMemoryMessageStore::new();
        store.upsert(&msg("2", "a", 5_000, "")).await.unwrap();
        store.upsert(&msg("1", "a", 2_000, "late")).await.unwrap();
        assert_eq!(
            store.last_activity("a").await.unwrap(),
            Timestamp::from_unix_millis(5_000)
        );
    }
}

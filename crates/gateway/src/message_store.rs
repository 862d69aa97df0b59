//! SQLite-backed message store.

use {
    async_trait::async_trait,
    pincer_channels::{Error, MessageStore, Result},
    pincer_common::{ChannelMessage, Timestamp},
    sqlx::{QueryBuilder, Sqlite, SqlitePool},
};

pub struct SqliteMessageStore {
    pool: SqlitePool,
}

impl SqliteMessageStore {
    /// Wrap a pool whose migrations already ran.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the schema directly. For in-memory test databases that skip
    /// migrations.
    #[doc(hidden)]
    pub async fn init(pool: &SqlitePool) -> anyhow::Result<()> {
        sqlx::raw_sql(include_str!("../migrations/20250601000000_messages.sql"))
            .execute(pool)
            .await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: String,
    conversation_id: String,
    sender_id: String,
    sender_name: String,
    content: String,
    timestamp: String,
    is_self: bool,
}

impl From<MessageRow> for ChannelMessage {
    fn from(r: MessageRow) -> Self {
        Self {
            id: r.id,
            conversation_id: r.conversation_id,
            sender_id: r.sender_id,
            sender_name: r.sender_name,
            content: r.content,
            timestamp: Timestamp::from_raw(r.timestamp),
            is_self: r.is_self,
        }
    }
}

fn store_err(operation: &'static str) -> impl FnOnce(sqlx::Error) -> Error {
    move |e| Error::store(operation, e)
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn upsert(&self, message: &ChannelMessage) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(store_err("upsert"))?;

        sqlx::query(
            "INSERT INTO messages
             (id, conversation_id, sender_id, sender_name, content, timestamp, is_self)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id, conversation_id) DO UPDATE SET
                 sender_id   = excluded.sender_id,
                 sender_name = excluded.sender_name,
                 content     = excluded.content,
                 timestamp   = excluded.timestamp,
                 is_self     = excluded.is_self",
        )
        .bind(&message.id)
        .bind(&message.conversation_id)
        .bind(&message.sender_id)
        .bind(&message.sender_name)
        .bind(&message.content)
        .bind(message.timestamp.as_str())
        .bind(message.is_self)
        .execute(&mut *tx)
        .await
        .map_err(store_err("upsert"))?;

        sqlx::query(
            "INSERT INTO conversations (conversation_id, last_activity) VALUES (?, ?)
             ON CONFLICT(conversation_id) DO UPDATE SET
                 last_activity = MAX(last_activity, excluded.last_activity)",
        )
        .bind(&message.conversation_id)
        .bind(message.timestamp.as_str())
        .execute(&mut *tx)
        .await
        .map_err(store_err("upsert"))?;

        tx.commit().await.map_err(store_err("upsert"))?;
        Ok(())
    }

    async fn query_after(
        &self,
        conversation_ids: &[String],
        since: &Timestamp,
    ) -> Result<Vec<ChannelMessage>> {
        if conversation_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT id, conversation_id, sender_id, sender_name, content, timestamp, is_self
             FROM messages WHERE timestamp > ",
        );
        qb.push_bind(since.as_str());
        qb.push(" AND conversation_id IN (");
        let mut ids = qb.separated(", ");
        for id in conversation_ids {
            ids.push_bind(id.as_str());
        }
        ids.push_unseparated(") ORDER BY timestamp ASC, seq ASC");

        let rows = qb
            .build_query_as::<MessageRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(store_err("query"))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn last_activity(&self, conversation_id: &str) -> Result<Option<Timestamp>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT last_activity FROM conversations WHERE conversation_id = ?")
                .bind(conversation_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(store_err("last_activity"))?;
        Ok(row.map(|(ts,)| Timestamp::from_raw(ts)))
    }

    async fn count(&self, conversation_id: &str) -> Result<u64> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages WHERE conversation_id = ?")
            .bind(conversation_id)
            .fetch_one(&self.pool)
            .await
            .map_err(store_err("count"))?;
        Ok(n.max(0) as u64)
    }
}

//! Gateway: opens the message store and wires the transport, ingest handler
//! and dispatch loop together.
//!
//! Lifecycle:
//! 1. Resolve the data directory, install the metrics recorder, open
//!    SQLite, run migrations
//! 2. Load router state (watermark, sessions, registry)
//! 3. Start the Telegram transport feeding the ingest handler
//! 4. Run the dispatch loop until shutdown

pub mod message_store;
#[cfg(feature = "metrics")]
pub mod metrics_snapshot;
pub mod server;

pub use {
    message_store::SqliteMessageStore,
    server::{open_pool, open_store, run, run_until, wait_for_shutdown_signal},
};

/// Run database migrations for the message store.
///
/// Creates the `messages` and `conversations` tables. Called at startup
/// before using [`SqliteMessageStore`].
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}

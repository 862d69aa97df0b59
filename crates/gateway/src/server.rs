use std::{path::Path, sync::Arc, time::Duration};

use {
    anyhow::Context,
    pincer_agents::ClaudeCliEngine,
    pincer_auto_reply::{DispatchLoop, IngestHandler, Interpreter, RouterState},
    pincer_channels::ChannelPlugin,
    pincer_config::{DataLayout, PincerConfig},
    pincer_sessions::ConversationRegistry,
    pincer_telegram::TelegramPlugin,
    sqlx::{
        SqlitePool,
        sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    },
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
};

use crate::{SqliteMessageStore, run_migrations};

/// Open (creating if needed) the SQLite database at `path` in WAL mode.
pub async fn open_pool(path: &Path) -> anyhow::Result<SqlitePool> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));
    SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await
        .with_context(|| format!("failed to open {}", path.display()))
}

/// Open the message store under `layout` and bring its schema up to date.
pub async fn open_store(layout: &DataLayout) -> anyhow::Result<SqliteMessageStore> {
    let pool = open_pool(&layout.message_db()).await?;
    run_migrations(&pool)
        .await
        .context("failed to migrate message store")?;
    Ok(SqliteMessageStore::new(pool))
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            },
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            },
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("shutdown signal received");
}

/// Run the gateway until Ctrl-C or SIGTERM.
pub async fn run(config: PincerConfig) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        trigger.cancel();
    });
    run_until(config, shutdown).await
}

/// Run the gateway until `shutdown` is cancelled.
pub async fn run_until(config: PincerConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    let telegram = config.channels.telegram.clone().context(
        "no transport configured: add a [channels.telegram] section with a bot token",
    )?;

    let layout = DataLayout::resolve(&config);
    std::fs::create_dir_all(layout.groups_dir())
        .with_context(|| format!("failed to create {}", layout.groups_dir().display()))?;
    info!(data_dir = %layout.root().display(), "starting pincer gateway");

    let metrics_cancel = shutdown.child_token();
    let _stop_metrics = metrics_cancel.clone().drop_guard();
    #[cfg(feature = "metrics")]
    let metrics_task =
        crate::metrics_snapshot::start(&config.metrics, &layout, metrics_cancel.clone());

    let store = Arc::new(open_store(&layout).await?);
    let state = RouterState::load(&layout);

    let ingest = Arc::new(IngestHandler::new(
        store.clone(),
        ConversationRegistry::load(layout.registry_file()),
    ));
    let mut transport = TelegramPlugin::new();
    transport
        .start(telegram, ingest)
        .await
        .context("failed to start telegram transport")?;
    info!(channel = transport.id(), username = ?transport.username(), "transport started");

    let engine = Arc::new(ClaudeCliEngine::new(config.engine.clone()));
    let interpreter = Interpreter::new(&config, layout.groups_dir(), engine, transport.outbound())?;
    let dispatch = DispatchLoop::new(&config, store, interpreter, state);

    let state = dispatch.run(shutdown).await;

    if let Err(e) = transport.stop().await {
        warn!(error = %e, "failed to stop transport cleanly");
    }
    metrics_cancel.cancel();
    #[cfg(feature = "metrics")]
    if let Some(task) = metrics_task
        && let Err(e) = task.await
    {
        warn!(error = %e, "metrics snapshot task failed");
    }
    info!(watermark = %state.watermark.current(), "pincer gateway stopped");
    Ok(())
}

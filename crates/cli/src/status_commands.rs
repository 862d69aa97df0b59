use std::sync::Arc;

use {
    anyhow::Result,
    pincer_channels::MessageStore,
    pincer_config::DataLayout,
    pincer_sessions::{ConversationRegistry, FileWatermarkStore, SessionTable, Watermark},
};

pub async fn status(layout: &DataLayout) -> Result<()> {
    let watermark = Watermark::load(Arc::new(FileWatermarkStore::new(layout.watermark_file())));
    let sessions = SessionTable::load(layout.sessions_file());
    let registry = ConversationRegistry::load(layout.registry_file());

    println!("Data directory: {}", layout.root().display());
    if watermark.current().is_empty() {
        println!("Watermark:      (none)");
    } else {
        println!("Watermark:      {}", watermark.current());
    }
    println!("Sessions:       {}", sessions.len());
    let metrics_file = layout.metrics_file();
    if metrics_file.exists() {
        println!("Metrics:        {}", metrics_file.display());
    }

    let store = if layout.message_db().exists() {
        Some(pincer_gateway::open_store(layout).await?)
    } else {
        None
    };

    println!();
    let mut any = false;
    for (id, conversation) in registry.list() {
        any = true;
        let (last, count) = match &store {
            Some(store) => (store.last_activity(id).await?, store.count(id).await?),
            None => (None, 0),
        };
        let last = last.map_or_else(|| "-".to_string(), |ts| ts.to_string());
        let session = if sessions.get(id).is_some() {
            "session"
        } else {
            "-"
        };
        let enabled = if conversation.enabled {
            ""
        } else {
            " [disabled]"
        };
        println!(
            "{id}\t{}{enabled}\tmessages={count}\tlast={last}\t{session}",
            conversation.name
        );
    }
    if !any {
        println!("No registered conversations. Add one with `pincer register`.");
    }
    Ok(())
}

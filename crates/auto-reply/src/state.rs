use std::sync::Arc;

use {
    pincer_config::DataLayout,
    pincer_sessions::{ConversationRegistry, FileWatermarkStore, SessionTable, Watermark},
    tracing::info,
};

/// Everything the dispatch loop mutates, loaded once at startup and saved
/// after every mutation.
pub struct RouterState {
    pub watermark: Watermark,
    pub sessions: SessionTable,
    pub registry: ConversationRegistry,
}

impl RouterState {
    /// Load from the data directory. Missing or corrupt files start empty.
    pub fn load(layout: &DataLayout) -> Self {
        let state = Self {
            watermark: Watermark::load(Arc::new(FileWatermarkStore::new(layout.watermark_file()))),
            sessions: SessionTable::load(layout.sessions_file()),
            registry: ConversationRegistry::load(layout.registry_file()),
        };
        info!(
            watermark = %state.watermark.current(),
            sessions = state.sessions.len(),
            conversations = state.registry.registered_ids().len(),
            "router state loaded"
        );
        state
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_data_dir_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let state = RouterState::load(&DataLayout::new(dir.path()));
        assert!(state.watermark.current().is_empty());
        assert!(state.sessions.is_empty());
        assert!(state.registry.registered_ids().is_empty());
    }

    #[test]
    fn corrupt_files_load_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path());
        for path in [
            layout.watermark_file(),
            layout.sessions_file(),
            layout.registry_file(),
        ] {
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, "{{{{").unwrap();
        }
        let state = RouterState::load(&layout);
        assert!(state.watermark.current().is_empty());
        assert!(state.sessions.is_empty());
        assert!(state.registry.registered_ids().is_empty());
    }
}

//! The dispatch watermark: timestamp of the last fully handled message.

use std::{path::PathBuf, sync::Arc};

use {
    pincer_common::Timestamp,
    serde::{Deserialize, Serialize},
    tracing::{debug, warn},
};

use crate::{Result, state_file};

/// Durable storage for the watermark.
pub trait WatermarkStore: Send + Sync {
    /// The persisted watermark, or the empty sentinel.
    fn load(&self) -> Timestamp;

    /// Replace the persisted watermark. Must be on stable storage on return.
    fn save(&self, timestamp: &Timestamp) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RouterState {
    #[serde(default)]
    last_timestamp: String,
}

/// `router_state.json`-backed watermark store.
pub struct FileWatermarkStore {
    path: PathBuf,
}

impl FileWatermarkStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl WatermarkStore for FileWatermarkStore {
    fn load(&self) -> Timestamp {
        let state: RouterState = state_file::read_or_default(&self.path);
        match Timestamp::parse(&state.last_timestamp) {
            Ok(ts) => ts,
            Err(e) => {
                // Keep the raw value: resetting to empty would replay history.
                warn!(error = %e, "unparseable watermark, comparing it as stored");
                Timestamp::from_raw(state.last_timestamp)
            },
        }
    }

    fn save(&self, timestamp: &Timestamp) -> Result<()> {
        state_file::write_durable(&self.path, &RouterState {
            last_timestamp: timestamp.as_str().to_string(),
        })
    }
}

/// In-memory view of the watermark that only moves forward and is persisted
/// before it moves.
pub struct Watermark {
    current: Timestamp,
    store: Arc<dyn WatermarkStore>,
}

impl Watermark {
    pub fn load(store: Arc<dyn WatermarkStore>) -> Self {
        let current = store.load();
        debug!(watermark = %current, "loaded watermark");
        Self { current, store }
    }

    pub fn current(&self) -> &Timestamp {
        &self.current
    }

    /// Move the watermark to `timestamp` if that is later than the current
    /// value. Returns whether it moved.
    ///
    /// The in-memory value changes only after the store confirmed the write,
    /// so a failed save leaves both sides at the old value.
    pub fn advance(&mut self, timestamp: &Timestamp) -> Result<bool> {
        if timestamp <= &self.current {
            return Ok(false);
        }
        self.store.save(timestamp)?;
        self.current = timestamp.clone();
        Ok(true)
    }
}

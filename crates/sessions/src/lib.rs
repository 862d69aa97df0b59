//! Persisted router state: the dispatch watermark, per-conversation session
//! tokens, and the conversation registry.
//!
//! Each lives in its own small JSON document under `<data_dir>/data/`. These
//! files are externally editable, so loading never fails: a missing file is
//! an empty default and a corrupt one is logged, preserved as
//! `<name>.corrupt`, and replaced by the default. Every save is an atomic,
//! fsynced full replace.

pub mod error;
pub mod registry;
pub mod session_table;
pub mod state_file;
pub mod watermark;

pub use {
    error::{Error, Result},
    registry::{Conversation, ConversationRegistry, check_folder, slugify},
    session_table::SessionTable,
    watermark::{FileWatermarkStore, Watermark, WatermarkStore},
};

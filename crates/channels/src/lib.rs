//! Transport seam.
//!
//! A transport (Telegram, ...) turns its native updates into
//! [`InboundEvent`]s handed to an [`InboundSink`], and exposes a
//! [`ChannelOutbound`] for replies. Inbound messages are persisted through a
//! [`MessageStore`]; the dispatch side reads them back from the same store.

pub mod error;
pub mod inbound;
pub mod message_store;
pub mod plugin;
pub mod store_memory;

pub use {
    error::{Error, Result},
    inbound::{InboundEvent, MediaKind, MessageContent},
    message_store::MessageStore,
    plugin::{ChannelHealthSnapshot, ChannelOutbound, ChannelPlugin, InboundSink},
    store_memory::InMemoryMessageStore,
};

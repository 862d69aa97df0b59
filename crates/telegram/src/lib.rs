//! Telegram transport for pincer.
//!
//! Implements `ChannelPlugin` with teloxide long polling. Inbound messages
//! become `InboundEvent`s for the ingest sink; replies go out as plain text,
//! split at Telegram's message size limit.

pub mod bot;
pub mod chunk;
pub mod config;
pub mod error;
pub mod handlers;
pub mod outbound;
pub mod plugin;
pub mod state;

pub use {config::TelegramAccountConfig, error::Error, plugin::TelegramPlugin};

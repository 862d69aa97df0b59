//! Shared types and error definitions used across all pincer crates.

pub mod error;
pub mod types;

pub use {
    error::{Error, FromMessage, PincerError, Result},
    types::{ChannelMessage, Timestamp, preview},
};

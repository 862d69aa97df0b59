//! Inbound message pipeline: the glue between a transport and the engine.
//!
//! Flow: transport event → [`IngestHandler`] → message store →
//! [`DispatchLoop`] (polling past the watermark) → [`Interpreter`] →
//! session table update + reply via channel outbound → watermark advance.
//!
//! Ingest and dispatch share nothing but the message store, so either can
//! crash and restart independently.

pub mod commands;
pub mod dispatch;
pub mod error;
pub mod ingest;
pub mod reply;
pub mod state;

pub use {
    commands::{Classified, CommandSet},
    dispatch::{CycleReport, DispatchLoop},
    error::{Error, Result},
    ingest::IngestHandler,
    reply::{Interpreter, Outcome},
    state::RouterState,
};

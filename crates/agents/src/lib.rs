//! Reasoning-engine seam for the auto-reply pipeline.
//!
//! The engine is an opaque `run(prompt, workdir, token)` capability. This
//! crate defines that seam ([`AgentEngine`]), the prompt text handed to it,
//! the per-conversation instruction document, and the Claude CLI adapter.

pub mod claude_cli;
pub mod engine;
pub mod error;
pub mod persona;
pub mod prompt;

pub use {
    claude_cli::ClaudeCliEngine,
    engine::{AgentEngine, EngineReply, EngineRequest},
    error::{Error, Result},
    persona::InstructionDocument,
};

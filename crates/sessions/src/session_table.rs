//! Per-conversation continuation tokens (`sessions.json`).

use std::{collections::BTreeMap, path::PathBuf};

use tracing::debug;

use crate::{Result, state_file};

/// Conversation id → engine continuation token.
///
/// Absence of an entry means the next engine run starts a fresh context.
/// Every mutation is persisted before it becomes visible in memory.
pub struct SessionTable {
    path: PathBuf,
    tokens: BTreeMap<String, String>,
}

impl SessionTable {
    pub fn load(path: PathBuf) -> Self {
        let tokens: BTreeMap<String, String> = state_file::read_or_default(&path);
        debug!(path = %path.display(), sessions = tokens.len(), "loaded session table");
        Self { path, tokens }
    }

    pub fn get(&self, conversation_id: &str) -> Option<&str> {
        self.tokens.get(conversation_id).map(String::as_str)
    }

    pub fn set(&mut self, conversation_id: &str, token: &str) -> Result<()> {
        if self.get(conversation_id) == Some(token) {
            return Ok(());
        }
        let mut next = self.tokens.clone();
        next.insert(conversation_id.to_string(), token.to_string());
        self.commit(next)
    }

    /// Drop the token for `conversation_id`. Returns whether one existed.
    pub fn remove(&mut self, conversation_id: &str) -> Result<bool> {
        if !self.tokens.contains_key(conversation_id) {
            return Ok(false);
        }
        let mut next = self.tokens.clone();
        next.remove(conversation_id);
        self.commit(next)?;
        Ok(true)
    }

    pub fn list(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tokens.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    fn commit(&mut self, next: BTreeMap<String, String>) -> Result<()> {
        state_file::write_durable(&self.path, &next)?;
        self.tokens = next;
        Ok(())
    }
}

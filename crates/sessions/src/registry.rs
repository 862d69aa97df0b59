//! Registered conversations (`registered_groups.json`).
//!
//! Written by the CLI, read by the running daemon. The daemon calls
//! [`ConversationRegistry::refresh`] each poll cycle and picks up changes
//! when the file's modification time or size moves.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::SystemTime,
};

use {
    pincer_common::Timestamp,
    serde::{Deserialize, Serialize},
    tracing::{debug, info, warn},
};

use crate::{Error, Result, state_file};

fn default_enabled() -> bool {
    true
}

/// Configuration of one registered conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Display name, embedded in engine prompts.
    pub name: String,
    /// Working-directory handle: a single path component under `groups/`.
    pub folder: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Conversation {
    /// Absolute working directory for this conversation.
    pub fn workdir(&self, groups_dir: &Path) -> PathBuf {
        groups_dir.join(&self.folder)
    }
}

/// Reject folder names that would escape the groups directory.
pub fn check_folder(folder: &str) -> Result<()> {
    let reason = if folder.is_empty() {
        "empty"
    } else if folder == "." || folder == ".." {
        "relative path component"
    } else if folder.contains(['/', '\\']) {
        "contains a path separator"
    } else if folder.chars().any(char::is_control) {
        "contains control characters"
    } else {
        return Ok(());
    };
    Err(Error::InvalidFolder {
        folder: folder.to_string(),
        reason,
    })
}

/// Folder name derived from a display name: lower-case ASCII alphanumerics
/// joined by single dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("conversation");
    }
    slug
}

type Fingerprint = Option<(SystemTime, u64)>;

/// Read the registry file, dropping entries whose folder would escape the
/// groups directory.
fn read_entries(path: &Path) -> BTreeMap<String, Conversation> {
    let mut entries: BTreeMap<String, Conversation> = state_file::read_or_default(path);
    entries.retain(|conversation_id, c| match check_folder(&c.folder) {
        Ok(()) => true,
        Err(e) => {
            warn!(
                conversation_id = %conversation_id,
                folder = %c.folder,
                error = %e,
                "ignoring conversation with invalid folder"
            );
            false
        },
    });
    entries
}

fn fingerprint(path: &Path) -> Fingerprint {
    let meta = std::fs::metadata(path).ok()?;
    Some((meta.modified().ok()?, meta.len()))
}

pub struct ConversationRegistry {
    path: PathBuf,
    entries: BTreeMap<String, Conversation>,
    seen: Fingerprint,
}

impl ConversationRegistry {
    pub fn load(path: PathBuf) -> Self {
        let seen = fingerprint(&path);
        let entries = read_entries(&path);
        debug!(path = %path.display(), conversations = entries.len(), "loaded conversation registry");
        Self {
            path,
            entries,
            seen,
        }
    }

    /// Reload from disk if the file changed since the last load. Returns
    /// whether a reload happened.
    pub fn refresh(&mut self) -> bool {
        let current = fingerprint(&self.path);
        if current == self.seen {
            return false;
        }
        self.entries = read_entries(&self.path);
        self.seen = current;
        info!(conversations = self.entries.len(), "conversation registry reloaded");
        true
    }

    /// Registered and enabled conversation.
    pub fn get(&self, conversation_id: &str) -> Option<&Conversation> {
        self.entries.get(conversation_id).filter(|c| c.enabled)
    }

    pub fn is_registered(&self, conversation_id: &str) -> bool {
        self.get(conversation_id).is_some()
    }

    /// Ids of every enabled conversation.
    pub fn registered_ids(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, c)| c.enabled)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Every entry, disabled ones included.
    pub fn list(&self) -> impl Iterator<Item = (&str, &Conversation)> {
        self.entries.iter().map(|(id, c)| (id.as_str(), c))
    }

    /// Add or replace a registration. The folder defaults to a slug of the
    /// name.
    pub fn register(
        &mut self,
        conversation_id: &str,
        name: &str,
        folder: Option<&str>,
    ) -> Result<Conversation> {
        let folder = folder.map_or_else(|| slugify(name), str::to_string);
        check_folder(&folder)?;

        let conversation = Conversation {
            name: name.to_string(),
            folder,
            added_at: Some(Timestamp::now().as_str().to_string()),
            enabled: true,
        };
        let mut next = self.entries.clone();
        next.insert(conversation_id.to_string(), conversation.clone());
        self.commit(next)?;
        Ok(conversation)
    }

    /// Remove a registration. Returns the removed entry, if any.
    pub fn unregister(&mut self, conversation_id: &str) -> Result<Option<Conversation>> {
        let mut next = self.entries.clone();
        let Some(removed) = next.remove(conversation_id) else {
            return Ok(None);
        };
        self.commit(next)?;
        Ok(Some(removed))
    }

    fn commit(&mut self, next: BTreeMap<String, Conversation>) -> Result<()> {
        state_file::write_durable(&self.path, &next)?;
        self.entries = next;
        self.seen = fingerprint(&self.path);
        Ok(())
    }
}

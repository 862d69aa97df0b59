//! Per-conversation instruction document (`CLAUDE.md` in the workdir).
//!
//! ```text
//! # Assistant
//!
//! <instructions>
//!
//! ## What You Can Do
//! <fixed capabilities text>
//!
//! ## Memories
//! <memories>
//!
//! ## Saved Files
//! <saved files>
//! ```
//!
//! The engine edits the memories and saved-files sections itself. The persona
//! command replaces only the instructions, so both sections are carried over
//! from the previous document. Parsing is best effort and never fails: a
//! missing section falls back to its placeholder.

use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::{debug, info};

use crate::error::{Context, Result};

pub const DOCUMENT_FILE: &str = "CLAUDE.md";

pub const DEFAULT_INSTRUCTIONS: &str = "You are a helpful assistant in a group chat. Be concise.";

const TITLE: &str = "# Assistant";
const CAPABILITIES_HEADING: &str = "## What You Can Do";
const MEMORIES_HEADING: &str = "## Memories";
const SAVED_FILES_HEADING: &str = "## Saved Files";

const CAPABILITIES: &str = "\
You have tools to work with files in this folder:
- **Write tool**: Save notes, lists, or any data to files (e.g., `notes.md`, `todos.txt`)
- **Read tool**: Read files you've previously saved
- **WebSearch tool**: Look up current information online

When the user asks you to save, remember, or keep track of something, use the Write tool to create a file.

**REQUIRED:** After creating any file, you MUST use the Edit tool to add it to the \"Saved Files\" section in this CLAUDE.md file.";

const MEMORIES_PLACEHOLDER: &str = "<!-- Persistent notes about this user/chat -->";
const SAVED_FILES_PLACEHOLDER: &str =
    "<!-- After creating a file, add it here: \"- filename.txt - description\" -->";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionDocument {
    pub instructions: String,
    pub memories: String,
    pub saved_files: String,
}

impl Default for InstructionDocument {
    fn default() -> Self {
        Self {
            instructions: DEFAULT_INSTRUCTIONS.into(),
            memories: MEMORIES_PLACEHOLDER.into(),
            saved_files: SAVED_FILES_PLACEHOLDER.into(),
        }
    }
}

/// Byte offset of `heading` when it starts a line and is not a prefix of a
/// longer heading.
fn find_heading(text: &str, heading: &str) -> Option<usize> {
    text.match_indices(heading).map(|(i, _)| i).find(|&i| {
        let line_start = i == 0 || text[..i].ends_with('\n');
        let rest = &text[i + heading.len()..];
        let line_end = rest.is_empty() || rest.starts_with(['\n', '\r', ' ', '\t']);
        line_start && line_end
    })
}

/// Body of the section under `heading`, up to the next known heading.
fn section<'a>(text: &'a str, heading: &str, boundaries: &[Option<usize>]) -> Option<&'a str> {
    let start = find_heading(text, heading)? + heading.len();
    let end = boundaries
        .iter()
        .flatten()
        .copied()
        .filter(|&b| b >= start)
        .min()
        .unwrap_or(text.len());
    Some(text[start..end].trim())
}

impl InstructionDocument {
    pub fn path(workdir: &Path) -> PathBuf {
        workdir.join(DOCUMENT_FILE)
    }

    /// Extract sections from `text`. Anything unrecognizable becomes the
    /// corresponding default.
    pub fn parse(text: &str) -> Self {
        let capabilities = find_heading(text, CAPABILITIES_HEADING);
        let memories = find_heading(text, MEMORIES_HEADING);
        let saved = find_heading(text, SAVED_FILES_HEADING);
        let boundaries = [capabilities, memories, saved];

        let body_start = find_heading(text, TITLE).map_or(0, |i| i + TITLE.len());
        let body_end = boundaries
            .iter()
            .flatten()
            .copied()
            .filter(|&b| b >= body_start)
            .min()
            .unwrap_or(text.len());
        let instructions = text.get(body_start..body_end).map(str::trim).unwrap_or("");

        let defaults = Self::default();
        Self {
            instructions: non_empty(instructions).unwrap_or(defaults.instructions),
            memories: section(text, MEMORIES_HEADING, &boundaries)
                .and_then(non_empty)
                .unwrap_or(defaults.memories),
            saved_files: section(text, SAVED_FILES_HEADING, &boundaries)
                .and_then(non_empty)
                .unwrap_or(defaults.saved_files),
        }
    }

    pub fn render(&self) -> String {
        format!(
            "{TITLE}\n\n{}\n\n{CAPABILITIES_HEADING}\n\n{CAPABILITIES}\n\n\
             {MEMORIES_HEADING}\n\n{}\n\n{SAVED_FILES_HEADING}\n\n{}\n",
            self.instructions, self.memories, self.saved_files
        )
    }

    #[must_use]
    pub fn with_instructions(mut self, instructions: &str) -> Self {
        self.instructions = instructions.trim().to_string();
        self
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

/// Return the document text for `workdir`, creating the directory and a
/// default document first if needed.
pub fn ensure_document(workdir: &Path) -> Result<String> {
    let path = InstructionDocument::path(workdir);
    if !path.exists() {
        fs::create_dir_all(workdir)
            .with_context(|| format!("create workdir {}", workdir.display()))?;
        write_atomic(&path, &InstructionDocument::default().render())?;
        debug!(path = %path.display(), "wrote default instruction document");
    }
    fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
}

/// Replace the instructions of the document in `workdir`, keeping its
/// memories and saved files.
pub fn update_instructions(workdir: &Path, instructions: &str) -> Result<InstructionDocument> {
    let path = InstructionDocument::path(workdir);
    fs::create_dir_all(workdir)
        .with_context(|| format!("create workdir {}", workdir.display()))?;

    let previous = match fs::read_to_string(&path) {
        Ok(text) => InstructionDocument::parse(&text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => InstructionDocument::default(),
        Err(e) => return Err(e).with_context(|| format!("read {}", path.display())),
    };
    let updated = previous.with_instructions(instructions);
    write_atomic(&path, &updated.render())?;
    info!(path = %path.display(), "instruction document updated");
    Ok(updated)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let tmp = path.with_extension("md.tmp");
    fs::write(&tmp, contents).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

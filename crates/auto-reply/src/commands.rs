//! Recognition of control commands and trigger-addressed queries.

use {
    pincer_config::{AssistantConfig, CommandsConfig},
    regex::Regex,
};

use crate::{Error, Result};

/// What a message asks of the assistant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified<'a> {
    /// Drop the conversation's session.
    Reset,
    /// Replace the conversation's instructions. Empty means "show usage".
    Persona { instructions: &'a str },
    /// Addressed to the assistant; the trigger is stripped.
    Query { text: &'a str },
    /// Ambient conversation, or an address with nothing after it.
    Ignore,
}

/// Compiled command literals and trigger for one assistant name.
#[derive(Debug, Clone)]
pub struct CommandSet {
    reset: String,
    persona: String,
    trigger: Regex,
}

impl CommandSet {
    pub fn new(assistant: &AssistantConfig, commands: &CommandsConfig) -> Result<Self> {
        let pattern = format!(r"(?i)^@{}\b", regex::escape(&assistant.name));
        let trigger = Regex::new(&pattern).map_err(|source| Error::Trigger {
            name: assistant.name.clone(),
            source,
        })?;
        Ok(Self {
            reset: commands.reset.clone(),
            persona: commands.persona.clone(),
            trigger,
        })
    }

    pub fn persona_literal(&self) -> &str {
        &self.persona
    }

    /// Classify `content`, checking reset, then persona, then the trigger.
    pub fn classify<'a>(&self, content: &'a str) -> Classified<'a> {
        let content = content.trim();

        if content.eq_ignore_ascii_case(&self.reset) {
            return Classified::Reset;
        }

        if let Some(rest) = strip_prefix_ignore_case(content, &self.persona)
            && (rest.is_empty() || rest.starts_with(char::is_whitespace))
        {
            return Classified::Persona {
                instructions: rest.trim(),
            };
        }

        match self.trigger.find(content) {
            Some(m) => match content[m.end()..].trim() {
                "" => Classified::Ignore,
                text => Classified::Query { text },
            },
            None => Classified::Ignore,
        }
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &s[prefix.len()..])
}

//! Semantic validation of a loaded configuration.
//!
//! Parsing already enforces types; this catches values that parse but would
//! make the assistant unreachable or ambiguous.

use std::path::PathBuf;

use crate::schema::PincerConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "assistant.name"
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}: {}", self.severity, self.path, self.message)
    }
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(&mut self, severity: Severity, path: &str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            path: path.to_string(),
            message: message.into(),
        });
    }
}

/// Validate `config`.
pub fn validate(config: &PincerConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    let name = &config.assistant.name;
    if name.trim().is_empty() {
        result.push(Severity::Error, "assistant.name", "must not be empty");
    } else if name.chars().any(char::is_whitespace) {
        result.push(
            Severity::Error,
            "assistant.name",
            format!("{name:?} contains whitespace; the @{name} trigger could never match"),
        );
    }

    for (path, literal) in [
        ("commands.reset", &config.commands.reset),
        ("commands.persona", &config.commands.persona),
    ] {
        if !literal.starts_with('/') || literal.len() < 2 {
            result.push(
                Severity::Error,
                path,
                format!("{literal:?} must start with '/' followed by a name"),
            );
        }
    }

    if config
        .commands
        .reset
        .eq_ignore_ascii_case(&config.commands.persona)
    {
        result.push(
            Severity::Error,
            "commands",
            "reset and persona commands must differ",
        );
    } else if config
        .commands
        .reset
        .to_lowercase()
        .starts_with(&config.commands.persona.to_lowercase())
    {
        result.push(
            Severity::Warning,
            "commands.reset",
            "reset literal starts with the persona prefix; it will still be matched as reset first",
        );
    }

    if config.dispatch.poll_interval_ms == 0 {
        result.push(
            Severity::Error,
            "dispatch.poll_interval_ms",
            "must be greater than zero",
        );
    }
    if config.dispatch.engine_timeout_secs == 0 {
        result.push(
            Severity::Warning,
            "dispatch.engine_timeout_secs",
            "engine runs have no time limit; a hung run stalls every conversation",
        );
    }
    if config.dispatch.max_attempts == 0 {
        result.push(
            Severity::Warning,
            "dispatch.max_attempts",
            "failing messages are retried forever",
        );
    }

    if config.engine.command.trim().is_empty() {
        result.push(Severity::Error, "engine.command", "must not be empty");
    }
    if config.engine.allowed_tools.iter().any(|t| t == "Bash") {
        result.push(
            Severity::Warning,
            "engine.allowed_tools",
            "Bash gives every chat participant shell access on this host",
        );
    }

    result
}

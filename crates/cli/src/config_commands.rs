use std::path::Path;

use {
    anyhow::Result,
    clap::Subcommand,
    pincer_config::{PincerConfig, Severity, validate},
};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the configuration and report errors and warnings.
    Check,
}

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Returns `true` when the configuration has no errors.
pub fn handle_config(
    action: &ConfigAction,
    config: &PincerConfig,
    path: Option<&Path>,
) -> Result<bool> {
    match action {
        ConfigAction::Check => Ok(check(config, path)),
    }
}

fn check(config: &PincerConfig, path: Option<&Path>) -> bool {
    let result = validate(config);

    match path {
        Some(path) => eprintln!("Checking {}\n", path.display()),
        None => eprintln!("No config file found; checking defaults.\n"),
    }

    for d in &result.diagnostics {
        let (color, label) = match d.severity {
            Severity::Error => (RED, "error"),
            Severity::Warning => (YELLOW, "warning"),
        };
        if d.path.is_empty() {
            eprintln!("  {BOLD}{color}{label}{RESET} {}", d.message);
        } else {
            eprintln!("  {BOLD}{color}{label}{RESET} {}: {}", d.path, d.message);
        }
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);
    if !result.diagnostics.is_empty() {
        eprintln!();
    }
    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }
    !result.has_errors()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass() {
        assert!(handle_config(&ConfigAction::Check, &PincerConfig::default(), None).unwrap());
    }

    #[test]
    fn bad_name_fails() {
        let mut config = PincerConfig::default();
        config.assistant.name = "two words".into();
        assert!(!handle_config(&ConfigAction::Check, &config, None).unwrap());
    }
}

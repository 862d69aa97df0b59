use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{env_subst::substitute_env, schema::PincerConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["pincer.toml", "pincer.yaml", "pincer.yml", "pincer.json"];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<PincerConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./pincer.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/pincer/pincer.{toml,yaml,yml,json}` (user-global)
///
/// Returns `PincerConfig::default()` if no config file is found or the file
/// cannot be parsed.
pub fn discover_and_load() -> PincerConfig {
    match find_config_file() {
        Some(path) => load_or_default(&path),
        None => {
            debug!("no config file found, using defaults");
            PincerConfig::default()
        },
    }
}

/// Load `path`, logging and falling back to defaults on any failure.
pub fn load_or_default(path: &Path) -> PincerConfig {
    debug!(path = %path.display(), "loading config");
    match load_config(path) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            PincerConfig::default()
        },
    }
}

/// Apply `PINCER_*` environment overrides on top of a loaded config.
pub fn apply_env_overrides(config: &mut PincerConfig) {
    apply_overrides_with(config, |name| std::env::var(name).ok());
}

fn apply_overrides_with(config: &mut PincerConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(name) = lookup("PINCER_ASSISTANT_NAME").filter(|n| !n.trim().is_empty()) {
        config.assistant.name = name.trim().to_string();
    }
    if let Some(dir) = lookup("PINCER_DATA_DIR").filter(|d| !d.is_empty()) {
        config.paths.data_dir = Some(PathBuf::from(dir));
    }
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    // Project-local
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let config_dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| config_dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/pincer/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "pincer").map(|d| d.config_dir().to_path_buf())
}

/// Returns the path of an existing config file, or the default TOML path.
pub fn find_or_default_config_path() -> PathBuf {
    if let Some(path) = find_config_file() {
        return path;
    }
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pincer.toml")
}

/// Serialize `config` to TOML and write it to `path`.
///
/// Creates parent directories if needed.
pub fn save_config(config: &PincerConfig, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str =
        toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("serialize config: {e}"))?;
    std::fs::write(path, toml_str)?;
    debug!(path = %path.display(), "saved config");
    Ok(())
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<PincerConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

//! Configuration loading, validation, env substitution and data-dir layout.
//!
//! Config files: `pincer.toml`, `pincer.yaml`, or `pincer.json`
//! Searched in `./` then `~/.config/pincer/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod paths;
pub mod schema;
pub mod validate;

pub use {
    loader::{
        apply_env_overrides, config_dir, discover_and_load, find_or_default_config_path,
        load_config, load_or_default, save_config,
    },
    paths::DataLayout,
    schema::{
        AssistantConfig, ChannelsConfig, CommandsConfig, DispatchConfig, EngineConfig,
        MetricsConfig, PathsConfig, PincerConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult, validate},
};

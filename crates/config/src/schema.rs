/// Config schema types (assistant identity, commands, dispatch, engine, channels, metrics).
use std::{collections::HashMap, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PincerConfig {
    pub assistant: AssistantConfig,
    pub commands: CommandsConfig,
    pub dispatch: DispatchConfig,
    pub engine: EngineConfig,
    pub channels: ChannelsConfig,
    pub metrics: MetricsConfig,
    pub paths: PathsConfig,
}

/// Assistant identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Name used for the `@<name>` trigger and the reply prefix.
    pub name: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            name: "Pincer".into(),
        }
    }
}

impl AssistantConfig {
    /// Prefix put in front of every reply, e.g. `*Pincer:*`.
    ///
    /// Stored messages starting with this prefix are the assistant's own
    /// replies echoed back by the transport.
    pub fn reply_prefix(&self) -> String {
        format!("*{}:*", self.name)
    }

    /// Format a reply body with the assistant's prefix.
    pub fn format_reply(&self, body: &str) -> String {
        format!("{} {body}", self.reply_prefix())
    }
}

/// Reserved control command literals (matched case-insensitively).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    /// Exact-match literal that drops the conversation's session.
    pub reset: String,
    /// Prefix literal that rewrites the conversation's instructions.
    pub persona: String,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            reset: "/clear".into(),
            persona: "/personality".into(),
        }
    }
}

/// Dispatch loop tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Sleep between poll cycles.
    pub poll_interval_ms: u64,
    /// Hard wall-clock limit for one engine run. `0` disables the limit.
    pub engine_timeout_secs: u64,
    /// Consecutive failed attempts after which a message is skipped.
    /// `0` retries forever.
    pub max_attempts: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            engine_timeout_secs: 600,
            max_attempts: 5,
        }
    }
}

impl DispatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn engine_timeout(&self) -> Option<Duration> {
        (self.engine_timeout_secs > 0).then(|| Duration::from_secs(self.engine_timeout_secs))
    }
}

/// Reasoning engine invocation (Claude CLI).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Executable to run.
    pub command: String,
    /// Model alias passed with `--model`.
    pub model: String,
    /// Tools the engine may use. No shell access by default.
    pub allowed_tools: Vec<String>,
    /// Value for `--permission-mode`.
    pub permission_mode: String,
    /// Additional arguments appended verbatim.
    pub extra_args: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command: "claude".into(),
            model: "haiku".into(),
            allowed_tools: ["Read", "Write", "Edit", "Glob", "Grep", "WebSearch", "WebFetch"]
                .into_iter()
                .map(String::from)
                .collect(),
            permission_mode: "bypassPermissions".into(),
            extra_args: Vec::new(),
        }
    }
}

/// Transport configuration. Each value is handed to its transport crate as-is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelsConfig {
    /// Telegram bot account settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram: Option<serde_json::Value>,
}

/// Metrics collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder at startup.
    pub enabled: bool,
    /// How often `data/metrics.prom` is rewritten. `0` writes it only at
    /// shutdown.
    pub snapshot_interval_secs: u64,
    /// Labels added to every metric.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            snapshot_interval_secs: 15,
            labels: HashMap::new(),
        }
    }
}

impl MetricsConfig {
    pub fn snapshot_interval(&self) -> Option<Duration> {
        (self.snapshot_interval_secs > 0).then(|| Duration::from_secs(self.snapshot_interval_secs))
    }
}

/// Filesystem overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root for the message store, state files and conversation folders.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = PincerConfig::default();
        assert_eq!(cfg.assistant.name, "Pincer");
        assert_eq!(cfg.commands.reset, "/clear");
        assert_eq!(cfg.commands.persona, "/personality");
        assert_eq!(cfg.dispatch.poll_interval(), Duration::from_secs(2));
        assert_eq!(cfg.dispatch.engine_timeout(), Some(Duration::from_secs(600)));
        assert!(!cfg.engine.allowed_tools.iter().any(|t| t == "Bash"));
        assert!(cfg.metrics.enabled);
        assert_eq!(cfg.metrics.snapshot_interval(), Some(Duration::from_secs(15)));
    }

    #[test]
    fn metrics_section_parses() {
        let cfg: PincerConfig = toml::from_str(
            r#"
            [metrics]
            snapshot_interval_secs = 0

            [metrics.labels]
            host = "pi"
            "#,
        )
        .unwrap();
        assert!(cfg.metrics.enabled);
        assert!(cfg.metrics.snapshot_interval().is_none());
        assert_eq!(cfg.metrics.labels.get("host").map(String::as_str), Some("pi"));
    }

    #[test]
    fn zero_timeout_disables_limit() {
        let cfg = DispatchConfig {
            engine_timeout_secs: 0,
            ..Default::default()
        };
        assert!(cfg.engine_timeout().is_none());
    }

    #[test]
    fn reply_prefix_uses_name() {
        let a = AssistantConfig {
            name: "Andy".into(),
        };
        assert_eq!(a.reply_prefix(), "*Andy:*");
        assert_eq!(a.format_reply("hi"), "*Andy:* hi");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: PincerConfig = toml::from_str(
            r#"
            [assistant]
            name = "Andy"

            [dispatch]
            poll_interval_ms = 500
            "#,
        )
        .unwrap();
        assert_eq!(cfg.assistant.name, "Andy");
        assert_eq!(cfg.dispatch.poll_interval_ms, 500);
        assert_eq!(cfg.dispatch.max_attempts, 5);
        assert_eq!(cfg.engine.command, "claude");
        assert!(cfg.channels.telegram.is_none());
    }
}

//! Engine adapter that shells out to the Claude Code CLI.
//!
//! One process per run, `-p` print mode with JSON output. Continuation uses
//! the CLI's own `--resume <session_id>`.

use std::process::Stdio;

use {
    async_trait::async_trait,
    pincer_config::EngineConfig,
    serde::Deserialize,
    tokio::process::Command,
    tracing::{debug, warn},
};

use crate::{
    engine::{AgentEngine, EngineReply, EngineRequest},
    error::{Error, Result},
    persona, prompt,
};

/// Final JSON object printed by `claude -p --output-format json`.
#[derive(Debug, Deserialize)]
struct CliResult {
    #[serde(default)]
    is_error: bool,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
}

pub struct ClaudeCliEngine {
    config: EngineConfig,
}

impl ClaudeCliEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    fn args(&self, request: &EngineRequest, system_prompt: &str) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            request.prompt.clone(),
            "--output-format".into(),
            "json".into(),
            "--model".into(),
            self.config.model.clone(),
            "--permission-mode".into(),
            self.config.permission_mode.clone(),
        ];
        if !self.config.allowed_tools.is_empty() {
            args.push("--allowedTools".into());
            args.push(self.config.allowed_tools.join(","));
        }
        args.push("--append-system-prompt".into());
        args.push(system_prompt.to_string());
        if let Some(token) = &request.session_token {
            args.push("--resume".into());
            args.push(token.clone());
        }
        args.extend(self.config.extra_args.iter().cloned());
        args
    }
}

/// Interpret the CLI's stdout. The JSON result is the last non-empty line;
/// anything before it is ignored.
fn parse_output(stdout: &[u8]) -> Result<EngineReply> {
    let text = String::from_utf8_lossy(stdout);
    let line = text
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| Error::engine("no output"))?;
    let parsed: CliResult = serde_json::from_str(line.trim())?;
    if parsed.is_error {
        return Err(Error::engine(
            parsed.result.unwrap_or_else(|| "unspecified error".into()),
        ));
    }
    Ok(EngineReply {
        text: parsed.result,
        session_token: parsed.session_id,
    })
}

#[async_trait]
impl AgentEngine for ClaudeCliEngine {
    fn name(&self) -> &str {
        "claude-cli"
    }

    async fn run(&self, request: EngineRequest) -> Result<EngineReply> {
        let document = persona::ensure_document(&request.workdir)?;
        let system_prompt = prompt::build_system_prompt(&document, &request.workdir);

        debug!(
            workdir = %request.workdir.display(),
            resume = request.session_token.is_some(),
            model = %self.config.model,
            "starting engine run"
        );

        let output = Command::new(&self.config.command)
            .args(self.args(&request, &system_prompt))
            .current_dir(&request.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| Error::Spawn {
                command: self.config.command.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // The CLI reports some failures as JSON on stdout with a non-zero exit.
            if let Err(e @ Error::Engine { .. }) = parse_output(&output.stdout) {
                return Err(e);
            }
            warn!(status = %output.status, stderr = %stderr.trim(), "engine exited with failure");
            return Err(Error::engine(format!(
                "exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        parse_output(&output.stdout)
    }
}

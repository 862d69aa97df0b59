use std::path::PathBuf;

use async_trait::async_trait;

use crate::Result;

/// One engine invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineRequest {
    pub prompt: String,
    /// Conversation working directory. The engine may read and write files
    /// here; its instruction document lives here too.
    pub workdir: PathBuf,
    /// Continuation token from the previous successful run, `None` for a
    /// fresh context.
    pub session_token: Option<String>,
}

/// Output of a run the engine itself considered successful.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineReply {
    /// Reply text. `None` or empty means the run produced nothing to send.
    pub text: Option<String>,
    /// Token to pass on the next run. May differ from the one passed in.
    pub session_token: Option<String>,
}

impl EngineReply {
    /// The reply text when there is something to send.
    pub fn text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// The reasoning engine behind the assistant.
///
/// Treated as a black box: retries and tool use happen inside. Any `Err`
/// is an engine failure the caller reports to the user.
#[async_trait]
pub trait AgentEngine: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    async fn run(&self, request: EngineRequest) -> Result<EngineReply>;
}

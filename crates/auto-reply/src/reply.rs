//! Command interpreter: turns one stored message into at most one reply.

use std::{path::PathBuf, sync::Arc, time::Duration};

use {
    pincer_agents::{AgentEngine, EngineReply, EngineRequest, persona, prompt},
    pincer_channels::ChannelOutbound,
    pincer_common::{ChannelMessage, preview},
    pincer_config::{AssistantConfig, PincerConfig},
    pincer_sessions::{Conversation, SessionTable},
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use pincer_metrics::{counter, engine as engine_metrics, histogram, labels, outbound as outbound_metrics};

use crate::{
    Error, Result,
    commands::{Classified, CommandSet},
};

pub const RESET_REPLY: &str = "Conversation cleared! Starting fresh.";
pub const PERSONA_REPLY: &str = "Personality updated!";
pub const APOLOGY_REPLY: &str = "Sorry, I encountered an error. Please try again.";

/// How a message was handled. Every variant counts as handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Unregistered,
    Ignored,
    SessionReset,
    PersonaUsage,
    PersonaUpdated,
    Replied,
    /// The engine failed, timed out or returned nothing; an apology was sent.
    Apologized,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unregistered => "unregistered",
            Self::Ignored => "ignored",
            Self::SessionReset => "session_reset",
            Self::PersonaUsage => "persona_usage",
            Self::PersonaUpdated => "persona_updated",
            Self::Replied => "replied",
            Self::Apologized => "apologized",
        }
    }
}

pub struct Interpreter {
    assistant: AssistantConfig,
    commands: CommandSet,
    engine: Arc<dyn AgentEngine>,
    outbound: Arc<dyn ChannelOutbound>,
    groups_dir: PathBuf,
    engine_timeout: Option<Duration>,
}

impl Interpreter {
    pub fn new(
        config: &PincerConfig,
        groups_dir: PathBuf,
        engine: Arc<dyn AgentEngine>,
        outbound: Arc<dyn ChannelOutbound>,
    ) -> Result<Self> {
        Ok(Self {
            assistant: config.assistant.clone(),
            commands: CommandSet::new(&config.assistant, &config.commands)?,
            engine,
            outbound,
            groups_dir,
            engine_timeout: config.dispatch.engine_timeout(),
        })
    }

    pub fn assistant(&self) -> &AssistantConfig {
        &self.assistant
    }

    /// Handle one message for `conversation` (`None` when unregistered).
    ///
    /// `Err` means the message was not handled and must be retried: a
    /// session-table write, instruction-document write or reply send failed.
    pub async fn handle(
        &self,
        message: &ChannelMessage,
        conversation: Option<&Conversation>,
        sessions: &mut SessionTable,
    ) -> Result<Outcome> {
        let Some(conversation) = conversation else {
            return Ok(Outcome::Unregistered);
        };
        let conversation_id = message.conversation_id.as_str();

        match self.commands.classify(&message.content) {
            Classified::Reset => {
                let existed = sessions.remove(conversation_id)?;
                info!(conversation_id, existed, "session cleared");
                self.send(conversation_id, RESET_REPLY).await?;
                Ok(Outcome::SessionReset)
            },
            Classified::Persona { instructions: "" } => {
                let usage = format!("Usage: {} <instructions>", self.commands.persona_literal());
                self.send(conversation_id, &usage).await?;
                Ok(Outcome::PersonaUsage)
            },
            Classified::Persona { instructions } => {
                let workdir = conversation.workdir(&self.groups_dir);
                persona::update_instructions(&workdir, instructions).map_err(Error::Persona)?;
                info!(conversation_id, name = %conversation.name, "personality updated");
                self.send(conversation_id, PERSONA_REPLY).await?;
                Ok(Outcome::PersonaUpdated)
            },
            Classified::Query { text } => {
                self.answer(message, conversation, text, sessions).await
            },
            Classified::Ignore => Ok(Outcome::Ignored),
        }
    }

    async fn answer(
        &self,
        message: &ChannelMessage,
        conversation: &Conversation,
        text: &str,
        sessions: &mut SessionTable,
    ) -> Result<Outcome> {
        let conversation_id = message.conversation_id.as_str();
        info!(
            conversation_id,
            name = %conversation.name,
            sender = %message.sender_name,
            "processing message: {}",
            preview(text, 100)
        );

        if let Err(e) = self.outbound.send_typing(conversation_id).await {
            debug!(conversation_id, error = %e, "typing indicator failed");
        }

        let request = EngineRequest {
            prompt: prompt::build_prompt(&conversation.name, &message.sender_name, text),
            workdir: conversation.workdir(&self.groups_dir),
            session_token: sessions.get(conversation_id).map(String::from),
        };

        let reply = match self.run_engine(request).await {
            Ok(reply) => reply,
            Err(reason) => {
                warn!(conversation_id, engine = self.engine.name(), %reason, "engine run failed");
                self.send(conversation_id, APOLOGY_REPLY).await?;
                return Ok(Outcome::Apologized);
            },
        };

        let Some(body) = reply.text() else {
            warn!(conversation_id, engine = self.engine.name(), "engine returned no text");
            #[cfg(feature = "metrics")]
            counter!(engine_metrics::FAILURES_TOTAL, labels::REASON => "empty").increment(1);
            self.send(conversation_id, APOLOGY_REPLY).await?;
            return Ok(Outcome::Apologized);
        };

        if let Some(token) = &reply.session_token {
            sessions.set(conversation_id, token)?;
        }
        self.send(conversation_id, body).await?;
        info!(conversation_id, "response sent: {}", preview(body, 100));
        Ok(Outcome::Replied)
    }

    /// Run the engine under the configured time limit. `Err` carries the
    /// failure reason for logs.
    async fn run_engine(&self, request: EngineRequest) -> std::result::Result<EngineReply, String> {
        #[cfg(feature = "metrics")]
        let start = std::time::Instant::now();
        #[cfg(feature = "metrics")]
        counter!(engine_metrics::RUNS_TOTAL).increment(1);

        let run = self.engine.run(request);
        let result = match self.engine_timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(_) => Err(format!("timed out after {}s", limit.as_secs())),
            },
            None => run.await.map_err(|e| e.to_string()),
        };

        #[cfg(feature = "metrics")]
        {
            histogram!(engine_metrics::DURATION_SECONDS).record(start.elapsed().as_secs_f64());
            if result.is_err() {
                counter!(engine_metrics::FAILURES_TOTAL, labels::REASON => "error").increment(1);
            }
        }

        result
    }

    async fn send(&self, conversation_id: &str, body: &str) -> Result<()> {
        let text = self.assistant.format_reply(body);
        match self.outbound.send_text(conversation_id, &text).await {
            Ok(()) => {
                #[cfg(feature = "metrics")]
                counter!(outbound_metrics::SENT_TOTAL).increment(1);
                Ok(())
            },
            Err(source) => {
                #[cfg(feature = "metrics")]
                counter!(outbound_metrics::ERRORS_TOTAL).increment(1);
                Err(Error::Send {
                    conversation_id: conversation_id.to_string(),
                    source,
                })
            },
        }
    }
}

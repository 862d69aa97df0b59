use thiserror::Error;

/// Failures that stop a message from counting as handled.
///
/// Engine failures are not here: they are answered with an apology and the
/// message counts as handled.
#[derive(Debug, Error)]
pub enum Error {
    #[error("message store: {0}")]
    Store(#[source] pincer_channels::Error),

    #[error("router state: {0}")]
    State(#[from] pincer_sessions::Error),

    #[error("instruction document: {0}")]
    Persona(#[source] pincer_agents::Error),

    #[error("send to {conversation_id} failed: {source}")]
    Send {
        conversation_id: String,
        #[source]
        source: pincer_channels::Error,
    },

    #[error("invalid trigger for assistant name {name:?}: {source}")]
    Trigger {
        name: String,
        #[source]
        source: regex::Error,
    },

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

impl pincer_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pincer_common::impl_context!();

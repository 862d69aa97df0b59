use {
    chrono::{DateTime, Utc},
    pincer_common::{ChannelMessage, Timestamp},
    serde::Serialize,
};

/// Kind of media attached to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
    Document,
    Audio,
    Voice,
    Animation,
}

/// Transport-neutral message body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageContent {
    /// Plain or formatted text.
    Text { text: String },
    /// Media with an optional caption.
    Media {
        media: MediaKind,
        caption: Option<String>,
    },
    /// Stickers, locations, service messages, ...
    Unsupported,
}

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// The textual content the pipeline works with, if any.
    ///
    /// Empty text and captionless media count as "no text content".
    pub fn as_text(&self) -> Option<&str> {
        let text = match self {
            Self::Text { text } => text.as_str(),
            Self::Media {
                caption: Some(caption),
                ..
            } => caption.as_str(),
            Self::Media { caption: None, .. } | Self::Unsupported => return None,
        };
        (!text.is_empty()).then_some(text)
    }
}

/// An inbound event as delivered by a transport.
#[derive(Debug, Clone, Serialize)]
pub struct InboundEvent {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub sender_name: Option<String>,
    pub content: MessageContent,
    pub sent_at: DateTime<Utc>,
    /// Sent by the account the transport is logged in as.
    pub is_self: bool,
}

impl InboundEvent {
    /// Normalize into the canonical stored shape.
    ///
    /// Returns `None` when the event carries no text content.
    pub fn to_message(&self) -> Option<ChannelMessage> {
        let content = self.content.as_text()?;
        Some(ChannelMessage {
            id: self.id.clone(),
            conversation_id: self.conversation_id.clone(),
            sender_id: self.sender_id.clone(),
            sender_name: self
                .sender_name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
            content: content.to_string(),
            timestamp: Timestamp::from_datetime(self.sent_at),
            is_self: self.is_self,
        })
    }
}

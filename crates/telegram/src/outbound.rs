use std::time::Duration;

use {
    async_trait::async_trait,
    pincer_channels::{ChannelOutbound, Error, Result},
    teloxide::{
        RequestError,
        prelude::*,
        types::{ChatAction, ChatId},
    },
    tracing::{debug, warn},
};

use crate::{
    chunk::{TELEGRAM_MAX_MESSAGE_LEN, chunk_message},
    state::SharedBot,
};

/// Sends replies through the bot the plugin started.
pub struct TelegramOutbound {
    pub(crate) shared: SharedBot,
}

impl TelegramOutbound {
    fn bot(&self) -> Result<Bot> {
        let state = self.shared.read().unwrap_or_else(|e| e.into_inner());
        state
            .as_ref()
            .map(|s| s.bot.clone())
            .ok_or_else(|| Error::unavailable("telegram bot is not started"))
    }

    async fn send_chunk(&self, bot: &Bot, chat_id: ChatId, chunk: &str) -> Result<()> {
        let first = bot.send_message(chat_id, chunk).await;
        let err = match first {
            Ok(_) => return Ok(()),
            Err(err) => err,
        };
        let Some(wait) = retry_after_duration(&err) else {
            return Err(Error::external("telegram send", err));
        };

        warn!(
            chat_id = chat_id.0,
            retry_after_secs = wait.as_secs(),
            "telegram rate limited, waiting before retry"
        );
        tokio::time::sleep(wait).await;
        bot.send_message(chat_id, chunk)
            .await
            .map(|_| ())
            .map_err(|e| Error::external("telegram send", e))
    }
}

fn parse_chat_id(conversation_id: &str) -> Result<ChatId> {
    conversation_id
        .parse::<i64>()
        .map(ChatId)
        .map_err(|_| Error::invalid_input(format!("not a telegram chat id: {conversation_id}")))
}

fn retry_after_duration(error: &RequestError) -> Option<Duration> {
    match error {
        RequestError::RetryAfter(wait) => Some(wait.duration()),
        _ => None,
    }
}

#[async_trait]
impl ChannelOutbound for TelegramOutbound {
    async fn send_text(&self, conversation_id: &str, text: &str) -> Result<()> {
        let chat_id = parse_chat_id(conversation_id)?;
        let bot = self.bot()?;

        let chunks = chunk_message(text, TELEGRAM_MAX_MESSAGE_LEN);
        debug!(
            chat_id = chat_id.0,
            text_len = text.len(),
            chunk_count = chunks.len(),
            "telegram outbound text send"
        );
        for chunk in &chunks {
            self.send_chunk(&bot, chat_id, chunk).await?;
        }
        Ok(())
    }

    async fn send_typing(&self, conversation_id: &str) -> Result<()> {
        let chat_id = parse_chat_id(conversation_id)?;
        self.bot()?
            .send_chat_action(chat_id, ChatAction::Typing)
            .await
            .map(|_| ())
            .map_err(|e| Error::external("telegram typing", e))
    }
}

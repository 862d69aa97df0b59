use std::sync::{Arc, RwLock};

use {
    async_trait::async_trait,
    pincer_channels::{
        ChannelHealthSnapshot, ChannelOutbound, ChannelPlugin, Error, InboundSink, Result,
    },
    teloxide::prelude::Requester,
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
};

use crate::{bot, config::TelegramAccountConfig, outbound::TelegramOutbound, state::SharedBot};

/// Telegram channel plugin.
pub struct TelegramPlugin {
    shared: SharedBot,
    cancel: Option<CancellationToken>,
}

impl TelegramPlugin {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(RwLock::new(None)),
            cancel: None,
        }
    }

    /// The bot's username once started.
    pub fn username(&self) -> Option<String> {
        let state = self.shared.read().unwrap_or_else(|e| e.into_inner());
        state.as_ref().and_then(|s| s.username.clone())
    }
}

impl Default for TelegramPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelPlugin for TelegramPlugin {
    fn id(&self) -> &str {
        "telegram"
    }

    async fn start(&mut self, config: serde_json::Value, sink: Arc<dyn InboundSink>) -> Result<()> {
        if self.cancel.is_some() {
            return Err(Error::invalid_input("telegram plugin is already started"));
        }
        let config: TelegramAccountConfig = serde_json::from_value(config)?;
        info!(config = ?config, "starting telegram transport");
        let cancel = bot::start_polling(config, Arc::clone(&self.shared), sink).await?;
        self.cancel = Some(cancel);
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
            info!("telegram transport stopped");
        }
        let mut state = self.shared.write().unwrap_or_else(|e| e.into_inner());
        *state = None;
        Ok(())
    }

    fn outbound(&self) -> Arc<dyn ChannelOutbound> {
        Arc::new(TelegramOutbound {
            shared: Arc::clone(&self.shared),
        })
    }

    async fn probe(&self) -> Result<ChannelHealthSnapshot> {
        let bot = {
            let state = self.shared.read().unwrap_or_else(|e| e.into_inner());
            state.as_ref().map(|s| s.bot.clone())
        };
        let Some(bot) = bot else {
            return Ok(ChannelHealthSnapshot {
                connected: false,
                details: Some("not started".into()),
            });
        };
        match bot.get_me().await {
            Ok(me) => Ok(ChannelHealthSnapshot {
                connected: true,
                details: me.username.clone().map(|u| format!("@{u}")),
            }),
            Err(e) => {
                warn!(error = %e, "telegram probe failed");
                Ok(ChannelHealthSnapshot {
                    connected: false,
                    details: Some(e.to_string()),
                })
            },
        }
    }
}

use std::{sync::Arc, time::Duration};

use {
    pincer_channels::InboundSink,
    secrecy::ExposeSecret,
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{AllowedUpdate, UpdateKind, UserId},
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use crate::{
    config::TelegramAccountConfig,
    error::{Error, Result},
    handlers,
    state::{BotState, SharedBot},
};

/// Connect the bot and start polling.
///
/// Spawns a background task that forwards message updates to `sink` until
/// the returned `CancellationToken` is cancelled.
pub async fn start_polling(
    config: TelegramAccountConfig,
    shared: SharedBot,
    sink: Arc<dyn InboundSink>,
) -> Result<CancellationToken> {
    if !config.has_token() {
        return Err(Error::message("telegram bot token is empty"));
    }

    // Client timeout must outlast the long-polling timeout.
    let client = teloxide::net::default_reqwest_settings()
        .timeout(Duration::from_secs(u64::from(config.poll_timeout_secs) + 15))
        .build()
        .map_err(|e| Error::external("build telegram http client", e))?;
    let bot = Bot::with_client(config.token.expose_secret(), client);

    let me = bot.get_me().await?;
    bot.delete_webhook().send().await?;
    info!(username = ?me.username, "telegram bot connected (webhook cleared)");

    {
        let mut state = shared.write().unwrap_or_else(|e| e.into_inner());
        *state = Some(BotState {
            bot: bot.clone(),
            username: me.username.clone(),
        });
    }

    let cancel = CancellationToken::new();
    tokio::spawn(poll_loop(bot, me.id, config, sink, cancel.clone()));
    Ok(cancel)
}

async fn poll_loop(
    bot: Bot,
    bot_id: UserId,
    config: TelegramAccountConfig,
    sink: Arc<dyn InboundSink>,
    cancel: CancellationToken,
) {
    info!("starting telegram polling loop");
    let backoff = Duration::from_secs(config.error_backoff_secs);
    let mut offset: i32 = 0;

    loop {
        let request = bot
            .get_updates()
            .offset(offset)
            .timeout(config.poll_timeout_secs)
            .allowed_updates(vec![AllowedUpdate::Message]);

        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = request.send() => result,
        };

        match result {
            Ok(updates) => {
                debug!(count = updates.len(), "got telegram updates");
                for update in updates {
                    offset = update.id.as_offset();
                    match update.kind {
                        UpdateKind::Message(msg) => {
                            debug!(
                                chat_id = msg.chat.id.0,
                                message_id = msg.id.0,
                                "received telegram message"
                            );
                            sink.on_event(handlers::to_event(&msg, Some(bot_id))).await;
                        },
                        other => debug!("ignoring non-message update: {other:?}"),
                    }
                }
            },
            Err(RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) => {
                error!("telegram polling stopped: another instance is running with this token");
                cancel.cancel();
                break;
            },
            Err(e) => {
                warn!(error = %e, "telegram getUpdates failed");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(backoff) => {},
                }
            },
        }
    }
    info!("telegram polling stopped");
}

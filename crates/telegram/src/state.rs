use std::sync::{Arc, RwLock};

use teloxide::Bot;

/// The connected bot, shared between the polling task, the outbound sender
/// and the plugin. `None` until the plugin is started.
pub type SharedBot = Arc<RwLock<Option<BotState>>>;

#[derive(Clone)]
pub struct BotState {
    pub bot: Bot,
    pub username: Option<String>,
}

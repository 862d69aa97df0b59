use {anyhow::Result, clap::Subcommand, pincer_config::DataLayout, pincer_sessions::SessionTable};

/// Engine session tokens. A running gateway keeps its own copy of this
/// table, so clear sessions while it is stopped or send the reset command
/// in the chat instead.
#[derive(Subcommand)]
pub enum SessionAction {
    /// List conversations with an engine session.
    List,
    /// Forget the engine session of a conversation.
    Clear {
        #[arg(allow_hyphen_values = true)]
        conversation_id: String,
    },
}

pub fn handle_sessions(layout: &DataLayout, action: &SessionAction) -> Result<()> {
    let mut sessions = SessionTable::load(layout.sessions_file());
    match action {
        SessionAction::List => {
            if sessions.is_empty() {
                println!("No sessions.");
            }
            for (conversation_id, token) in sessions.list() {
                println!("{conversation_id}\t{token}");
            }
        },
        SessionAction::Clear { conversation_id } => {
            if sessions.remove(conversation_id)? {
                println!("Cleared session for {conversation_id}");
            } else {
                println!("No session for {conversation_id}");
            }
        },
    }
    Ok(())
}

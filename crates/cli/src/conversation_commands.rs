use {anyhow::Result, clap::Args, pincer_config::DataLayout, pincer_sessions::ConversationRegistry};

#[derive(Args)]
pub struct RegisterArgs {
    /// Conversation id as reported by the transport (Telegram chat id).
    #[arg(allow_hyphen_values = true)]
    pub conversation_id: String,
    /// Display name shown to the engine.
    #[arg(long)]
    pub name: String,
    /// Working-directory name under `groups/`. Defaults to a slug of the name.
    #[arg(long)]
    pub folder: Option<String>,
}

pub fn register(layout: &DataLayout, args: &RegisterArgs) -> Result<()> {
    let mut registry = ConversationRegistry::load(layout.registry_file());
    let conversation =
        registry.register(&args.conversation_id, &args.name, args.folder.as_deref())?;
    let workdir = conversation.workdir(&layout.groups_dir());
    std::fs::create_dir_all(&workdir)?;
    println!(
        "Registered {} as \"{}\" ({})",
        args.conversation_id,
        conversation.name,
        workdir.display()
    );
    Ok(())
}

pub fn unregister(layout: &DataLayout, conversation_id: &str) -> Result<()> {
    let mut registry = ConversationRegistry::load(layout.registry_file());
    match registry.unregister(conversation_id)? {
        Some(removed) => println!("Unregistered {conversation_id} (\"{}\")", removed.name),
        None => println!("{conversation_id} is not registered"),
    }
    Ok(())
}

pub fn list(layout: &DataLayout) -> Result<()> {
    let registry = ConversationRegistry::load(layout.registry_file());
    let mut any = false;
    for (id, conversation) in registry.list() {
        any = true;
        let state = if conversation.enabled {
            ""
        } else {
            " [disabled]"
        };
        println!(
            "{id}\t{}\t{}{state}",
            conversation.name, conversation.folder
        );
    }
    if !any {
        println!("No registered conversations.");
    }
    Ok(())
}

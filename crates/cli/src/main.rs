mod config_commands;
mod conversation_commands;
mod session_commands;
mod status_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    pincer_config::{DataLayout, PincerConfig},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "pincer", about = "Pincer: chat intake and dispatch for an AI assistant", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery of ./pincer.toml and ~/.config/pincer/).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory (overrides config and the platform default).
    #[arg(long, global = true, env = "PINCER_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gateway (default when no subcommand is provided).
    Run,
    /// Register a conversation so the assistant listens to it.
    Register(conversation_commands::RegisterArgs),
    /// Stop listening to a conversation.
    Unregister {
        #[arg(allow_hyphen_values = true)]
        conversation_id: String,
    },
    /// List registered conversations.
    Conversations,
    /// Engine session management.
    Sessions {
        #[command(subcommand)]
        action: session_commands::SessionAction,
    },
    /// Show watermark, conversations and message counts.
    Status,
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Load the config the way every subcommand sees it: explicit `--config`
/// path or discovery, then `PINCER_*` overrides, then `--data-dir`.
fn resolve_config(
    config: Option<&PathBuf>,
    data_dir: Option<&PathBuf>,
) -> anyhow::Result<(PincerConfig, Option<PathBuf>)> {
    let (mut loaded, path) = match config {
        Some(path) => (pincer_config::load_config(path)?, Some(path.clone())),
        None => {
            let path = pincer_config::find_or_default_config_path();
            if path.exists() {
                (pincer_config::load_or_default(&path), Some(path))
            } else {
                (PincerConfig::default(), None)
            }
        },
    };
    pincer_config::apply_env_overrides(&mut loaded);
    if let Some(dir) = data_dir {
        loaded.paths.data_dir = Some(dir.clone());
    }
    Ok((loaded, path))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    let (config, config_path) = resolve_config(cli.config.as_ref(), cli.data_dir.as_ref())?;
    let layout = DataLayout::resolve(&config);

    match cli.command {
        None | Some(Commands::Run) => {
            info!(version = env!("CARGO_PKG_VERSION"), "pincer starting");
            pincer_gateway::run(config).await
        },
        Some(Commands::Register(args)) => conversation_commands::register(&layout, &args),
        Some(Commands::Unregister { conversation_id }) => {
            conversation_commands::unregister(&layout, &conversation_id)
        },
        Some(Commands::Conversations) => conversation_commands::list(&layout),
        Some(Commands::Sessions { action }) => session_commands::handle_sessions(&layout, &action),
        Some(Commands::Status) => status_commands::status(&layout).await,
        Some(Commands::Config { action }) => {
            if config_commands::handle_config(&action, &config, config_path.as_deref())? {
                Ok(())
            } else {
                std::process::exit(1)
            }
        },
    }
}

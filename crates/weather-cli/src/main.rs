//! weather-chat
//!
//! Terminal chat with an AI weather assistant that can look up current
//! conditions and forecasts, and remember users across sessions.

mod chat;
mod config;
mod console;

use std::fs::OpenOptions;
use std::path::Path;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::LlmProvider;
use agent_runtime::{AnthropicConfig, AnthropicProvider, OllamaConfig, OllamaProvider};
use weather_advisor::{MemoryStore, OpenMeteoProvider, SqliteMemoryStore, summarize_user};

use crate::chat::{ChatOptions, Services, SessionEnd};
use crate::config::{ProviderKind, Settings};
use crate::console::Console;

const LOG_FILE: &str = "weather-chat.log";

/// Start an AI weather chatbot session
#[derive(Parser, Debug)]
#[command(name = "weather-chat")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// User identifier for personalized sessions
    #[arg(short, long, global = true)]
    user: Option<String>,

    /// Enable memory persistence
    #[arg(long)]
    memories: bool,

    /// Enable streaming responses
    #[arg(long)]
    stream: bool,

    /// Disable conversation summarization on exit
    #[arg(long)]
    no_save_on_exit: bool,

    /// Show error details instead of a generic apology
    #[arg(long)]
    debug: bool,

    /// Mirror logs to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Model to use (provider default when omitted)
    #[arg(short, long)]
    model: Option<String>,

    /// LLM provider
    #[arg(short, long, value_enum)]
    provider: Option<ProviderKind>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show a summary of what is remembered about a user
    Summary,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let settings = Settings::from_env()?.with_overrides(args.provider, args.model.clone(), args.debug);
    init_tracing(&settings.log_dir, args.verbose)?;

    let store = SqliteMemoryStore::open(&settings.database_path)
        .with_context(|| format!("failed to open {}", settings.database_path.display()))?;
    tracing::debug!(path = %settings.database_path.display(), "Memory store opened");

    match args.command {
        Some(Command::Summary) => summary(&store, args.user.as_deref()),
        None => {
            let services = Services {
                provider: connect(&settings).await?,
                weather: Arc::new(OpenMeteoProvider::from_env()?),
                store: Arc::new(store),
                debug: settings.debug,
            };
            let options = ChatOptions {
                user: args.user,
                memory_mode: args.memories,
                streaming: args.stream,
                save_on_exit: !args.no_save_on_exit,
            };

            let mut input = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
            let mut console = Console::stdout();
            match chat::run(&services, &options, &mut input, &mut console).await? {
                SessionEnd::Finished => Ok(ExitCode::SUCCESS),
                SessionEnd::NoUser => Ok(ExitCode::FAILURE),
            }
        }
    }
}

/// Log to a file in the data directory; stdout belongs to the conversation
fn init_tracing(log_dir: &Path, verbose: bool) -> anyhow::Result<()> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create {}", log_dir.display()))?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join(LOG_FILE))?;

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let stderr = verbose.then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .with(stderr)
        .init();
    Ok(())
}

/// Build the configured LLM provider and check it is reachable
async fn connect(settings: &Settings) -> anyhow::Result<Arc<dyn LlmProvider>> {
    let provider: Arc<dyn LlmProvider> = match settings.provider {
        ProviderKind::Anthropic => {
            let mut config = AnthropicConfig::from_env()?;
            if let Some(model) = &settings.model {
                config.model.clone_from(model);
            }
            Arc::new(AnthropicProvider::from_config(config)?)
        }
        ProviderKind::Ollama => {
            let mut config = OllamaConfig::from_env();
            if let Some(model) = &settings.model {
                config.model.clone_from(model);
            }
            Arc::new(OllamaProvider::from_config(config)?)
        }
    };

    match provider.health_check().await {
        Ok(true) => tracing::info!(provider = %settings.provider, "✓ Provider ready"),
        Ok(false) | Err(_) => {
            tracing::warn!(provider = %settings.provider, "⚠ Provider not available - requests will fail");
        }
    }
    Ok(provider)
}

fn summary(store: &dyn MemoryStore, user: Option<&str>) -> anyhow::Result<ExitCode> {
    let Some(user) = user else {
        eprintln!("Please specify a user with --user option");
        return Ok(ExitCode::FAILURE);
    };

    println!("{}", summarize_user(store, user, chrono::Utc::now())?);
    Ok(ExitCode::SUCCESS)
}

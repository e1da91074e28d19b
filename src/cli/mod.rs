//! Command-line interface parsing and dispatch.
//!
//! `gemchat` with no subcommand starts the interactive chat; `gems` and
//! `chats` are non-interactive listings of the persona and transcript stores.

pub mod chat_list;
pub mod gem_list;

use std::env;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Mutex;

use clap::{Parser, Subcommand};

use crate::api;
use crate::core::config::{self, Config, DataDirs};
use crate::core::gem::GemStore;
use crate::core::models;
use crate::core::session::SessionState;
use crate::core::transcript::TranscriptStore;
use crate::ui::chat_loop::{run_chat, ChatApp, ChatAppParams, NewChatDraft};

#[derive(Parser)]
#[command(name = "gemchat")]
#[command(about = "A terminal chat client for the Gemini API with gems and saved conversations")]
#[command(
    long_about = "Gemchat is a full-screen terminal chat client for the Google Gemini API. \
Conversations are saved as JSON files and can be reopened, searched, and deleted; \
\"gems\" are persona presets that seed each new conversation.\n\n\
Environment Variables:\n\
  GEMINI_API_KEY    Your Gemini API key (required; GOOGLE_API_KEY also accepted)\n\
  GEMCHAT_LOG       Write diagnostic logs to this file (filtered by RUST_LOG)\n\n\
Controls:\n\
  Type              Enter your message in the input field\n\
  Enter             Send the message or run a /command\n\
  Up/Down/Mouse     Scroll through the conversation\n\
  Ctrl+C            Quit\n\n\
Commands:\n\
  /help             List all slash commands"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Preselect a gem for the first new chat (ignored when unknown)
    #[arg(short = 'g', long, global = true, value_name = "KEY")]
    pub gem: Option<String>,

    /// Model for new chats (display name or API id)
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Request Google Search grounding for new chats
    #[arg(long, global = true)]
    pub grounding: bool,

    /// Root directory for chats, gems, and uploads (defaults to the user data dir)
    #[arg(long, global = true, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the chat interface (default)
    Chat,
    /// List available gems
    Gems,
    /// List saved conversations, optionally filtered by content
    Chats {
        /// Case-insensitive substring to search for
        query: Option<String>,
    },
}

pub async fn run() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_logging()?;

    let config = Config::load()?;
    let dirs = DataDirs::resolve(args.data_dir.as_deref())?;

    match args.command {
        Some(Commands::Gems) => gem_list::list_gems(&dirs),
        Some(Commands::Chats { ref query }) => chat_list::list_chats(&dirs, query.as_deref()),
        Some(Commands::Chat) | None => chat(args, config, dirs).await,
    }
}

async fn chat(args: Args, config: Config, dirs: DataDirs) -> Result<(), Box<dyn Error>> {
    // Resolve everything fatal before touching terminal modes so failures
    // land on a readable stderr.
    let api_key = config::api_key()?;
    let gems = GemStore::load(&dirs.gems)?;

    let preselected = args.gem.filter(|key| {
        if gems.contains(key) {
            true
        } else {
            eprintln!("Unknown gem '{key}'; using the default selection.");
            false
        }
    });
    let mut session = SessionState::new(config.save_uploads.unwrap_or(false), preselected);

    let preselected = session.take_preselected_gem();
    let gem_key = gems
        .default_key(preselected.as_deref().or(config.default_gem.as_deref()))
        .to_string();

    let model_id = args
        .model
        .as_deref()
        .or(config.default_model.as_deref())
        .map(|name| match models::resolve(name) {
            Some(id) => id,
            None => {
                eprintln!("Unknown model '{name}'; using the default model.");
                models::default_model_id()
            }
        })
        .unwrap_or_else(models::default_model_id)
        .to_string();

    let draft = NewChatDraft {
        gem_key,
        model_id,
        grounding_requested: args.grounding,
    };

    let (app, rx) = ChatApp::new(ChatAppParams {
        gems,
        store: TranscriptStore::new(&dirs.chats),
        uploads_dir: dirs.uploads.clone(),
        session,
        draft,
        api_key,
        base_url: api::DEFAULT_BASE_URL.to_string(),
    })?;

    run_chat(app, rx).await
}

/// The TUI owns the terminal, so diagnostics go to a file instead of stderr.
/// Enabled only when `GEMCHAT_LOG` names a path.
fn init_logging() -> Result<(), Box<dyn Error>> {
    let Ok(path) = env::var("GEMCHAT_LOG") else {
        return Ok(());
    };
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("gemchat=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

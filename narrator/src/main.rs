//! narrate - Read EPUB and text files aloud with a synchronized highlight

mod book;
mod player;
mod restore;
mod speech;
mod terminal;
mod text;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use narrator_core::{NarrationConfig, PlaybackCoordinator, SpeechEngine};
use std::path::PathBuf;
use std::sync::Arc;

use player::Player;
use restore::{PositionStore, ReadingPosition, SavedPosition};
use speech::{CommandSpeechEngine, PacedSpeechEngine};
use terminal::{ProgressStatus, TerminalMediaSession, TerminalSurface};
use text::DocumentChunker;

#[derive(Parser, Debug)]
#[command(name = "narrate")]
#[command(about = "Read EPUB and text files aloud with a synchronized highlight", long_about = None)]
#[command(version)]
struct Args {
    /// EPUB or plain text file to read
    file: Option<PathBuf>,

    /// Start at this chunk instead of the saved position
    #[arg(long)]
    from: Option<usize>,

    /// Read only this chapter (EPUB, 0-based)
    #[arg(long)]
    chapter: Option<usize>,

    /// Keep reading text appended to the file
    #[arg(long)]
    autoplay: bool,

    /// Speaking rate in words per minute
    #[arg(long)]
    wpm: Option<u32>,

    /// TTS command to run, e.g. "espeak-ng -v en-us"
    #[arg(long)]
    voice_command: Option<String>,

    /// Do not speak; pace the highlight at reading speed
    #[arg(long)]
    silent: bool,

    /// Ignore the saved reading position
    #[arg(long)]
    fresh: bool,

    /// Enable debug logging
    #[arg(short, long, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Set whether appended text is read automatically
    SetAutoplay {
        /// true or false
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
    /// Set default speaking rate
    SetWpm {
        /// Words per minute (80-450)
        value: u32,
    },
    /// Set the TTS command (omit to auto-detect)
    SetVoiceCommand {
        command: Option<String>,
    },
}

fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    if let Some(Commands::Config { action }) = &args.command {
        return handle_config_command(action);
    }

    let path = args
        .file
        .clone()
        .ok_or_else(|| anyhow::anyhow!("A file to read is required. Run 'narrate --help' for usage."))?;
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }

    let mut config = NarrationConfig::load().context("Failed to load configuration")?;
    config.autoplay |= args.autoplay;
    if let Some(wpm) = args.wpm {
        config.words_per_minute = wpm;
    }
    if let Some(command) = &args.voice_command {
        config.voice_command = Some(command.clone());
    }
    log::debug!("Configuration: {:?}", config);

    let book = book::load_book(&path).context("Failed to load document")?;
    eprintln!(
        "\"{}\" by {} ({} chapters, ~{} words)",
        book.title,
        book.author.as_deref().unwrap_or("Unknown"),
        book.chapters.len(),
        book.total_words()
    );

    let text = book.narration_text(args.chapter)?;
    let chunker = Arc::new(DocumentChunker::new(&text, config.chunk_size));
    let chunks = chunker.chunks();
    if chunks.is_empty() {
        anyhow::bail!("Nothing to read in {}", path.display());
    }

    let bar = terminal::progress_bar(chunks.len());
    let surface = Arc::new(TerminalSurface::new(&book.title, &chunks, bar.clone()));
    let media = Arc::new(TerminalMediaSession::new());
    let speech = select_engine(&args, &config);

    let store = PositionStore::open_default()?;
    let document_hash = restore::document_hash(&path)?;
    let hint = match (args.from, args.fresh) {
        (Some(index), _) => SavedPosition::new(Some(index)),
        (None, true) => SavedPosition::new(None),
        (None, false) => SavedPosition::from_store(&store, &document_hash, args.chapter),
    };

    let coordinator = PlaybackCoordinator::builder(config.clone())
        .chunker(chunker.clone())
        .speech(speech)
        .renderer(surface.clone())
        .surface(surface.clone())
        .status(Arc::new(ProgressStatus::new(bar.clone())))
        .restore_hint(Arc::new(hint))
        .keep_alive(media.clone())
        .build()?;

    let position = ReadingPosition {
        document_hash,
        document_path: path.clone(),
        chapter: args.chapter,
        chunk_index: 0,
        total_chunks: chunks.len(),
        updated_at: Utc::now(),
    };

    let mut player = Player::new(coordinator, chunker, surface, media, bar, store, position);
    if config.autoplay && book.appendable {
        let read_len = std::fs::metadata(&path)?.len();
        player = player.watch_growth(path.clone(), read_len);
    }

    player.run(&book.title).await
}

/// The configured TTS command, or silent pacing when none is usable.
fn select_engine(args: &Args, config: &NarrationConfig) -> Arc<dyn SpeechEngine> {
    if !args.silent {
        if let Some(engine) =
            CommandSpeechEngine::detect(config.voice_command.as_deref(), config.words_per_minute)
        {
            log::debug!("Speaking with {}", engine.program().display());
            return Arc::new(engine);
        }
        eprintln!("No TTS command found (tried espeak-ng, espeak, say); reading silently.");
    }
    Arc::new(PacedSpeechEngine::new(config.words_per_minute))
}

fn handle_config_command(action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = NarrationConfig::load()?;
            println!("Configuration file: {:?}", NarrationConfig::config_path()?);
            println!();
            println!("autoplay = {}", config.autoplay);
            println!("auto_scroll = {}", config.auto_scroll);
            println!("words_per_minute = {}", config.words_per_minute);
            println!("chunk_size = {}", config.chunk_size);
            match &config.voice_command {
                Some(command) => println!("voice_command = \"{}\"", command),
                None => println!("voice_command = (auto-detect)"),
            }
            println!("speech_start_timeout_ms = {}", config.speech_start_timeout_ms);
        }
        ConfigAction::SetAutoplay { enabled } => {
            let mut config = NarrationConfig::load()?;
            config.autoplay = *enabled;
            config.save()?;
            println!("Autoplay set to: {}", config.autoplay);
        }
        ConfigAction::SetWpm { value } => {
            let mut config = NarrationConfig::load()?;
            config.words_per_minute = (*value).clamp(80, 450);
            config.save()?;
            println!("Default speaking rate set to: {} wpm", config.words_per_minute);
        }
        ConfigAction::SetVoiceCommand { command } => {
            let mut config = NarrationConfig::load()?;
            config.voice_command = command.clone();
            config.save()?;
            match &config.voice_command {
                Some(command) => println!("Voice command set to: {}", command),
                None => println!("Voice command cleared (auto-detect)"),
            }
        }
    }
    Ok(())
}

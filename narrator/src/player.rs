//! Interactive narration loop: keyboard controls, progress, saved
//! positions and growing text files.

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use narrator_core::{MediaAction, PlaybackCoordinator, RunOutcome};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};

use crate::restore::{PositionStore, ReadingPosition};
use crate::terminal::{TerminalMediaSession, TerminalSurface};
use crate::text::DocumentChunker;

/// How often a growing text file is checked for new content.
const APPEND_POLL: Duration = Duration::from_secs(1);

/// A keyboard command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Media(MediaAction),
    Seek(usize),
    ToggleAutoplay,
    Quit,
}

impl Control {
    /// Parse one line of keyboard input.
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let control = match words.next()? {
            "p" | "pause" => Self::Media(MediaAction::Pause),
            "r" | "resume" | "play" => Self::Media(MediaAction::Play),
            "s" | "stop" => Self::Media(MediaAction::Stop),
            "g" | "go" => Self::Seek(words.next()?.parse().ok()?),
            "a" | "autoplay" => Self::ToggleAutoplay,
            "q" | "quit" => Self::Quit,
            _ => return None,
        };
        Some(control)
    }
}

pub const HELP: &str = "Controls: p pause, r resume, s stop, g N go to chunk N, a toggle autoplay, q quit";

/// A text file that may grow while it is read.
struct GrowingFile {
    path: PathBuf,
    read_len: u64,
}

impl GrowingFile {
    /// Text appended since the last check, if any.
    async fn appended(&mut self) -> Result<Option<String>> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("Failed to re-read {}", self.path.display()))?;
        let len = bytes.len() as u64;
        if len <= self.read_len {
            // Truncated or unchanged: nothing new to read
            self.read_len = self.read_len.min(len);
            return Ok(None);
        }

        let start = self.read_len as usize;
        let (text, consumed) = decode_complete(&bytes[start..]);
        self.read_len += consumed as u64;
        Ok((!text.trim().is_empty()).then_some(text))
    }
}

/// Decode `bytes` up to the last complete UTF-8 sequence. Returns the text
/// and the number of bytes consumed; a trailing partial character is left
/// for the next read. Invalid sequences become U+FFFD.
fn decode_complete(mut bytes: &[u8]) -> (String, usize) {
    let mut text = String::new();
    let mut consumed = 0;
    loop {
        match std::str::from_utf8(bytes) {
            Ok(valid) => {
                text.push_str(valid);
                return (text, consumed + bytes.len());
            }
            Err(e) => {
                let valid_up_to = e.valid_up_to();
                text.push_str(&String::from_utf8_lossy(&bytes[..valid_up_to]));
                match e.error_len() {
                    Some(bad) => {
                        text.push(char::REPLACEMENT_CHARACTER);
                        consumed += valid_up_to + bad;
                        bytes = &bytes[valid_up_to + bad..];
                    }
                    None => return (text, consumed + valid_up_to),
                }
            }
        }
    }
}

pub struct Player {
    coordinator: PlaybackCoordinator,
    chunker: Arc<DocumentChunker>,
    surface: Arc<TerminalSurface>,
    media: Arc<TerminalMediaSession>,
    bar: ProgressBar,
    store: PositionStore,
    position: ReadingPosition,
    growing: Option<GrowingFile>,
    outcomes: mpsc::UnboundedSender<narrator_core::Result<RunOutcome>>,
    outcomes_rx: mpsc::UnboundedReceiver<narrator_core::Result<RunOutcome>>,
}

impl Player {
    pub fn new(
        coordinator: PlaybackCoordinator,
        chunker: Arc<DocumentChunker>,
        surface: Arc<TerminalSurface>,
        media: Arc<TerminalMediaSession>,
        bar: ProgressBar,
        store: PositionStore,
        position: ReadingPosition,
    ) -> Self {
        let (outcomes, outcomes_rx) = mpsc::unbounded_channel();
        Self {
            coordinator,
            chunker,
            surface,
            media,
            bar,
            store,
            position,
            growing: None,
            outcomes,
            outcomes_rx,
        }
    }

    /// Watch the document for appended text (plain text files only).
    pub fn watch_growth(mut self, path: PathBuf, read_len: u64) -> Self {
        self.growing = Some(GrowingFile { path, read_len });
        self
    }

    fn spawn_run<F>(&self, run: F)
    where
        F: Future<Output = narrator_core::Result<RunOutcome>> + Send + 'static,
    {
        let outcomes = self.outcomes.clone();
        tokio::spawn(async move {
            let _ = outcomes.send(run.await);
        });
    }

    fn spawn_appended(&self) {
        let coordinator = self.coordinator.clone();
        self.spawn_run(async move {
            coordinator
                .content_appended()
                .await
                .map(|outcome| outcome.unwrap_or(RunOutcome::Halted))
        });
    }

    fn dispatch(&self, action: MediaAction) {
        let coordinator = self.coordinator.clone();
        self.spawn_run(async move {
            coordinator
                .handle_media_action(action)
                .await
                .map(|outcome| outcome.unwrap_or(RunOutcome::Halted))
        });
    }

    fn save_position(&mut self, chunk_index: usize, total_chunks: usize) {
        self.position.chunk_index = chunk_index;
        self.position.total_chunks = total_chunks;
        if let Err(e) = self.store.save(&self.position) {
            log::warn!("Could not save reading position: {:#}", e);
        }
    }

    /// Returns false when the loop should exit.
    fn handle_control(&mut self, control: Control) -> bool {
        match control {
            Control::Media(action) => {
                // Routed through the media session like a hardware key
                if !self.media.press(action) {
                    self.dispatch(action);
                }
            }
            Control::Seek(index) => {
                let coordinator = self.coordinator.clone();
                self.spawn_run(async move { coordinator.seek(index).await });
            }
            Control::ToggleAutoplay => {
                let enabled = !self.coordinator.snapshot().autoplay_enabled;
                self.coordinator.set_autoplay(enabled);
                self.bar
                    .println(format!("Autoplay {}", if enabled { "on" } else { "off" }));
            }
            Control::Quit => {
                self.coordinator.stop(true);
                return false;
            }
        }
        true
    }

    /// Returns false when the loop should exit.
    fn handle_outcome(&mut self, outcome: narrator_core::Result<RunOutcome>) -> Result<bool> {
        match outcome.context("Narration failed")? {
            RunOutcome::Completed => {
                if let Err(e) = self.store.clear(&self.position.document_hash) {
                    log::warn!("Could not clear reading position: {:#}", e);
                }
                return Ok(false);
            }
            RunOutcome::AwaitingContent => {
                // Text appended while earlier chunks were still being read
                if self.chunker.chunks().len() > self.coordinator.snapshot().total_chunks {
                    self.spawn_appended();
                }
            }
            RunOutcome::Halted | RunOutcome::Superseded => {}
        }
        Ok(true)
    }

    async fn check_growth(&mut self) -> Result<()> {
        let Some(growing) = self.growing.as_mut() else {
            return Ok(());
        };
        let Some(text) = growing.appended().await? else {
            return Ok(());
        };

        let (first_index, added) = self.chunker.append(&text);
        if added.is_empty() {
            return Ok(());
        }
        log::info!("{} chunks appended", added.len());
        self.surface.append_chunks(first_index, &added);
        self.bar.inc_length(added.len() as u64);
        self.spawn_appended();
        Ok(())
    }

    /// Announce the title, narrate, and handle input until done or quit.
    pub async fn run(mut self, title: &str) -> Result<()> {
        let mut events = self.coordinator.subscribe();
        let mut actions = self
            .coordinator
            .media_actions()
            .context("Media actions already taken")?;
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;
        let mut poll = tokio::time::interval(APPEND_POLL);

        self.bar.println(HELP);
        let coordinator = self.coordinator.clone();
        let announcement = format!("Reading {}", title);
        self.spawn_run(async move {
            coordinator.announce(&announcement).await;
            coordinator.start_restored().await
        });

        loop {
            tokio::select! {
                line = lines.next_line(), if stdin_open => match line? {
                    Some(line) => match Control::parse(&line) {
                        Some(control) => {
                            if !self.handle_control(control) {
                                break;
                            }
                        }
                        None if line.trim().is_empty() => {}
                        None => self.bar.println(HELP),
                    },
                    None => {
                        log::debug!("Input closed; narrating without controls");
                        stdin_open = false;
                    }
                },
                Some(action) = actions.recv() => self.dispatch(action),
                event = events.recv() => match event {
                    Ok(event) => {
                        self.bar.set_length(event.total_chunks as u64);
                        self.bar.set_position(event.chunk_index as u64);
                        self.save_position(event.chunk_index, event.total_chunks);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        log::debug!("Skipped {} chunk events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                Some(outcome) = self.outcomes_rx.recv() => {
                    if !self.handle_outcome(outcome)? {
                        let total = self.coordinator.snapshot().total_chunks as u64;
                        self.bar.set_position(total);
                        self.bar.finish_with_message("Finished");
                        return Ok(());
                    }
                }
                _ = poll.tick(), if self.growing.is_some() => self.check_growth().await?,
            }
        }

        self.bar.abandon_with_message("Stopped");
        Ok(())
    }
}

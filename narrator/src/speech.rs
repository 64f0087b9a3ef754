//! Speech engines for the terminal: an external TTS command, or a silent
//! engine that paces itself at reading speed.

use async_trait::async_trait;
use narrator_core::{SpeechEngine, SpeechErrorKind, SpeechOutcome, StartNotifier, VoiceRole};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Notify;

/// Commands tried, in order, when none is configured.
const KNOWN_COMMANDS: &[&str] = &["espeak-ng", "espeak", "say"];

/// Shortest time the paced engine spends on an utterance.
const MIN_UTTERANCE: Duration = Duration::from_millis(250);

/// Cancels the utterance in flight. Starting a new utterance cancels the
/// previous one, the way a platform speech service behaves.
#[derive(Default)]
struct Interrupter {
    generation: AtomicU64,
    notify: Notify,
}

impl Interrupter {
    /// Claim the engine for a new utterance.
    fn begin(&self) -> u64 {
        self.interrupt();
        self.generation.load(Ordering::SeqCst)
    }

    fn interrupt(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Resolves once the utterance `generation` has been cancelled.
    async fn interrupted(&self, generation: u64) {
        loop {
            let notified = self.notify.notified();
            if self.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            notified.await;
        }
    }
}

/// How a command takes its rate and voice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandFlavor {
    Espeak,
    Say,
    Custom,
}

impl CommandFlavor {
    fn of(program: &str) -> Self {
        let name = std::path::Path::new(program)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        match name.as_str() {
            "espeak" | "espeak-ng" => Self::Espeak,
            "say" => Self::Say,
            _ => Self::Custom,
        }
    }

    fn args(self, words_per_minute: u32, role: VoiceRole) -> Vec<String> {
        let rate = words_per_minute.to_string();
        match (self, role) {
            (Self::Espeak, VoiceRole::Narrator) => vec!["-s".into(), rate],
            (Self::Espeak, VoiceRole::AppVoice) => {
                vec!["-s".into(), rate, "-v".into(), "en+f3".into()]
            }
            (Self::Say, _) => vec!["-r".into(), rate],
            (Self::Custom, _) => Vec::new(),
        }
    }
}

/// Speaks through an external TTS command, one process per utterance.
pub struct CommandSpeechEngine {
    program: PathBuf,
    extra_args: Vec<String>,
    flavor: CommandFlavor,
    words_per_minute: u32,
    interrupter: Interrupter,
}

impl CommandSpeechEngine {
    /// Resolve `command` (program plus optional arguments) on PATH, or the
    /// first known TTS command when `None`.
    pub fn detect(command: Option<&str>, words_per_minute: u32) -> Option<Self> {
        match command {
            Some(command) => {
                let mut parts = command.split_whitespace();
                let program = parts.next()?;
                match which::which(program) {
                    Ok(path) => Some(Self::new(path, program, parts.map(String::from).collect(), words_per_minute)),
                    Err(e) => {
                        log::warn!("Voice command '{}' not found: {}", program, e);
                        None
                    }
                }
            }
            None => KNOWN_COMMANDS.iter().find_map(|name| {
                which::which(name)
                    .ok()
                    .map(|path| Self::new(path, name, Vec::new(), words_per_minute))
            }),
        }
    }

    fn new(program: PathBuf, name: &str, extra_args: Vec<String>, words_per_minute: u32) -> Self {
        log::info!("Using voice command {}", program.display());
        Self {
            program,
            extra_args,
            flavor: CommandFlavor::of(name),
            words_per_minute,
            interrupter: Interrupter::default(),
        }
    }

    pub fn program(&self) -> &std::path::Path {
        &self.program
    }
}

#[async_trait]
impl SpeechEngine for CommandSpeechEngine {
    async fn speak(&self, text: &str, role: VoiceRole, mut started: StartNotifier) -> SpeechOutcome {
        let generation = self.interrupter.begin();

        let mut command = Command::new(&self.program);
        command
            .args(&self.extra_args)
            .args(self.flavor.args(self.words_per_minute, role))
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                return SpeechOutcome::Errored(SpeechErrorKind::Other(format!(
                    "failed to start {}: {}",
                    self.program.display(),
                    e
                )));
            }
        };
        started.notify();

        tokio::select! {
            status = child.wait() => match status {
                Ok(status) if status.success() => SpeechOutcome::Ended,
                Ok(status) => SpeechOutcome::Errored(SpeechErrorKind::Other(format!(
                    "{} exited with {}",
                    self.program.display(),
                    status
                ))),
                Err(e) => SpeechOutcome::Errored(SpeechErrorKind::Other(e.to_string())),
            },
            _ = self.interrupter.interrupted(generation) => {
                if let Err(e) = child.kill().await {
                    log::debug!("Failed to kill voice command: {}", e);
                }
                SpeechOutcome::Errored(SpeechErrorKind::Interrupted)
            }
        }
    }

    fn cancel(&self) {
        self.interrupter.interrupt();
    }
}

/// Silent engine that takes as long as reading the text aloud would.
pub struct PacedSpeechEngine {
    words_per_minute: u32,
    interrupter: Interrupter,
}

impl PacedSpeechEngine {
    pub fn new(words_per_minute: u32) -> Self {
        Self {
            words_per_minute: words_per_minute.max(1),
            interrupter: Interrupter::default(),
        }
    }
}

/// Time to read `text` aloud at `words_per_minute`.
fn utterance_duration(text: &str, words_per_minute: u32) -> Duration {
    let words = text.split_whitespace().count() as u64;
    let millis = words * 60_000 / u64::from(words_per_minute.max(1));
    Duration::from_millis(millis).max(MIN_UTTERANCE)
}

#[async_trait]
impl SpeechEngine for PacedSpeechEngine {
    async fn speak(&self, text: &str, _role: VoiceRole, mut started: StartNotifier) -> SpeechOutcome {
        let generation = self.interrupter.begin();
        started.notify();

        tokio::select! {
            _ = tokio::time::sleep(utterance_duration(text, self.words_per_minute)) => SpeechOutcome::Ended,
            _ = self.interrupter.interrupted(generation) => {
                SpeechOutcome::Errored(SpeechErrorKind::Interrupted)
            }
        }
    }

    fn cancel(&self) {
        self.interrupter.interrupt();
    }
}

//! Collaborator contracts consumed by the coordinator.
//!
//! Everything platform-specific (speech, rendering, visibility, status
//! output, media session) is injected through these traits.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::chunk::{Chunk, VoiceRole};
use crate::error::Result;
use crate::highlight::{Container, Region, TextRange, Viewport};

/// Why a speak call ended without a clean finish
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechErrorKind {
    /// The utterance was cut off (by `cancel()` or by a newer utterance)
    Interrupted,
    /// The utterance was dropped before it finished
    Canceled,
    /// Any other engine failure
    Other(String),
}

impl SpeechErrorKind {
    /// Interruption-class errors are the ones our own cancellation produces.
    pub fn is_interruption(&self) -> bool {
        matches!(self, Self::Interrupted | Self::Canceled)
    }
}

/// Outcome of a single speak call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechOutcome {
    Ended,
    Errored(SpeechErrorKind),
}

/// One-shot "speaking has begun" notification passed to the engine
#[derive(Debug)]
pub struct StartNotifier {
    tx: Option<oneshot::Sender<()>>,
}

impl StartNotifier {
    /// Create a notifier and the receiver the caller watches.
    pub fn channel() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A notifier nobody listens to (one-off utterances).
    pub fn detached() -> Self {
        Self { tx: None }
    }

    /// Signal that audio started. Later calls are ignored.
    pub fn notify(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Produces the ordered chunk list
#[async_trait]
pub trait Chunker: Send + Sync {
    /// Make chunks ready and return them.
    ///
    /// Idempotent: once ready, every call returns the same ordered list
    /// (extended only when content is appended).
    async fn ensure_chunks_ready(&self) -> Result<Vec<Chunk>>;
}

/// Platform text-to-speech capability (a system-wide singleton)
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Speak `text` and resolve once the utterance ends or fails.
    ///
    /// Implementations call `started.notify()` when audio actually begins.
    /// Issuing a new utterance cancels whatever was being spoken.
    async fn speak(&self, text: &str, role: VoiceRole, started: StartNotifier) -> SpeechOutcome;

    /// Halt any in-flight utterance immediately.
    fn cancel(&self);
}

/// Named text-range highlight overlay
pub trait HighlightRenderer: Send + Sync {
    /// Replace the highlight `name` with `ranges` in one step.
    fn set_highlight(&self, name: &str, ranges: Vec<TextRange>);

    /// Remove the highlight `name` if present.
    fn clear_highlight(&self, name: &str);
}

/// Rendered content and its scroll container
pub trait ContentSurface: Send + Sync {
    /// Snapshot of the nodes rendered in `region`.
    fn container(&self, region: Region) -> Option<Container>;

    /// Vertical offset of node `node` of `region` within the scroll container.
    fn marker_offset(&self, region: Region, node: usize) -> Option<f64>;

    fn viewport(&self) -> Viewport;

    fn scroll_to(&self, top: f64);

    fn scroll_to_end(&self);
}

/// Set while the user performs an explicit seek
pub trait NavigationSignal: Send + Sync {
    fn is_navigating(&self) -> bool;
}

/// Whether the narrated content is currently on screen
pub trait Visibility: Send + Sync {
    fn is_visible(&self) -> bool;
}

/// Receives short human-readable status strings
pub trait StatusReporter: Send + Sync {
    fn report(&self, status: &str);
}

/// Supplies an initial position after a restored save
pub trait RestoreHint: Send + Sync {
    /// Consume the hint. Returns `None` once taken or when absent.
    fn take_start_index(&self) -> Option<usize>;
}

/// Lock-screen / media-key actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaAction {
    Play,
    Pause,
    Stop,
}

/// Background audio that keeps the OS from suspending narration
pub trait KeepAliveBackend: Send + Sync {
    /// Begin the inaudible continuous signal.
    fn start_signal(&self) -> Result<()>;

    fn stop_signal(&self);

    /// Route media-session handlers into `actions`.
    fn register_media_handlers(&self, actions: mpsc::UnboundedSender<MediaAction>);
}

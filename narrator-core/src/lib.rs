//! Narration playback library for the narrate workspace
//!
//! Drives chunked text through a speech engine with:
//! - Cooperative cancellation via session versions
//! - Chunk highlighting and auto-scroll kept in step with speech
//! - Recovery from system interruptions (backgrounding, stalled starts)
//! - An optional keep-alive signal with media-key routing

pub mod chunk;
pub mod classifier;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod highlight;
pub mod keepalive;
pub mod mock;
pub mod ports;
pub mod session;

pub use chunk::{Chunk, VoiceRole};
pub use classifier::{Interruption, InterruptionClassifier, SpeakSignal};
pub use config::NarrationConfig;
pub use coordinator::{ChunkEvent, CoordinatorBuilder, PlaybackCoordinator, RunOutcome};
pub use error::{NarrationError, Result};
pub use highlight::{HIGHLIGHT_NAME, HighlightState, HighlightSynchronizer, ScrollPolicy};
pub use keepalive::KeepAliveSignal;
pub use ports::{
    Chunker, ContentSurface, HighlightRenderer, KeepAliveBackend, MediaAction, NavigationSignal,
    RestoreHint, SpeechEngine, SpeechErrorKind, SpeechOutcome, StartNotifier, StatusReporter,
    Visibility,
};
pub use session::{NarrationSnapshot, NarrationState, PlaybackState, SessionCounter};

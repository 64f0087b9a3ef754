//! Playback coordinator: drives chunks through the speech engine one at a
//! time, keeps the highlight in step, and recovers from interruptions.
//!
//! Cancellation is cooperative. Every run owns a session version and checks
//! it after each suspension point; a run whose version is stale exits
//! without touching speech, highlight or navigation state.

mod builder;
mod events;

pub use builder::CoordinatorBuilder;
pub use events::{ChunkEvent, RunOutcome};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{Mutex as AsyncMutex, broadcast, mpsc};
use tokio::time::sleep;

use crate::chunk::{Chunk, VoiceRole};
use crate::classifier::{Interruption, InterruptionClassifier, SpeakSignal};
use crate::config::NarrationConfig;
use crate::error::{NarrationError, Result};
use crate::highlight::{HighlightState, HighlightSynchronizer};
use crate::keepalive::KeepAliveSignal;
use crate::ports::{
    Chunker, MediaAction, NavigationSignal, RestoreHint, SpeechEngine, SpeechOutcome,
    StartNotifier, StatusReporter, Visibility,
};
use crate::session::{NarrationSnapshot, NarrationState, PlaybackState, SessionCounter};

/// Capacity of the chunk event channel.
const EVENT_CAPACITY: usize = 64;

pub const STATUS_SPEAKING: &str = "Speaking…";
pub const STATUS_READY: &str = "Ready";
pub const STATUS_PAUSED: &str = "Paused";
pub const STATUS_STOPPED: &str = "Stopped";

/// Collaborators handed over by the builder.
struct Parts {
    config: NarrationConfig,
    chunker: Arc<dyn Chunker>,
    speech: Arc<dyn SpeechEngine>,
    highlighter: HighlightSynchronizer,
    navigation: Arc<dyn NavigationSignal>,
    visibility: Arc<dyn Visibility>,
    status: Arc<dyn StatusReporter>,
    restore: Option<Arc<dyn RestoreHint>>,
    keep_alive: Option<KeepAliveSignal>,
}

struct Inner {
    config: NarrationConfig,
    sessions: SessionCounter,
    /// Lock order: `state` before `highlighter`. Never held across an await.
    state: Mutex<NarrationState>,
    highlighter: Mutex<HighlightSynchronizer>,
    classifier: InterruptionClassifier,
    chunker: Arc<dyn Chunker>,
    speech: Arc<dyn SpeechEngine>,
    navigation: Arc<dyn NavigationSignal>,
    visibility: Arc<dyn Visibility>,
    status: Arc<dyn StatusReporter>,
    restore: Option<Arc<dyn RestoreHint>>,
    keep_alive: Option<KeepAliveSignal>,
    /// Set by `seek` while it moves the position
    seeking: AtomicBool,
    /// Held while a one-off utterance is being spoken
    one_off: AsyncMutex<()>,
    events: broadcast::Sender<ChunkEvent>,
}

/// Narration scheduler and state machine.
///
/// Cloning is cheap and shares the same coordinator, so one task can run
/// `start()` while another calls `pause()` or `stop()`.
#[derive(Clone)]
pub struct PlaybackCoordinator {
    inner: Arc<Inner>,
}

impl PlaybackCoordinator {
    pub fn builder(config: NarrationConfig) -> CoordinatorBuilder {
        CoordinatorBuilder::new(config)
    }

    fn from_parts(parts: Parts) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let state = NarrationState::new(parts.config.autoplay);

        Self {
            inner: Arc::new(Inner {
                config: parts.config,
                sessions: SessionCounter::new(),
                state: Mutex::new(state),
                highlighter: Mutex::new(parts.highlighter),
                classifier: InterruptionClassifier::new(),
                chunker: parts.chunker,
                speech: parts.speech,
                navigation: parts.navigation,
                visibility: parts.visibility,
                status: parts.status,
                restore: parts.restore,
                keep_alive: parts.keep_alive,
                seeking: AtomicBool::new(false),
                one_off: AsyncMutex::new(()),
                events,
            }),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, NarrationState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_highlighter(&self) -> MutexGuard<'_, HighlightSynchronizer> {
        self.inner.highlighter.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_current(&self, version: u64) -> bool {
        self.inner.sessions.is_current(version)
    }

    fn is_navigating(&self) -> bool {
        self.inner.seeking.load(Ordering::SeqCst) || self.inner.navigation.is_navigating()
    }

    fn report(&self, status: &str) {
        log::debug!("Status: {}", status);
        self.inner.status.report(status);
    }

    fn start_keep_alive(&self) {
        if let Some(keep_alive) = &self.inner.keep_alive {
            if let Err(e) = keep_alive.start() {
                log::warn!("Keep-alive unavailable: {}", e);
            }
        }
    }

    fn stop_keep_alive(&self) {
        if let Some(keep_alive) = &self.inner.keep_alive {
            keep_alive.stop();
        }
    }

    /// Retire the live session's right to speak and allocate a new version.
    ///
    /// The version is bumped under the state lock, so a stale run can never
    /// pass its version check and then highlight over the new session.
    fn claim_version(&self) -> u64 {
        let mut state = self.lock_state();
        let version = self.inner.sessions.new_version();
        state.version = version;
        version
    }

    /// Ask the chunker for chunks, reporting failures to the user.
    async fn load_chunks(&self, version: u64) -> Result<Vec<Chunk>> {
        match self.inner.chunker.ensure_chunks_ready().await {
            Ok(chunks) => Ok(chunks),
            Err(e) => {
                let reason = match e {
                    NarrationError::ChunkingFailed(reason) => reason,
                    other => other.to_string(),
                };
                log::warn!("Chunker not ready: {}", reason);
                if self.is_current(version) {
                    self.report(&format!("Narration unavailable: {}", reason));
                }
                Err(NarrationError::ChunkingFailed(reason))
            }
        }
    }

    /// Start narrating at `from_index`, superseding any running session.
    ///
    /// Resolves when this run's chunk loop exits.
    pub async fn start(&self, from_index: usize) -> Result<RunOutcome> {
        // Let a one-off utterance finish before narration takes the engine
        drop(self.inner.one_off.lock().await);

        let was_playing = {
            let mut state = self.lock_state();
            let playing = state.state == PlaybackState::Playing;
            if playing {
                state.state = PlaybackState::Paused;
                state.awaiting_content = false;
            }
            playing
        };
        if was_playing {
            log::debug!("Stopping running session before restart");
            self.inner.speech.cancel();
            sleep(self.inner.config.restart_settle()).await;
        }

        let version = self.claim_version();
        log::info!("Narration session {} starting at chunk {}", version, from_index);

        let chunks = self.load_chunks(version).await?;
        if !self.is_current(version) {
            return Ok(RunOutcome::Superseded);
        }

        {
            let mut state = self.lock_state();
            state.current_index = from_index.min(chunks.len());
            state.chunks = chunks;
            state.state = PlaybackState::Playing;
            state.awaiting_content = false;
        }

        self.start_keep_alive();
        self.report(STATUS_SPEAKING);
        Ok(self.run_chunks(version).await)
    }

    /// Start at the restored position if one was supplied, else at the top.
    pub async fn start_restored(&self) -> Result<RunOutcome> {
        let from_index = self
            .inner
            .restore
            .as_ref()
            .and_then(|hint| hint.take_start_index())
            .unwrap_or(0);
        self.start(from_index).await
    }

    /// Continue from the current position.
    pub async fn resume(&self) -> Result<RunOutcome> {
        let from_index = self.lock_state().current_index;
        self.start(from_index).await
    }

    /// Halt narration, keeping position and highlight.
    pub fn pause(&self) {
        let paused = {
            let mut state = self.lock_state();
            if state.state == PlaybackState::Playing {
                state.state = PlaybackState::Paused;
                state.awaiting_content = false;
                true
            } else {
                false
            }
        };

        if paused {
            self.inner.speech.cancel();
            log::info!("Narration paused");
            self.report(STATUS_PAUSED);
        }
    }

    /// Cancel speech immediately and halt narration.
    pub fn stop(&self, preserve_highlight: bool) {
        self.halt(preserve_highlight);
        self.stop_keep_alive();
        log::info!("Narration stopped");
        self.report(STATUS_STOPPED);
    }

    fn halt(&self, preserve_highlight: bool) {
        self.inner.speech.cancel();

        let mut state = self.lock_state();
        state.state = PlaybackState::Paused;
        state.interrupted = false;
        state.awaiting_content = false;
        if !preserve_highlight {
            self.lock_highlighter().clear();
        }
    }

    /// Jump to chunk `index` and narrate from there.
    pub async fn seek(&self, index: usize) -> Result<RunOutcome> {
        self.inner.seeking.store(true, Ordering::SeqCst);
        self.halt(true);
        sleep(self.inner.config.restart_settle()).await;
        self.inner.seeking.store(false, Ordering::SeqCst);
        self.start(index).await
    }

    /// Narrate chunks appended since an autoplay run caught up.
    ///
    /// Returns `None` when the coordinator is not armed for new content.
    pub async fn content_appended(&self) -> Result<Option<RunOutcome>> {
        let armed = {
            let state = self.lock_state();
            state.awaiting_content && state.state == PlaybackState::Playing
        };
        if !armed {
            return Ok(None);
        }

        let version = self.claim_version();
        let chunks = self.load_chunks(version).await?;
        if !self.is_current(version) {
            return Ok(Some(RunOutcome::Superseded));
        }

        {
            let mut state = self.lock_state();
            if state.state != PlaybackState::Playing {
                return Ok(Some(RunOutcome::Halted));
            }
            log::debug!(
                "Content appended: {} -> {} chunks",
                state.chunks.len(),
                chunks.len()
            );
            state.chunks = chunks;
            state.awaiting_content = false;
        }

        Ok(Some(self.run_chunks(version).await))
    }

    /// Speak a one-off application message, holding narration back until it ends.
    pub async fn announce(&self, text: &str) -> SpeechOutcome {
        let _gate = self.inner.one_off.lock().await;
        self.inner
            .speech
            .speak(text, VoiceRole::AppVoice, StartNotifier::detached())
            .await
    }

    /// Enable or disable autoplay.
    ///
    /// Disabling while armed for new content finishes narration.
    pub fn set_autoplay(&self, enabled: bool) {
        let finished = {
            let mut state = self.lock_state();
            state.autoplay_enabled = enabled;
            if !enabled && state.awaiting_content {
                state.awaiting_content = false;
                state.state = PlaybackState::Completed;
                true
            } else {
                false
            }
        };

        if finished {
            self.stop_keep_alive();
            self.report(STATUS_READY);
        }
    }

    /// Route a lock-screen / media-key action.
    pub async fn handle_media_action(&self, action: MediaAction) -> Result<Option<RunOutcome>> {
        log::debug!("Media action: {:?}", action);
        match action {
            MediaAction::Play => self.resume().await.map(Some),
            MediaAction::Pause => {
                self.pause();
                Ok(None)
            }
            MediaAction::Stop => {
                self.stop(false);
                Ok(None)
            }
        }
    }

    /// Media actions delivered by the keep-alive backend. Only the first call gets them.
    pub fn media_actions(&self) -> Option<mpsc::UnboundedReceiver<MediaAction>> {
        self.inner.keep_alive.as_ref().and_then(|k| k.take_actions())
    }

    pub fn keep_alive_active(&self) -> bool {
        self.inner
            .keep_alive
            .as_ref()
            .map(|k| k.is_active())
            .unwrap_or(false)
    }

    pub fn snapshot(&self) -> NarrationSnapshot {
        NarrationSnapshot::from(&*self.lock_state())
    }

    pub fn highlight_state(&self) -> HighlightState {
        self.lock_highlighter().state()
    }

    /// Receive a [`ChunkEvent`] for every highlight attempt.
    pub fn subscribe(&self) -> broadcast::Receiver<ChunkEvent> {
        self.inner.events.subscribe()
    }

    /// The chunk loop. Runs one chunk at a time until the end of the list or
    /// until pause, stop, navigation or supersession.
    async fn run_chunks(&self, version: u64) -> RunOutcome {
        let mut first_chunk = true;
        let mut reported_error = false;

        loop {
            let (index, chunk) = {
                let mut state = self.lock_state();
                if !self.is_current(version) {
                    return RunOutcome::Superseded;
                }
                if state.state != PlaybackState::Playing || self.is_navigating() {
                    return RunOutcome::Halted;
                }
                if state.take_interrupted() {
                    log::debug!("Retrying chunk {} after interruption", state.current_index);
                }
                if state.is_finished() {
                    break;
                }
                (state.current_index, state.chunks[state.current_index].clone())
            };

            if first_chunk {
                first_chunk = false;
                sleep(self.inner.config.render_settle()).await;
                if !self.is_current(version) {
                    return RunOutcome::Superseded;
                }
            }

            drop(self.inner.one_off.lock().await);

            let (highlighted, total_chunks) = {
                let state = self.lock_state();
                if !self.is_current(version) {
                    return RunOutcome::Superseded;
                }
                if state.state != PlaybackState::Playing || self.is_navigating() {
                    return RunOutcome::Halted;
                }

                let mut highlighter = self.lock_highlighter();
                let highlighted = highlighter.highlight(&state, index);
                if !highlighted {
                    highlighter.clear();
                } else if self.inner.config.auto_scroll {
                    highlighter.scroll_into_view(index);
                }
                (highlighted, state.total_chunks())
            };

            // No subscribers is fine
            let _ = self.inner.events.send(ChunkEvent {
                chunk_index: index,
                chunk_text: chunk.text.clone(),
                total_chunks,
                highlight_succeeded: highlighted,
            });

            let signal = self.speak_watched(&chunk).await;
            if !self.is_current(version) {
                log::debug!("Session {} superseded while speaking chunk {}", version, index);
                return RunOutcome::Superseded;
            }

            let verdict = {
                let state = self.lock_state();
                self.inner
                    .classifier
                    .classify(&signal, &state, self.inner.visibility.is_visible())
            };

            match verdict {
                Interruption::NormalEnd => {
                    if !self.advance_if_playing() {
                        log::debug!("Chunk {} ended after playback halted; keeping position", index);
                        return RunOutcome::Halted;
                    }
                    if reported_error {
                        reported_error = false;
                        self.report(STATUS_SPEAKING);
                    }
                }
                Interruption::EngineFailure(detail) => {
                    log::warn!("Speech failed on chunk {}: {}", index, detail);
                    self.report(&format!("TTS error: {}", detail));
                    reported_error = true;
                    if !self.advance_if_playing() {
                        return RunOutcome::Halted;
                    }
                }
                Interruption::SystemInterruption => {
                    let halted = {
                        let mut state = self.lock_state();
                        state.interrupted = true;
                        state.state != PlaybackState::Playing || self.is_navigating()
                    };
                    if halted {
                        log::debug!("Chunk {} interrupted while halted; leaving for resume", index);
                        return RunOutcome::Halted;
                    }

                    // Unbounded: interruptions are assumed to be transient
                    log::info!("Chunk {} interrupted by the system; retrying", index);
                    sleep(self.inner.config.retry_settle()).await;
                    if !self.is_current(version) {
                        return RunOutcome::Superseded;
                    }
                }
                Interruption::UserStop => {
                    log::debug!("Chunk {} stopped by user", index);
                    return RunOutcome::Halted;
                }
            }
        }

        self.finish(version)
    }

    /// Move to the next chunk unless pause or stop landed while the
    /// current one was being spoken.
    fn advance_if_playing(&self) -> bool {
        let mut state = self.lock_state();
        if state.state != PlaybackState::Playing {
            return false;
        }
        state.current_index += 1;
        true
    }

    /// Completion handling once every chunk has been spoken.
    fn finish(&self, version: u64) -> RunOutcome {
        {
            let mut state = self.lock_state();
            if !self.is_current(version) {
                return RunOutcome::Superseded;
            }

            let mut highlighter = self.lock_highlighter();
            highlighter.clear();

            if state.autoplay_enabled {
                state.awaiting_content = true;
                log::info!("Narration caught up at chunk {}; waiting for more", state.current_index);
                return RunOutcome::AwaitingContent;
            }

            highlighter.scroll_to_end();
            state.state = PlaybackState::Completed;
            state.current_index = state.chunks.len();
        }

        log::info!("Narration session {} completed", version);
        self.stop_keep_alive();
        self.report(STATUS_READY);
        RunOutcome::Completed
    }

    /// Speak one chunk, cancelling it if audio never starts.
    async fn speak_watched(&self, chunk: &Chunk) -> SpeakSignal {
        let (notifier, mut started) = StartNotifier::channel();
        let mut speak = self.inner.speech.speak(&chunk.text, chunk.voice_role, notifier);
        let start_timeout = sleep(self.inner.config.speech_start_timeout());
        tokio::pin!(start_timeout);
        let mut waiting_for_start = true;

        loop {
            tokio::select! {
                biased;
                outcome = &mut speak => return SpeakSignal::Outcome(outcome),
                // A dropped notifier means the engine does not report starts
                _ = &mut started, if waiting_for_start => waiting_for_start = false,
                _ = &mut start_timeout, if waiting_for_start => {
                    log::warn!(
                        "Speech did not start within {:?}; cancelling",
                        self.inner.config.speech_start_timeout()
                    );
                    self.inner.speech.cancel();
                    return SpeakSignal::StartTimeout;
                }
            }
        }
    }
}

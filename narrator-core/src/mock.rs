//! In-memory collaborators for testing
//!
//! Scriptable stand-ins for the speech engine, chunker, renderer and the
//! other platform ports, so coordinator behavior can be exercised without
//! audio or a display.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, mpsc};

use crate::chunk::{Chunk, VoiceRole};
use crate::error::{NarrationError, Result};
use crate::highlight::{Container, Node, Region, TextRange, Viewport};
use crate::ports::{
    Chunker, ContentSurface, HighlightRenderer, KeepAliveBackend, MediaAction, NavigationSignal,
    RestoreHint, SpeechEngine, SpeechErrorKind, SpeechOutcome, StartNotifier, StatusReporter,
    Visibility,
};

/// What the scripted engine does with one speak call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechStep {
    /// Start, speak for the configured duration, then end
    Finish,
    /// Start and keep speaking until cancelled
    Hold,
    /// Never report a start; wait until cancelled
    NeverStart,
    /// Start, then fail with the given error
    Fail(SpeechErrorKind),
}

/// A speech engine that follows a script, one step per speak call
///
/// Calls beyond the script use the default step. Like a platform engine,
/// a new speak call cancels whatever was in flight.
pub struct ScriptedSpeechEngine {
    script: Mutex<VecDeque<SpeechStep>>,
    default_step: SpeechStep,
    /// How long a `Finish` step speaks for
    duration: Duration,
    calls: Mutex<Vec<(String, VoiceRole)>>,
    spoke: Notify,
    generation: AtomicU64,
    cancelled: Notify,
    cancel_count: AtomicUsize,
    /// While set, speak calls wait before claiming the engine
    setup_held: AtomicBool,
    setup_released: Notify,
}

impl ScriptedSpeechEngine {
    /// Create an engine that finishes every utterance almost immediately
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default_step: SpeechStep::Finish,
            duration: Duration::from_millis(5),
            calls: Mutex::new(Vec::new()),
            spoke: Notify::new(),
            generation: AtomicU64::new(0),
            cancelled: Notify::new(),
            cancel_count: AtomicUsize::new(0),
            setup_held: AtomicBool::new(false),
            setup_released: Notify::new(),
        }
    }

    /// Make speak calls wait in setup, before the utterance is registered,
    /// until [`release_setup`](Self::release_setup). A cancel during setup
    /// finds nothing to cancel.
    pub fn hold_setup(&self) {
        self.setup_held.store(true, Ordering::SeqCst);
    }

    pub fn release_setup(&self) {
        self.setup_held.store(false, Ordering::SeqCst);
        self.setup_released.notify_waiters();
    }

    async fn wait_for_setup(&self) {
        loop {
            let notified = self.setup_released.notified();
            if !self.setup_held.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }

    /// Steps for the first calls, in order
    pub fn with_script(self, steps: impl IntoIterator<Item = SpeechStep>) -> Self {
        *self.script.lock().unwrap_or_else(|e| e.into_inner()) = steps.into_iter().collect();
        self
    }

    /// Step used once the script runs out
    pub fn with_default(mut self, step: SpeechStep) -> Self {
        self.default_step = step;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Append a step to the remaining script
    pub fn push_step(&self, step: SpeechStep) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(step);
    }

    /// Texts passed to speak, in call order
    pub fn spoken(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(text, _)| text.clone())
            .collect()
    }

    /// Voice roles passed to speak, in call order
    pub fn roles(&self) -> Vec<VoiceRole> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, role)| *role)
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn cancel_count(&self) -> usize {
        self.cancel_count.load(Ordering::SeqCst)
    }

    /// Wait until speak has been called at least `n` times
    pub async fn wait_for_calls(&self, n: usize) {
        loop {
            let notified = self.spoke.notified();
            if self.call_count() >= n {
                return;
            }
            notified.await;
        }
    }

    fn next_step(&self) -> SpeechStep {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| self.default_step.clone())
    }

    fn interrupt(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.cancelled.notify_waiters();
    }

    async fn wait_for_cancel(&self, generation: u64) {
        loop {
            let notified = self.cancelled.notified();
            if self.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            notified.await;
        }
    }
}

impl Default for ScriptedSpeechEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechEngine for ScriptedSpeechEngine {
    async fn speak(&self, text: &str, role: VoiceRole, mut started: StartNotifier) -> SpeechOutcome {
        let step = self.next_step();
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((text.to_string(), role));
        self.spoke.notify_waiters();
        self.wait_for_setup().await;

        // A new utterance replaces the one in flight
        self.interrupt();
        let generation = self.generation.load(Ordering::SeqCst);

        match step {
            SpeechStep::Finish => {
                started.notify();
                tokio::select! {
                    _ = tokio::time::sleep(self.duration) => SpeechOutcome::Ended,
                    _ = self.wait_for_cancel(generation) => {
                        SpeechOutcome::Errored(SpeechErrorKind::Interrupted)
                    }
                }
            }
            SpeechStep::Hold => {
                started.notify();
                self.wait_for_cancel(generation).await;
                SpeechOutcome::Errored(SpeechErrorKind::Interrupted)
            }
            SpeechStep::NeverStart => {
                self.wait_for_cancel(generation).await;
                SpeechOutcome::Errored(SpeechErrorKind::Canceled)
            }
            SpeechStep::Fail(kind) => {
                started.notify();
                SpeechOutcome::Errored(kind)
            }
        }
    }

    fn cancel(&self) {
        self.cancel_count.fetch_add(1, Ordering::SeqCst);
        self.interrupt();
    }
}

/// A chunker over a fixed list of texts
pub struct StaticChunker {
    chunks: Mutex<Vec<Chunk>>,
    failure: Mutex<Option<String>>,
    call_count: AtomicUsize,
}

impl StaticChunker {
    pub fn from_texts(texts: &[&str]) -> Self {
        Self {
            chunks: Mutex::new(texts.iter().map(|t| Chunk::new(*t)).collect()),
            failure: Mutex::new(None),
            call_count: AtomicUsize::new(0),
        }
    }

    /// A chunker that always fails with `reason`
    pub fn failing(reason: &str) -> Self {
        let chunker = Self::from_texts(&[]);
        *chunker.failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(reason.to_string());
        chunker
    }

    /// Append chunks, as streaming content would
    pub fn append(&self, texts: &[&str]) {
        self.chunks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(texts.iter().map(|t| Chunk::new(*t)));
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Chunker for StaticChunker {
    async fn ensure_chunks_ready(&self) -> Result<Vec<Chunk>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.failure.lock().unwrap_or_else(|e| e.into_inner()).clone() {
            return Err(NarrationError::ChunkingFailed(reason));
        }
        Ok(self.chunks.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }
}

/// A renderer that remembers the active ranges of each named highlight
#[derive(Default)]
pub struct RecordingRenderer {
    active: Mutex<HashMap<String, Vec<TextRange>>>,
    set_count: AtomicUsize,
    clear_count: AtomicUsize,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ranges currently shown for `name`
    pub fn active(&self, name: &str) -> Option<Vec<TextRange>> {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    pub fn set_count(&self) -> usize {
        self.set_count.load(Ordering::SeqCst)
    }

    pub fn clear_count(&self) -> usize {
        self.clear_count.load(Ordering::SeqCst)
    }
}

impl HighlightRenderer for RecordingRenderer {
    fn set_highlight(&self, name: &str, ranges: Vec<TextRange>) {
        self.set_count.fetch_add(1, Ordering::SeqCst);
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), ranges);
    }

    fn clear_highlight(&self, name: &str) {
        self.clear_count.fetch_add(1, Ordering::SeqCst);
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name);
    }
}

/// Rendered content held in memory
///
/// Every node is one line of `line_height`, so a marker's offset is its
/// node index times the line height.
pub struct MemorySurface {
    regions: Mutex<HashMap<Region, Container>>,
    line_height: f64,
    viewport: Mutex<Viewport>,
    scrolled_to_end: AtomicBool,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self {
            regions: Mutex::new(HashMap::new()),
            line_height: 20.0,
            viewport: Mutex::new(Viewport {
                scroll_top: 0.0,
                height: 400.0,
                keyboard_inset: 0.0,
            }),
            scrolled_to_end: AtomicBool::new(false),
        }
    }

    /// Main region with `start i`, text, `end i` for every chunk
    pub fn from_chunks(texts: &[&str]) -> Self {
        let surface = Self::new();
        surface.append_chunks(0, texts);
        surface
    }

    pub fn with_region(self, region: Region, nodes: Vec<Node>) -> Self {
        self.regions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(region, Container::new(nodes));
        self
    }

    pub fn with_line_height(mut self, line_height: f64) -> Self {
        self.line_height = line_height;
        self
    }

    pub fn with_viewport(self, viewport: Viewport) -> Self {
        *self.viewport.lock().unwrap_or_else(|e| e.into_inner()) = viewport;
        self
    }

    /// Render more chunks into the main region, numbered from `first_index`
    pub fn append_chunks(&self, first_index: usize, texts: &[&str]) {
        let mut regions = self.regions.lock().unwrap_or_else(|e| e.into_inner());
        let main = regions.entry(Region::Main).or_default();
        for (offset, text) in texts.iter().enumerate() {
            let index = first_index + offset;
            main.nodes.push(Node::start(index));
            main.nodes.push(Node::text(*text));
            main.nodes.push(Node::end(index));
        }
    }

    pub fn scrolled_to_end(&self) -> bool {
        self.scrolled_to_end.load(Ordering::SeqCst)
    }

    fn content_height(&self) -> f64 {
        let regions = self.regions.lock().unwrap_or_else(|e| e.into_inner());
        let lines = regions.get(&Region::Main).map(|c| c.nodes.len()).unwrap_or(0);
        lines as f64 * self.line_height
    }
}

impl Default for MemorySurface {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentSurface for MemorySurface {
    fn container(&self, region: Region) -> Option<Container> {
        self.regions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&region)
            .cloned()
    }

    fn marker_offset(&self, region: Region, node: usize) -> Option<f64> {
        let regions = self.regions.lock().unwrap_or_else(|e| e.into_inner());
        let container = regions.get(&region)?;
        (node < container.nodes.len()).then(|| node as f64 * self.line_height)
    }

    fn viewport(&self) -> Viewport {
        *self.viewport.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn scroll_to(&self, top: f64) {
        self.viewport.lock().unwrap_or_else(|e| e.into_inner()).scroll_top = top;
    }

    fn scroll_to_end(&self) {
        let height = self.content_height();
        let mut viewport = self.viewport.lock().unwrap_or_else(|e| e.into_inner());
        viewport.scroll_top = (height - viewport.visible_height()).max(0.0);
        self.scrolled_to_end.store(true, Ordering::SeqCst);
    }
}

/// Collects every reported status line
#[derive(Default)]
pub struct RecordingStatus {
    statuses: Mutex<Vec<String>>,
}

impl RecordingStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.statuses.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn last(&self) -> Option<String> {
        self.statuses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }
}

impl StatusReporter for RecordingStatus {
    fn report(&self, status: &str) {
        self.statuses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(status.to_string());
    }
}

/// Navigation flag toggled by the test
#[derive(Default)]
pub struct FlagNavigation(AtomicBool);

impl FlagNavigation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, navigating: bool) {
        self.0.store(navigating, Ordering::SeqCst);
    }
}

impl NavigationSignal for FlagNavigation {
    fn is_navigating(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Visibility flag toggled by the test
pub struct FlagVisibility(AtomicBool);

impl FlagVisibility {
    pub fn new(visible: bool) -> Self {
        Self(AtomicBool::new(visible))
    }

    pub fn set(&self, visible: bool) {
        self.0.store(visible, Ordering::SeqCst);
    }
}

impl Visibility for FlagVisibility {
    fn is_visible(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A restore hint that yields its index once
pub struct FixedRestoreHint(Mutex<Option<usize>>);

impl FixedRestoreHint {
    pub fn new(index: usize) -> Self {
        Self(Mutex::new(Some(index)))
    }
}

impl RestoreHint for FixedRestoreHint {
    fn take_start_index(&self) -> Option<usize> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

/// Keep-alive backend that counts starts and stops
#[derive(Default)]
pub struct RecordingKeepAlive {
    starts: AtomicUsize,
    stops: AtomicUsize,
    fail: bool,
    handlers: Mutex<Option<mpsc::UnboundedSender<MediaAction>>>,
}

impl RecordingKeepAlive {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose signal never starts
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Simulate a lock-screen button press
    pub fn press(&self, action: MediaAction) {
        if let Some(tx) = self.handlers.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
            let _ = tx.send(action);
        }
    }
}

impl KeepAliveBackend for RecordingKeepAlive {
    fn start_signal(&self) -> Result<()> {
        if self.fail {
            return Err(NarrationError::KeepAlive("audio output unavailable".into()));
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop_signal(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn register_media_handlers(&self, actions: mpsc::UnboundedSender<MediaAction>) {
        *self.handlers.lock().unwrap_or_else(|e| e.into_inner()) = Some(actions);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_engine_follows_script() {
        let engine = ScriptedSpeechEngine::new().with_script([
            SpeechStep::Fail(SpeechErrorKind::Other("synthesis-failed".into())),
            SpeechStep::Finish,
        ]);

        let first = engine.speak("one", VoiceRole::Narrator, StartNotifier::detached()).await;
        let second = engine.speak("two", VoiceRole::AppVoice, StartNotifier::detached()).await;

        assert_eq!(
            first,
            SpeechOutcome::Errored(SpeechErrorKind::Other("synthesis-failed".into()))
        );
        assert_eq!(second, SpeechOutcome::Ended);
        assert_eq!(engine.spoken(), vec!["one", "two"]);
        assert_eq!(engine.roles(), vec![VoiceRole::Narrator, VoiceRole::AppVoice]);
    }

    #[tokio::test]
    async fn test_hold_ends_on_cancel() {
        let engine = std::sync::Arc::new(ScriptedSpeechEngine::new().with_default(SpeechStep::Hold));
        let (notifier, started) = StartNotifier::channel();

        let speaker = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.speak("held", VoiceRole::Narrator, notifier).await })
        };

        started.await.unwrap();
        engine.cancel();
        let outcome = speaker.await.unwrap();
        assert_eq!(outcome, SpeechOutcome::Errored(SpeechErrorKind::Interrupted));
        assert_eq!(engine.cancel_count(), 1);
    }

    #[tokio::test]
    async fn test_static_chunker_append_and_fail() {
        let chunker = StaticChunker::from_texts(&["A."]);
        chunker.append(&["B."]);
        assert_eq!(chunker.ensure_chunks_ready().await.unwrap().len(), 2);

        let failing = StaticChunker::failing("no content");
        assert!(matches!(
            failing.ensure_chunks_ready().await,
            Err(NarrationError::ChunkingFailed(reason)) if reason == "no content"
        ));
    }

    #[test]
    fn test_memory_surface_scroll_to_end() {
        let surface = MemorySurface::from_chunks(&["One.", "Two."])
            .with_line_height(100.0)
            .with_viewport(Viewport {
                scroll_top: 0.0,
                height: 250.0,
                keyboard_inset: 50.0,
            });
        surface.scroll_to_end();
        // 6 nodes * 100 - (250 - 50)
        assert_eq!(surface.viewport().scroll_top, 400.0);
        assert!(surface.scrolled_to_end());
    }
}

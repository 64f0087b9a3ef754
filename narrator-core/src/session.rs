//! Playback sessions: the version token used for cooperative cancellation,
//! and the narration state owned by the coordinator.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::chunk::Chunk;

/// Monotonic counter identifying the live narration run.
///
/// Cloning shares the counter. Version 0 means no session has started.
#[derive(Debug, Clone, Default)]
pub struct SessionCounter {
    version: Arc<AtomicU64>,
}

impl SessionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next version, retiring every older one.
    pub fn new_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Whether `version` is still the live session.
    pub fn is_current(&self, version: u64) -> bool {
        self.version.load(Ordering::SeqCst) == version
    }

    pub fn current(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }
}

/// Coarse playback state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
    Paused,
    Completed,
}

/// Everything the coordinator knows about the current run.
#[derive(Debug, Clone, Default)]
pub struct NarrationState {
    /// Version of the session that owns this state
    pub version: u64,
    /// Ordered chunk list from the chunker
    pub chunks: Vec<Chunk>,
    /// Next chunk to speak
    pub current_index: usize,
    pub state: PlaybackState,
    pub autoplay_enabled: bool,
    /// Set by a system interruption, consumed on the next loop iteration
    pub interrupted: bool,
    /// An autoplay run finished and is waiting for appended chunks
    pub awaiting_content: bool,
}

impl NarrationState {
    pub fn new(autoplay_enabled: bool) -> Self {
        Self {
            autoplay_enabled,
            ..Self::default()
        }
    }

    pub fn total_chunks(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_last_chunk(&self, index: usize) -> bool {
        index + 1 == self.chunks.len()
    }

    pub fn is_finished(&self) -> bool {
        self.current_index >= self.chunks.len()
    }

    /// Take the interruption flag, leaving it cleared.
    pub fn take_interrupted(&mut self) -> bool {
        std::mem::take(&mut self.interrupted)
    }
}

/// Read-only view handed to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrationSnapshot {
    pub version: u64,
    pub current_index: usize,
    pub total_chunks: usize,
    pub state: PlaybackState,
    pub autoplay_enabled: bool,
    pub interrupted: bool,
    pub awaiting_content: bool,
}

impl From<&NarrationState> for NarrationSnapshot {
    fn from(state: &NarrationState) -> Self {
        Self {
            version: state.version,
            current_index: state.current_index,
            total_chunks: state.chunks.len(),
            state: state.state,
            autoplay_enabled: state.autoplay_enabled,
            interrupted: state.interrupted,
            awaiting_content: state.awaiting_content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versions_strictly_increase() {
        let counter = SessionCounter::new();
        assert_eq!(counter.current(), 0);
        let first = counter.new_version();
        let second = counter.new_version();
        assert!(second > first);
        assert!(!counter.is_current(first));
        assert!(counter.is_current(second));
    }

    #[test]
    fn test_cloned_counter_shares_version() {
        let counter = SessionCounter::new();
        let handle = counter.clone();
        let version = counter.new_version();
        assert!(handle.is_current(version));
        handle.new_version();
        assert!(!counter.is_current(version));
    }

    #[test]
    fn test_take_interrupted_clears_flag() {
        let mut state = NarrationState::new(false);
        state.interrupted = true;
        assert!(state.take_interrupted());
        assert!(!state.interrupted);
        assert!(!state.take_interrupted());
    }

    #[test]
    fn test_last_chunk_and_finished() {
        let mut state = NarrationState::new(false);
        state.chunks = vec![Chunk::new("A."), Chunk::new("B.")];
        assert!(!state.is_last_chunk(0));
        assert!(state.is_last_chunk(1));
        assert!(!state.is_finished());
        state.current_index = 2;
        assert!(state.is_finished());
    }
}

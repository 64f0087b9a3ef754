//! What the coordinator reports back to callers.

/// How a chunk loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every chunk was spoken; narration is finished
    Completed,
    /// Every chunk was spoken; autoplay is armed for appended content
    AwaitingContent,
    /// Paused, stopped or navigated away; position and highlight kept
    Halted,
    /// A newer session took over
    Superseded,
}

/// Emitted once per highlight attempt, for automation hooks and progress UIs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkEvent {
    pub chunk_index: usize,
    pub chunk_text: String,
    pub total_chunks: usize,
    pub highlight_succeeded: bool,
}

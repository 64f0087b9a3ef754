//! Text processing for narration: cleaning, sentence splitting, chunking.

pub mod chunker;
mod cleaner;
mod sentences;

use async_trait::async_trait;
use narrator_core::{Chunk, Chunker, NarrationError};
use std::sync::Mutex;

pub use chunker::{MAX_OVERSHOOT, chunk_text};

/// Chunker over a document held in memory.
///
/// The document is chunked once up front; appended text is chunked on its
/// own and added after the existing chunks, so earlier indices never move.
pub struct DocumentChunker {
    chunks: Mutex<Vec<Chunk>>,
    target_size: usize,
}

impl DocumentChunker {
    pub fn new(text: &str, target_size: usize) -> Self {
        let chunks = Self::split(text, target_size);
        log::debug!("Document split into {} chunks", chunks.len());
        Self {
            chunks: Mutex::new(chunks),
            target_size,
        }
    }

    fn split(text: &str, target_size: usize) -> Vec<Chunk> {
        chunk_text(text, target_size, target_size + MAX_OVERSHOOT)
            .into_iter()
            .map(Chunk::new)
            .collect()
    }

    pub fn chunks(&self) -> Vec<Chunk> {
        self.chunks.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Chunk `text` and append it. Returns the index of the first new chunk
    /// and the new chunks.
    pub fn append(&self, text: &str) -> (usize, Vec<Chunk>) {
        let added = Self::split(text, self.target_size);
        let mut chunks = self.chunks.lock().unwrap_or_else(|e| e.into_inner());
        let first_index = chunks.len();
        chunks.extend(added.iter().cloned());
        (first_index, added)
    }
}

#[async_trait]
impl Chunker for DocumentChunker {
    async fn ensure_chunks_ready(&self) -> narrator_core::Result<Vec<Chunk>> {
        let chunks = self.chunks();
        if chunks.is_empty() {
            return Err(NarrationError::ChunkingFailed("no readable text".into()));
        }
        Ok(chunks)
    }
}

//! Saved reading positions, so narration can pick up where it stopped.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use narrator_core::RestoreHint;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Where narration of one document stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingPosition {
    /// Hash of the document the position belongs to
    pub document_hash: String,
    pub document_path: PathBuf,
    /// Chapter narrated, or `None` for the whole document
    #[serde(default)]
    pub chapter: Option<usize>,
    /// Chunk being spoken when the position was saved
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub updated_at: DateTime<Utc>,
}

/// Hash of the first MiB of a document, used as its identity.
pub fn document_hash(path: &Path) -> Result<String> {
    let file = File::open(path).context("Failed to open document for hashing")?;
    let mut head = Vec::with_capacity(1024 * 1024);
    BufReader::new(file)
        .take(1024 * 1024)
        .read_to_end(&mut head)
        .context("Failed to read document for hashing")?;

    let digest = Sha256::digest(&head);
    Ok(format!("{:x}", digest)[..16].to_string())
}

/// JSON files of reading positions, one per document.
pub struct PositionStore {
    dir: PathBuf,
}

impl PositionStore {
    /// Store under the local data directory.
    pub fn open_default() -> Result<Self> {
        let dir = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .map(|d| d.join("narrate").join("positions"))
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Self::open(dir)
    }

    pub fn open(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn file_for(&self, document_hash: &str) -> PathBuf {
        self.dir.join(format!("{}.json", document_hash))
    }

    /// Saved position for a document, if any. Unreadable files count as none.
    pub fn load(&self, document_hash: &str) -> Option<ReadingPosition> {
        let file = File::open(self.file_for(document_hash)).ok()?;
        match serde_json::from_reader(BufReader::new(file)) {
            Ok(position) => Some(position),
            Err(e) => {
                log::warn!("Ignoring corrupt position for {}: {}", document_hash, e);
                None
            }
        }
    }

    pub fn save(&self, position: &ReadingPosition) -> Result<()> {
        let mut position = position.clone();
        position.updated_at = Utc::now();

        let path = self.file_for(&position.document_hash);
        let file = File::create(&path).context("Failed to create position file")?;
        serde_json::to_writer_pretty(BufWriter::new(file), &position)
            .context("Failed to write position JSON")?;
        Ok(())
    }

    /// Forget a document's position (after it was read to the end).
    pub fn clear(&self, document_hash: &str) -> Result<()> {
        match fs::remove_file(self.file_for(document_hash)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("Failed to remove position file"),
        }
    }
}

/// Start index offered to the coordinator once.
pub struct SavedPosition {
    index: Mutex<Option<usize>>,
}

impl SavedPosition {
    pub fn new(index: Option<usize>) -> Self {
        Self {
            index: Mutex::new(index),
        }
    }

    /// Position from the store, if it matches the chapter being read.
    pub fn from_store(store: &PositionStore, document_hash: &str, chapter: Option<usize>) -> Self {
        let index = store
            .load(document_hash)
            .filter(|p| p.chapter == chapter)
            .map(|p| p.chunk_index);
        if let Some(index) = index {
            log::info!("Resuming at chunk {}", index);
        }
        Self::new(index)
    }
}

impl RestoreHint for SavedPosition {
    fn take_start_index(&self) -> Option<usize> {
        self.index.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

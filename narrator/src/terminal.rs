//! Terminal rendering: the document as marker-delimited text, the
//! highlight printed as it moves, and status on a progress bar.

use indicatif::{ProgressBar, ProgressStyle};
use narrator_core::highlight::{Container, Node, Region, TextRange, Viewport};
use narrator_core::{
    Chunk, ContentSurface, HighlightRenderer, KeepAliveBackend, MediaAction, StatusReporter,
};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Virtual height of one terminal row.
const ROW_HEIGHT: f64 = 20.0;

/// Rows assumed when the terminal does not say.
const DEFAULT_ROWS: usize = 24;

/// Progress bar for narration: position follows chunks, message is status.
pub fn progress_bar(total_chunks: usize) -> ProgressBar {
    let bar = ProgressBar::new(total_chunks as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    bar.set_style(style);
    bar
}

fn terminal_rows() -> usize {
    std::env::var("LINES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_ROWS)
}

/// Document content laid out one chunk per row.
///
/// Scrolling is virtual: the terminal scrolls on its own, but the position
/// is tracked so auto-scroll decisions can be logged and tested.
pub struct TerminalSurface {
    regions: Mutex<HashMap<Region, Container>>,
    viewport: Mutex<Viewport>,
    active: Mutex<Option<Vec<TextRange>>>,
    bar: ProgressBar,
}

impl TerminalSurface {
    pub fn new(title: &str, chunks: &[Chunk], bar: ProgressBar) -> Self {
        let mut regions = HashMap::new();
        regions.insert(Region::StatusLine, Container::new(vec![Node::text(title)]));
        regions.insert(Region::Main, Container::default());

        let surface = Self {
            regions: Mutex::new(regions),
            viewport: Mutex::new(Viewport {
                scroll_top: 0.0,
                height: terminal_rows() as f64 * ROW_HEIGHT,
                keyboard_inset: 0.0,
            }),
            active: Mutex::new(None),
            bar,
        };
        surface.append_chunks(0, chunks);
        surface
    }

    /// Lay out chunks numbered from `first_index` after the existing content.
    pub fn append_chunks(&self, first_index: usize, chunks: &[Chunk]) {
        let mut regions = self.regions.lock().unwrap_or_else(|e| e.into_inner());
        let main = regions.entry(Region::Main).or_default();
        for (offset, chunk) in chunks.iter().enumerate() {
            let index = first_index + offset;
            main.nodes.push(Node::start(index));
            main.nodes.push(Node::text(chunk.text.as_str()));
            main.nodes.push(Node::end(index));
        }
    }

    /// Text covered by `ranges`, joined with spaces.
    fn range_text(&self, ranges: &[TextRange]) -> String {
        let regions = self.regions.lock().unwrap_or_else(|e| e.into_inner());
        ranges
            .iter()
            .filter_map(|range| match regions.get(&range.region)?.nodes.get(range.node)? {
                Node::Text(text) => text.get(range.start..range.end).map(str::to_string),
                Node::Marker(_) => None,
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn highlighted_text(&self) -> Option<String> {
        let active = self.active.lock().unwrap_or_else(|e| e.into_inner()).clone()?;
        Some(self.range_text(&active))
    }

    fn rows_before(container: &Container, node: usize) -> usize {
        container.nodes[..node]
            .iter()
            .filter(|n| matches!(n, Node::Text(_)))
            .count()
    }
}

impl ContentSurface for TerminalSurface {
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
        if node >= container.nodes.len() {
            return None;
        }
        Some(Self::rows_before(container, node) as f64 * ROW_HEIGHT)
    }

    fn viewport(&self) -> Viewport {
        *self.viewport.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn scroll_to(&self, top: f64) {
        log::debug!("Scroll to row {}", (top / ROW_HEIGHT).round());
        self.viewport.lock().unwrap_or_else(|e| e.into_inner()).scroll_top = top;
    }

    fn scroll_to_end(&self) {
        let rows = {
            let regions = self.regions.lock().unwrap_or_else(|e| e.into_inner());
            regions
                .get(&Region::Main)
                .map(|c| Self::rows_before(c, c.nodes.len()))
                .unwrap_or(0)
        };
        let mut viewport = self.viewport.lock().unwrap_or_else(|e| e.into_inner());
        viewport.scroll_top = (rows as f64 * ROW_HEIGHT - viewport.visible_height()).max(0.0);
    }
}

impl HighlightRenderer for TerminalSurface {
    fn set_highlight(&self, _name: &str, ranges: Vec<TextRange>) {
        let text = self.range_text(&ranges);
        self.bar.println(format!("» {}", text));
        *self.active.lock().unwrap_or_else(|e| e.into_inner()) = Some(ranges);
    }

    fn clear_highlight(&self, _name: &str) {
        *self.active.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

/// Shows status text as the progress bar message.
pub struct ProgressStatus {
    bar: ProgressBar,
}

impl ProgressStatus {
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl StatusReporter for ProgressStatus {
    fn report(&self, status: &str) {
        log::debug!("Status: {}", status);
        self.bar.set_message(status.to_string());
    }
}

/// Media session for the terminal: keyboard controls stand in for media keys.
///
/// There is no background audio to keep alive in a terminal, so the signal
/// only logs its lifecycle.
#[derive(Default)]
pub struct TerminalMediaSession {
    handlers: Mutex<Option<mpsc::UnboundedSender<MediaAction>>>,
}

impl TerminalMediaSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a key press as a media action. Returns false before the
    /// session has been registered.
    pub fn press(&self, action: MediaAction) -> bool {
        match self.handlers.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
            Some(tx) => tx.send(action).is_ok(),
            None => false,
        }
    }
}

impl KeepAliveBackend for TerminalMediaSession {
    fn start_signal(&self) -> narrator_core::Result<()> {
        log::debug!("Media session active");
        Ok(())
    }

    fn stop_signal(&self) {
        log::debug!("Media session idle");
    }

    fn register_media_handlers(&self, actions: mpsc::UnboundedSender<MediaAction>) {
        *self.handlers.lock().unwrap_or_else(|e| e.into_inner()) = Some(actions);
    }
}

//! Highlight synchronization: maps a chunk index to text ranges in the
//! rendered content, applies them as a named overlay, and keeps the chunk
//! scrolled into view.

mod content;
mod scroll;

pub use content::{Container, Marker, MarkerEdge, Node, Region, TextRange, Viewport};
pub use scroll::ScrollPolicy;

use std::sync::Arc;

use crate::ports::{ContentSurface, HighlightRenderer};
use crate::session::NarrationState;

/// Name of the overlay used for the spoken chunk.
pub const HIGHLIGHT_NAME: &str = "narration";

/// Which chunk is currently highlighted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HighlightState {
    pub active_chunk_index: Option<usize>,
}

/// Where a chunk's start marker was found.
struct MarkerLocation {
    region: Region,
    container: Container,
    node: usize,
}

pub struct HighlightSynchronizer {
    renderer: Arc<dyn HighlightRenderer>,
    surface: Arc<dyn ContentSurface>,
    scroll: ScrollPolicy,
    state: HighlightState,
}

impl HighlightSynchronizer {
    pub fn new(renderer: Arc<dyn HighlightRenderer>, surface: Arc<dyn ContentSurface>) -> Self {
        Self {
            renderer,
            surface,
            scroll: ScrollPolicy::default(),
            state: HighlightState::default(),
        }
    }

    pub fn with_scroll_policy(mut self, scroll: ScrollPolicy) -> Self {
        self.scroll = scroll;
        self
    }

    pub fn state(&self) -> HighlightState {
        self.state
    }

    /// Find the start marker for `index`, searching regions in priority order.
    fn locate(&self, index: usize) -> Option<MarkerLocation> {
        Region::SEARCH_ORDER.iter().find_map(|&region| {
            let container = self.surface.container(region)?;
            let node = container.find_marker(index, MarkerEdge::Start, 0)?;
            Some(MarkerLocation {
                region,
                container,
                node,
            })
        })
    }

    /// Compute the trimmed sub-ranges covering chunk `index`.
    ///
    /// Returns `None` when the chunk has no start marker, no usable end, or
    /// no visible text.
    pub fn chunk_ranges(&self, state: &NarrationState, index: usize) -> Option<Vec<TextRange>> {
        let MarkerLocation {
            region,
            container,
            node: start,
        } = self.locate(index)?;

        let end = match container.find_marker(index, MarkerEdge::End, start + 1) {
            Some(end) => end,
            None if state.is_last_chunk(index) => container.nodes.len(),
            None => return None,
        };

        if end <= start + 1 {
            return None;
        }

        let ranges: Vec<TextRange> = container.nodes[start + 1..end]
            .iter()
            .enumerate()
            .filter_map(|(offset, node)| match node {
                Node::Text(text) => trimmed_span(text).map(|(from, to)| TextRange {
                    region,
                    node: start + 1 + offset,
                    start: from,
                    end: to,
                }),
                Node::Marker(_) => None,
            })
            .collect();

        if ranges.is_empty() { None } else { Some(ranges) }
    }

    /// Highlight chunk `index`, replacing any previous highlight.
    ///
    /// Returns false when the chunk cannot be located; the previous
    /// highlight is left for the caller to clear.
    pub fn highlight(&mut self, state: &NarrationState, index: usize) -> bool {
        match self.chunk_ranges(state, index) {
            Some(ranges) => {
                self.renderer.set_highlight(HIGHLIGHT_NAME, ranges);
                self.state.active_chunk_index = Some(index);
                true
            }
            None => {
                log::debug!("No highlight range for chunk {}", index);
                false
            }
        }
    }

    /// Remove the narration highlight if one is shown.
    pub fn clear(&mut self) {
        if self.state.active_chunk_index.take().is_some() {
            self.renderer.clear_highlight(HIGHLIGHT_NAME);
        }
    }

    /// Scroll so chunk `index` sits just below the top of the viewport.
    ///
    /// Returns whether a scroll was issued.
    pub fn scroll_into_view(&self, index: usize) -> bool {
        let Some(location) = self.locate(index) else {
            return false;
        };
        let Some(offset) = self.surface.marker_offset(location.region, location.node) else {
            return false;
        };

        match self.scroll.scroll_target(offset, &self.surface.viewport()) {
            Some(top) => {
                self.surface.scroll_to(top);
                true
            }
            None => false,
        }
    }

    pub fn scroll_to_end(&self) {
        self.surface.scroll_to_end();
    }
}

/// Byte span of `text` without surrounding whitespace, if any content remains.
fn trimmed_span(text: &str) -> Option<(usize, usize)> {
    let start = text.len() - text.trim_start().len();
    let end = text.trim_end().len();
    if start < end { Some((start, end)) } else { None }
}

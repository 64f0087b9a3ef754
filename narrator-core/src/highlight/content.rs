//! Rendered-content model: flattened node lists with chunk boundary markers.

use serde::{Deserialize, Serialize};

/// Content regions, in the order they are searched for markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    /// Single-line status area
    StatusLine,
    /// Secondary region above the main text
    Upper,
    /// Primary scrolling content
    Main,
}

impl Region {
    /// Marker search order.
    pub const SEARCH_ORDER: [Region; 3] = [Region::StatusLine, Region::Upper, Region::Main];
}

/// Which end of a chunk a marker sits at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkerEdge {
    Start,
    End,
}

/// Zero-width chunk boundary embedded by the chunker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    pub index: usize,
    pub edge: MarkerEdge,
}

/// One node of rendered content, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Node {
    Text(String),
    Marker(Marker),
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn start(index: usize) -> Self {
        Self::Marker(Marker {
            index,
            edge: MarkerEdge::Start,
        })
    }

    pub fn end(index: usize) -> Self {
        Self::Marker(Marker {
            index,
            edge: MarkerEdge::End,
        })
    }
}

/// The nodes rendered in one region.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Container {
    pub nodes: Vec<Node>,
}

impl Container {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// Position of the marker `(index, edge)`, searching from `from`.
    pub fn find_marker(&self, index: usize, edge: MarkerEdge, from: usize) -> Option<usize> {
        self.nodes
            .iter()
            .enumerate()
            .skip(from)
            .find_map(|(pos, node)| match node {
                Node::Marker(m) if m.index == index && m.edge == edge => Some(pos),
                _ => None,
            })
    }

    /// Concatenated text of every text node.
    pub fn plain_text(&self) -> String {
        self.nodes
            .iter()
            .filter_map(|node| match node {
                Node::Text(text) => Some(text.as_str()),
                Node::Marker(_) => None,
            })
            .collect()
    }
}

/// A highlighted span inside one text node (byte offsets, end exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRange {
    pub region: Region,
    pub node: usize,
    pub start: usize,
    pub end: usize,
}

/// Scroll container metrics.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    /// Current scroll offset
    pub scroll_top: f64,
    /// Full visible height
    pub height: f64,
    /// Height hidden by an on-screen keyboard
    pub keyboard_inset: f64,
}

impl Viewport {
    /// Height actually visible to the reader.
    pub fn visible_height(&self) -> f64 {
        (self.height - self.keyboard_inset.max(0.0)).max(0.0)
    }
}

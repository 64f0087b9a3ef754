//! Constructor-time wiring of the coordinator's collaborators.

use std::sync::Arc;

use crate::config::NarrationConfig;
use crate::error::{NarrationError, Result};
use crate::highlight::{HighlightSynchronizer, ScrollPolicy};
use crate::keepalive::KeepAliveSignal;
use crate::ports::{
    Chunker, ContentSurface, HighlightRenderer, KeepAliveBackend, NavigationSignal, RestoreHint,
    SpeechEngine, StatusReporter, Visibility,
};

use super::PlaybackCoordinator;

/// Used when no navigation signal is supplied.
struct NoNavigation;

impl NavigationSignal for NoNavigation {
    fn is_navigating(&self) -> bool {
        false
    }
}

/// Used when no visibility source is supplied.
struct AlwaysVisible;

impl Visibility for AlwaysVisible {
    fn is_visible(&self) -> bool {
        true
    }
}

/// Used when no status reporter is supplied.
struct LogStatus;

impl StatusReporter for LogStatus {
    fn report(&self, status: &str) {
        log::info!("{}", status);
    }
}

/// Collects collaborators for a [`PlaybackCoordinator`].
///
/// Chunker, speech engine, renderer and surface are required; the rest
/// fall back to "never navigating", "always visible" and log-only status.
pub struct CoordinatorBuilder {
    config: NarrationConfig,
    chunker: Option<Arc<dyn Chunker>>,
    speech: Option<Arc<dyn SpeechEngine>>,
    renderer: Option<Arc<dyn HighlightRenderer>>,
    surface: Option<Arc<dyn ContentSurface>>,
    navigation: Option<Arc<dyn NavigationSignal>>,
    visibility: Option<Arc<dyn Visibility>>,
    status: Option<Arc<dyn StatusReporter>>,
    restore: Option<Arc<dyn RestoreHint>>,
    keep_alive: Option<Arc<dyn KeepAliveBackend>>,
}

impl CoordinatorBuilder {
    pub fn new(config: NarrationConfig) -> Self {
        Self {
            config,
            chunker: None,
            speech: None,
            renderer: None,
            surface: None,
            navigation: None,
            visibility: None,
            status: None,
            restore: None,
            keep_alive: None,
        }
    }

    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    pub fn speech(mut self, speech: Arc<dyn SpeechEngine>) -> Self {
        self.speech = Some(speech);
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn HighlightRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn surface(mut self, surface: Arc<dyn ContentSurface>) -> Self {
        self.surface = Some(surface);
        self
    }

    pub fn navigation(mut self, navigation: Arc<dyn NavigationSignal>) -> Self {
        self.navigation = Some(navigation);
        self
    }

    pub fn visibility(mut self, visibility: Arc<dyn Visibility>) -> Self {
        self.visibility = Some(visibility);
        self
    }

    pub fn status(mut self, status: Arc<dyn StatusReporter>) -> Self {
        self.status = Some(status);
        self
    }

    pub fn restore_hint(mut self, restore: Arc<dyn RestoreHint>) -> Self {
        self.restore = Some(restore);
        self
    }

    pub fn keep_alive(mut self, backend: Arc<dyn KeepAliveBackend>) -> Self {
        self.keep_alive = Some(backend);
        self
    }

    pub fn build(self) -> Result<PlaybackCoordinator> {
        let chunker = self.chunker.ok_or_else(|| missing("chunker"))?;
        let speech = self.speech.ok_or_else(|| missing("speech engine"))?;
        let renderer = self.renderer.ok_or_else(|| missing("highlight renderer"))?;
        let surface = self.surface.ok_or_else(|| missing("content surface"))?;

        let scroll = ScrollPolicy::new(self.config.scroll_buffer_ratio, self.config.scroll_tolerance_px);
        let highlighter = HighlightSynchronizer::new(renderer, surface).with_scroll_policy(scroll);

        Ok(PlaybackCoordinator::from_parts(super::Parts {
            config: self.config,
            chunker,
            speech,
            highlighter,
            navigation: self.navigation.unwrap_or_else(|| Arc::new(NoNavigation)),
            visibility: self.visibility.unwrap_or_else(|| Arc::new(AlwaysVisible)),
            status: self.status.unwrap_or_else(|| Arc::new(LogStatus)),
            restore: self.restore,
            keep_alive: self.keep_alive.map(KeepAliveSignal::new),
        }))
    }
}

fn missing(what: &str) -> NarrationError {
    NarrationError::Config(format!("coordinator {} not set", what))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MemorySurface, RecordingRenderer, ScriptedSpeechEngine, StaticChunker};

    #[test]
    fn test_build_requires_chunker() {
        let result = CoordinatorBuilder::new(NarrationConfig::default())
            .speech(Arc::new(ScriptedSpeechEngine::new()))
            .renderer(Arc::new(RecordingRenderer::new()))
            .surface(Arc::new(MemorySurface::new()))
            .build();
        match result {
            Err(NarrationError::Config(msg)) => assert!(msg.contains("chunker")),
            other => panic!("expected config error, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_build_with_defaults() {
        let coordinator = CoordinatorBuilder::new(NarrationConfig::default())
            .chunker(Arc::new(StaticChunker::from_texts(&["A."])))
            .speech(Arc::new(ScriptedSpeechEngine::new()))
            .renderer(Arc::new(RecordingRenderer::new()))
            .surface(Arc::new(MemorySurface::new()))
            .build()
            .unwrap();
        assert_eq!(coordinator.snapshot().version, 0);
    }
}

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use narrator_core::mock::{
    FixedRestoreHint, FlagNavigation, FlagVisibility, MemorySurface, RecordingKeepAlive,
    RecordingRenderer, RecordingStatus, ScriptedSpeechEngine, SpeechStep, StaticChunker,
};
use narrator_core::{
    CoordinatorBuilder, HIGHLIGHT_NAME, MediaAction, NarrationConfig, NarrationError,
    PlaybackCoordinator, PlaybackState, RunOutcome, SpeechErrorKind, SpeechOutcome, VoiceRole,
};

const TEXTS: [&str; 3] = ["A.", "B.", "C."];

struct Harness {
    engine: Arc<ScriptedSpeechEngine>,
    chunker: Arc<StaticChunker>,
    renderer: Arc<RecordingRenderer>,
    surface: Arc<MemorySurface>,
    status: Arc<RecordingStatus>,
    keep_alive: Arc<RecordingKeepAlive>,
    coordinator: PlaybackCoordinator,
}

impl Harness {
    fn new(engine: ScriptedSpeechEngine) -> Self {
        Self::build(engine, NarrationConfig::fast(), |b| b)
    }

    fn build(
        engine: ScriptedSpeechEngine,
        config: NarrationConfig,
        extra: impl FnOnce(CoordinatorBuilder) -> CoordinatorBuilder,
    ) -> Self {
        let engine = Arc::new(engine);
        let chunker = Arc::new(StaticChunker::from_texts(&TEXTS));
        let renderer = Arc::new(RecordingRenderer::new());
        let surface = Arc::new(MemorySurface::from_chunks(&TEXTS));
        let status = Arc::new(RecordingStatus::new());
        let keep_alive = Arc::new(RecordingKeepAlive::new());

        let builder = CoordinatorBuilder::new(config)
            .chunker(chunker.clone())
            .speech(engine.clone())
            .renderer(renderer.clone())
            .surface(surface.clone())
            .status(status.clone())
            .keep_alive(keep_alive.clone());
        let coordinator = extra(builder).build().unwrap();

        Self {
            engine,
            chunker,
            renderer,
            surface,
            status,
            keep_alive,
            coordinator,
        }
    }

    fn spawn_start(&self, from: usize) -> tokio::task::JoinHandle<narrator_core::Result<RunOutcome>> {
        let coordinator = self.coordinator.clone();
        tokio::spawn(async move { coordinator.start(from).await })
    }
}

async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("timed out")
}

fn autoplay() -> NarrationConfig {
    NarrationConfig {
        autoplay: true,
        ..NarrationConfig::fast()
    }
}

#[tokio::test]
async fn test_plays_every_chunk_to_completion() {
    let h = Harness::new(ScriptedSpeechEngine::new());

    let outcome = within(h.coordinator.start(0)).await.unwrap();

    assert_eq!(outcome, RunOutcome::Completed);
    let snapshot = h.coordinator.snapshot();
    assert_eq!(snapshot.state, PlaybackState::Completed);
    assert_eq!(snapshot.current_index, 3);
    assert_eq!(h.engine.spoken(), vec!["A.", "B.", "C."]);
    assert!(h.renderer.active(HIGHLIGHT_NAME).is_none());
    assert_eq!(h.coordinator.highlight_state().active_chunk_index, None);
    assert_eq!(h.status.last().as_deref(), Some("Ready"));
    assert!(h.surface.scrolled_to_end());
    assert_eq!(h.keep_alive.starts(), 1);
    assert_eq!(h.keep_alive.stops(), 1);
}

#[tokio::test]
async fn test_system_interruption_retries_same_chunk() {
    let engine = ScriptedSpeechEngine::new().with_script([
        SpeechStep::Finish,
        SpeechStep::Fail(SpeechErrorKind::Interrupted),
    ]);
    let h = Harness::new(engine);

    let outcome = within(h.coordinator.start(0)).await.unwrap();

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(h.engine.spoken(), vec!["A.", "B.", "B.", "C."]);
    let snapshot = h.coordinator.snapshot();
    assert_eq!(snapshot.current_index, 3);
    assert!(!snapshot.interrupted);
}

#[tokio::test]
async fn test_pause_mid_chunk_then_resume() {
    let engine = ScriptedSpeechEngine::new().with_script([SpeechStep::Finish, SpeechStep::Hold]);
    let h = Harness::new(engine);

    let run = h.spawn_start(0);
    within(h.engine.wait_for_calls(2)).await;
    h.coordinator.pause();

    assert_eq!(within(run).await.unwrap().unwrap(), RunOutcome::Halted);
    let snapshot = h.coordinator.snapshot();
    assert_eq!(snapshot.state, PlaybackState::Paused);
    assert_eq!(snapshot.current_index, 1);
    assert_eq!(h.coordinator.highlight_state().active_chunk_index, Some(1));
    let ranges = h.renderer.active(HIGHLIGHT_NAME).unwrap();
    assert_eq!(ranges[0].node, 4);
    assert_eq!(h.status.last().as_deref(), Some("Paused"));

    let outcome = within(h.coordinator.resume()).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(h.engine.spoken(), vec!["A.", "B.", "B.", "C."]);
}

#[tokio::test]
async fn test_autoplay_waits_for_appended_content() {
    let h = Harness::build(ScriptedSpeechEngine::new(), autoplay(), |b| b);

    let outcome = within(h.coordinator.start(0)).await.unwrap();
    assert_eq!(outcome, RunOutcome::AwaitingContent);
    let snapshot = h.coordinator.snapshot();
    assert!(snapshot.awaiting_content);
    assert_eq!(snapshot.state, PlaybackState::Playing);
    assert!(h.renderer.active(HIGHLIGHT_NAME).is_none());
    assert!(h.coordinator.keep_alive_active());

    h.chunker.append(&["D."]);
    h.surface.append_chunks(3, &["D."]);
    let outcome = within(h.coordinator.content_appended()).await.unwrap();

    assert_eq!(outcome, Some(RunOutcome::AwaitingContent));
    assert_eq!(h.engine.spoken(), vec!["A.", "B.", "C.", "D."]);
    assert_eq!(h.coordinator.snapshot().current_index, 4);
}

#[tokio::test]
async fn test_content_appended_ignored_when_not_armed() {
    let h = Harness::new(ScriptedSpeechEngine::new());
    within(h.coordinator.start(0)).await.unwrap();

    h.chunker.append(&["D."]);
    let outcome = within(h.coordinator.content_appended()).await.unwrap();

    assert_eq!(outcome, None);
    assert_eq!(h.engine.call_count(), 3);
}

#[tokio::test]
async fn test_disabling_autoplay_while_waiting_completes() {
    let h = Harness::build(ScriptedSpeechEngine::new(), autoplay(), |b| b);
    within(h.coordinator.start(0)).await.unwrap();

    h.coordinator.set_autoplay(false);

    let snapshot = h.coordinator.snapshot();
    assert_eq!(snapshot.state, PlaybackState::Completed);
    assert!(!snapshot.awaiting_content);
    assert!(!snapshot.autoplay_enabled);
    assert!(!h.coordinator.keep_alive_active());
    assert_eq!(h.status.last().as_deref(), Some("Ready"));
}

#[tokio::test]
async fn test_newer_session_silences_older_one() {
    let engine = ScriptedSpeechEngine::new().with_default(SpeechStep::Hold);
    let h = Harness::new(engine);

    let first = h.spawn_start(0);
    within(h.engine.wait_for_calls(1)).await;
    let second = h.spawn_start(2);

    let first_outcome = within(first).await.unwrap().unwrap();
    assert!(matches!(first_outcome, RunOutcome::Halted | RunOutcome::Superseded));

    within(h.engine.wait_for_calls(2)).await;
    assert_eq!(h.engine.spoken(), vec!["A.", "C."]);
    assert_eq!(h.coordinator.highlight_state().active_chunk_index, Some(2));

    h.coordinator.stop(false);
    assert_eq!(within(second).await.unwrap().unwrap(), RunOutcome::Halted);
    assert_eq!(h.engine.call_count(), 2);
}

#[tokio::test]
async fn test_start_timeout_retries_chunk() {
    let engine = ScriptedSpeechEngine::new().with_script([SpeechStep::NeverStart]);
    let h = Harness::new(engine);

    let outcome = within(h.coordinator.start(0)).await.unwrap();

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(h.engine.spoken(), vec!["A.", "A.", "B.", "C."]);
    assert!(h.engine.cancel_count() >= 1);
}

#[tokio::test]
async fn test_engine_failure_skips_chunk() {
    let engine = ScriptedSpeechEngine::new().with_script([
        SpeechStep::Finish,
        SpeechStep::Fail(SpeechErrorKind::Other("synthesis-failed".into())),
    ]);
    let h = Harness::new(engine);

    let outcome = within(h.coordinator.start(0)).await.unwrap();

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(h.engine.spoken(), vec!["A.", "B.", "C."]);
    assert!(
        h.status
            .statuses()
            .contains(&"TTS error: synthesis-failed".to_string())
    );
}

#[tokio::test]
async fn test_hidden_content_retries_until_visible() {
    let visibility = Arc::new(FlagVisibility::new(false));
    let h = Harness::build(ScriptedSpeechEngine::new(), NarrationConfig::fast(), {
        let visibility = visibility.clone();
        move |b| b.visibility(visibility)
    });

    let run = h.spawn_start(0);
    within(h.engine.wait_for_calls(2)).await;
    visibility.set(true);

    assert_eq!(within(run).await.unwrap().unwrap(), RunOutcome::Completed);
    let spoken = h.engine.spoken();
    assert_eq!(&spoken[..2], &["A.", "A."]);
    assert_eq!(&spoken[spoken.len() - 2..], &["B.", "C."]);
}

#[tokio::test]
async fn test_chunker_failure_reports_unavailable() {
    let engine = Arc::new(ScriptedSpeechEngine::new());
    let status = Arc::new(RecordingStatus::new());
    let coordinator = CoordinatorBuilder::new(NarrationConfig::fast())
        .chunker(Arc::new(StaticChunker::failing("no content")))
        .speech(engine.clone())
        .renderer(Arc::new(RecordingRenderer::new()))
        .surface(Arc::new(MemorySurface::new()))
        .status(status.clone())
        .build()
        .unwrap();

    let result = within(coordinator.start(0)).await;

    assert!(matches!(result, Err(NarrationError::ChunkingFailed(reason)) if reason == "no content"));
    assert_eq!(status.last().as_deref(), Some("Narration unavailable: no content"));
    assert_eq!(engine.call_count(), 0);
}

#[tokio::test]
async fn test_missing_markers_still_speaks() {
    let engine = Arc::new(ScriptedSpeechEngine::new());
    let coordinator = CoordinatorBuilder::new(NarrationConfig::fast())
        .chunker(Arc::new(StaticChunker::from_texts(&TEXTS)))
        .speech(engine.clone())
        .renderer(Arc::new(RecordingRenderer::new()))
        .surface(Arc::new(MemorySurface::new()))
        .build()
        .unwrap();
    let mut events = coordinator.subscribe();

    let outcome = within(coordinator.start(0)).await.unwrap();

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(engine.call_count(), 3);
    for index in 0..3 {
        let event = events.recv().await.unwrap();
        assert_eq!(event.chunk_index, index);
        assert!(!event.highlight_succeeded);
    }
}

#[tokio::test]
async fn test_chunk_events_follow_playback() {
    let h = Harness::new(ScriptedSpeechEngine::new());
    let mut events = h.coordinator.subscribe();

    within(h.coordinator.start(0)).await.unwrap();

    for (index, text) in TEXTS.iter().enumerate() {
        let event = events.recv().await.unwrap();
        assert_eq!(event.chunk_index, index);
        assert_eq!(event.chunk_text, *text);
        assert_eq!(event.total_chunks, 3);
        assert!(event.highlight_succeeded);
    }
}

#[tokio::test]
async fn test_seek_moves_to_chunk() {
    let engine = ScriptedSpeechEngine::new().with_default(SpeechStep::Hold);
    let h = Harness::new(engine);

    let run = h.spawn_start(0);
    within(h.engine.wait_for_calls(1)).await;

    let seek = {
        let coordinator = h.coordinator.clone();
        tokio::spawn(async move { coordinator.seek(2).await })
    };
    assert_eq!(within(run).await.unwrap().unwrap(), RunOutcome::Halted);

    within(h.engine.wait_for_calls(2)).await;
    assert_eq!(h.engine.spoken(), vec!["A.", "C."]);
    assert_eq!(h.coordinator.snapshot().current_index, 2);
    assert_eq!(h.coordinator.highlight_state().active_chunk_index, Some(2));

    h.coordinator.stop(true);
    assert_eq!(within(seek).await.unwrap().unwrap(), RunOutcome::Halted);
    assert_eq!(h.coordinator.highlight_state().active_chunk_index, Some(2));
}

#[tokio::test]
async fn test_navigation_halts_before_speaking() {
    let navigation = Arc::new(FlagNavigation::new());
    navigation.set(true);
    let h = Harness::build(ScriptedSpeechEngine::new(), NarrationConfig::fast(), {
        let navigation = navigation.clone();
        move |b| b.navigation(navigation)
    });

    let outcome = within(h.coordinator.start(0)).await.unwrap();

    assert_eq!(outcome, RunOutcome::Halted);
    assert_eq!(h.engine.call_count(), 0);
}

#[tokio::test]
async fn test_stop_clears_highlight_and_keep_alive() {
    let engine = ScriptedSpeechEngine::new().with_default(SpeechStep::Hold);
    let h = Harness::new(engine);

    let run = h.spawn_start(0);
    within(h.engine.wait_for_calls(1)).await;
    assert!(h.renderer.active(HIGHLIGHT_NAME).is_some());

    h.coordinator.stop(false);

    assert_eq!(within(run).await.unwrap().unwrap(), RunOutcome::Halted);
    assert!(h.renderer.active(HIGHLIGHT_NAME).is_none());
    assert!(!h.coordinator.keep_alive_active());
    assert_eq!(h.status.last().as_deref(), Some("Stopped"));
    assert_eq!(h.coordinator.snapshot().state, PlaybackState::Paused);
}

#[tokio::test]
async fn test_media_actions_drive_playback() {
    let engine = ScriptedSpeechEngine::new().with_default(SpeechStep::Hold);
    let h = Harness::new(engine);
    let mut actions = h.coordinator.media_actions().unwrap();

    let run = h.spawn_start(0);
    within(h.engine.wait_for_calls(1)).await;

    h.keep_alive.press(MediaAction::Pause);
    let action = within(actions.recv()).await.unwrap();
    assert_eq!(within(h.coordinator.handle_media_action(action)).await.unwrap(), None);
    assert_eq!(within(run).await.unwrap().unwrap(), RunOutcome::Halted);
    // Pausing keeps the media session alive
    assert!(h.coordinator.keep_alive_active());

    h.keep_alive.press(MediaAction::Stop);
    let action = within(actions.recv()).await.unwrap();
    within(h.coordinator.handle_media_action(action)).await.unwrap();
    assert!(!h.coordinator.keep_alive_active());
    assert_eq!(h.keep_alive.stops(), 1);
}

#[tokio::test]
async fn test_announce_finishes_before_narration() {
    let engine = ScriptedSpeechEngine::new().with_duration(Duration::from_millis(30));
    let h = Harness::new(engine);

    let announce = {
        let coordinator = h.coordinator.clone();
        tokio::spawn(async move { coordinator.announce("Welcome back").await })
    };
    within(h.engine.wait_for_calls(1)).await;
    let run = h.spawn_start(0);

    assert_eq!(within(announce).await.unwrap(), SpeechOutcome::Ended);
    assert_eq!(within(run).await.unwrap().unwrap(), RunOutcome::Completed);
    assert_eq!(h.engine.spoken(), vec!["Welcome back", "A.", "B.", "C."]);
    assert_eq!(h.engine.roles()[0], VoiceRole::AppVoice);
    assert_eq!(h.engine.roles()[1], VoiceRole::Narrator);
}

#[tokio::test]
async fn test_start_restored_uses_hint_once() {
    let h = Harness::build(ScriptedSpeechEngine::new(), NarrationConfig::fast(), |b| {
        b.restore_hint(Arc::new(FixedRestoreHint::new(2)))
    });

    within(h.coordinator.start_restored()).await.unwrap();
    assert_eq!(h.engine.spoken(), vec!["C."]);

    within(h.coordinator.start_restored()).await.unwrap();
    assert_eq!(h.engine.spoken(), vec!["C.", "A.", "B.", "C."]);
}

#[tokio::test]
async fn test_start_past_end_completes_without_speaking() {
    let h = Harness::new(ScriptedSpeechEngine::new());

    let outcome = within(h.coordinator.start(10)).await.unwrap();

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(h.engine.call_count(), 0);
    assert_eq!(h.coordinator.snapshot().current_index, 3);
}

#[tokio::test]
async fn test_failing_keep_alive_does_not_block_playback() {
    let engine = Arc::new(ScriptedSpeechEngine::new());
    let keep_alive = Arc::new(RecordingKeepAlive::failing());
    let coordinator = CoordinatorBuilder::new(NarrationConfig::fast())
        .chunker(Arc::new(StaticChunker::from_texts(&TEXTS)))
        .speech(engine.clone())
        .renderer(Arc::new(RecordingRenderer::new()))
        .surface(Arc::new(MemorySurface::from_chunks(&TEXTS)))
        .keep_alive(keep_alive.clone())
        .build()
        .unwrap();

    let outcome = within(coordinator.start(0)).await.unwrap();

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(engine.call_count(), 3);
    assert!(!coordinator.keep_alive_active());
}

#[tokio::test]
async fn test_pause_during_engine_setup_keeps_position() {
    let h = Harness::new(ScriptedSpeechEngine::new());
    h.engine.hold_setup();

    let run = h.spawn_start(0);
    within(h.engine.wait_for_calls(1)).await;
    // The engine has not registered the utterance, so the cancel misses it
    h.coordinator.pause();
    h.engine.release_setup();

    assert_eq!(within(run).await.unwrap().unwrap(), RunOutcome::Halted);
    let snapshot = h.coordinator.snapshot();
    assert_eq!(snapshot.current_index, 0);
    assert_eq!(snapshot.state, PlaybackState::Paused);

    let outcome = within(h.coordinator.resume()).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(h.engine.spoken(), vec!["A.", "A.", "B.", "C."]);
}

#[tokio::test]
async fn test_interruption_while_paused_is_left_for_resume() {
    let visibility = Arc::new(FlagVisibility::new(true));
    let h = Harness::build(ScriptedSpeechEngine::new(), NarrationConfig::fast(), {
        let visibility = visibility.clone();
        move |b| b.visibility(visibility)
    });
    h.engine.hold_setup();

    let run = h.spawn_start(0);
    within(h.engine.wait_for_calls(1)).await;
    h.coordinator.pause();
    visibility.set(false);
    h.engine.release_setup();

    assert_eq!(within(run).await.unwrap().unwrap(), RunOutcome::Halted);
    let snapshot = h.coordinator.snapshot();
    assert_eq!(snapshot.current_index, 0);
    assert!(snapshot.interrupted);

    visibility.set(true);
    let outcome = within(h.coordinator.resume()).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed);
    assert!(!h.coordinator.snapshot().interrupted);
    assert_eq!(h.engine.spoken(), vec!["A.", "A.", "B.", "C."]);
}

#[tokio::test]
async fn test_interruption_while_navigating_halts_without_advancing() {
    let navigation = Arc::new(FlagNavigation::new());
    let visibility = Arc::new(FlagVisibility::new(true));
    let engine = ScriptedSpeechEngine::new().with_duration(Duration::from_millis(200));
    let h = Harness::build(engine, NarrationConfig::fast(), {
        let navigation = navigation.clone();
        let visibility = visibility.clone();
        move |b| b.navigation(navigation).visibility(visibility)
    });

    let run = h.spawn_start(0);
    within(h.engine.wait_for_calls(1)).await;
    navigation.set(true);
    visibility.set(false);

    assert_eq!(within(run).await.unwrap().unwrap(), RunOutcome::Halted);
    let snapshot = h.coordinator.snapshot();
    assert_eq!(snapshot.current_index, 0);
    assert!(snapshot.interrupted);
    assert_eq!(h.engine.call_count(), 1);

    navigation.set(false);
    visibility.set(true);
    let outcome = within(h.coordinator.resume()).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(h.engine.spoken(), vec!["A.", "A.", "B.", "C."]);
}

#[tokio::test]
async fn test_speaking_status_returns_after_engine_failure() {
    let engine = ScriptedSpeechEngine::new()
        .with_script([SpeechStep::Fail(SpeechErrorKind::Other("no-voice".into()))]);
    let h = Harness::new(engine);

    let outcome = within(h.coordinator.start(0)).await.unwrap();

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(
        h.status.statuses(),
        vec!["Speaking…", "TTS error: no-voice", "Speaking…", "Ready"]
    );
}

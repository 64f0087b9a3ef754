//! Decides why a speak call ended.

use crate::ports::{SpeechErrorKind, SpeechOutcome};
use crate::session::{NarrationState, PlaybackState};

/// What the coordinator observed for one speak call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeakSignal {
    /// The engine resolved the utterance
    Outcome(SpeechOutcome),
    /// The engine accepted the utterance but never started speaking
    StartTimeout,
}

/// The coordinator's reading of a [`SpeakSignal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interruption {
    /// The chunk was spoken to the end
    NormalEnd,
    /// Our own pause/stop cut the chunk off
    UserStop,
    /// Something outside the user's control stopped the chunk; retry it
    SystemInterruption,
    /// The engine failed for a reason retrying will not fix
    EngineFailure(String),
}

/// Stateless classifier; everything it needs is passed in.
#[derive(Debug, Clone, Copy, Default)]
pub struct InterruptionClassifier;

impl InterruptionClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify `signal` given the narration state at the time it arrived.
    pub fn classify(
        &self,
        signal: &SpeakSignal,
        state: &NarrationState,
        content_visible: bool,
    ) -> Interruption {
        match signal {
            SpeakSignal::Outcome(SpeechOutcome::Ended) => {
                if content_visible {
                    Interruption::NormalEnd
                } else {
                    // A backgrounded utterance may have stopped silently
                    Interruption::SystemInterruption
                }
            }
            SpeakSignal::Outcome(SpeechOutcome::Errored(kind)) => match kind {
                SpeechErrorKind::Other(detail) => Interruption::EngineFailure(detail.clone()),
                // Interruption-class: caused by us unless we are still playing
                _ if state.state == PlaybackState::Playing => Interruption::SystemInterruption,
                _ => Interruption::UserStop,
            },
            SpeakSignal::StartTimeout => Interruption::SystemInterruption,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(playback: PlaybackState) -> NarrationState {
        NarrationState {
            state: playback,
            ..NarrationState::default()
        }
    }

    fn ended() -> SpeakSignal {
        SpeakSignal::Outcome(SpeechOutcome::Ended)
    }

    fn errored(kind: SpeechErrorKind) -> SpeakSignal {
        SpeakSignal::Outcome(SpeechOutcome::Errored(kind))
    }

    #[test]
    fn test_clean_end_while_visible() {
        let classifier = InterruptionClassifier::new();
        let result = classifier.classify(&ended(), &state(PlaybackState::Playing), true);
        assert_eq!(result, Interruption::NormalEnd);
    }

    #[test]
    fn test_clean_end_while_hidden_is_interruption() {
        let classifier = InterruptionClassifier::new();
        let result = classifier.classify(&ended(), &state(PlaybackState::Playing), false);
        assert_eq!(result, Interruption::SystemInterruption);
    }

    #[test]
    fn test_interrupted_while_paused_is_user_stop() {
        let classifier = InterruptionClassifier::new();
        let signal = errored(SpeechErrorKind::Interrupted);
        assert_eq!(
            classifier.classify(&signal, &state(PlaybackState::Paused), true),
            Interruption::UserStop
        );
        let signal = errored(SpeechErrorKind::Canceled);
        assert_eq!(
            classifier.classify(&signal, &state(PlaybackState::Paused), true),
            Interruption::UserStop
        );
    }

    #[test]
    fn test_interrupted_while_playing_is_system() {
        let classifier = InterruptionClassifier::new();
        let signal = errored(SpeechErrorKind::Interrupted);
        assert_eq!(
            classifier.classify(&signal, &state(PlaybackState::Playing), true),
            Interruption::SystemInterruption
        );
    }

    #[test]
    fn test_start_timeout_is_system() {
        let classifier = InterruptionClassifier::new();
        assert_eq!(
            classifier.classify(&SpeakSignal::StartTimeout, &state(PlaybackState::Playing), true),
            Interruption::SystemInterruption
        );
    }

    #[test]
    fn test_other_error_is_engine_failure() {
        let classifier = InterruptionClassifier::new();
        let signal = errored(SpeechErrorKind::Other("voice unavailable".into()));
        assert_eq!(
            classifier.classify(&signal, &state(PlaybackState::Playing), true),
            Interruption::EngineFailure("voice unavailable".into())
        );
    }
}

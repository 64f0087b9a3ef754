//! Narration chunks: the unit of text spoken as one step.

use serde::{Deserialize, Serialize};

/// Which voice speaks a chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoiceRole {
    /// The reading voice used for content
    #[default]
    Narrator,
    /// The voice used for application messages
    AppVoice,
}

/// A chunk of text ready for narration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// The text to speak
    pub text: String,
    /// Voice used to speak it
    #[serde(default)]
    pub voice_role: VoiceRole,
}

impl Chunk {
    /// Create a narrator chunk.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice_role: VoiceRole::Narrator,
        }
    }

    /// Set the voice role.
    pub fn with_voice_role(mut self, voice_role: VoiceRole) -> Self {
        self.voice_role = voice_role;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_defaults_to_narrator() {
        let chunk = Chunk::new("Hello world");
        assert_eq!(chunk.text, "Hello world");
        assert_eq!(chunk.voice_role, VoiceRole::Narrator);
    }

    #[test]
    fn test_chunk_with_voice_role() {
        let chunk = Chunk::new("Saved.").with_voice_role(VoiceRole::AppVoice);
        assert_eq!(chunk.voice_role, VoiceRole::AppVoice);
    }
}

//! Speech input and output.
//!
//! Both directions are optional. Callers check [`SpeechIo::capabilities`]
//! first and fall back to text when a direction is missing.

use async_trait::async_trait;
use thiserror::Error;

/// Which speech directions the runtime supports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpeechCapabilities {
    pub listen: bool,
    pub speak: bool,
}

/// Errors from a speech backend.
#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("speech is not supported in this environment")]
    Unsupported,

    #[error("nothing was heard")]
    NoSpeech,

    #[error("speech backend failed: {0}")]
    Backend(String),
}

/// Speech recognition and synthesis.
#[async_trait]
pub trait SpeechIo: Send + Sync {
    fn capabilities(&self) -> SpeechCapabilities;

    /// Listen once and return the final transcript.
    async fn listen(&self) -> Result<String, SpeechError>;

    /// Read text aloud.
    async fn speak(&self, text: &str) -> Result<(), SpeechError>;
}

/// Text-only runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSpeech;

#[async_trait]
impl SpeechIo for NoSpeech {
    fn capabilities(&self) -> SpeechCapabilities {
        SpeechCapabilities::default()
    }

    async fn listen(&self) -> Result<String, SpeechError> {
        Err(SpeechError::Unsupported)
    }

    async fn speak(&self, _text: &str) -> Result<(), SpeechError> {
        Err(SpeechError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_speech_is_text_only() {
        let speech = NoSpeech;
        assert_eq!(speech.capabilities(), SpeechCapabilities::default());
        assert!(matches!(speech.listen().await, Err(SpeechError::Unsupported)));
        assert!(matches!(speech.speak("hola").await, Err(SpeechError::Unsupported)));
    }
}

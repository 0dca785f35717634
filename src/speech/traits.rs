use crate::error::UpstreamError;
use async_trait::async_trait;
use serde::Serialize;

/// A selectable synthesis voice.
#[derive(Debug, Clone, Serialize)]
pub struct VoiceInfo {
    pub id: String,
    pub label: String,
}

/// The text-to-speech collaborator. No retention semantics: rendered audio
/// is addressed by filename and deletable independently of any chat data.
#[async_trait]
pub trait SpeechRenderer: Send + Sync {
    /// Render `text` to audio bytes. `speed` is a playback-rate multiplier
    /// around 1.0.
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        speed: f64,
    ) -> Result<Vec<u8>, UpstreamError>;

    fn voices(&self) -> Vec<VoiceInfo>;

    fn languages(&self) -> Vec<String>;
}

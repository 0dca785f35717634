use crate::error::UpstreamError;
use crate::history::ChatMessage;
use async_trait::async_trait;

/// The AI response generator, specified at its interface: prompt in, reply
/// text out. A failure here is an [`UpstreamError`] and never prevents the
/// user's own message from having been considered for persistence first.
#[async_trait]
pub trait ReplyProvider: Send + Sync {
    /// Generate a reply to `prompt`, given the conversation so far.
    /// `context` is in insertion order and may be empty (history disabled
    /// or a fresh session).
    async fn generate(
        &self,
        prompt: &str,
        context: &[ChatMessage],
    ) -> Result<String, UpstreamError>;
}

use super::traits::ReplyProvider;
use crate::error::UpstreamError;
use crate::history::{ChatMessage, MessageRole};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const SERVICE: &str = "openai";

/// OpenAI-compatible chat-completions client. Works against any endpoint
/// speaking the same wire shape by pointing `base_url` elsewhere.
pub struct OpenAiProvider {
    /// Pre-computed `"Bearer <key>"` header value (avoids `format!` per request).
    cached_auth_header: Option<String>,
    base_url: String,
    model: String,
    temperature: f64,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiProvider {
    pub fn new(api_key: Option<&str>, base_url: &str, model: &str, temperature: f64) -> Self {
        Self {
            cached_auth_header: api_key.map(|k| format!("Bearer {k}")),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature,
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .connect_timeout(std::time::Duration::from_secs(10))
                .pool_max_idle_per_host(10)
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    fn build_request(&self, prompt: &str, context: &[ChatMessage]) -> ChatRequest {
        let mut messages = Vec::with_capacity(context.len() + 1);
        for message in context {
            messages.push(Message {
                role: match message.role {
                    MessageRole::User => "user",
                    MessageRole::Assistant => "assistant",
                },
                content: message.content.clone(),
            });
        }
        messages.push(Message {
            role: "user",
            content: prompt.to_string(),
        });

        ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl ReplyProvider for OpenAiProvider {
    async fn generate(
        &self,
        prompt: &str,
        context: &[ChatMessage],
    ) -> Result<String, UpstreamError> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut request = self.client.post(&url).json(&self.build_request(prompt, context));
        if let Some(ref auth) = self.cached_auth_header {
            request = request.header("Authorization", auth);
        }

        let response = request.send().await.map_err(|e| UpstreamError::Request {
            service: SERVICE.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                service: SERVICE.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response.json().await.map_err(|e| UpstreamError::Decode {
            service: SERVICE.to_string(),
            message: e.to_string(),
        })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| UpstreamError::Decode {
                service: SERVICE.to_string(),
                message: "response contained no choices".to_string(),
            })
    }
}

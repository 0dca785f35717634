use super::traits::{SpeechRenderer, VoiceInfo};
use crate::error::UpstreamError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

const SERVICE: &str = "openai-speech";

const VOICES: [(&str, &str); 6] = [
    ("alloy", "Alloy"),
    ("echo", "Echo"),
    ("fable", "Fable"),
    ("onyx", "Onyx"),
    ("nova", "Nova"),
    ("shimmer", "Shimmer"),
];

const LANGUAGES: [&str; 10] = [
    "en", "es", "fr", "de", "it", "pt", "ja", "ko", "zh", "hi",
];

/// OpenAI-compatible `/audio/speech` client.
pub struct OpenAiSpeech {
    cached_auth_header: Option<String>,
    base_url: String,
    model: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct SpeechRequest {
    model: String,
    input: String,
    voice: String,
    speed: f64,
}

impl OpenAiSpeech {
    pub fn new(api_key: Option<&str>, base_url: &str, model: &str) -> Self {
        Self {
            cached_auth_header: api_key.map(|k| format!("Bearer {k}")),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .connect_timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }
}

#[async_trait]
impl SpeechRenderer for OpenAiSpeech {
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        speed: f64,
    ) -> Result<Vec<u8>, UpstreamError> {
        let url = format!("{}/audio/speech", self.base_url);
        let body = SpeechRequest {
            model: self.model.clone(),
            input: text.to_string(),
            voice: voice.to_string(),
            speed,
        };

        let mut request = self.client.post(&url).json(&body);
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

        let bytes = response.bytes().await.map_err(|e| UpstreamError::Decode {
            service: SERVICE.to_string(),
            message: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }

    fn voices(&self) -> Vec<VoiceInfo> {
        VOICES
            .iter()
            .map(|(id, label)| VoiceInfo {
                id: (*id).to_string(),
                label: (*label).to_string(),
            })
            .collect()
    }

    fn languages(&self) -> Vec<String> {
        LANGUAGES.iter().map(|lang| (*lang).to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn synthesize_returns_audio_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/speech"))
            .and(body_partial_json(serde_json::json!({
                "input": "hello",
                "voice": "nova",
                "speed": 1.25,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;

        let speech = OpenAiSpeech::new(Some("key"), &server.uri(), "tts-1");

        let audio = speech.synthesize("hello", "nova", 1.25).await.unwrap();

        assert_eq!(audio, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn synthesize_surfaces_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/speech"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad voice"))
            .mount(&server)
            .await;

        let speech = OpenAiSpeech::new(None, &server.uri(), "tts-1");

        let err = speech.synthesize("hello", "nope", 1.0).await.unwrap_err();

        assert!(matches!(err, UpstreamError::Status { status: 400, .. }));
    }

    #[test]
    fn voices_and_languages_are_non_empty() {
        let speech = OpenAiSpeech::new(None, "http://localhost", "tts-1");
        assert!(!speech.voices().is_empty());
        assert!(speech.languages().contains(&"en".to_string()));
    }
}

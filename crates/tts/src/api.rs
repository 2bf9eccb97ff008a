//! REST client for the speech synthesis endpoint.

use serde::Serialize;

use crate::config::SpeechConfig;

/// Body of a `POST /audio/speech` request.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SpeechRequest {
    pub model: String,
    pub input: String,
    pub voice: String,
}

/// Errors from the speech service.
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("speech API error ({status}): {body}")]
    ApiError {
        status: u16,
        /// Raw response body for diagnostics.
        body: String,
    },

    /// The service answered 2xx with no audio.
    #[error("speech API returned an empty audio body")]
    EmptyAudio,
}

/// Narration boundary: text in, encoded audio bytes out.
#[async_trait::async_trait]
pub trait SpeechApi: Send + Sync {
    /// Model and voice applied to every request.
    fn request_for(&self, text: &str) -> SpeechRequest;

    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, SpeechError>;
}

/// HTTP client for an OpenAI-compatible speech endpoint.
pub struct OpenAiSpeech {
    client: reqwest::Client,
    config: SpeechConfig,
}

impl OpenAiSpeech {
    pub fn new(config: SpeechConfig) -> Result<Self, SpeechError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    /// Reuse an existing [`reqwest::Client`] for connection pooling.
    pub fn with_client(client: reqwest::Client, config: SpeechConfig) -> Self {
        Self { client, config }
    }

    fn speech_url(&self) -> String {
        format!("{}/audio/speech", self.config.base_url)
    }
}

#[async_trait::async_trait]
impl SpeechApi for OpenAiSpeech {
    fn request_for(&self, text: &str) -> SpeechRequest {
        SpeechRequest {
            model: self.config.model.clone(),
            input: text.to_string(),
            voice: self.config.voice.clone(),
        }
    }

    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, SpeechError> {
        let response = self
            .client
            .post(self.speech_url())
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(status = status.as_u16(), "Speech synthesis rejected");
            return Err(SpeechError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Err(SpeechError::EmptyAudio);
        }

        tracing::debug!(bytes = audio.len(), "Speech synthesized");
        Ok(audio.to_vec())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

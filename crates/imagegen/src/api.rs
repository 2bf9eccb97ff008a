//! REST client for the prediction-style image service.
//!
//! Wire shapes follow the Replicate predictions API: submit with
//! `POST /models/{model}/predictions`, poll the `urls.get` address, then
//! download the first entry of `output`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{GenerationOptions, ImageGenConfig};
use crate::job::JobStatus;

/// Body of a submit request.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PredictionRequest {
    pub input: PredictionInput,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PredictionInput {
    pub prompt: String,
    pub num_outputs: u32,
    pub aspect_ratio: String,
    pub output_format: String,
    pub output_quality: u8,
}

impl PredictionRequest {
    pub fn new(prompt: String, options: &GenerationOptions) -> Self {
        Self {
            input: PredictionInput {
                prompt,
                num_outputs: 1,
                aspect_ratio: options.aspect_ratio.clone(),
                output_format: options.output_format.clone(),
                output_quality: options.output_quality,
            },
        }
    }
}

/// A prediction as returned by submit or poll.
///
/// Every field is optional; models differ in what they fill in and
/// when. A synchronous model may answer the submit with `output` already
/// populated and no poll address.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Prediction {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub output: Option<PredictionOutput>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
    #[serde(default)]
    pub urls: Option<PredictionUrls>,
}

/// `output` is a list of URLs for most models and a bare URL for a few.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PredictionOutput {
    Many(Vec<String>),
    One(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictionUrls {
    #[serde(default)]
    pub get: Option<String>,
}

impl Prediction {
    /// Output references, empty if none were returned.
    pub fn outputs(&self) -> Vec<String> {
        match &self.output {
            Some(PredictionOutput::Many(urls)) => urls.clone(),
            Some(PredictionOutput::One(url)) => vec![url.clone()],
            None => Vec::new(),
        }
    }

    pub fn poll_url(&self) -> Option<&str> {
        self.urls.as_ref().and_then(|u| u.get.as_deref())
    }

    /// Error message, if the service reported one.
    pub fn error_message(&self) -> Option<String> {
        match &self.error {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) if s.trim().is_empty() => None,
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}

/// Errors from the image service and the job lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum ImageGenError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("image API error ({status}): {body}")]
    ApiError { status: u16, body: String },

    /// The job reached the `failed` state.
    #[error("generation job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },

    /// The job never reached a terminal state within the poll budget.
    #[error("generation job {job_id} timed out after {attempts} polls ({waited:?})")]
    PollTimeout {
        job_id: String,
        attempts: u32,
        waited: Duration,
    },

    /// A nominally successful job carried no output reference.
    #[error("generation job {job_id} succeeded with no output")]
    EmptyOutput { job_id: String },

    /// A pending job carried no address to poll.
    #[error("generation job {job_id} is {status} but has no poll address")]
    MissingPollUrl { job_id: String, status: JobStatus },

    /// The job has no output to hand over because it has not succeeded.
    #[error("generation job {job_id} is {status}, not succeeded")]
    NotFinished { job_id: String, status: JobStatus },

    /// A poll response arrived for a job that had already finished.
    #[error("generation job {job_id} is already {status}")]
    AlreadyTerminal { job_id: String, status: JobStatus },

    /// The downloaded bytes are not a recognised image format.
    #[error("generation job {job_id} output is not a recognised image")]
    UnrecognizedImage { job_id: String },
}

impl ImageGenError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::PollTimeout { .. })
    }
}

/// Image-generation boundary.
#[async_trait::async_trait]
pub trait PredictionApi: Send + Sync {
    async fn submit(&self, request: &PredictionRequest) -> Result<Prediction, ImageGenError>;

    async fn poll(&self, poll_url: &str) -> Result<Prediction, ImageGenError>;

    async fn download(&self, output_url: &str) -> Result<Vec<u8>, ImageGenError>;
}

/// HTTP client for a Replicate-compatible predictions API.
pub struct ReplicateApi {
    client: reqwest::Client,
    api_token: String,
    base_url: String,
    model: String,
}

impl ReplicateApi {
    pub fn new(config: &ImageGenConfig) -> Result<Self, ImageGenError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_client(client, config))
    }

    /// Reuse an existing [`reqwest::Client`] for connection pooling.
    pub fn with_client(client: reqwest::Client, config: &ImageGenConfig) -> Self {
        Self {
            client,
            api_token: config.api_token.clone(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
        }
    }

    fn submit_url(&self) -> String {
        format!("{}/models/{}/predictions", self.base_url, self.model)
    }

    /// Ensure the response has a success status code, or turn it into
    /// [`ImageGenError::ApiError`] carrying the body text.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ImageGenError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ImageGenError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ImageGenError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait::async_trait]
impl PredictionApi for ReplicateApi {
    async fn submit(&self, request: &PredictionRequest) -> Result<Prediction, ImageGenError> {
        let response = self
            .client
            .post(self.submit_url())
            .bearer_auth(&self.api_token)
            .json(request)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn poll(&self, poll_url: &str) -> Result<Prediction, ImageGenError> {
        let response = self
            .client
            .get(poll_url)
            .bearer_auth(&self.api_token)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Output URLs are public delivery links; the API token is not sent.
    async fn download(&self, output_url: &str) -> Result<Vec<u8>, ImageGenError> {
        let response = self.client.get(output_url).send().await?;
        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

//! Submit → poll → download driver for one image.

use std::sync::Arc;

use image::ImageFormat;

use crate::api::{ImageGenError, PredictionApi, PredictionRequest};
use crate::config::{GenerationOptions, PollPolicy};
use crate::job::GenerationJob;

/// Raw bytes of a generated image plus where they came from.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub job_id: String,
    pub source_url: String,
    pub format: ImageFormat,
    pub bytes: Vec<u8>,
}

impl GeneratedImage {
    /// File extension matching the sniffed format.
    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("img")
    }
}

/// Generates images through a [`PredictionApi`] under a fixed poll budget.
///
/// Cheap to share: one instance serves every segment of every run.
pub struct ImageGenerator {
    api: Arc<dyn PredictionApi>,
    options: GenerationOptions,
    poll: PollPolicy,
}

impl ImageGenerator {
    pub fn new(api: Arc<dyn PredictionApi>, options: GenerationOptions, poll: PollPolicy) -> Self {
        Self { api, options, poll }
    }

    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }

    pub fn poll_policy(&self) -> PollPolicy {
        self.poll
    }

    /// Generate one image for `text` and download its bytes.
    pub async fn generate(&self, text: &str) -> Result<GeneratedImage, ImageGenError> {
        let request = PredictionRequest::new(self.options.prompt_for(text), &self.options);
        let submitted = self.api.submit(&request).await?;
        let job = GenerationJob::from_submission(submitted)?;

        tracing::debug!(job_id = %job.id, status = %job.status, "Generation job submitted");

        let job = self.wait_for_terminal(job).await?;
        let job_id = job.id.clone();
        let source_url = job.into_output()?;

        let bytes = self.api.download(&source_url).await?;
        let format = image::guess_format(&bytes)
            .map_err(|_| ImageGenError::UnrecognizedImage {
                job_id: job_id.clone(),
            })?;

        tracing::debug!(
            job_id = %job_id,
            bytes = bytes.len(),
            format = ?format,
            "Generated image downloaded",
        );

        Ok(GeneratedImage {
            job_id,
            source_url,
            format,
            bytes,
        })
    }

    /// Poll on a fixed interval until the job is terminal or the retry
    /// budget runs out. Worst case waits `max_retries × interval`.
    async fn wait_for_terminal(
        &self,
        mut job: GenerationJob,
    ) -> Result<GenerationJob, ImageGenError> {
        while !job.is_terminal() {
            if job.polls >= self.poll.max_retries {
                job.time_out();
                tracing::warn!(
                    job_id = %job.id,
                    attempts = job.polls,
                    "Generation job did not finish within poll budget",
                );
                return Err(ImageGenError::PollTimeout {
                    job_id: job.id,
                    attempts: job.polls,
                    waited: self.poll.interval * job.polls,
                });
            }

            tokio::time::sleep(self.poll.interval).await;

            let Some(poll_url) = job.poll_url.clone() else {
                return Err(ImageGenError::MissingPollUrl {
                    job_id: job.id,
                    status: job.status,
                });
            };
            let prediction = self.api.poll(&poll_url).await?;
            job.apply_poll(prediction)?;

            tracing::trace!(job_id = %job.id, attempt = job.polls, status = %job.status, "Polled generation job");
        }
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use assert_matches::assert_matches;

    use super::*;
    use crate::api::Prediction;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    /// Scripted API: returns `submit` once, then pops `polls` in order,
    /// repeating the last one when the script runs out.
    struct ScriptedApi {
        submit: Prediction,
        polls: Mutex<VecDeque<Prediction>>,
        last_poll: Prediction,
        poll_count: AtomicU32,
        download: Vec<u8>,
    }

    impl ScriptedApi {
        fn new(submit: &str, polls: &[&str], download: &[u8]) -> Self {
            let parsed: VecDeque<Prediction> = polls
                .iter()
                .map(|p| serde_json::from_str(p).unwrap())
                .collect();
            let last_poll = parsed.back().cloned().unwrap_or_default();
            Self {
                submit: serde_json::from_str(submit).unwrap(),
                polls: Mutex::new(parsed),
                last_poll,
                poll_count: AtomicU32::new(0),
                download: download.to_vec(),
            }
        }
    }

    #[async_trait::async_trait]
    impl PredictionApi for ScriptedApi {
        async fn submit(&self, _request: &PredictionRequest) -> Result<Prediction, ImageGenError> {
            Ok(self.submit.clone())
        }

        async fn poll(&self, _poll_url: &str) -> Result<Prediction, ImageGenError> {
            self.poll_count.fetch_add(1, Ordering::SeqCst);
            let next = self.polls.lock().unwrap().pop_front();
            Ok(next.unwrap_or_else(|| self.last_poll.clone()))
        }

        async fn download(&self, _output_url: &str) -> Result<Vec<u8>, ImageGenError> {
            Ok(self.download.clone())
        }
    }

    const PENDING: &str = r#"{"id":"job-1","status":"starting","urls":{"get":"https://api/p/job-1"}}"#;

    fn policy(interval_ms: u64, max_retries: u32) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(interval_ms),
            max_retries,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_output_skips_polling() {
        let api = Arc::new(ScriptedApi::new(
            r#"{"id":"job-1","output":["https://x/1.png"]}"#,
            &[],
            PNG_MAGIC,
        ));
        let generator = ImageGenerator::new(api.clone(), GenerationOptions::default(), policy(1000, 5));

        let start = tokio::time::Instant::now();
        let image = generator.generate("A ghost.").await.unwrap();

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(api.poll_count.load(Ordering::SeqCst), 0);
        assert_eq!(image.format, ImageFormat::Png);
        assert_eq!(image.extension(), "png");
        assert_eq!(image.source_url, "https://x/1.png");
    }

    #[tokio::test(start_paused = true)]
    async fn polls_until_succeeded() {
        let api = Arc::new(ScriptedApi::new(
            PENDING,
            &[
                r#"{"status":"processing"}"#,
                r#"{"status":"processing"}"#,
                r#"{"status":"succeeded","output":["https://x/1.png"]}"#,
            ],
            PNG_MAGIC,
        ));
        let generator = ImageGenerator::new(api.clone(), GenerationOptions::default(), policy(500, 10));

        let start = tokio::time::Instant::now();
        let image = generator.generate("A ghost.").await.unwrap();

        assert_eq!(api.poll_count.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_millis(1500));
        assert_eq!(image.job_id, "job-1");
    }

    #[tokio::test(start_paused = true)]
    async fn never_finishing_job_times_out_after_budget() {
        let api = Arc::new(ScriptedApi::new(
            PENDING,
            &[r#"{"status":"processing"}"#],
            PNG_MAGIC,
        ));
        let generator = ImageGenerator::new(api.clone(), GenerationOptions::default(), policy(250, 8));

        let start = tokio::time::Instant::now();
        let err = generator.generate("A ghost.").await.unwrap_err();

        assert_eq!(start.elapsed(), Duration::from_millis(250 * 8));
        assert_eq!(api.poll_count.load(Ordering::SeqCst), 8);
        assert_matches!(
            err,
            ImageGenError::PollTimeout { attempts: 8, waited, .. } if waited == Duration::from_secs(2)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_job_stops_polling() {
        let api = Arc::new(ScriptedApi::new(
            PENDING,
            &[
                r#"{"status":"processing"}"#,
                r#"{"status":"failed","error":"NSFW content detected"}"#,
            ],
            PNG_MAGIC,
        ));
        let generator = ImageGenerator::new(api.clone(), GenerationOptions::default(), policy(100, 10));

        let err = generator.generate("A ghost.").await.unwrap_err();

        assert_eq!(api.poll_count.load(Ordering::SeqCst), 2);
        assert_matches!(err, ImageGenError::JobFailed { ref message, .. } if message == "NSFW content detected");
    }

    #[tokio::test(start_paused = true)]
    async fn succeeded_with_empty_output_fails() {
        let api = Arc::new(ScriptedApi::new(
            PENDING,
            &[r#"{"status":"succeeded","output":[]}"#],
            PNG_MAGIC,
        ));
        let generator = ImageGenerator::new(api, GenerationOptions::default(), policy(100, 10));

        let err = generator.generate("A ghost.").await.unwrap_err();
        assert_matches!(err, ImageGenError::EmptyOutput { .. });
    }

    #[tokio::test]
    async fn unrecognised_download_is_rejected() {
        let api = Arc::new(ScriptedApi::new(
            r#"{"id":"job-1","output":["https://x/1.png"]}"#,
            &[],
            b"<html>not an image</html>",
        ));
        let generator = ImageGenerator::new(api, GenerationOptions::default(), policy(100, 10));

        let err = generator.generate("A ghost.").await.unwrap_err();
        assert_matches!(err, ImageGenError::UnrecognizedImage { .. });
    }
}

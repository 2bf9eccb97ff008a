//! One-shot story worker.
//!
//! Reads a pre-segmented story, builds the real service clients from
//! [`WorkerConfig`], runs the pipeline once and returns the run report.

pub mod config;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use storyreel_cloud::S3ObjectStore;
use storyreel_core::error::CoreError;
use storyreel_core::ffmpeg::FfprobeDurationProbe;
use storyreel_core::segmentation::{parse_segment_markup, validate_segments, SegmentationClient};
use storyreel_core::subprocess::{ProcessRunner, ToolRunner};
use storyreel_core::types::{Segment, Story, StoryId};
use storyreel_imagegen::{ImageGenError, ImageGenerator, ReplicateApi};
use storyreel_pipeline::{Pipeline, PipelineDeps, PipelineError, RunReport};
use storyreel_tts::{OpenAiSpeech, SpeechError};

pub use config::WorkerConfig;

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("cannot read story file: {0}")]
    StoryFile(#[source] std::io::Error),

    #[error("segmentation failed: {0}")]
    Segmentation(#[from] CoreError),

    #[error("speech client setup failed: {0}")]
    SpeechClient(#[from] SpeechError),

    #[error("image client setup failed: {0}")]
    ImageClient(#[from] ImageGenError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// [`SegmentationClient`] over text that already carries
/// `<segment number="N">` markup.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkupSegmenter;

#[async_trait::async_trait]
impl SegmentationClient for MarkupSegmenter {
    async fn segment(&self, story_id: StoryId, text: &str) -> Result<Vec<Segment>, CoreError> {
        validate_segments(story_id, parse_segment_markup(text)?)
    }
}

/// Build a pipeline backed by the real services.
pub async fn build_pipeline(config: &WorkerConfig) -> Result<Pipeline, WorkerError> {
    let runner: Arc<dyn ToolRunner> = Arc::new(ProcessRunner);

    let prediction_api = ReplicateApi::new(&config.imagegen)?;
    let images = ImageGenerator::new(
        Arc::new(prediction_api),
        config.imagegen.options.clone(),
        config.imagegen.poll,
    );

    let deps = PipelineDeps {
        speech: Arc::new(OpenAiSpeech::new(config.speech.clone())?),
        images: Arc::new(images),
        store: Arc::new(S3ObjectStore::connect(&config.storage).await),
        probe: Arc::new(FfprobeDurationProbe::new(Arc::clone(&runner))),
        runner,
    };

    Ok(Pipeline::new(
        deps,
        config.pipeline.clone(),
        config.publish_target(),
    ))
}

/// Segment the configured story file and run it through `pipeline`.
pub async fn run_story(
    config: &WorkerConfig,
    pipeline: &Pipeline,
    cancel: &CancellationToken,
) -> Result<RunReport, WorkerError> {
    let content = tokio::fs::read_to_string(&config.story_file)
        .await
        .map_err(WorkerError::StoryFile)?;

    let segments = MarkupSegmenter.segment(config.story_id, &content).await?;
    tracing::info!(
        story_id = config.story_id,
        segments = segments.len(),
        file = %config.story_file.display(),
        "Story loaded",
    );

    let mut story = Story::new(config.story_id, content);
    let report = pipeline.run(&mut story, segments, cancel).await?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn markup_segmenter_parses_and_validates() {
        let text = r#"
            <segment number="2">The door swings open.</segment>
            <segment number="1">A house on the hill.</segment>
        "#;
        let segments = MarkupSegmenter.segment(1, text).await.unwrap();
        assert_eq!(
            segments,
            vec![
                Segment::new(1, "A house on the hill."),
                Segment::new(2, "The door swings open."),
            ]
        );
    }

    #[tokio::test]
    async fn markup_without_segments_is_rejected() {
        let err = MarkupSegmenter
            .segment(5, "Just a paragraph with no markup.")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NoSegments { story_id: 5 }));
    }
}

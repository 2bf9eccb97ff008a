//! End-to-end run orchestration.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use storyreel_cloud::ObjectStore;
use storyreel_core::error::CoreError;
use storyreel_core::ffmpeg::DurationProbe;
use storyreel_core::segmentation::validate_segments;
use storyreel_core::subprocess::ToolRunner;
use storyreel_core::types::{Segment, Story, StoryId, Timestamp};
use storyreel_imagegen::ImageGenerator;
use storyreel_tts::SpeechApi;

use crate::concat::Concatenator;
use crate::config::PipelineConfig;
use crate::controller::{run_segments, SegmentStages};
use crate::encoder::{SegmentClip, SegmentEncoder};
use crate::error::PipelineError;
use crate::image::ImageSynthesizer;
use crate::narration::NarrationSynthesizer;
use crate::publish::{ArtifactPublisher, PublishTarget, PublishedVideo};
use crate::workspace::{Workspace, WorkspaceLayout};

/// External collaborators, constructed once and shared by every run.
#[derive(Clone)]
pub struct PipelineDeps {
    pub speech: Arc<dyn SpeechApi>,
    pub images: Arc<ImageGenerator>,
    pub store: Arc<dyn ObjectStore>,
    pub runner: Arc<dyn ToolRunner>,
    pub probe: Arc<dyn DurationProbe>,
}

/// Summary of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub story_id: StoryId,
    pub object_key: String,
    pub video_url: String,
    pub segment_count: usize,
    pub total_duration_secs: f64,
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
}

/// Story → published video.
///
/// One `Pipeline` can serve many concurrent runs; the encoder cap
/// covers the segment encodes and concat passes of all of them.
pub struct Pipeline {
    stages: Arc<SegmentStages>,
    concatenator: Concatenator,
    publisher: ArtifactPublisher,
    work_dir: PathBuf,
}

impl Pipeline {
    pub fn new(deps: PipelineDeps, config: PipelineConfig, target: PublishTarget) -> Self {
        let encode_permits = Arc::new(Semaphore::new(config.max_encodes.max(1)));
        let request_permits = Arc::new(Semaphore::new(config.max_requests.max(1)));

        let stages = SegmentStages {
            narration: NarrationSynthesizer::new(deps.speech, deps.probe),
            image: ImageSynthesizer::new(deps.images),
            encoder: SegmentEncoder::new(
                Arc::clone(&deps.runner),
                config.encode.clone(),
                Arc::clone(&encode_permits),
            ),
            requests: request_permits,
        };

        Self {
            stages: Arc::new(stages),
            concatenator: Concatenator::new(deps.runner, config.encode, encode_permits),
            publisher: ArtifactPublisher::new(deps.store, target),
            work_dir: config.work_dir,
        }
    }

    /// Run the whole pipeline for `story`.
    ///
    /// Segments are validated before any external call. On success the
    /// story's video address is set; on any outcome the run workspace is
    /// removed before returning.
    pub async fn run(
        &self,
        story: &mut Story,
        segments: Vec<Segment>,
        cancel: &CancellationToken,
    ) -> Result<RunReport, PipelineError> {
        if story.video_url.is_some() {
            return Err(CoreError::Validation(format!(
                "Story {} already has a video",
                story.id
            ))
            .into());
        }
        let segments = validate_segments(story.id, segments)?;
        let segment_count = segments.len();

        let started_at = chrono::Utc::now();
        tracing::info!(story_id = story.id, segments = segment_count, "Pipeline run started");

        let workspace = Workspace::create(&self.work_dir, story.id)
            .await
            .map_err(PipelineError::Workspace)?;

        let result = self
            .execute(workspace.layout(), segments, cancel)
            .await;
        workspace.cleanup().await;

        let (clips, published) = match result {
            Ok(done) => done,
            Err(e) => {
                tracing::error!(story_id = story.id, error = %e, "Pipeline run failed");
                return Err(e);
            }
        };

        story.attach_video_url(published.url.clone())?;

        let report = RunReport {
            story_id: story.id,
            object_key: published.key,
            video_url: published.url,
            segment_count,
            total_duration_secs: clips.iter().map(|c| c.duration_secs).sum(),
            started_at,
            finished_at: chrono::Utc::now(),
        };
        tracing::info!(
            story_id = story.id,
            video_url = %report.video_url,
            duration_secs = report.total_duration_secs,
            "Pipeline run finished",
        );
        Ok(report)
    }

    async fn execute(
        &self,
        layout: &WorkspaceLayout,
        segments: Vec<Segment>,
        cancel: &CancellationToken,
    ) -> Result<(Vec<SegmentClip>, PublishedVideo), PipelineError> {
        let clips = run_segments(Arc::clone(&self.stages), layout, segments, cancel)
            .await
            .map_err(PipelineError::Segments)?;

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        let video_path = self
            .concatenator
            .concatenate(layout, &clips)
            .await
            .map_err(PipelineError::Concatenation)?;

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        let published = self
            .publisher
            .publish(layout.story_id(), &video_path)
            .await
            .map_err(PipelineError::Publish)?;

        Ok((clips, published))
    }
}

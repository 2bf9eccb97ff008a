//! Still image + narration → one clip, under the shared encoder cap.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;

use storyreel_core::ffmpeg::{check_exit, encode_segment_invocation, EncodeSettings, FfmpegError};
use storyreel_core::subprocess::ToolRunner;
use storyreel_core::types::SegmentNumber;
use storyreel_imagegen::GeneratedImage;

use crate::error::SegmentError;
use crate::narration::Narration;
use crate::workspace::WorkspaceLayout;

/// One encoded segment clip.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentClip {
    pub number: SegmentNumber,
    pub path: PathBuf,
    pub duration_secs: f64,
}

pub struct SegmentEncoder {
    runner: Arc<dyn ToolRunner>,
    settings: EncodeSettings,
    permits: Arc<Semaphore>,
}

impl SegmentEncoder {
    /// `permits` is the global encoder cap; share one semaphore across
    /// every encoder that should count against the same limit.
    pub fn new(runner: Arc<dyn ToolRunner>, settings: EncodeSettings, permits: Arc<Semaphore>) -> Self {
        Self {
            runner,
            settings,
            permits,
        }
    }

    pub fn settings(&self) -> &EncodeSettings {
        &self.settings
    }

    /// Encode one clip whose length is the narration's duration.
    ///
    /// The encoder permit is held only while the subprocess runs.
    pub async fn encode(
        &self,
        layout: &WorkspaceLayout,
        number: SegmentNumber,
        image: GeneratedImage,
        narration: &Narration,
    ) -> Result<SegmentClip, SegmentError> {
        let output_path = layout.clip_path(number);
        let invocation = encode_segment_invocation(
            &self.settings,
            image.bytes,
            &narration.audio_path,
            narration.duration_secs,
            &output_path,
        );

        let output = {
            let _permit = self
                .permits
                .acquire()
                .await
                .map_err(|_| SegmentError::Aborted("encoder pool closed".to_string()))?;

            tracing::debug!(
                story_id = layout.story_id(),
                segment = number,
                available = self.permits.available_permits(),
                "Encoding segment clip",
            );
            self.runner
                .run(invocation)
                .await
                .map_err(FfmpegError::from)?
        };

        let output = check_exit(output)?;

        if tokio::fs::metadata(&output_path).await.is_err() {
            return Err(FfmpegError::OutputMissing(output_path.display().to_string()).into());
        }

        tracing::debug!(
            story_id = layout.story_id(),
            segment = number,
            duration_ms = output.duration_ms,
            "Segment clip encoded",
        );

        Ok(SegmentClip {
            number,
            path: output_path,
            duration_secs: narration.duration_secs,
        })
    }
}

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;

use storyreel_core::ffmpeg::{check_exit, concat_invocation, render_manifest, EncodeSettings, FfmpegError};
use storyreel_core::subprocess::ToolRunner;

use crate::encoder::SegmentClip;
use crate::workspace::WorkspaceLayout;

/// Joins clips with the concat demuxer at a constant frame rate.
///
/// The concat pass re-encodes, so it holds one of the encoder permits
/// shared with [`SegmentEncoder`](crate::encoder::SegmentEncoder).
pub struct Concatenator {
    runner: Arc<dyn ToolRunner>,
    settings: EncodeSettings,
    permits: Arc<Semaphore>,
}

impl Concatenator {
    pub fn new(runner: Arc<dyn ToolRunner>, settings: EncodeSettings, permits: Arc<Semaphore>) -> Self {
        Self {
            runner,
            settings,
            permits,
        }
    }

    /// Write the manifest in ascending segment order and produce the
    /// final video. Returns its path inside the workspace.
    pub async fn concatenate(
        &self,
        layout: &WorkspaceLayout,
        clips: &[SegmentClip],
    ) -> Result<PathBuf, FfmpegError> {
        let mut ordered: Vec<&SegmentClip> = clips.iter().collect();
        ordered.sort_by_key(|clip| clip.number);
        let paths: Vec<&PathBuf> = ordered.iter().map(|clip| &clip.path).collect();

        let manifest_path = layout.manifest_path();
        tokio::fs::write(&manifest_path, render_manifest(&paths)).await?;

        let output_path = layout.final_video_path();
        let output = {
            let _permit = self.permits.acquire().await.map_err(|_| {
                FfmpegError::IoError(std::io::Error::other("encoder pool closed"))
            })?;
            self.runner
                .run(concat_invocation(&self.settings, &manifest_path, &output_path))
                .await?
        };
        let output = check_exit(output)?;

        match tokio::fs::metadata(&output_path).await {
            Ok(meta) if meta.len() > 0 => {}
            _ => return Err(FfmpegError::OutputMissing(output_path.display().to_string())),
        }

        tracing::info!(
            story_id = layout.story_id(),
            clips = paths.len(),
            duration_ms = output.duration_ms,
            "Clips concatenated",
        );
        Ok(output_path)
    }
}

use std::path::PathBuf;
use std::sync::Arc;

use storyreel_core::ffmpeg::DurationProbe;
use storyreel_core::types::Segment;
use storyreel_tts::SpeechApi;

use crate::error::SegmentError;
use crate::workspace::WorkspaceLayout;

/// A segment's narration on disk plus its measured length.
#[derive(Debug, Clone, PartialEq)]
pub struct Narration {
    pub audio_path: PathBuf,
    pub duration_secs: f64,
}

/// Text → speech audio file → probed duration.
pub struct NarrationSynthesizer {
    speech: Arc<dyn SpeechApi>,
    probe: Arc<dyn DurationProbe>,
}

impl NarrationSynthesizer {
    pub fn new(speech: Arc<dyn SpeechApi>, probe: Arc<dyn DurationProbe>) -> Self {
        Self { speech, probe }
    }

    /// Synthesize `segment`'s narration into the workspace.
    ///
    /// Writes exactly one file, `story_<id>_segment_<n>.mp3`.
    pub async fn synthesize(
        &self,
        layout: &WorkspaceLayout,
        segment: &Segment,
    ) -> Result<Narration, SegmentError> {
        let text = segment.text.trim();
        if text.is_empty() {
            return Err(SegmentError::Validation(format!(
                "segment {} has no narration text",
                segment.number
            )));
        }

        let request = self.speech.request_for(text);
        let audio = self.speech.synthesize(&request).await?;

        let audio_path = layout.narration_path(segment.number);
        tokio::fs::write(&audio_path, &audio).await?;

        let duration_secs = self.probe.duration_secs(&audio_path).await?;

        tracing::debug!(
            story_id = layout.story_id(),
            segment = segment.number,
            bytes = audio.len(),
            duration_secs,
            "Narration ready",
        );

        Ok(Narration {
            audio_path,
            duration_secs,
        })
    }
}

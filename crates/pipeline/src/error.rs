use std::fmt;

use storyreel_cloud::StorageError;
use storyreel_core::error::CoreError;
use storyreel_core::ffmpeg::FfmpegError;
use storyreel_core::types::SegmentNumber;
use storyreel_imagegen::ImageGenError;
use storyreel_tts::SpeechError;

// ---------------------------------------------------------------------------
// Segment-level errors
// ---------------------------------------------------------------------------

/// Coarse classification of a segment failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentErrorKind {
    /// Narration or image service failure, including poll timeouts.
    ExternalService,
    /// Encoder or probe failure, including invalid durations and timeouts.
    Encoding,
    Validation,
    Cancelled,
    /// Local I/O or a crashed task.
    Internal,
}

/// Why one segment task failed. Fails only that segment.
#[derive(Debug, thiserror::Error)]
pub enum SegmentError {
    #[error("narration failed: {0}")]
    Narration(#[from] SpeechError),

    #[error("image generation failed: {0}")]
    ImageGeneration(#[from] ImageGenError),

    #[error("encoding failed: {0}")]
    Encoding(#[from] FfmpegError),

    #[error("invalid segment: {0}")]
    Validation(String),

    #[error("cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("segment task aborted: {0}")]
    Aborted(String),
}

impl SegmentError {
    pub fn kind(&self) -> SegmentErrorKind {
        match self {
            Self::Narration(_) | Self::ImageGeneration(_) => SegmentErrorKind::ExternalService,
            Self::Encoding(_) => SegmentErrorKind::Encoding,
            Self::Validation(_) => SegmentErrorKind::Validation,
            Self::Cancelled => SegmentErrorKind::Cancelled,
            Self::Io(_) | Self::Aborted(_) => SegmentErrorKind::Internal,
        }
    }
}

/// Every failed segment of a run, ordered by segment number.
#[derive(Debug)]
pub struct SegmentFailures {
    failures: Vec<(SegmentNumber, SegmentError)>,
}

impl SegmentFailures {
    pub fn new(mut failures: Vec<(SegmentNumber, SegmentError)>) -> Self {
        failures.sort_by_key(|(number, _)| *number);
        Self { failures }
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn segment_numbers(&self) -> Vec<SegmentNumber> {
        self.failures.iter().map(|(n, _)| *n).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SegmentNumber, &SegmentError)> {
        self.failures.iter().map(|(n, e)| (*n, e))
    }

    /// The failure for `number`, if that segment failed.
    pub fn get(&self, number: SegmentNumber) -> Option<&SegmentError> {
        self.failures
            .iter()
            .find(|(n, _)| *n == number)
            .map(|(_, e)| e)
    }
}

impl fmt::Display for SegmentFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.failures.len() == 1 {
            "segment"
        } else {
            "segments"
        };
        write!(f, "{} {noun} failed", self.failures.len())?;
        for (i, (number, error)) in self.failures.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}segment {number}: {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SegmentFailures {}

// ---------------------------------------------------------------------------
// Run-level errors
// ---------------------------------------------------------------------------

/// Why a pipeline run failed.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Rejected before any external call.
    #[error("validation failed: {0}")]
    Validation(#[from] CoreError),

    #[error("could not prepare run workspace: {0}")]
    Workspace(#[source] std::io::Error),

    #[error(transparent)]
    Segments(SegmentFailures),

    #[error("concatenation failed: {0}")]
    Concatenation(#[source] FfmpegError),

    #[error("publish failed: {0}")]
    Publish(#[source] StorageError),

    #[error("run cancelled")]
    Cancelled,
}

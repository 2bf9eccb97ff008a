use std::sync::Arc;

use storyreel_core::types::Segment;
use storyreel_imagegen::{GeneratedImage, ImageGenerator};

use crate::error::SegmentError;

/// Segment text → generated image bytes, held in memory until encoding.
pub struct ImageSynthesizer {
    generator: Arc<ImageGenerator>,
}

impl ImageSynthesizer {
    pub fn new(generator: Arc<ImageGenerator>) -> Self {
        Self { generator }
    }

    pub async fn synthesize(&self, segment: &Segment) -> Result<GeneratedImage, SegmentError> {
        let text = segment.text.trim();
        if text.is_empty() {
            return Err(SegmentError::Validation(format!(
                "segment {} has no text to illustrate",
                segment.number
            )));
        }

        let image = self.generator.generate(text).await?;

        tracing::debug!(
            segment = segment.number,
            job_id = %image.job_id,
            bytes = image.bytes.len(),
            "Image ready",
        );
        Ok(image)
    }
}

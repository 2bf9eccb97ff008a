use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Stories are keyed by the surrounding application's BIGSERIAL ids.
pub type StoryId = i64;

/// 1-based position of a segment within its story.
pub type SegmentNumber = u32;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// A story submitted for video generation.
///
/// `video_url` stays `None` until a pipeline run publishes the final video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    pub id: StoryId,
    pub content: String,
    pub video_url: Option<String>,
}

impl Story {
    pub fn new(id: StoryId, content: impl Into<String>) -> Self {
        Self {
            id,
            content: content.into(),
            video_url: None,
        }
    }

    /// Attach the published video address.
    ///
    /// A story is mutated exactly once per successful run; attaching a
    /// second address is rejected.
    pub fn attach_video_url(&mut self, url: impl Into<String>) -> Result<(), CoreError> {
        if let Some(existing) = &self.video_url {
            return Err(CoreError::Validation(format!(
                "Story {} already has a video address: {existing}",
                self.id
            )));
        }
        self.video_url = Some(url.into());
        Ok(())
    }
}

/// One unit of narration text, as produced by the segmenter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub number: SegmentNumber,
    pub text: String,
}

impl Segment {
    pub fn new(number: SegmentNumber, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
        }
    }

    /// Zero-based slot index for order-indexed result collections.
    pub fn index(&self) -> usize {
        self.number.saturating_sub(1) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_story_has_no_video() {
        let story = Story::new(7, "Once upon a midnight dreary");
        assert_eq!(story.id, 7);
        assert!(story.video_url.is_none());
    }

    #[test]
    fn attach_video_url_once() {
        let mut story = Story::new(1, "text");
        story
            .attach_video_url("https://cdn.example/videos/story_1_video.mp4")
            .unwrap();
        assert_eq!(
            story.video_url.as_deref(),
            Some("https://cdn.example/videos/story_1_video.mp4")
        );
    }

    #[test]
    fn attach_video_url_twice_is_rejected() {
        let mut story = Story::new(1, "text");
        story.attach_video_url("a").unwrap();
        assert!(story.attach_video_url("b").is_err());
        assert_eq!(story.video_url.as_deref(), Some("a"));
    }

    #[test]
    fn segment_index_is_zero_based() {
        assert_eq!(Segment::new(1, "x").index(), 0);
        assert_eq!(Segment::new(4, "x").index(), 3);
    }
}

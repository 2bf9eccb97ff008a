//! Segment markup parsing and the segmentation boundary.
//!
//! The upstream segmenter (a language model, outside this workspace)
//! returns the story split into tagged blocks:
//!
//! ```text
//! <segment number="1">
//! It was a dark and stormy night.
//! </segment>
//! ```
//!
//! [`parse_segment_markup`] turns that text into [`Segment`]s and
//! [`validate_segments`] enforces the ordering contract the pipeline
//! relies on: non-empty, numbers unique and contiguous from 1.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::CoreError;
use crate::types::{Segment, SegmentNumber, StoryId};

/// External collaborator that splits story text into ordered segments.
#[async_trait::async_trait]
pub trait SegmentationClient: Send + Sync {
    async fn segment(&self, story_id: StoryId, text: &str) -> Result<Vec<Segment>, CoreError>;
}

fn segment_tag() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| {
        Regex::new(r#"(?s)<segment\s+number\s*=\s*"\s*([^"]*?)\s*"\s*>(.*?)</segment>"#)
            .expect("segment tag pattern is valid")
    })
}

/// Extract every `<segment number="N">` block from segmenter output.
///
/// Block text is trimmed; blocks that are empty after trimming are
/// skipped. A non-numeric `number` attribute is a validation error.
/// The result is returned in document order and is not yet validated.
pub fn parse_segment_markup(markup: &str) -> Result<Vec<Segment>, CoreError> {
    let mut segments = Vec::new();
    for caps in segment_tag().captures_iter(markup) {
        let raw_number = &caps[1];
        let text = caps[2].trim();
        if text.is_empty() {
            continue;
        }
        let number: SegmentNumber = raw_number.parse().map_err(|_| {
            CoreError::Validation(format!("Invalid segment number '{raw_number}'"))
        })?;
        segments.push(Segment::new(number, text));
    }
    Ok(segments)
}

/// Check the segmentation contract and return the segments sorted by number.
///
/// Rules:
/// - At least one segment.
/// - Numbers start at 1, are unique, and have no gaps.
/// - Every segment has non-blank text.
pub fn validate_segments(
    story_id: StoryId,
    mut segments: Vec<Segment>,
) -> Result<Vec<Segment>, CoreError> {
    if segments.is_empty() {
        return Err(CoreError::NoSegments { story_id });
    }

    let mut seen = HashSet::with_capacity(segments.len());
    for segment in &segments {
        if segment.number == 0 {
            return Err(CoreError::Validation(
                "Segment numbers start at 1".to_string(),
            ));
        }
        if !seen.insert(segment.number) {
            return Err(CoreError::Validation(format!(
                "Duplicate segment number {}",
                segment.number
            )));
        }
        if segment.text.trim().is_empty() {
            return Err(CoreError::Validation(format!(
                "Segment {} has empty text",
                segment.number
            )));
        }
    }

    segments.sort_by_key(|s| s.number);

    let count = segments.len() as SegmentNumber;
    if let Some(last) = segments.last() {
        if last.number != count {
            return Err(CoreError::Validation(format!(
                "Segment numbers must be contiguous from 1 to {count}, found {}",
                last.number
            )));
        }
    }

    Ok(segments)
}

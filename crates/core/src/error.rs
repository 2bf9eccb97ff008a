use crate::types::StoryId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Story {story_id} has no segments")]
    NoSegments { story_id: StoryId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

use std::path::Path;
use std::sync::Arc;

use storyreel_cloud::{ObjectStore, StorageError};
use storyreel_core::types::StoryId;

pub const VIDEO_CONTENT_TYPE: &str = "video/mp4";

/// Object key of a story's final video.
pub fn object_key(story_id: StoryId) -> String {
    format!("videos/story_{story_id}_video.mp4")
}

/// Where published videos go and how they are addressed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishTarget {
    pub bucket: String,
    /// Public URL prefix; the object key is appended after a `/`.
    pub public_base_url: String,
}

impl PublishTarget {
    pub fn public_url(&self, key: &str) -> String {
        format!(
            "{}/{}",
            self.public_base_url.trim_end_matches('/'),
            key.trim_start_matches('/')
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedVideo {
    pub key: String,
    pub url: String,
}

/// Uploads the final video. One attempt; failure is returned as-is.
pub struct ArtifactPublisher {
    store: Arc<dyn ObjectStore>,
    target: PublishTarget,
}

impl ArtifactPublisher {
    pub fn new(store: Arc<dyn ObjectStore>, target: PublishTarget) -> Self {
        Self { store, target }
    }

    pub async fn publish(
        &self,
        story_id: StoryId,
        video_path: &Path,
    ) -> Result<PublishedVideo, StorageError> {
        let key = object_key(story_id);
        self.store
            .put_object(&self.target.bucket, &key, video_path, VIDEO_CONTENT_TYPE)
            .await?;

        let url = self.target.public_url(&key);
        tracing::info!(story_id, key = %key, url = %url, "Video published");
        Ok(PublishedVideo { key, url })
    }
}

use std::path::PathBuf;

use storyreel_cloud::StorageConfig;
use storyreel_core::config::{require_env, ConfigError};
use storyreel_core::types::StoryId;
use storyreel_imagegen::ImageGenConfig;
use storyreel_pipeline::{PipelineConfig, PublishTarget};
use storyreel_tts::SpeechConfig;

/// Everything one worker invocation needs, loaded from the environment.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub story_id: StoryId,
    /// Segment markup produced by the upstream segmenter.
    pub story_file: PathBuf,
    pub speech: SpeechConfig,
    pub imagegen: ImageGenConfig,
    pub storage: StorageConfig,
    pub pipeline: PipelineConfig,
}

impl WorkerConfig {
    /// Load every sub-configuration plus `STORY_ID` and `STORY_FILE`.
    ///
    /// Fails on the first missing or invalid variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw_id = require_env("STORY_ID")?;
        let story_id: StoryId = raw_id.parse().map_err(|_| ConfigError::Invalid {
            var: "STORY_ID",
            reason: format!("'{raw_id}' is not an integer"),
        })?;

        Ok(Self {
            story_id,
            story_file: PathBuf::from(require_env("STORY_FILE")?),
            speech: SpeechConfig::from_env()?,
            imagegen: ImageGenConfig::from_env()?,
            storage: StorageConfig::from_env()?,
            pipeline: PipelineConfig::from_env()?,
        })
    }

    pub fn publish_target(&self) -> PublishTarget {
        PublishTarget {
            bucket: self.storage.bucket.clone(),
            public_base_url: self.storage.public_base_url.clone(),
        }
    }
}

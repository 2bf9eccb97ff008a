use std::time::Duration;

use storyreel_core::config::{env_or, optional_env, parse_env_or, require_env, ConfigError};

/// Fixed generation options applied to every segment prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOptions {
    pub aspect_ratio: String,
    pub output_format: String,
    /// 1..=100
    pub output_quality: u8,
    /// Style hint appended to every prompt, e.g. `"cinematic, moody lighting"`.
    pub prompt_suffix: Option<String>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            aspect_ratio: "16:9".to_string(),
            output_format: "webp".to_string(),
            output_quality: 90,
            prompt_suffix: None,
        }
    }
}

impl GenerationOptions {
    /// Segment text plus the optional style suffix.
    pub fn prompt_for(&self, text: &str) -> String {
        match &self.prompt_suffix {
            Some(suffix) => format!("{}, {suffix}", text.trim()),
            None => text.trim().to_string(),
        }
    }
}

/// Poll budget for a generation job.
///
/// The worst-case wait for a job that never finishes is
/// `max_retries × interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_retries: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_retries: 60,
        }
    }
}

impl PollPolicy {
    pub fn max_wait(&self) -> Duration {
        self.interval * self.max_retries
    }
}

/// Connection settings for the image service.
#[derive(Debug, Clone)]
pub struct ImageGenConfig {
    pub api_token: String,
    /// Base URL without trailing slash, e.g. `https://api.replicate.com/v1`.
    pub base_url: String,
    /// Model path, e.g. `black-forest-labs/flux-schnell`.
    pub model: String,
    pub options: GenerationOptions,
    pub poll: PollPolicy,
    pub request_timeout: Duration,
}

impl ImageGenConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                     | Default                          |
    /// |-----------------------------|----------------------------------|
    /// | `REPLICATE_API_TOKEN`       | required                         |
    /// | `IMAGEGEN_BASE_URL`         | `https://api.replicate.com/v1`   |
    /// | `IMAGEGEN_MODEL`            | `black-forest-labs/flux-schnell` |
    /// | `IMAGEGEN_ASPECT_RATIO`     | `16:9`                           |
    /// | `IMAGEGEN_OUTPUT_FORMAT`    | `webp`                           |
    /// | `IMAGEGEN_OUTPUT_QUALITY`   | `90`                             |
    /// | `IMAGEGEN_PROMPT_SUFFIX`    | unset                            |
    /// | `IMAGEGEN_POLL_INTERVAL_MS` | `2000`                           |
    /// | `IMAGEGEN_MAX_RETRIES`      | `60`                             |
    pub fn from_env() -> Result<Self, ConfigError> {
        let output_quality: u8 = parse_env_or("IMAGEGEN_OUTPUT_QUALITY", 90u8)?;
        if !(1..=100).contains(&output_quality) {
            return Err(ConfigError::Invalid {
                var: "IMAGEGEN_OUTPUT_QUALITY",
                reason: format!("{output_quality} is outside 1..=100"),
            });
        }

        let max_retries: u32 = parse_env_or("IMAGEGEN_MAX_RETRIES", 60u32)?;
        if max_retries == 0 {
            return Err(ConfigError::Invalid {
                var: "IMAGEGEN_MAX_RETRIES",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            api_token: require_env("REPLICATE_API_TOKEN")?,
            base_url: env_or("IMAGEGEN_BASE_URL", "https://api.replicate.com/v1")
                .trim_end_matches('/')
                .to_string(),
            model: env_or("IMAGEGEN_MODEL", "black-forest-labs/flux-schnell"),
            options: GenerationOptions {
                aspect_ratio: env_or("IMAGEGEN_ASPECT_RATIO", "16:9"),
                output_format: env_or("IMAGEGEN_OUTPUT_FORMAT", "webp"),
                output_quality,
                prompt_suffix: optional_env("IMAGEGEN_PROMPT_SUFFIX"),
            },
            poll: PollPolicy {
                interval: Duration::from_millis(parse_env_or("IMAGEGEN_POLL_INTERVAL_MS", 2000u64)?),
                max_retries,
            },
            request_timeout: Duration::from_secs(60),
        })
    }
}

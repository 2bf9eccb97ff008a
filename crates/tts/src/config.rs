use std::time::Duration;

use storyreel_core::config::{env_or, parse_env_or, require_env, ConfigError};

/// Connection settings for the narration service.
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    pub api_key: String,
    /// Base URL without trailing slash, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    pub model: String,
    pub voice: String,
    pub request_timeout: Duration,
}

impl SpeechConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                   | Default                     |
    /// |---------------------------|-----------------------------|
    /// | `OPENAI_API_KEY`          | required                    |
    /// | `TTS_BASE_URL`            | `https://api.openai.com/v1` |
    /// | `TTS_MODEL`               | `tts-1`                     |
    /// | `TTS_VOICE`               | `onyx`                      |
    /// | `TTS_REQUEST_TIMEOUT_SECS`| `120`                       |
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: require_env("OPENAI_API_KEY")?,
            base_url: env_or("TTS_BASE_URL", "https://api.openai.com/v1")
                .trim_end_matches('/')
                .to_string(),
            model: env_or("TTS_MODEL", "tts-1"),
            voice: env_or("TTS_VOICE", "onyx"),
            request_timeout: Duration::from_secs(parse_env_or("TTS_REQUEST_TIMEOUT_SECS", 120u64)?),
        })
    }
}

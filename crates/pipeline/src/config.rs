use std::path::PathBuf;
use std::time::Duration;

use storyreel_core::config::{env_or, parse_env_or, ConfigError};
use storyreel_core::ffmpeg::{EncodeSettings, DEFAULT_FRAME_RATE};

/// Default cap on simultaneously running encoder subprocesses.
pub const DEFAULT_MAX_ENCODES: usize = 2;

/// Default cap on in-flight narration/image requests.
pub const DEFAULT_MAX_REQUESTS: usize = 8;

/// Run-level settings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root under which each run creates its own workspace directory.
    pub work_dir: PathBuf,
    pub encode: EncodeSettings,
    pub max_encodes: usize,
    pub max_requests: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("./temp"),
            encode: EncodeSettings::default(),
            max_encodes: DEFAULT_MAX_ENCODES,
            max_requests: DEFAULT_MAX_REQUESTS,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                      | Default  |
    /// |------------------------------|----------|
    /// | `PIPELINE_WORK_DIR`          | `./temp` |
    /// | `PIPELINE_FRAME_RATE`        | `15`     |
    /// | `PIPELINE_MAX_ENCODES`       | `2`      |
    /// | `PIPELINE_MAX_REQUESTS`      | `8`      |
    /// | `PIPELINE_TOOL_TIMEOUT_SECS` | `600`    |
    pub fn from_env() -> Result<Self, ConfigError> {
        let frame_rate: u32 = at_least_one(
            "PIPELINE_FRAME_RATE",
            parse_env_or("PIPELINE_FRAME_RATE", DEFAULT_FRAME_RATE)?,
        )?;
        let max_encodes: usize = at_least_one(
            "PIPELINE_MAX_ENCODES",
            parse_env_or("PIPELINE_MAX_ENCODES", DEFAULT_MAX_ENCODES)?,
        )?;
        let max_requests: usize = at_least_one(
            "PIPELINE_MAX_REQUESTS",
            parse_env_or("PIPELINE_MAX_REQUESTS", DEFAULT_MAX_REQUESTS)?,
        )?;
        let timeout_secs: u64 = at_least_one(
            "PIPELINE_TOOL_TIMEOUT_SECS",
            parse_env_or("PIPELINE_TOOL_TIMEOUT_SECS", 600u64)?,
        )?;

        Ok(Self {
            work_dir: PathBuf::from(env_or("PIPELINE_WORK_DIR", "./temp")),
            encode: EncodeSettings {
                frame_rate,
                timeout: Duration::from_secs(timeout_secs),
                ..EncodeSettings::default()
            },
            max_encodes,
            max_requests,
        })
    }
}

fn at_least_one<T>(var: &'static str, value: T) -> Result<T, ConfigError>
where
    T: PartialOrd + From<u8>,
{
    if value < T::from(1u8) {
        return Err(ConfigError::Invalid {
            var,
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.work_dir, PathBuf::from("./temp"));
        assert_eq!(config.encode.frame_rate, 15);
        assert_eq!(config.max_encodes, 2);
        assert_eq!(config.max_requests, 8);
        assert_eq!(config.encode.timeout, Duration::from_secs(600));
    }

    // One test owns the PIPELINE_* variables; tests share the process environment.
    #[test]
    fn from_env_reads_and_validates() {
        std::env::set_var("PIPELINE_WORK_DIR", "/tmp/storyreel");
        std::env::set_var("PIPELINE_MAX_ENCODES", "4");
        std::env::remove_var("PIPELINE_FRAME_RATE");
        std::env::remove_var("PIPELINE_MAX_REQUESTS");
        std::env::set_var("PIPELINE_TOOL_TIMEOUT_SECS", "30");

        let config = PipelineConfig::from_env().unwrap();
        assert_eq!(config.work_dir, PathBuf::from("/tmp/storyreel"));
        assert_eq!(config.max_encodes, 4);
        assert_eq!(config.max_requests, 8);
        assert_eq!(config.encode.frame_rate, 15);
        assert_eq!(config.encode.timeout, Duration::from_secs(30));

        std::env::set_var("PIPELINE_MAX_ENCODES", "0");
        assert_eq!(
            PipelineConfig::from_env().unwrap_err(),
            ConfigError::Invalid {
                var: "PIPELINE_MAX_ENCODES",
                reason: "must be at least 1".to_string(),
            }
        );

        std::env::set_var("PIPELINE_MAX_ENCODES", "two");
        assert!(PipelineConfig::from_env().is_err());

        std::env::remove_var("PIPELINE_MAX_ENCODES");
        std::env::remove_var("PIPELINE_WORK_DIR");
        std::env::remove_var("PIPELINE_TOOL_TIMEOUT_SECS");
    }
}

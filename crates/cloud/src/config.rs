use storyreel_core::config::{env_or, optional_env, require_env, ConfigError};

/// Connection settings for the S3-compatible bucket that receives videos.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    /// API endpoint, e.g. `https://<account>.r2.cloudflarestorage.com`.
    pub endpoint: String,
    /// Base of the public URL recorded on the story. Defaults to `endpoint`.
    pub public_base_url: String,
    pub region: String,
    /// Static credentials; both unset falls back to the default AWS chain.
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl StorageConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                 | Default       |
    /// |-------------------------|---------------|
    /// | `R2_BUCKET`             | required      |
    /// | `R2_ENDPOINT`           | required      |
    /// | `R2_PUBLIC_BASE_URL`    | `R2_ENDPOINT` |
    /// | `STORAGE_REGION`        | `auto`        |
    /// | `AWS_ACCESS_KEY_ID`     | unset         |
    /// | `AWS_SECRET_ACCESS_KEY` | unset         |
    pub fn from_env() -> Result<Self, ConfigError> {
        let endpoint = require_env("R2_ENDPOINT")?.trim_end_matches('/').to_string();
        let public_base_url = optional_env("R2_PUBLIC_BASE_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| endpoint.clone());

        let access_key_id = optional_env("AWS_ACCESS_KEY_ID");
        let secret_access_key = optional_env("AWS_SECRET_ACCESS_KEY");
        if access_key_id.is_some() != secret_access_key.is_some() {
            return Err(ConfigError::Invalid {
                var: "AWS_SECRET_ACCESS_KEY",
                reason: "AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY must be set together".into(),
            });
        }

        Ok(Self {
            bucket: require_env("R2_BUCKET")?,
            endpoint,
            public_base_url,
            region: env_or("STORAGE_REGION", "auto"),
            access_key_id,
            secret_access_key,
        })
    }
}

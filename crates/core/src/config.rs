//! Environment-variable helpers shared by every `from_env` constructor.

use std::str::FromStr;

/// Invalid or missing configuration. Raised before any external call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Read a required, non-blank variable.
pub fn require_env(var: &'static str) -> Result<String, ConfigError> {
    match std::env::var(var) {
        Ok(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ConfigError::Missing(var)),
    }
}

/// Read an optional variable; blank counts as unset.
pub fn optional_env(var: &'static str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read a variable, falling back to `default` when unset.
pub fn env_or(var: &'static str, default: &str) -> String {
    optional_env(var).unwrap_or_else(|| default.to_string())
}

/// Parse a variable into `T`, falling back to `default` when unset.
pub fn parse_env_or<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(var) {
        None => Ok(default),
        Some(raw) => raw.parse::<T>().map_err(|e| ConfigError::Invalid {
            var,
            reason: format!("'{raw}': {e}"),
        }),
    }
}

use super::{types::Config, ConfigError};
use crate::config::AuthMethod;

/// Validate configuration
/// Currently validates:
/// - Auth section exists (enforced by serde)
/// - Server port is not 0
/// - api_key auth has a non-empty key
/// - OTS section, when present, has a URL and credentials
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.auth.method == AuthMethod::ApiKey
        && config.auth.api_key.as_deref().unwrap_or("").is_empty()
    {
        return Err(ConfigError::ValidationError(
            "auth.api_key is required when auth.method is \"api_key\"".to_string(),
        ));
    }

    if let Some(ots) = &config.ots {
        if ots.url.is_empty() {
            return Err(ConfigError::ValidationError(
                "ots.url cannot be empty".to_string(),
            ));
        }
        if ots.username.is_empty() || ots.password.is_empty() {
            return Err(ConfigError::ValidationError(
                "ots.username and ots.password are required".to_string(),
            ));
        }
    }

    if config.batch.poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "batch.poll_interval_ms cannot be 0".to_string(),
        ));
    }

    Ok(())
}

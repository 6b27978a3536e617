use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::{types::Config, ConfigError};

/// Environment variable naming the config file.
pub const CONFIG_PATH_VAR: &str = "GALLEYFORGE_CONFIG";

/// Resolve the config file path: `GALLEYFORGE_CONFIG` when set,
/// `config.toml` in the working directory otherwise.
pub fn config_path_from_env() -> PathBuf {
    resolve_config_path(std::env::var_os(CONFIG_PATH_VAR))
}

fn resolve_config_path(var: Option<OsString>) -> PathBuf {
    match var {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => PathBuf::from("config.toml"),
    }
}

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("GALLEYFORGE_").split("_"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

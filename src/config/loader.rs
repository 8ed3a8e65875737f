//! Settings file discovery and parsing.

use std::path::{Path, PathBuf};

use crate::config::schema::ServerConfig;
use crate::error::{ConfigError, FileboxError};

/// Settings file looked up in the home directory.
const DEFAULT_SETTINGS_FILE: &str = ".filebox-settings.json";

/// `~/.filebox-settings.json`, if a home directory is known.
pub fn default_settings_path() -> Option<PathBuf> {
    Some(dirs::home_dir()?.join(DEFAULT_SETTINGS_FILE))
}

/// Pick the settings for this run.
///
/// An explicit path must exist. Without one the home settings file is used
/// when present, and built-in defaults otherwise.
pub fn resolve_config(explicit: Option<&Path>) -> Result<ServerConfig, FileboxError> {
    if let Some(path) = explicit {
        return load_config(path);
    }

    match default_settings_path() {
        Some(path) if path.is_file() => load_config(&path),
        _ => {
            tracing::debug!("No settings file found, using defaults");
            Ok(ServerConfig::default())
        }
    }
}

/// Read and parse a settings file.
pub fn load_config(path: &Path) -> Result<ServerConfig, FileboxError> {
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ConfigError::FileNotFound(path.display().to_string()),
        _ => ConfigError::ParseError(format!("{}: {}", path.display(), e)),
    })?;

    tracing::debug!("Loading settings from {}", path.display());
    parse_config(&content)
}

/// Parse and validate settings JSON. Missing keys take their defaults.
pub fn parse_config(json: &str) -> Result<ServerConfig, FileboxError> {
    let config: ServerConfig = serde_json::from_str(json)
        .map_err(|e| ConfigError::ParseError(format!("invalid settings JSON: {}", e)))?;
    config.validate()?;
    Ok(config)
}

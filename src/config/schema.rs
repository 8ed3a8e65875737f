//! Configuration schema for the settings file.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, FileboxError};
use crate::utils::{absolutize, expand_home};

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";

/// Default data directory, relative to the working directory.
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Default static asset directory, relative to the working directory.
pub const DEFAULT_WEB_DIR: &str = "./web";

/// Default multipart body limit (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 << 20;

/// Default interval between expired-token sweeps.
pub const DEFAULT_TOKEN_CLEANUP_INTERVAL_SECS: u64 = 3600;

/// Main server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Address to bind to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Directory holding the web client. Not served when absent.
    #[serde(default)]
    pub web_dir: Option<String>,

    /// Root of all persisted data (credentials and user files).
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Maximum accepted upload body size in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Seconds between expired-token sweeps; 0 disables the sweep.
    #[serde(default = "default_token_cleanup_interval_secs")]
    pub token_cleanup_interval_secs: u64,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_bind_address() -> String {
    DEFAULT_BIND_ADDRESS.to_string()
}

fn default_data_dir() -> String {
    DEFAULT_DATA_DIR.to_string()
}

fn default_max_upload_bytes() -> usize {
    DEFAULT_MAX_UPLOAD_BYTES
}

fn default_token_cleanup_interval_secs() -> u64 {
    DEFAULT_TOKEN_CLEANUP_INTERVAL_SECS
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind_address: default_bind_address(),
            web_dir: None,
            data_dir: default_data_dir(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            token_cleanup_interval_secs: DEFAULT_TOKEN_CLEANUP_INTERVAL_SECS,
        }
    }
}

impl ServerConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), FileboxError> {
        if self.port == 0 {
            return Err(ConfigError::ValidationError("port must be non-zero".to_string()).into());
        }

        if self.bind_address.trim().is_empty() {
            return Err(
                ConfigError::ValidationError("bindAddress cannot be empty".to_string()).into(),
            );
        }

        if self.data_dir.trim().is_empty() {
            return Err(ConfigError::ValidationError("dataDir cannot be empty".to_string()).into());
        }

        if self.max_upload_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "maxUploadBytes must be greater than zero".to_string(),
            )
            .into());
        }

        Ok(())
    }

    /// Absolute data directory, with `~` expanded.
    pub fn data_path(&self) -> PathBuf {
        absolutize(&PathBuf::from(expand_home(&self.data_dir)))
    }

    /// Absolute web directory, with `~` expanded.
    pub fn web_path(&self) -> Option<PathBuf> {
        self.web_dir
            .as_deref()
            .map(|dir| absolutize(&PathBuf::from(expand_home(dir))))
    }

    /// Socket address string to listen on.
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

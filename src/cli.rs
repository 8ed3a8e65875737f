//! CLI parsing.

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::config::{resolve_config, ServerConfig, DEFAULT_WEB_DIR};
use crate::error::FileboxError;

/// Filebox - multi-user HTTP file manager
#[derive(Parser, Debug)]
#[command(name = "filebox")]
#[command(about = "Filebox - serve per-user sandboxed file storage over HTTP")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short = 'd', long = "debug")]
    pub debug: bool,

    /// Path to settings file (default: ~/.filebox-settings.json)
    #[arg(short = 's', long = "settings")]
    pub settings: Option<PathBuf>,

    /// Port to listen on
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Directory holding the web client (default: ./web when present)
    #[arg(long = "web")]
    pub web: Option<String>,

    /// Directory holding credentials and user files
    #[arg(long = "data")]
    pub data: Option<String>,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Settings for this run, with command-line flags applied on top.
    pub fn load_settings(&self) -> Result<ServerConfig, FileboxError> {
        let mut config = resolve_config(self.settings.as_deref())?;
        self.apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line flags on top of the loaded settings.
    pub fn apply_overrides(&self, config: &mut ServerConfig) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(ref web) = self.web {
            config.web_dir = Some(web.clone());
        }
        if let Some(ref data) = self.data {
            config.data_dir = data.clone();
        }

        if config.web_dir.is_none() && Path::new(DEFAULT_WEB_DIR).is_dir() {
            config.web_dir = Some(DEFAULT_WEB_DIR.to_string());
        }
    }
}

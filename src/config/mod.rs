//! Server settings.

pub mod loader;
pub mod schema;

pub use loader::{default_settings_path, load_config, parse_config, resolve_config};
pub use schema::{
    ServerConfig, DEFAULT_BIND_ADDRESS, DEFAULT_DATA_DIR, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_PORT,
    DEFAULT_TOKEN_CLEANUP_INTERVAL_SECS, DEFAULT_WEB_DIR,
};

//! Filebox - a multi-user HTTP file manager.
//!
//! Each registered user gets a private directory under the data root. Requests
//! authenticate with bearer tokens and every path is confined to the caller's
//! directory before it touches the filesystem.

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod files;
pub mod manager;
pub mod server;
pub mod utils;

pub use auth::{CredentialStore, SessionManager};
pub use config::ServerConfig;
pub use error::{ConfigError, FileboxError, Result};
pub use files::{FileEntry, FileStore};
pub use manager::FileboxManager;

/// Re-export commonly used items.
pub mod prelude {
    pub use crate::auth::SessionManager;
    pub use crate::config::ServerConfig;
    pub use crate::error::{FileboxError, Result};
    pub use crate::files::FileStore;
    pub use crate::manager::FileboxManager;
}

//! Runtime state owned by the manager.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::auth::SessionManager;
use crate::config::ServerConfig;
use crate::files::FileStore;
use crate::server::HttpServer;

/// Internal state for the file manager.
#[derive(Default)]
pub struct ManagerState {
    /// The configuration the manager was initialized with.
    pub config: Option<ServerConfig>,

    /// Credentials and tokens.
    pub sessions: Option<Arc<SessionManager>>,

    /// Per-user file storage.
    pub files: Option<Arc<FileStore>>,

    /// Running HTTP server.
    pub server: Option<HttpServer>,

    /// Address the server is listening on.
    pub local_addr: Option<SocketAddr>,

    /// Location of the credential file.
    pub credentials_path: Option<PathBuf>,

    /// Periodic expired-token sweep.
    pub cleanup_task: Option<JoinHandle<()>>,

    /// Whether the manager has been initialized.
    pub initialized: bool,
}

impl ManagerState {
    /// Create a new manager state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop background work and clear everything.
    pub fn reset(&mut self) {
        if let Some(task) = self.cleanup_task.take() {
            task.abort();
        }
        if let Some(ref mut server) = self.server {
            server.stop();
        }

        self.server = None;
        self.local_addr = None;
        self.sessions = None;
        self.files = None;
        self.credentials_path = None;
        self.config = None;
        self.initialized = false;
    }
}

//! File manager - main orchestration module.

pub mod state;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::task::JoinHandle;

use crate::auth::{CredentialStore, SessionManager, ADMIN_USERNAME, CREDENTIALS_FILE_NAME};
use crate::config::ServerConfig;
use crate::error::{ConfigError, FileboxError};
use crate::files::FileStore;
use crate::server::{ApiHandler, HttpServer, StaticAssets};

use self::state::ManagerState;

/// Subdirectory of the data directory holding every user's files.
pub const FILES_DIR_NAME: &str = "files";

/// Location of the credential file for a data directory.
///
/// The file sits inside the admin user's own directory.
pub fn credentials_path(data_dir: &Path) -> PathBuf {
    data_dir
        .join(FILES_DIR_NAME)
        .join(ADMIN_USERNAME)
        .join(CREDENTIALS_FILE_NAME)
}

/// The file manager - owns the session manager, file store and HTTP server.
pub struct FileboxManager {
    state: Arc<RwLock<ManagerState>>,
}

impl Default for FileboxManager {
    fn default() -> Self {
        Self::new()
    }
}

impl FileboxManager {
    /// Create a new, uninitialized manager.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(ManagerState::new())),
        }
    }

    /// Create the data layout, load credentials and start serving.
    pub async fn initialize(&self, config: ServerConfig) -> Result<(), FileboxError> {
        config.validate()?;

        if self.is_initialized() {
            return Err(FileboxError::Server("Manager already initialized".to_string()));
        }

        let data_dir = config.data_path();
        let files_dir = data_dir.join(FILES_DIR_NAME);
        tokio::fs::create_dir_all(&files_dir).await?;

        let assets = match config.web_path() {
            Some(web_dir) if web_dir.is_dir() => Some(StaticAssets::new(web_dir)),
            Some(web_dir) => {
                return Err(ConfigError::FileNotFound(web_dir.display().to_string()).into());
            }
            None => None,
        };

        let creds_path = credentials_path(&data_dir);
        let sessions = Arc::new(SessionManager::new(CredentialStore::new(&creds_path)));
        let files = Arc::new(FileStore::new(&files_dir));

        let handler = Arc::new(ApiHandler::new(
            sessions.clone(),
            files.clone(),
            assets.clone(),
            config.max_upload_bytes,
        ));

        let mut server = HttpServer::bind(&config.listen_address(), handler).await?;
        server.start()?;
        let local_addr = server.local_addr();

        let cleanup_task = spawn_token_sweep(sessions.clone(), config.token_cleanup_interval_secs);

        tracing::info!("Server started on {}", local_addr);
        tracing::info!("Data directory: {}", data_dir.display());
        match &assets {
            Some(assets) => tracing::info!("Web interface served from {}", assets.root().display()),
            None => tracing::info!("No web directory configured; serving the API only"),
        }

        let mut state = self.state.write();
        state.sessions = Some(sessions);
        state.files = Some(files);
        state.server = Some(server);
        state.local_addr = Some(local_addr);
        state.credentials_path = Some(creds_path);
        state.cleanup_task = cleanup_task;
        state.config = Some(config);
        state.initialized = true;

        Ok(())
    }

    /// Check if the manager is initialized.
    pub fn is_initialized(&self) -> bool {
        self.state.read().initialized
    }

    /// Get the current configuration.
    pub fn get_config(&self) -> Option<ServerConfig> {
        self.state.read().config.clone()
    }

    /// Address the HTTP server is listening on.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.state.read().local_addr
    }

    /// The session manager, once initialized.
    pub fn sessions(&self) -> Option<Arc<SessionManager>> {
        self.state.read().sessions.clone()
    }

    /// The file store, once initialized.
    pub fn files(&self) -> Option<Arc<FileStore>> {
        self.state.read().files.clone()
    }

    /// Location of the credential file, once initialized.
    pub fn credentials_path(&self) -> Option<PathBuf> {
        self.state.read().credentials_path.clone()
    }

    /// Stop the server and the token sweep.
    pub fn reset(&self) {
        self.state.write().reset();
        tracing::info!("File manager stopped");
    }
}

/// Periodically evict expired tokens. An interval of zero disables the sweep.
fn spawn_token_sweep(sessions: Arc<SessionManager>, interval_secs: u64) -> Option<JoinHandle<()>> {
    if interval_secs == 0 {
        return None;
    }

    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            let removed = sessions.cleanup_expired_tokens();
            if removed > 0 {
                tracing::debug!("Removed {} expired tokens", removed);
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(data_dir: &Path) -> ServerConfig {
        ServerConfig {
            port: 1,
            bind_address: "127.0.0.1".to_string(),
            data_dir: data_dir.display().to_string(),
            ..ServerConfig::default()
        }
    }

    #[test]
    fn test_credentials_path_layout() {
        assert_eq!(
            credentials_path(Path::new("/srv/data")),
            PathBuf::from("/srv/data/files/admin/USER_CREDS.json")
        );
    }

    #[tokio::test]
    async fn test_initialize_rejects_missing_web_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = test_config(tmp.path());
        config.web_dir = Some(tmp.path().join("no-web").display().to_string());

        let manager = FileboxManager::new();
        assert!(matches!(
            manager.initialize(config).await,
            Err(FileboxError::Config(ConfigError::FileNotFound(_)))
        ));
        assert!(!manager.is_initialized());
    }

    #[tokio::test]
    async fn test_initialize_creates_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut config = test_config(tmp.path());
        config.port = port;

        let manager = FileboxManager::new();
        manager.initialize(config).await.unwrap();

        assert!(manager.is_initialized());
        assert!(tmp.path().join("files").is_dir());
        let creds = manager.credentials_path().unwrap();
        assert!(creds.exists());
        assert!(manager.sessions().unwrap().authenticate("admin", "admin"));
        assert_eq!(manager.local_addr().unwrap().port(), port);

        assert!(manager.initialize(test_config(tmp.path())).await.is_err());

        manager.reset();
        assert!(!manager.is_initialized());
        assert!(manager.sessions().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_sweep_runs_on_interval() {
        use crate::auth::ManualClock;
        use chrono::Utc;

        let clock = Arc::new(ManualClock::new(Utc::now()));
        let sessions = Arc::new(SessionManager::with_clock(
            CredentialStore::in_memory(),
            clock.clone(),
        ));
        sessions.generate_token("bob").unwrap();
        clock.advance(chrono::Duration::hours(25));

        let task = spawn_token_sweep(sessions.clone(), 60).unwrap();
        tokio::time::sleep(Duration::from_secs(61)).await;
        tokio::task::yield_now().await;

        assert_eq!(sessions.active_token_count(), 0);
        task.abort();
        assert!(spawn_token_sweep(sessions, 0).is_none());
    }
}

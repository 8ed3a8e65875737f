//! Session manager: credentials and bearer tokens.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::auth::clock::{Clock, SystemClock};
use crate::auth::credentials::{Credential, CredentialStore};
use crate::error::{FileboxError, Result};

/// Built-in administrator account.
pub const ADMIN_USERNAME: &str = "admin";

/// Secret of the built-in administrator account.
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin";

/// Random bytes per token before encoding.
pub const TOKEN_BYTES: usize = 32;

/// Lifetime of an issued token.
pub fn token_ttl() -> Duration {
    Duration::hours(24)
}

/// An issued bearer token.
#[derive(Debug, Clone)]
pub struct SessionToken {
    pub value: String,
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

impl SessionToken {
    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Owns user credentials and the in-memory token table.
///
/// Every mutation, including the lazy eviction in [`validate_token`], runs
/// under the exclusive side of the relevant lock.
///
/// [`validate_token`]: SessionManager::validate_token
pub struct SessionManager {
    users: RwLock<BTreeMap<String, Credential>>,
    tokens: RwLock<HashMap<String, SessionToken>>,
    store: CredentialStore,
    clock: Arc<dyn Clock>,
}

impl SessionManager {
    /// Create a manager backed by `store`, seeded with the built-in admin.
    ///
    /// Existing records are loaded and the full set is written back so the
    /// store exists after startup. Neither step is fatal, and nothing is
    /// written back when loading fails.
    pub fn new(store: CredentialStore) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    /// Same as [`SessionManager::new`] with an explicit time source.
    pub fn with_clock(store: CredentialStore, clock: Arc<dyn Clock>) -> Self {
        let mut users = BTreeMap::new();
        users.insert(
            ADMIN_USERNAME.to_string(),
            Credential::new(ADMIN_USERNAME, DEFAULT_ADMIN_PASSWORD),
        );

        let manager = Self {
            users: RwLock::new(users),
            tokens: RwLock::new(HashMap::new()),
            store,
            clock,
        };

        // A store that failed to load is left untouched.
        match manager.load_credentials() {
            Ok(_) => {
                if let Err(e) = manager.save_credentials() {
                    tracing::warn!("Failed to save credentials: {}", e);
                }
            }
            Err(e) => tracing::warn!("Failed to load credentials: {}", e),
        }

        manager
    }

    /// Check a username/secret pair. Empty fields never match.
    pub fn authenticate(&self, username: &str, password: &str) -> bool {
        if username.is_empty() || password.is_empty() {
            return false;
        }

        let users = self.users.read();
        users
            .get(username)
            .map(|user| constant_time_eq(user.password.as_bytes(), password.as_bytes()))
            .unwrap_or(false)
    }

    /// Whether a credential exists for `username`.
    pub fn user_exists(&self, username: &str) -> bool {
        self.users.read().contains_key(username)
    }

    /// Register a new user and persist the full credential set.
    ///
    /// If persisting fails the error is returned, but the user stays
    /// registered in memory until the process exits.
    pub fn create_user(&self, username: &str, password: &str) -> Result<()> {
        validate_new_user(username, password)?;

        let mut users = self.users.write();
        if users.contains_key(username) {
            return Err(FileboxError::AlreadyExists);
        }

        users.insert(username.to_string(), Credential::new(username, password));
        tracing::info!("Registered user {}", username);

        let records: Vec<Credential> = users.values().cloned().collect();
        self.store.save(&records).map_err(|e| {
            tracing::warn!("User {} created but not persisted: {}", username, e);
            e
        })
    }

    /// Issue a fresh token for `username`, valid for 24 hours.
    pub fn generate_token(&self, username: &str) -> Result<String> {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| FileboxError::TokenGeneration(e.to_string()))?;
        let value = URL_SAFE.encode(bytes);

        let token = SessionToken {
            value: value.clone(),
            username: username.to_string(),
            expires_at: self.clock.now() + token_ttl(),
        };

        self.tokens.write().insert(value.clone(), token);
        tracing::debug!("Issued token for {}", username);

        Ok(value)
    }

    /// Resolve a token to its username, evicting it if it has expired.
    pub fn validate_token(&self, value: &str) -> Result<String> {
        let now = self.clock.now();
        let mut tokens = self.tokens.write();

        let token = tokens.get(value).ok_or(FileboxError::InvalidToken)?;
        if token.is_expired_at(now) {
            tokens.remove(value);
            return Err(FileboxError::TokenExpired);
        }

        Ok(token.username.clone())
    }

    /// Forget a token. Unknown tokens are ignored.
    pub fn revoke_token(&self, value: &str) {
        if self.tokens.write().remove(value).is_some() {
            tracing::debug!("Revoked token");
        }
    }

    /// Drop every expired token, returning how many were removed.
    pub fn cleanup_expired_tokens(&self) -> usize {
        let now = self.clock.now();
        let mut tokens = self.tokens.write();
        let before = tokens.len();
        tokens.retain(|_, token| !token.is_expired_at(now));
        before - tokens.len()
    }

    /// Number of live entries in the token table.
    pub fn active_token_count(&self) -> usize {
        self.tokens.read().len()
    }

    /// Merge records from the store.
    ///
    /// Admin records are skipped, as are usernames registration would reject.
    pub fn load_credentials(&self) -> Result<usize> {
        let records = self.store.load()?;

        let mut users = self.users.write();
        let mut loaded = 0;
        for record in records {
            if record.username == ADMIN_USERNAME {
                continue;
            }
            if !is_valid_username(&record.username) {
                tracing::warn!("Skipping stored user with invalid name {:?}", record.username);
                continue;
            }
            users.insert(record.username.clone(), record);
            loaded += 1;
        }

        if loaded > 0 {
            tracing::info!("Loaded {} users from credential store", loaded);
        }
        Ok(loaded)
    }

    /// Rewrite the store with every known credential.
    pub fn save_credentials(&self) -> Result<()> {
        let users = self.users.read();
        let records: Vec<Credential> = users.values().cloned().collect();
        self.store.save(&records)
    }
}

fn validate_new_user(username: &str, password: &str) -> Result<()> {
    if username.is_empty() || password.is_empty() {
        return Err(FileboxError::InvalidInput(
            "username and password are required".to_string(),
        ));
    }

    if username == ADMIN_USERNAME {
        return Err(FileboxError::ReservedName(username.to_string()));
    }

    if !is_valid_username(username) {
        return Err(FileboxError::InvalidCharacters);
    }

    Ok(())
}

/// Usernames are non-empty runs of ASCII letters, digits and `_`.
fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Compare two byte strings without short-circuiting on the first mismatch.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::ManualClock;
    use crate::auth::credentials::CREDENTIALS_FILE_NAME;

    fn manager_with_clock() -> (SessionManager, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let manager = SessionManager::with_clock(CredentialStore::in_memory(), clock.clone());
        (manager, clock)
    }

    #[test]
    fn test_admin_exists_by_default() {
        let manager = SessionManager::new(CredentialStore::in_memory());
        assert!(manager.user_exists("admin"));
        assert!(manager.authenticate("admin", "admin"));
        assert!(!manager.authenticate("admin", "wrong"));
    }

    #[test]
    fn test_authenticate_rejects_empty_fields() {
        let manager = SessionManager::new(CredentialStore::in_memory());
        assert!(!manager.authenticate("", "admin"));
        assert!(!manager.authenticate("admin", ""));
        assert!(!manager.authenticate("nobody", "x"));
    }

    #[test]
    fn test_create_user_validation() {
        let manager = SessionManager::new(CredentialStore::in_memory());

        assert!(matches!(
            manager.create_user("admin", "x"),
            Err(FileboxError::ReservedName(_))
        ));
        assert!(matches!(
            manager.create_user("bad name!", "x"),
            Err(FileboxError::InvalidCharacters)
        ));
        assert!(matches!(
            manager.create_user("bob", ""),
            Err(FileboxError::InvalidInput(_))
        ));
        assert!(matches!(
            manager.create_user("", "x"),
            Err(FileboxError::InvalidInput(_))
        ));
        assert!(matches!(
            manager.create_user("héllo", "x"),
            Err(FileboxError::InvalidCharacters)
        ));
        assert!(!manager.user_exists("bob"));
    }

    #[test]
    fn test_create_user_then_duplicate() {
        let manager = SessionManager::new(CredentialStore::in_memory());

        manager.create_user("bob_42", "pw").unwrap();
        assert!(manager.authenticate("bob_42", "pw"));
        assert!(matches!(
            manager.create_user("bob_42", "other"),
            Err(FileboxError::AlreadyExists)
        ));
        assert!(manager.authenticate("bob_42", "pw"));
    }

    #[test]
    fn test_token_round_trip() {
        let (manager, _clock) = manager_with_clock();

        let token = manager.generate_token("bob").unwrap();
        assert_eq!(URL_SAFE.decode(&token).unwrap().len(), TOKEN_BYTES);
        assert_eq!(manager.validate_token(&token).unwrap(), "bob");
    }

    #[test]
    fn test_tokens_are_unique_per_issue() {
        let (manager, _clock) = manager_with_clock();

        let first = manager.generate_token("bob").unwrap();
        let second = manager.generate_token("bob").unwrap();
        assert_ne!(first, second);
        assert_eq!(manager.validate_token(&first).unwrap(), "bob");
        assert_eq!(manager.validate_token(&second).unwrap(), "bob");
    }

    #[test]
    fn test_token_expires_after_ttl() {
        let (manager, clock) = manager_with_clock();
        let token = manager.generate_token("bob").unwrap();

        clock.advance(Duration::hours(24));
        assert_eq!(manager.validate_token(&token).unwrap(), "bob");

        clock.advance(Duration::seconds(1));
        assert!(matches!(
            manager.validate_token(&token),
            Err(FileboxError::TokenExpired)
        ));

        // Evicted on the failed validation.
        assert!(matches!(
            manager.validate_token(&token),
            Err(FileboxError::InvalidToken)
        ));
        assert_eq!(manager.active_token_count(), 0);
    }

    #[test]
    fn test_revoke_token() {
        let (manager, _clock) = manager_with_clock();
        let token = manager.generate_token("bob").unwrap();

        manager.revoke_token(&token);
        assert!(matches!(
            manager.validate_token(&token),
            Err(FileboxError::InvalidToken)
        ));

        // Idempotent.
        manager.revoke_token(&token);
        manager.revoke_token("never-issued");
    }

    #[test]
    fn test_cleanup_removes_only_expired() {
        let (manager, clock) = manager_with_clock();
        let old = manager.generate_token("alice").unwrap();

        clock.advance(Duration::hours(12));
        let fresh = manager.generate_token("bob").unwrap();

        clock.advance(Duration::hours(13));
        assert_eq!(manager.cleanup_expired_tokens(), 1);
        assert_eq!(manager.active_token_count(), 1);
        assert!(matches!(
            manager.validate_token(&old),
            Err(FileboxError::InvalidToken)
        ));
        assert_eq!(manager.validate_token(&fresh).unwrap(), "bob");
    }

    #[test]
    fn test_concurrent_validation() {
        let (manager, _clock) = manager_with_clock();
        let manager = Arc::new(manager);
        let token = manager.generate_token("bob").unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let manager = manager.clone();
                let token = token.clone();
                std::thread::spawn(move || {
                    (0..200)
                        .map(|_| manager.validate_token(&token).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        for handle in handles {
            let names = handle.join().unwrap();
            assert!(names.iter().all(|name| name == "bob"));
        }
        assert_eq!(manager.active_token_count(), 1);
    }

    #[test]
    fn test_credentials_persist_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("files").join("admin").join(CREDENTIALS_FILE_NAME);

        let manager = SessionManager::new(CredentialStore::new(&path));
        assert!(path.exists());
        manager.create_user("carol", "secret").unwrap();
        drop(manager);

        let reloaded = SessionManager::new(CredentialStore::new(&path));
        assert!(reloaded.authenticate("carol", "secret"));
        assert!(reloaded.authenticate("admin", "admin"));
    }

    #[test]
    fn test_store_cannot_redefine_admin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CREDENTIALS_FILE_NAME);
        std::fs::write(
            &path,
            r#"[{"username": "admin", "password": "hijack"}, {"username": "dave", "password": "pw"}]"#,
        )
        .unwrap();

        let manager = SessionManager::new(CredentialStore::new(&path));
        assert!(manager.authenticate("admin", "admin"));
        assert!(!manager.authenticate("admin", "hijack"));
        assert!(manager.authenticate("dave", "pw"));

        let saved = CredentialStore::new(&path).load().unwrap();
        let names: Vec<_> = saved.iter().map(|c| c.username.as_str()).collect();
        assert_eq!(names, vec!["admin", "dave"]);
    }

    #[test]
    fn test_stored_usernames_are_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CREDENTIALS_FILE_NAME);
        std::fs::write(
            &path,
            r#"[{"username": "..", "password": "x"},
                {"username": "a/b", "password": "x"},
                {"username": "", "password": "x"},
                {"username": "frank", "password": "pw"}]"#,
        )
        .unwrap();

        let manager = SessionManager::new(CredentialStore::new(&path));
        assert!(!manager.authenticate("..", "x"));
        assert!(!manager.user_exists(".."));
        assert!(!manager.user_exists("a/b"));
        assert!(manager.authenticate("frank", "pw"));
        assert_eq!(manager.load_credentials().unwrap(), 1);
    }

    #[test]
    fn test_unreadable_store_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CREDENTIALS_FILE_NAME);
        let damaged = r#"[{"username": "grace", "password": "pw"}, {"user"#;
        std::fs::write(&path, damaged).unwrap();

        let manager = SessionManager::new(CredentialStore::new(&path));
        assert!(manager.authenticate("admin", "admin"));
        assert!(!manager.user_exists("grace"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), damaged);
    }

    #[test]
    fn test_persistence_failure_keeps_user_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the parent directory should be.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let store = CredentialStore::new(blocker.join(CREDENTIALS_FILE_NAME));

        let manager = SessionManager::new(store);
        assert!(manager.create_user("erin", "pw").is_err());
        assert!(manager.authenticate("erin", "pw"));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secreT"));
        assert!(!constant_time_eq(b"secret", b"secrets"));
        assert!(constant_time_eq(b"", b""));
    }
}

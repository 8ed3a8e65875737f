//! Durable credential storage.
//!
//! Credentials are kept as a JSON array of `{username, password}` records and
//! rewritten in full on every change. Secrets are stored in plaintext.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// File name of the credential store.
pub const CREDENTIALS_FILE_NAME: &str = "USER_CREDS.json";

/// A username/secret pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(alias = "Username")]
    pub username: String,
    #[serde(alias = "Password")]
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// On-disk credential file. A store without a path keeps nothing.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    path: Option<PathBuf>,
}

impl CredentialStore {
    /// Store backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Store that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Read every record. A missing file yields no records.
    pub fn load(&self) -> Result<Vec<Credential>> {
        let Some(path) = self.path.as_deref() else {
            return Ok(Vec::new());
        };

        if !path.exists() {
            return Ok(Vec::new());
        }

        let data = fs::read(path)?;
        let records: Vec<Credential> = serde_json::from_slice(&data)?;
        Ok(records)
    }

    /// Replace the whole file with `records`, owner read/write only.
    pub fn save(&self, records: &[Credential]) -> Result<()> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };

        let data = serde_json::to_vec_pretty(records)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write a sibling file, then rename it over the store.
        let temp_path = path.with_extension("json.tmp");
        let mut file = owner_only_options().open(&temp_path)?;
        file.write_all(&data)?;
        file.sync_all()?;
        drop(file);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600))?;
        }

        fs::rename(&temp_path, path)?;

        tracing::debug!("Saved {} credentials to {}", records.len(), path.display());
        Ok(())
    }
}

fn owner_only_options() -> fs::OpenOptions {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options
}

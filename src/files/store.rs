//! Filesystem operations confined to per-user directories.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{FileboxError, Result};
use crate::files::entry::{sort_entries, FileEntry};
use crate::files::sandbox::UserSandbox;
use crate::utils::contains_separator;

/// A file received from a client, already buffered.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub name: String,
    pub data: Bytes,
}

impl IncomingFile {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

/// An opened file ready to be streamed to a client.
#[derive(Debug)]
pub struct FileDownload {
    /// Name the client asked for, used for the attachment header.
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub file: fs::File,
}

/// Sandboxed file store rooted at a single base directory.
///
/// Each user owns `<base>/<username>`; no operation reads, writes or lists
/// anything outside it.
#[derive(Debug, Clone)]
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    /// Create a store over `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Confinement root for `username`.
    pub fn sandbox(&self, username: &str) -> Result<UserSandbox> {
        UserSandbox::new(&self.base_dir, username)
    }

    /// Create the user's root directory if missing.
    pub async fn ensure_user_dir(&self, username: &str) -> Result<PathBuf> {
        let root = self.sandbox(username)?.root().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(root)
    }

    /// List the immediate children of a directory, folders first.
    pub async fn list_entries(&self, username: &str, path: &str) -> Result<Vec<FileEntry>> {
        let dir = self.sandbox(username)?.resolve_dir(path)?;

        let metadata = fs::metadata(&dir)
            .await
            .map_err(|e| FileboxError::from_io(e, path))?;
        if !metadata.is_dir() {
            return Err(FileboxError::NotADirectory);
        }

        let mut entries = Vec::new();
        let mut reader = fs::read_dir(&dir).await?;
        while let Some(child) = reader.next_entry().await? {
            let name = child.file_name().to_string_lossy().into_owned();
            // Follows symlinks; entries that cannot be stat'ed are left out.
            match fs::metadata(child.path()).await {
                Ok(metadata) => entries.push(FileEntry::from_metadata(&name, &metadata)),
                Err(e) => tracing::debug!("Skipping {} in listing: {}", name, e),
            }
        }

        sort_entries(&mut entries);
        Ok(entries)
    }

    /// Create a folder (and any missing parents) inside a directory.
    pub async fn create_folder(&self, username: &str, parent: &str, folder_name: &str) -> Result<()> {
        let sandbox = self.sandbox(username)?;
        let dir = sandbox.resolve_dir(parent)?;
        validate_entry_name(folder_name)?;

        let target = sandbox.resolve_entry(&dir, folder_name)?;
        fs::create_dir_all(&target).await?;

        tracing::debug!("Created folder {}", target.display());
        Ok(())
    }

    /// Remove the named entries from a directory, recursively for folders.
    ///
    /// Names that escape the sandbox, do not exist or fail to delete are
    /// skipped without failing the batch. Returns how many were removed.
    pub async fn delete_entries(&self, username: &str, path: &str, names: &[String]) -> Result<usize> {
        let sandbox = self.sandbox(username)?;
        let dir = sandbox.resolve_dir(path)?;

        let mut removed = 0;
        for name in names {
            let target = match sandbox.resolve_entry(&dir, name) {
                Ok(target) if target.as_path() != sandbox.root() => target,
                Ok(_) => {
                    tracing::debug!("Refusing to delete user root via {:?}", name);
                    continue;
                }
                Err(_) => continue,
            };

            let metadata = match fs::metadata(&target).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::debug!("Skipping delete of {}: {}", name, e);
                    continue;
                }
            };

            let result = if metadata.is_dir() {
                fs::remove_dir_all(&target).await
            } else {
                fs::remove_file(&target).await
            };

            match result {
                Ok(()) => removed += 1,
                Err(e) => tracing::debug!("Failed to delete {}: {}", name, e),
            }
        }

        Ok(removed)
    }

    /// Rename an entry within a directory.
    pub async fn rename_entry(
        &self,
        username: &str,
        path: &str,
        old_name: &str,
        new_name: &str,
    ) -> Result<()> {
        let sandbox = self.sandbox(username)?;
        let dir = sandbox.resolve_dir(path)?;
        validate_entry_name(new_name)?;
        if old_name.is_empty() {
            return Err(FileboxError::InvalidName(old_name.to_string()));
        }

        let source = sandbox.resolve_entry(&dir, old_name)?;
        let destination = sandbox.resolve_entry(&dir, new_name)?;

        fs::symlink_metadata(&source)
            .await
            .map_err(|e| FileboxError::from_io(e, old_name))?;

        if source != destination && fs::try_exists(&destination).await? {
            return Err(FileboxError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("{} already exists", new_name),
            )));
        }

        fs::rename(&source, &destination)
            .await
            .map_err(|e| FileboxError::from_io(e, old_name))?;

        tracing::debug!("Renamed {} to {}", source.display(), destination.display());
        Ok(())
    }

    /// Describe a single entry.
    pub async fn entry_info(&self, username: &str, path: &str, name: &str) -> Result<FileEntry> {
        let sandbox = self.sandbox(username)?;
        let dir = sandbox.resolve_dir(path)?;
        let target = sandbox.resolve_entry(&dir, name)?;

        let metadata = fs::metadata(&target)
            .await
            .map_err(|e| FileboxError::from_io(e, name))?;

        Ok(FileEntry::from_metadata(name, &metadata))
    }

    /// Write uploaded files into a directory, returning how many were stored.
    ///
    /// Files whose destination escapes the sandbox or that cannot be written
    /// are skipped and not counted. Existing files are overwritten.
    pub async fn upload_into(
        &self,
        username: &str,
        path: &str,
        files: &[IncomingFile],
    ) -> Result<usize> {
        let sandbox = self.sandbox(username)?;
        let dir = sandbox.resolve_dir(path)?;

        let mut written = 0;
        for incoming in files {
            if incoming.name.is_empty() {
                continue;
            }

            let target = match sandbox.resolve_entry(&dir, &incoming.name) {
                Ok(target) => target,
                Err(_) => continue,
            };

            match write_file(&target, &incoming.data).await {
                Ok(()) => written += 1,
                Err(e) => tracing::debug!("Skipping upload of {}: {}", incoming.name, e),
            }
        }

        Ok(written)
    }

    /// Open a file for download. Folders cannot be downloaded.
    pub async fn open_download(&self, username: &str, path: &str, name: &str) -> Result<FileDownload> {
        let sandbox = self.sandbox(username)?;
        let dir = sandbox.resolve_dir(path)?;
        let target = sandbox.resolve_entry(&dir, name)?;

        let metadata = fs::metadata(&target)
            .await
            .map_err(|e| FileboxError::from_io(e, name))?;
        if metadata.is_dir() {
            return Err(FileboxError::IsDirectory);
        }

        let file = fs::File::open(&target)
            .await
            .map_err(|e| FileboxError::from_io(e, name))?;

        Ok(FileDownload {
            name: name.to_string(),
            path: target,
            size: metadata.len(),
            file,
        })
    }
}

/// A new entry name must be a single, non-empty path component.
fn validate_entry_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || contains_separator(name) {
        return Err(FileboxError::InvalidName(name.to_string()));
    }
    Ok(())
}

async fn write_file(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(data).await?;
    file.flush().await?;
    Ok(())
}

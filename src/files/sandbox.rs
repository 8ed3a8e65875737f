//! Per-user path confinement.
//!
//! Every path a client sends is resolved against the user's root
//! (`<base>/<username>`) and rejected unless the lexically normalized result
//! is that root or lies beneath it. Entry names are checked again after being
//! joined to the resolved directory, so a name like `../x` cannot slip out.
//!
//! The check is lexical. A symlink planted inside a user directory by some
//! other means would still be followed by the filesystem calls that use the
//! resolved path; the API itself never creates symlinks.

use std::path::{Component, Path, PathBuf};

use crate::error::{FileboxError, Result};
use crate::utils::{absolutize, contains_separator, is_within};

/// Path aliases that mean "the user's root directory".
const ROOT_ALIASES: &[&str] = &["", "root", "/"];

/// Confinement root for a single user.
#[derive(Debug, Clone)]
pub struct UserSandbox {
    root: PathBuf,
}

impl UserSandbox {
    /// Sandbox for `username` beneath `base_dir`.
    ///
    /// The username must be a single normal path component, so the root is
    /// always a direct child of `base_dir`.
    pub fn new(base_dir: &Path, username: &str) -> Result<Self> {
        let mut components = Path::new(username).components();
        let single_normal = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !single_normal || contains_separator(username) {
            tracing::warn!("Rejected username as a directory name: {:?}", username);
            return Err(FileboxError::PathEscape(base_dir.join(username)));
        }

        Ok(Self {
            root: absolutize(&base_dir.join(username)),
        })
    }

    /// The user's root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a client-supplied directory path.
    ///
    /// Relative paths are taken from the user's root; absolute paths are used
    /// as given and must still land inside it.
    pub fn resolve_dir(&self, path: &str) -> Result<PathBuf> {
        if ROOT_ALIASES.contains(&path) {
            return Ok(self.root.clone());
        }

        let candidate = absolutize(&self.root.join(path));
        self.confine(candidate)
    }

    /// Join an entry name onto an already resolved directory and re-check it.
    pub fn resolve_entry(&self, dir: &Path, name: &str) -> Result<PathBuf> {
        let candidate = absolutize(&dir.join(name));
        self.confine(candidate)
    }

    fn confine(&self, candidate: PathBuf) -> Result<PathBuf> {
        if is_within(&self.root, &candidate) {
            Ok(candidate)
        } else {
            tracing::warn!(
                "Rejected path outside {}: {}",
                self.root.display(),
                candidate.display()
            );
            Err(FileboxError::PathEscape(candidate))
        }
    }
}

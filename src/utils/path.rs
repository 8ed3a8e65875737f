//! Lexical path helpers used for sandbox confinement.

use std::path::{Component, Path, PathBuf};

/// Replace a leading `~` with the home directory.
pub fn expand_home(path: &str) -> String {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => return path.to_string(),
    };
    match dirs::home_dir() {
        Some(home) => format!("{}{}", home.display(), rest),
        None => path.to_string(),
    }
}

/// Make a path absolute against the current directory and fold `.` and `..`
/// components without touching the filesystem.
///
/// The target does not have to exist, which matters for folders and uploads
/// that are about to be created. `..` at the root stays at the root.
pub fn absolutize(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::Prefix(prefix) => normalized.push(prefix.as_os_str()),
            Component::RootDir => normalized.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            Component::Normal(part) => normalized.push(part),
        }
    }
    normalized
}

/// Check whether `path` is `root` or lies beneath it, component by component.
///
/// Both paths are absolutized first, so `root/../x` is outside and
/// `root-sibling` never matches `root` by string prefix.
pub fn is_within(root: &Path, path: &Path) -> bool {
    absolutize(path).starts_with(absolutize(root))
}

/// Check if a name contains a path separator of either platform flavor.
pub fn contains_separator(name: &str) -> bool {
    name.contains('/') || name.contains('\\')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_home() {
        let home = dirs::home_dir().unwrap();

        assert_eq!(expand_home("~"), home.display().to_string());
        assert_eq!(
            expand_home("~/filebox/data"),
            format!("{}/filebox/data", home.display())
        );
        assert_eq!(expand_home("/srv/data"), "/srv/data");
        assert_eq!(expand_home("~bob/data"), "~bob/data");
        assert_eq!(expand_home("./data"), "./data");
    }

    #[test]
    fn test_absolutize_folds_dots() {
        assert_eq!(absolutize(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
        assert_eq!(absolutize(Path::new("/../../etc")), PathBuf::from("/etc"));
        assert!(absolutize(Path::new("relative")).is_absolute());
    }

    #[test]
    fn test_is_within() {
        let root = Path::new("/data/files/bob");
        assert!(is_within(root, Path::new("/data/files/bob")));
        assert!(is_within(root, Path::new("/data/files/bob/docs/a.txt")));
        assert!(!is_within(root, Path::new("/data/files/bob/../alice")));
        assert!(!is_within(root, Path::new("/data/files/bob2")));
        assert!(!is_within(root, Path::new("/etc/passwd")));
    }

    #[test]
    fn test_contains_separator() {
        assert!(contains_separator("a/b"));
        assert!(contains_separator("a\\b"));
        assert!(!contains_separator("a.b"));
    }
}

//! Directory entry descriptors returned to clients.

use std::fs::Metadata;
use std::time::SystemTime;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Kind of a listed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Folder,
    File,
}

/// A file or folder as shown in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Human-readable size, files only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    /// Last modification date as `YYYY-MM-DD`.
    pub modified: String,
}

impl FileEntry {
    /// Build a descriptor from already-fetched metadata.
    pub fn from_metadata(name: &str, metadata: &Metadata) -> Self {
        let (kind, size) = if metadata.is_dir() {
            (EntryKind::Folder, None)
        } else {
            (EntryKind::File, Some(format_size(metadata.len())))
        };

        let modified = metadata
            .modified()
            .map(format_date)
            .unwrap_or_default();

        Self {
            id: name.to_string(),
            name: name.to_string(),
            kind,
            size,
            modified,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }
}

/// Order entries folders first, then by case-insensitive name.
pub fn sort_entries(entries: &mut [FileEntry]) {
    entries.sort_by(|a, b| {
        a.kind
            .cmp(&b.kind)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
}

const SIZE_UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

/// Format a byte count with 1024-based units and one decimal above bytes.
pub fn format_size(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{} B", bytes);
    }

    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT && exp < SIZE_UNITS.len() - 1 {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }

    format!("{:.1} {}", bytes as f64 / div as f64, SIZE_UNITS[exp])
}

/// Calendar date of a timestamp in local time.
pub fn format_date(time: SystemTime) -> String {
    DateTime::<Local>::from(time).format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, kind: EntryKind) -> FileEntry {
        FileEntry {
            id: name.to_string(),
            name: name.to_string(),
            kind,
            size: None,
            modified: "2024-01-01".to_string(),
        }
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(1048576), "1.0 MB");
        assert_eq!(format_size(5 * 1024 * 1024 * 1024), "5.0 GB");
        assert_eq!(format_size(1024u64.pow(4)), "1.0 TB");
        assert_eq!(format_size(2048 * 1024u64.pow(4)), "2048.0 TB");
    }

    #[test]
    fn test_sort_folders_first_case_insensitive() {
        let mut entries = vec![
            entry("b.txt", EntryKind::File),
            entry("a.txt", EntryKind::File),
            entry("zeta", EntryKind::Folder),
            entry("A", EntryKind::Folder),
            entry("C.txt", EntryKind::File),
        ];
        sort_entries(&mut entries);

        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["A", "zeta", "a.txt", "b.txt", "C.txt"]);
    }

    #[test]
    fn test_entry_json_shape() {
        let mut file = entry("notes.txt", EntryKind::File);
        file.size = Some("10 B".to_string());
        let json = serde_json::to_value(&file).unwrap();
        assert_eq!(json["type"], "file");
        assert_eq!(json["size"], "10 B");

        let folder = serde_json::to_value(entry("docs", EntryKind::Folder)).unwrap();
        assert_eq!(folder["type"], "folder");
        assert!(folder.get("size").is_none());
    }

    #[test]
    fn test_format_date_shape() {
        let date = format_date(SystemTime::now());
        assert_eq!(date.len(), 10);
        assert_eq!(date.as_bytes()[4], b'-');
        assert_eq!(date.as_bytes()[7], b'-');
    }
}

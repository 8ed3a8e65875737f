//! Sandboxed per-user file storage.

pub mod entry;
pub mod sandbox;
pub mod store;

pub use entry::{format_date, format_size, sort_entries, EntryKind, FileEntry};
pub use sandbox::UserSandbox;
pub use store::{FileDownload, FileStore, IncomingFile};

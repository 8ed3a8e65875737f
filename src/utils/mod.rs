//! Shared helpers.

pub mod debug;
pub mod path;

pub use debug::{init_debug_logging, FILEBOX_DEBUG_ENV};
pub use path::{absolutize, contains_separator, expand_home, is_within};

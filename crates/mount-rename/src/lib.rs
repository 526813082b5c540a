//! Mount rename engine.
//!
//! Streams every record out of a search index page by page, rewrites the
//! `path` of records under one mount so they live under another, recomputes
//! `dir` and `parents`, and writes the result back as one partial update.

pub mod engine;
pub mod paths;

pub use engine::{ChangeMount, MOUNT_SEPARATOR, RenameReport, renamed_record, rewrite_path};
pub use paths::{dirname, make_parents};

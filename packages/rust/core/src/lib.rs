//! Publish pipeline for slugforge.
//!
//! Ties classification, tag extraction, translation and slug building into
//! per-document and batch workflows.

pub mod pipeline;
pub mod report;

pub use pipeline::{ProgressReporter, Publisher, SilentProgress, load_documents};
pub use report::{BatchFailure, BatchReport};

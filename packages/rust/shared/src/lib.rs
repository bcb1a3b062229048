//! Shared types, error model, and configuration for slugforge.
//!
//! This crate is the foundation depended on by all other slugforge crates.
//! It provides:
//! - [`SlugforgeError`]: the unified error type
//! - Domain types ([`ClassificationResult`], [`Tag`], [`RawDocument`], [`RunId`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BackendConfig, BackendProtocol, ClassifierConfig, PathsConfig, SlugConfig,
    TagConfig, TranslationConfig, config_dir, config_file_path, expand_home, init_config,
    load_config, load_config_from,
};
pub use error::{Result, SlugforgeError};
pub use types::{ClassificationResult, DocumentOutput, RawDocument, RunId, SeriesInfo, Tag};

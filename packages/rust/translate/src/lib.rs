//! CJK-to-slug translation with backend failover and a persisted cache.
//!
//! This crate provides:
//! - [`TranslationService`]: cache lookup, sticky-backend probing, hash fallback
//! - [`Backend`]: the supported backend protocols
//! - [`TranslationCache`]: flat `term -> fragment` JSON cache with write-through merges
//! - [`normalize`]: CJK detection and fragment normalization helpers

pub mod backend;
pub mod cache;
pub mod normalize;
pub mod service;

pub use backend::{Backend, Endpoint};
pub use cache::TranslationCache;
pub use normalize::{
    has_cjk, hash_fragment, is_cjk, normalize_fragment, short_hash, truncate_fragment,
};
pub use service::{
    BackendState, FallbackKind, TranslationOutcome, TranslationSource, TranslationService,
    TranslationStats,
};

//! URL slug construction.
//!
//! - [`SlugBuilder`]: date, category, series and title fragments under a length budget
//! - [`extract_title_terms`]: curated-term and window-scan title keyword extraction

pub mod builder;
pub mod title;

pub use builder::{SlugBuilder, TitlePiece, clean_slug};
pub use title::{TitleTerm, extract_title_terms};

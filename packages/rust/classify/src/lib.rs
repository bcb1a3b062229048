//! Article classification and tag extraction.
//!
//! This crate provides:
//! - [`KeywordIndex`]: taxonomy, keyword tables and curated vocabulary
//! - [`Classifier`]: keyword-frequency category assignment
//! - [`Segmenter`] / [`DictionarySegmenter`]: CJK word segmentation
//! - [`TagExtractor`]: weighted-frequency tag selection

pub mod classifier;
pub mod keywords;
pub mod segment;
pub mod tags;

pub use classifier::{Classifier, SubcategoryScore};
pub use keywords::{Category, DefaultCategory, KeywordIndex, KeywordList, SlugVocabulary, Subcategory};
pub use segment::{DictionarySegmenter, Segmenter};
pub use tags::{TagCandidate, TagExtractor, TagInput};

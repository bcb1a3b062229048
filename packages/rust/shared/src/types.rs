//! Core domain types shared by the classifier, tagger, and slug builder.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SlugforgeError};

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one batch run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// ClassificationResult
// ---------------------------------------------------------------------------

/// Taxonomy assignment for one article.
///
/// Always populated: when nothing matched, the index's default category is
/// used with `confidence == 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub main_category: String,
    pub main_category_code: String,
    pub subcategory: String,
    pub subcategory_code: String,
    /// Raw keyword score of the winning subcategory.
    pub confidence: u32,
}

impl ClassificationResult {
    /// Whether at least one keyword matched.
    pub fn is_confident(&self) -> bool {
        self.confidence > 0
    }
}

// ---------------------------------------------------------------------------
// Tag
// ---------------------------------------------------------------------------

/// A descriptive tag attached to a published article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Human-readable tag (CJK as found in the text).
    pub display_name: String,
    /// ASCII slug used in tag URLs. Never empty.
    pub slug: String,
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// Series membership of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesInfo {
    /// Series name as written by the author.
    pub name: String,
    /// 1-based installment number.
    pub episode: u32,
}

/// A raw article as handed over by the publishing pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDocument {
    /// Stable identifier chosen by the collaborator (file stem, row id, ...).
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub body_paragraphs: Vec<String>,
    /// Publication date, rendered as `YYYY-MM-DD` in the slug.
    pub date: NaiveDate,
    #[serde(default)]
    pub is_series: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode_number: Option<u32>,
    /// Slug assigned by an earlier publish pass, kept unless forced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_slug: Option<String>,
}

impl RawDocument {
    /// Body paragraphs joined with newlines.
    pub fn body(&self) -> String {
        self.body_paragraphs.join("\n")
    }

    /// Title, summary and body as one string, title first so it falls in the
    /// classifier's lead window.
    pub fn full_text(&self) -> String {
        let mut text = String::with_capacity(
            self.title.len() + self.summary.len() + self.body_paragraphs.len() * 64,
        );
        text.push_str(&self.title);
        text.push('\n');
        text.push_str(&self.summary);
        text.push('\n');
        text.push_str(&self.body());
        text
    }

    /// Series membership, validated.
    ///
    /// Returns `Ok(None)` for standalone articles and an error for a series
    /// document missing its name or episode number.
    pub fn series(&self) -> Result<Option<SeriesInfo>> {
        if !self.is_series {
            return Ok(None);
        }

        let name = self
            .series_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                SlugforgeError::validation(format!(
                    "document {} is marked as series but has no series name",
                    self.id
                ))
            })?;

        let episode = self.episode_number.ok_or_else(|| {
            SlugforgeError::validation(format!(
                "document {} is marked as series but has no episode number",
                self.id
            ))
        })?;

        Ok(Some(SeriesInfo {
            name: name.to_string(),
            episode,
        }))
    }
}

/// Everything the publishing collaborator needs for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentOutput {
    pub id: String,
    pub classification: ClassificationResult,
    pub tags: Vec<Tag>,
    pub slug: String,
    /// True when an existing slug was kept instead of rebuilt.
    #[serde(default)]
    pub slug_reused: bool,
}

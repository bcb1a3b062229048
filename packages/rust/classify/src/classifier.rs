//! Keyword-frequency article classifier.
//!
//! Each subcategory's score is the number of non-overlapping occurrences of
//! its keywords in the article text, with occurrences inside the lead window
//! (the first `lead_chars` characters) counted `lead_multiplier` times. The
//! highest score wins; on a tie the subcategory declared first keeps the lead.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error};

use slugforge_shared::{ClassificationResult, ClassifierConfig};

use crate::keywords::{KeywordIndex, KeywordList};

/// Score of one subcategory, as reported by [`Classifier::score_all`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubcategoryScore {
    pub subcategory: String,
    pub score: u32,
}

#[derive(Debug, Clone)]
pub struct Classifier {
    index: Arc<KeywordIndex>,
    lead_chars: usize,
    lead_multiplier: u32,
}

impl Classifier {
    pub fn new(index: Arc<KeywordIndex>, config: &ClassifierConfig) -> Self {
        Self {
            index,
            lead_chars: config.lead_chars,
            lead_multiplier: config.lead_multiplier.max(1),
        }
    }

    pub fn index(&self) -> &KeywordIndex {
        &self.index
    }

    /// Classify an article. Deterministic; never fails.
    ///
    /// Without any keyword match the index's default category is returned
    /// with confidence 0.
    pub fn classify(&self, text: &str) -> ClassificationResult {
        let lead = lead_window(text, self.lead_chars);

        let mut best: Option<(&KeywordList, u32)> = None;
        for list in self.index.keyword_lists() {
            let score = self.score(list, text, lead);
            if score == 0 {
                continue;
            }
            // Strictly greater: earlier declarations win ties.
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((list, score));
            }
        }

        let Some((list, score)) = best else {
            return self.index.default_result(0);
        };

        match self.index.parent_of(&list.domain) {
            Some((category, sub)) => {
                debug!(
                    category = %category.code,
                    subcategory = %sub.code,
                    score,
                    "article classified"
                );
                ClassificationResult {
                    main_category: category.name.clone(),
                    main_category_code: category.code.clone(),
                    subcategory: sub.name.clone(),
                    subcategory_code: sub.code.clone(),
                    confidence: score,
                }
            }
            None => {
                error!(
                    subcategory = %list.domain,
                    score,
                    "winning subcategory has no parent category, using default"
                );
                self.index.default_result(score)
            }
        }
    }

    /// Every subcategory with a non-zero score, highest first. Ties keep
    /// declaration order.
    pub fn score_all(&self, text: &str) -> Vec<SubcategoryScore> {
        let lead = lead_window(text, self.lead_chars);
        let mut scores: Vec<SubcategoryScore> = self
            .index
            .keyword_lists()
            .iter()
            .map(|list| SubcategoryScore {
                subcategory: list.domain.clone(),
                score: self.score(list, text, lead),
            })
            .filter(|s| s.score > 0)
            .collect();
        scores.sort_by(|a, b| b.score.cmp(&a.score));
        scores
    }

    fn score(&self, list: &KeywordList, text: &str, lead: &str) -> u32 {
        let total: usize = list
            .keywords
            .iter()
            .map(|keyword| {
                let all = text.matches(keyword.as_str()).count();
                let in_lead = lead.matches(keyword.as_str()).count();
                all + in_lead * (self.lead_multiplier as usize - 1)
            })
            .sum();
        u32::try_from(total).unwrap_or(u32::MAX)
    }
}

/// The first `chars` characters of `text`.
fn lead_window(text: &str, chars: usize) -> &str {
    let end = text
        .char_indices()
        .nth(chars)
        .map_or(text.len(), |(idx, _)| idx);
    &text[..end]
}

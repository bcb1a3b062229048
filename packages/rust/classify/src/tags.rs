//! Tag extraction from weighted token frequency.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, instrument};

use slugforge_shared::{ClassificationResult, Tag, TagConfig};
use slugforge_translate::{TranslationCache, TranslationService, hash_fragment, normalize_fragment};

use crate::keywords::KeywordIndex;
use crate::segment::Segmenter;

/// Text fields a tag set is derived from.
#[derive(Debug, Clone, Copy, Default)]
pub struct TagInput<'a> {
    pub title: &'a str,
    pub summary: &'a str,
    pub body: &'a str,
}

impl TagInput<'_> {
    fn is_blank(&self) -> bool {
        self.title.trim().is_empty() && self.summary.trim().is_empty() && self.body.trim().is_empty()
    }
}

/// A ranked tag candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct TagCandidate {
    pub token: String,
    pub score: f64,
    /// Index of the token's first appearance in the composite text.
    pub first_seen: usize,
}

pub struct TagExtractor {
    index: Arc<KeywordIndex>,
    segmenter: Arc<dyn Segmenter>,
    config: TagConfig,
}

impl std::fmt::Debug for TagExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagExtractor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TagExtractor {
    pub fn new(index: Arc<KeywordIndex>, segmenter: Arc<dyn Segmenter>, config: &TagConfig) -> Self {
        Self {
            index,
            segmenter,
            config: config.clone(),
        }
    }

    /// Up to `max_tags` tags for an article, first tag tied to its category.
    #[instrument(skip_all, fields(category = %classification.main_category_code))]
    pub async fn extract_tags(
        &self,
        input: TagInput<'_>,
        classification: &ClassificationResult,
        translator: &TranslationService,
    ) -> Vec<Tag> {
        let candidates = self.rank_candidates(input, classification, translator.cache());
        let names = self.select(&candidates, classification);

        let mut tags = Vec::with_capacity(names.len());
        for name in names {
            let slug = self.tag_slug(&name, translator).await;
            tags.push(Tag {
                display_name: name,
                slug,
            });
        }

        debug!(tags = tags.len(), candidates = candidates.len(), "tags extracted");
        tags
    }

    /// Score every usable token and keep the top `candidate_pool`.
    ///
    /// Sorted by weighted score, ties broken by first appearance.
    pub fn rank_candidates(
        &self,
        input: TagInput<'_>,
        classification: &ClassificationResult,
        cache: &TranslationCache,
    ) -> Vec<TagCandidate> {
        if input.is_blank() {
            return Vec::new();
        }

        let composite = format!(
            "{title}\n{title}\n{summary}\n{body}",
            title = input.title,
            summary = input.summary,
            body = input.body
        );

        let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
        for (position, token) in self.segmenter.segment(&composite).into_iter().enumerate() {
            if token.chars().count() < 2 || self.index.is_stop_word(&token) {
                continue;
            }
            counts.entry(token).or_insert((0, position)).0 += 1;
        }

        let relevant: HashSet<&str> = self
            .index
            .domain_terms_for(&classification.main_category)
            .iter()
            .chain(self.index.domain_terms_for(&classification.subcategory))
            .map(String::as_str)
            .collect();

        let mut candidates: Vec<TagCandidate> = counts
            .into_iter()
            .map(|(token, (count, first_seen))| {
                let mut score = count as f64;
                if input.title.contains(token.as_str()) {
                    score *= self.config.title_weight;
                }
                if input.summary.contains(token.as_str()) {
                    score *= self.config.summary_weight;
                }
                if relevant.contains(token.as_str()) {
                    score *= self.config.domain_weight;
                }
                if cache.contains(&token) {
                    score *= self.config.cached_weight;
                }
                TagCandidate {
                    token,
                    score,
                    first_seen,
                }
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.first_seen.cmp(&b.first_seen))
        });
        candidates.truncate(self.config.candidate_pool);
        candidates
    }

    fn select(&self, candidates: &[TagCandidate], classification: &ClassificationResult) -> Vec<String> {
        if candidates.is_empty() || self.config.max_tags == 0 {
            return Vec::new();
        }

        let mut selected: Vec<String> = Vec::with_capacity(self.config.max_tags);

        let category_terms = self.index.domain_terms_for(&classification.main_category);
        let first = candidates
            .iter()
            .find(|c| {
                related(&c.token, &classification.main_category)
                    || category_terms.iter().any(|term| related(&c.token, term))
            })
            .map(|c| c.token.clone())
            .unwrap_or_else(|| classification.main_category.clone());
        selected.push(first);

        if selected.len() < self.config.max_tags {
            if let Some(c) = candidates.iter().find(|c| {
                !selected.contains(&c.token) && names_subcategory(&c.token, &classification.subcategory)
            }) {
                selected.push(c.token.clone());
            }
        }

        for c in candidates {
            if selected.len() >= self.config.max_tags {
                break;
            }
            if !selected.contains(&c.token) {
                selected.push(c.token.clone());
            }
        }

        selected
    }

    async fn tag_slug(&self, name: &str, translator: &TranslationService) -> String {
        let fragment = translator.translate_to_slug_fragment(name).await;
        let slug = normalize_fragment(&fragment, translator.fragment_max_len());
        if slug.is_empty() {
            hash_fragment("tag", name)
        } else {
            slug
        }
    }
}

/// Equal, or one contains the other.
fn related(candidate: &str, term: &str) -> bool {
    !term.is_empty() && (candidate.contains(term) || term.contains(candidate))
}

/// Equal to the subcategory name or containing it. A fragment of the name
/// does not count.
fn names_subcategory(candidate: &str, subcategory: &str) -> bool {
    !subcategory.is_empty() && candidate.contains(subcategory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Classifier;
    use crate::segment::DictionarySegmenter;
    use slugforge_shared::{ClassifierConfig, TranslationConfig};

    fn extractor(config: TagConfig) -> TagExtractor {
        let index = Arc::new(KeywordIndex::builtin());
        let segmenter = Arc::new(DictionarySegmenter::from_index(&index));
        TagExtractor::new(index, segmenter, &config)
    }

    fn offline_service(cache: TranslationCache) -> TranslationService {
        let config = TranslationConfig {
            backends: vec![],
            batch_delay_ms: 0,
            ..TranslationConfig::default()
        };
        TranslationService::new(&config, Arc::new(cache)).unwrap()
    }

    fn classify(text: &str) -> ClassificationResult {
        Classifier::new(Arc::new(KeywordIndex::builtin()), &ClassifierConfig::default()).classify(text)
    }

    const TITLE: &str = "公司設立後如何記帳與申報營業稅";
    const SUMMARY: &str = "新創公司設立登記完成後，記帳與營業稅申報是第一個月的重點。";
    const BODY: &str = "有限公司設立後，每兩個月要申報營業稅，進項與銷項發票都要保存。\n記帳時憑證要完整，帳簿要按月整理。";

    fn input() -> TagInput<'static> {
        TagInput {
            title: TITLE,
            summary: SUMMARY,
            body: BODY,
        }
    }

    #[tokio::test]
    async fn tags_are_bounded_and_unique() {
        let ex = extractor(TagConfig::default());
        let classification = classify(&format!("{TITLE}\n{SUMMARY}\n{BODY}"));
        let svc = offline_service(TranslationCache::in_memory());

        let tags = ex.extract_tags(input(), &classification, &svc).await;

        assert!(!tags.is_empty());
        assert!(tags.len() <= 3);
        let names: HashSet<&str> = tags.iter().map(|t| t.display_name.as_str()).collect();
        assert_eq!(names.len(), tags.len());
        assert!(tags.iter().all(|t| !t.slug.is_empty()));
    }

    #[tokio::test]
    async fn first_tag_relates_to_category() {
        let ex = extractor(TagConfig::default());
        let classification = classify(&format!("{TITLE}\n{SUMMARY}\n{BODY}"));
        let svc = offline_service(TranslationCache::in_memory());

        let tags = ex.extract_tags(input(), &classification, &svc).await;
        let first = &tags[0].display_name;
        let terms = KeywordIndex::builtin()
            .domain_terms_for(&classification.main_category)
            .to_vec();
        assert!(
            first == &classification.main_category
                || terms.iter().any(|t| related(first, t)),
            "first tag {first} unrelated to {}",
            classification.main_category
        );
    }

    #[tokio::test]
    async fn empty_input_yields_no_tags() {
        let ex = extractor(TagConfig::default());
        let svc = offline_service(TranslationCache::in_memory());
        let classification = classify("");
        let tags = ex.extract_tags(TagInput::default(), &classification, &svc).await;
        assert!(tags.is_empty());
    }

    #[tokio::test]
    async fn cached_translations_become_slugs() {
        let ex = extractor(TagConfig::default());
        let classification = classify(&format!("{TITLE}\n{SUMMARY}\n{BODY}"));
        let cache = TranslationCache::from_entries([
            ("營業稅", "business-tax"),
            ("記帳", "bookkeeping"),
            ("公司設立", "company-setup"),
            ("工商登記", "business-registration"),
        ]);
        let svc = offline_service(cache);

        let tags = ex.extract_tags(input(), &classification, &svc).await;
        for tag in &tags {
            if let Some(expected) = svc.cache().get(&tag.display_name) {
                assert_eq!(tag.slug, expected);
            } else {
                assert!(tag.slug.starts_with("untranslated-"), "{}", tag.slug);
            }
        }
    }

    #[test]
    fn ranking_applies_title_weight() {
        let ex = extractor(TagConfig::default());
        let classification = classify("");
        let cache = TranslationCache::in_memory();

        // 增資 once in the title, 記帳 twice in the body only.
        let ranked = ex.rank_candidates(
            TagInput {
                title: "增資",
                summary: "",
                body: "記帳。記帳。",
            },
            &classification,
            &cache,
        );
        // 增資: count 2 (title twice) * 2.0 = 4.0; 記帳: 2.0
        assert_eq!(ranked[0].token, "增資");
        assert_eq!(ranked[0].score, 4.0);
        assert_eq!(ranked[1].token, "記帳");
        assert_eq!(ranked[1].score, 2.0);
    }

    #[test]
    fn ties_keep_first_appearance() {
        let ex = extractor(TagConfig::default());
        let classification = classify("");
        let cache = TranslationCache::in_memory();
        let ranked = ex.rank_candidates(
            TagInput {
                title: "",
                summary: "",
                body: "減資，記帳，增資",
            },
            &classification,
            &cache,
        );
        let tokens: Vec<&str> = ranked.iter().map(|c| c.token.as_str()).collect();
        assert_eq!(tokens, vec!["減資", "記帳", "增資"]);
    }

    #[test]
    fn stop_words_and_single_chars_are_ignored() {
        let ex = extractor(TagConfig::default());
        let classification = classify("");
        let cache = TranslationCache::in_memory();
        let ranked = ex.rank_candidates(
            TagInput {
                title: "如何",
                summary: "的",
                body: "如何 A",
            },
            &classification,
            &cache,
        );
        assert!(ranked.is_empty());
    }

    #[test]
    fn subcategory_pick_needs_the_full_name() {
        let ex = extractor(TagConfig::default());
        let classification = classify("財務報表");
        assert_eq!(classification.subcategory, "財務報表");

        let candidate = |token: &str, score: f64| TagCandidate {
            token: token.into(),
            score,
            first_seen: 0,
        };
        let candidates = vec![
            candidate("會計師", 4.0),
            candidate("IFRS", 3.0),
            candidate("報表", 2.0),
            candidate("財務報表分析", 1.0),
        ];

        let names = ex.select(&candidates, &classification);
        // 報表 is only part of the subcategory name, so it waits for the fill step.
        assert_eq!(names, vec!["會計師", "財務報表分析", "IFRS"]);
    }

    #[test]
    fn falls_back_to_category_name() {
        let ex = extractor(TagConfig::default());
        let classification = classify("記帳");
        let candidates = vec![TagCandidate {
            token: "IFRS".into(),
            score: 1.0,
            first_seen: 0,
        }];
        let names = ex.select(&candidates, &classification);
        assert_eq!(names, vec!["會計服務".to_string(), "IFRS".to_string()]);
    }

    #[test]
    fn candidate_pool_is_respected() {
        let ex = extractor(TagConfig {
            candidate_pool: 2,
            ..TagConfig::default()
        });
        let classification = classify("");
        let cache = TranslationCache::in_memory();
        let ranked = ex.rank_candidates(
            TagInput {
                title: "",
                summary: "",
                body: "減資 記帳 增資 健保",
            },
            &classification,
            &cache,
        );
        assert_eq!(ranked.len(), 2);
    }
}

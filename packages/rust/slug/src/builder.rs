//! Slug assembly under a length budget.
//!
//! Component order: `date[-category][-series-epN]-title...`. When the joined
//! slug is too long the date, category code and episode marker are always
//! kept, the series fragment only shrinks if those fixed parts overflow on
//! their own, and the remaining budget goes to title pieces by score.

use std::sync::{Arc, LazyLock};

use chrono::NaiveDate;
use regex::Regex;
use tracing::{debug, instrument};

use slugforge_classify::KeywordIndex;
use slugforge_shared::{ClassificationResult, SeriesInfo, SlugConfig};
use slugforge_translate::{
    FallbackKind, TranslationService, TranslationSource, hash_fragment, normalize_fragment,
    truncate_fragment,
};

use crate::title::{TitleTerm, extract_title_terms};

// ---------------------------------------------------------------------------
// Scoring weights for translated title pieces
// ---------------------------------------------------------------------------

const POSITION_BASE: i64 = 100;
const SHORT_TERM_BONUS: i64 = 10;
const CURATED_BONUS: i64 = 25;
const GENERIC_VERB_PENALTY: i64 = 30;

/// Translated title keyword with its ranking score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitlePiece {
    pub term: String,
    pub fragment: String,
    pub score: i64,
}

/// Builds URL slugs from classified, titled documents.
#[derive(Debug, Clone)]
pub struct SlugBuilder {
    index: Arc<KeywordIndex>,
    config: SlugConfig,
}

impl SlugBuilder {
    pub fn new(index: Arc<KeywordIndex>, config: &SlugConfig) -> Self {
        Self {
            index,
            config: config.clone(),
        }
    }

    pub fn max_len(&self) -> usize {
        self.config.max_len
    }

    /// Title keywords before translation.
    pub fn title_terms(&self, title: &str) -> Vec<TitleTerm> {
        extract_title_terms(
            title,
            self.index.slug_vocabulary(),
            self.index.stop_words(),
            self.config.max_title_terms,
        )
    }

    /// Build the slug for one document. Never empty, never longer than
    /// `max_len`, only `[a-z0-9-]`.
    #[instrument(skip_all, fields(date = %date, category = %classification.main_category_code))]
    pub async fn build_slug(
        &self,
        date: NaiveDate,
        classification: &ClassificationResult,
        series: Option<&SeriesInfo>,
        title: &str,
        translator: &TranslationService,
    ) -> String {
        let mut head = vec![date.format("%Y-%m-%d").to_string()];
        if classification.is_confident() {
            head.push(clean_slug(&classification.main_category_code));
        }

        let series_parts = match series {
            Some(info) => {
                let raw = translator.translate_to_slug_fragment(&info.name).await;
                let fragment = normalize_fragment(&raw, translator.fragment_max_len());
                let fragment = if fragment.is_empty() {
                    hash_fragment("series", &info.name)
                } else {
                    fragment
                };
                Some((fragment, format!("ep{}", info.episode)))
            }
            None => None,
        };

        let mut pieces: Vec<String> = self
            .title_pieces(title, translator)
            .await
            .into_iter()
            .map(|p| p.fragment)
            .collect();
        if pieces.is_empty() {
            pieces.push(hash_fragment("article", title));
        }

        let slug = fit(&head, series_parts.as_ref(), &pieces, self.config.max_len);
        debug!(%slug, len = slug.len(), "slug built");
        slug
    }

    /// Translate the title keywords and keep the best `max_title_fragments`,
    /// highest score first, distinct fragments only. Terms no backend could
    /// translate are left out.
    pub async fn title_pieces(&self, title: &str, translator: &TranslationService) -> Vec<TitlePiece> {
        let generic = &self.index.slug_vocabulary().generic_verbs;
        let mut pieces = Vec::new();

        for term in self.title_terms(title) {
            let outcome = translator
                .translate_detailed(&term.text, FallbackKind::Untranslated)
                .await;
            if outcome.source == TranslationSource::Fallback {
                continue;
            }
            let fragment = normalize_fragment(&outcome.fragment, translator.fragment_max_len());
            if fragment.is_empty() {
                continue;
            }
            pieces.push(TitlePiece {
                score: score_term(&term, generic),
                term: term.text,
                fragment,
            });
        }

        // Stable: equal scores keep title order.
        pieces.sort_by(|a, b| b.score.cmp(&a.score));
        let mut distinct: Vec<TitlePiece> = Vec::new();
        for piece in pieces {
            if distinct.len() >= self.config.max_title_fragments {
                break;
            }
            if !distinct.iter().any(|p| p.fragment == piece.fragment) {
                distinct.push(piece);
            }
        }
        distinct
    }
}

fn score_term(term: &TitleTerm, generic_verbs: &[String]) -> i64 {
    let position = i64::try_from(term.position).unwrap_or(POSITION_BASE);
    let mut score = POSITION_BASE - position.min(POSITION_BASE);
    if (2..=4).contains(&term.char_len()) {
        score += SHORT_TERM_BONUS;
    }
    if term.curated {
        score += CURATED_BONUS;
    }
    if generic_verbs.iter().any(|v| v == &term.text) {
        score -= GENERIC_VERB_PENALTY;
    }
    score
}

/// Lowercase, keep `[a-z0-9-]`, collapse hyphen runs, trim hyphens.
pub fn clean_slug(raw: &str) -> String {
    static INVALID_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^a-z0-9-]+").expect("valid regex"));
    static HYPHENS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-{2,}").expect("valid regex"));

    let lowered = raw.to_lowercase();
    let stripped = INVALID_RE.replace_all(&lowered, "");
    HYPHENS_RE
        .replace_all(&stripped, "-")
        .trim_matches('-')
        .to_string()
}

fn join(parts: &[&str]) -> String {
    clean_slug(&parts.iter().filter(|p| !p.is_empty()).copied().collect::<Vec<_>>().join("-"))
}

/// Assemble the components, trimming to `max_len` by priority.
fn fit(head: &[String], series: Option<&(String, String)>, pieces: &[String], max_len: usize) -> String {
    let mut fixed: Vec<&str> = head.iter().map(String::as_str).collect();
    if let Some((fragment, episode)) = series {
        fixed.push(fragment);
        fixed.push(episode);
    }

    let mut all = fixed.clone();
    all.extend(pieces.iter().map(String::as_str));
    let full = join(&all);
    if full.len() <= max_len {
        return full;
    }

    let fixed_slug = join(&fixed);
    if fixed_slug.len() >= max_len {
        return shrink_series(head, series, max_len);
    }

    // Room left after the fixed parts, minus the joining hyphen of each piece.
    let mut budget = max_len - fixed_slug.len();
    let mut kept: Vec<String> = Vec::new();
    for piece in pieces {
        let piece = clean_slug(piece);
        if piece.is_empty() {
            continue;
        }
        if piece.len() < budget {
            budget -= piece.len() + 1;
            kept.push(piece);
            continue;
        }
        if budget > 1 {
            let cut = truncate_fragment(&piece, budget - 1);
            if !cut.is_empty() {
                kept.push(cut);
            }
        }
        break;
    }

    let mut parts = fixed;
    parts.extend(kept.iter().map(String::as_str));
    join(&parts)
}

/// Fixed parts alone overflow: shorten the series fragment, keep the rest.
fn shrink_series(head: &[String], series: Option<&(String, String)>, max_len: usize) -> String {
    let mut parts: Vec<&str> = head.iter().map(String::as_str).collect();
    let Some((fragment, episode)) = series else {
        return truncate_fragment(&join(&parts), max_len);
    };

    parts.push(episode);
    let without_series = join(&parts);
    let shortened = max_len
        .checked_sub(without_series.len() + 1)
        .map(|room| truncate_fragment(fragment, room))
        .unwrap_or_default();

    parts.pop();
    if !shortened.is_empty() {
        parts.push(&shortened);
    }
    parts.push(episode);
    truncate_fragment(&join(&parts), max_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use slugforge_shared::TranslationConfig;
    use slugforge_translate::TranslationCache;

    fn slug_re() -> Regex {
        Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").unwrap()
    }

    fn builder() -> SlugBuilder {
        SlugBuilder::new(Arc::new(KeywordIndex::builtin()), &SlugConfig::default())
    }

    fn offline(cache: TranslationCache) -> TranslationService {
        let config = TranslationConfig {
            backends: vec![],
            batch_delay_ms: 0,
            ..TranslationConfig::default()
        };
        TranslationService::new(&config, Arc::new(cache)).unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, 3).unwrap()
    }

    fn registration() -> ClassificationResult {
        ClassificationResult {
            main_category: "工商登記".into(),
            main_category_code: "registration".into(),
            subcategory: "公司設立".into(),
            subcategory_code: "company-setup".into(),
            confidence: 6,
        }
    }

    fn unclassified() -> ClassificationResult {
        KeywordIndex::builtin().default_result(0)
    }

    #[test]
    fn clean_slug_normalizes() {
        assert_eq!(clean_slug("--Tax  Guide__2025--"), "taxguide2025");
        assert_eq!(clean_slug("a---b"), "a-b");
        assert_eq!(clean_slug("資本-變更"), "");
    }

    #[tokio::test]
    async fn untranslatable_title_uses_article_hash() {
        let svc = offline(TranslationCache::in_memory());
        let title = "今天天氣很好";
        let slug = builder()
            .build_slug(date(), &unclassified(), None, title, &svc)
            .await;
        assert_eq!(slug, format!("2025-02-03-{}", hash_fragment("article", title)));
        assert!(Regex::new(r"^2025-02-03-article-[0-9a-f]{8}$").unwrap().is_match(&slug));
    }

    #[tokio::test]
    async fn cached_title_terms_make_the_slug() {
        let cache = TranslationCache::from_entries([
            ("有限公司", "limited-company"),
            ("增資", "capital-increase"),
        ]);
        let svc = offline(cache);
        let slug = builder()
            .build_slug(date(), &registration(), None, "有限公司如何增資", &svc)
            .await;
        assert_eq!(slug, "2025-02-03-registration-limited-company-capital-increase");
    }

    #[tokio::test]
    async fn category_code_needs_confidence() {
        let svc = offline(TranslationCache::from_entries([("增資", "capital-increase")]));
        let slug = builder()
            .build_slug(date(), &unclassified(), None, "增資", &svc)
            .await;
        assert_eq!(slug, "2025-02-03-capital-increase");
    }

    #[tokio::test]
    async fn long_series_title_only_shrinks_title() {
        let cache = TranslationCache::from_entries([
            ("創業指南", "startup-guide"),
            ("股份有限公司", "company-limited-by-shares-incorporation"),
            ("設立登記", "establishment-registration-procedure"),
            ("資本額", "registered-capital-minimum-amount"),
        ]);
        let svc = offline(cache);
        let series = SeriesInfo {
            name: "創業指南".into(),
            episode: 1,
        };
        let title = format!(
            "股份有限公司設立登記與資本額{}",
            "從準備文件到送件核准的每一個步驟".repeat(10)
        );
        assert!(title.chars().count() > 150);

        let slug = builder()
            .build_slug(date(), &registration(), Some(&series), &title, &svc)
            .await;

        assert!(slug.len() <= 80, "{slug} is {} long", slug.len());
        assert!(slug_re().is_match(&slug), "{slug}");
        assert!(slug.starts_with("2025-02-03-registration-startup-guide-ep1-"), "{slug}");
    }

    #[tokio::test]
    async fn oversized_series_name_is_shortened() {
        let cache = TranslationCache::from_entries([(
            "創業指南",
            "the-complete-and-exhaustive-guide-for-founders",
        )]);
        let config = SlugConfig {
            max_len: 40,
            ..SlugConfig::default()
        };
        let b = SlugBuilder::new(Arc::new(KeywordIndex::builtin()), &config);
        let svc = offline(cache);
        let series = SeriesInfo {
            name: "創業指南".into(),
            episode: 12,
        };
        let slug = b
            .build_slug(date(), &registration(), Some(&series), "創業", &svc)
            .await;
        assert!(slug.len() <= 40, "{slug}");
        assert!(slug.starts_with("2025-02-03-registration-"), "{slug}");
        assert!(slug.ends_with("-ep12"), "{slug}");
    }

    #[tokio::test]
    async fn backend_translations_feed_the_slug() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"translatedText": "Income Tax"})),
            )
            .mount(&server)
            .await;

        let config = TranslationConfig {
            backends: vec![slugforge_shared::BackendConfig {
                name: "libre".into(),
                endpoint: server.uri(),
                protocol: slugforge_shared::BackendProtocol::LibreTranslate,
                timeout_secs: 2,
            }],
            batch_delay_ms: 0,
            ..TranslationConfig::default()
        };
        let svc = TranslationService::new(&config, Arc::new(TranslationCache::in_memory())).unwrap();
        let slug = builder()
            .build_slug(date(), &unclassified(), None, "所得稅", &svc)
            .await;
        assert_eq!(slug, "2025-02-03-income-tax");
    }

    #[test]
    fn scoring_prefers_early_curated_terms() {
        let generic = vec!["申請".to_string()];
        let early = TitleTerm {
            text: "增資".into(),
            position: 0,
            curated: true,
        };
        let late = TitleTerm {
            text: "增資".into(),
            position: 20,
            curated: true,
        };
        let verb = TitleTerm {
            text: "申請".into(),
            position: 0,
            curated: false,
        };
        assert!(score_term(&early, &generic) > score_term(&late, &generic));
        assert!(score_term(&early, &generic) > score_term(&verb, &generic));
    }

    #[test]
    fn fit_truncates_first_piece_that_does_not_fit() {
        let head = vec!["2025-02-03".to_string()];
        let pieces = vec!["alpha-beta".to_string(), "gamma-delta-epsilon".to_string()];
        let slug = fit(&head, None, &pieces, 30);
        assert_eq!(slug, "2025-02-03-alpha-beta-gamma");
        assert!(slug.len() <= 30);
    }
}

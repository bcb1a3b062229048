//! Publish pipeline: raw document → classification → tags → slug.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, instrument, warn};

use slugforge_classify::{Classifier, DictionarySegmenter, KeywordIndex, TagExtractor, TagInput};
use slugforge_shared::{
    AppConfig, DocumentOutput, RawDocument, Result, RunId, SlugforgeError, expand_home,
};
use slugforge_slug::SlugBuilder;
use slugforge_translate::{TranslationCache, TranslationService};

use crate::report::{BatchFailure, BatchReport};

/// Progress callback for reporting batch status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before a document is processed.
    fn document_started(&self, id: &str, current: usize, total: usize);
    /// Called after a document is processed, successfully or not.
    fn document_finished(&self, id: &str, ok: bool);
    /// Called when the batch completes.
    fn done(&self, report: &BatchReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn document_started(&self, _id: &str, _current: usize, _total: usize) {}
    fn document_finished(&self, _id: &str, _ok: bool) {}
    fn done(&self, _report: &BatchReport) {}
}

/// Classifies, tags and slugs documents with one shared translation service.
#[derive(Debug)]
pub struct Publisher {
    classifier: Classifier,
    tagger: TagExtractor,
    slugger: SlugBuilder,
    translator: Arc<TranslationService>,
}

impl Publisher {
    /// Wire up every component from the application config.
    ///
    /// A missing or malformed keyword index falls back to the built-in one;
    /// an unusable cache file degrades to an in-memory cache.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let index = Arc::new(KeywordIndex::load_or_builtin(&expand_home(
            &config.paths.keyword_index,
        )));
        let cache = Arc::new(TranslationCache::open(expand_home(
            &config.paths.translation_cache,
        )));
        let translator = Arc::new(TranslationService::new(&config.translation, cache)?);
        Ok(Self::new(index, config, translator))
    }

    pub fn new(index: Arc<KeywordIndex>, config: &AppConfig, translator: Arc<TranslationService>) -> Self {
        let segmenter = Arc::new(DictionarySegmenter::from_index(&index));
        Self {
            classifier: Classifier::new(Arc::clone(&index), &config.classifier),
            tagger: TagExtractor::new(Arc::clone(&index), segmenter, &config.tags),
            slugger: SlugBuilder::new(index, &config.slug),
            translator,
        }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn translator(&self) -> &TranslationService {
        &self.translator
    }

    /// Translate the curated slug vocabulary into the cache.
    pub async fn prewarm(&self) -> usize {
        let terms = &self.classifier.index().slug_vocabulary().domain_terms;
        self.translator.prewarm(terms).await
    }

    /// Process one document.
    ///
    /// An existing slug is kept unless `force` is set. Fails only when the
    /// document itself is invalid (series without name or episode).
    #[instrument(skip_all, fields(id = %doc.id))]
    pub async fn process_document(&self, doc: &RawDocument, force: bool) -> Result<DocumentOutput> {
        let series = doc.series()?;

        let classification = self.classifier.classify(&doc.full_text());

        let body = doc.body();
        let input = TagInput {
            title: &doc.title,
            summary: &doc.summary,
            body: &body,
        };
        let tags = self
            .tagger
            .extract_tags(input, &classification, &self.translator)
            .await;

        let existing = doc
            .existing_slug
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let (slug, slug_reused) = match existing {
            Some(slug) if !force => (slug.to_string(), true),
            _ => {
                let slug = self
                    .slugger
                    .build_slug(
                        doc.date,
                        &classification,
                        series.as_ref(),
                        &doc.title,
                        &self.translator,
                    )
                    .await;
                (slug, false)
            }
        };

        info!(
            category = %classification.main_category_code,
            confidence = classification.confidence,
            tags = tags.len(),
            %slug,
            slug_reused,
            "document processed"
        );

        Ok(DocumentOutput {
            id: doc.id.clone(),
            classification,
            tags,
            slug,
            slug_reused,
        })
    }

    /// Process documents in order; a failing document is recorded and the
    /// batch continues.
    #[instrument(skip_all, fields(documents = docs.len(), force))]
    pub async fn process_batch(
        &self,
        docs: &[RawDocument],
        force: bool,
        progress: &dyn ProgressReporter,
    ) -> BatchReport {
        let start = Instant::now();
        let run_id = RunId::new();
        let started_at = Utc::now();
        info!(%run_id, "starting publish batch");

        progress.phase("Processing documents");
        let mut outputs = Vec::with_capacity(docs.len());
        let mut failures = Vec::new();

        for (i, doc) in docs.iter().enumerate() {
            progress.document_started(&doc.id, i + 1, docs.len());
            match self.process_document(doc, force).await {
                Ok(output) => {
                    outputs.push(output);
                    progress.document_finished(&doc.id, true);
                }
                Err(e) => {
                    warn!(id = %doc.id, error = %e, "document failed, continuing");
                    failures.push(BatchFailure {
                        id: doc.id.clone(),
                        message: e.to_string(),
                    });
                    progress.document_finished(&doc.id, false);
                }
            }
        }

        let report = BatchReport {
            run_id,
            started_at,
            succeeded: outputs.len(),
            failed: failures.len(),
            outputs,
            failures,
            elapsed: start.elapsed(),
            translation: self.translator.stats(),
        };

        info!(
            run_id = %report.run_id,
            succeeded = report.succeeded,
            failed = report.failed,
            elapsed_ms = report.elapsed.as_millis() as u64,
            cache_hits = report.translation.cache_hits,
            fallbacks = report.translation.fallbacks,
            "publish batch complete"
        );

        progress.done(&report);
        report
    }
}

/// Read a JSON array of raw documents.
pub fn load_documents(path: &Path) -> Result<Vec<RawDocument>> {
    let content = std::fs::read_to_string(path).map_err(|e| SlugforgeError::io(path, e))?;
    serde_json::from_str(&content)
        .map_err(|e| SlugforgeError::parse(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use slugforge_shared::{BackendConfig, BackendProtocol, TranslationConfig};
    use std::sync::Mutex;
    use uuid::Uuid;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn offline_publisher(cache: TranslationCache) -> Publisher {
        let config = AppConfig {
            translation: TranslationConfig {
                backends: vec![],
                batch_delay_ms: 0,
                ..TranslationConfig::default()
            },
            ..AppConfig::default()
        };
        let translator =
            Arc::new(TranslationService::new(&config.translation, Arc::new(cache)).unwrap());
        Publisher::new(Arc::new(KeywordIndex::builtin()), &config, translator)
    }

    fn doc(id: &str, title: &str) -> RawDocument {
        RawDocument {
            id: id.into(),
            title: title.into(),
            summary: String::new(),
            body_paragraphs: vec![],
            date: NaiveDate::from_ymd_opt(2025, 2, 3).unwrap(),
            is_series: false,
            series_name: None,
            episode_number: None,
            existing_slug: None,
        }
    }

    fn fixture_documents() -> Vec<RawDocument> {
        load_documents(Path::new("../../../fixtures/json/documents.fixture.json")).unwrap()
    }

    #[derive(Default)]
    struct RecordingProgress {
        events: Mutex<Vec<String>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn phase(&self, name: &str) {
            self.events.lock().unwrap().push(format!("phase:{name}"));
        }
        fn document_started(&self, id: &str, current: usize, total: usize) {
            self.events
                .lock()
                .unwrap()
                .push(format!("start:{id}:{current}/{total}"));
        }
        fn document_finished(&self, id: &str, ok: bool) {
            self.events.lock().unwrap().push(format!("finish:{id}:{ok}"));
        }
        fn done(&self, report: &BatchReport) {
            self.events
                .lock()
                .unwrap()
                .push(format!("done:{}", report.total()));
        }
    }

    #[tokio::test]
    async fn document_gets_classification_tags_and_slug() {
        let publisher = offline_publisher(TranslationCache::from_entries([
            ("所得稅", "income-tax"),
            ("結算申報", "tax-filing"),
        ]));
        let mut d = doc("tax-1", "所得稅結算申報");
        d.summary = "五月所得稅結算申報的扣除額整理。".into();
        d.body_paragraphs = vec!["所得稅申報前先確認免稅額與扣除額。".into()];

        let out = publisher.process_document(&d, false).await.unwrap();
        assert_eq!(out.classification.main_category_code, "taxation");
        assert_eq!(out.classification.subcategory_code, "income-tax");
        assert!(!out.tags.is_empty() && out.tags.len() <= 3);
        assert!(out.slug.starts_with("2025-02-03-taxation-"), "{}", out.slug);
        assert!(out.slug.contains("income-tax"));
        assert!(!out.slug_reused);
    }

    #[tokio::test]
    async fn existing_slug_is_kept_unless_forced() {
        let publisher = offline_publisher(TranslationCache::in_memory());
        let mut d = doc("kept", "今天天氣很好");
        d.existing_slug = Some("2024-01-01-old-slug".into());

        let kept = publisher.process_document(&d, false).await.unwrap();
        assert_eq!(kept.slug, "2024-01-01-old-slug");
        assert!(kept.slug_reused);

        let rebuilt = publisher.process_document(&d, true).await.unwrap();
        assert!(rebuilt.slug.starts_with("2025-02-03-article-"), "{}", rebuilt.slug);
        assert!(!rebuilt.slug_reused);
    }

    #[tokio::test]
    async fn empty_document_gets_default_category_and_article_slug() {
        let publisher = offline_publisher(TranslationCache::in_memory());
        let out = publisher.process_document(&doc("empty", ""), false).await.unwrap();
        assert_eq!(out.classification.confidence, 0);
        assert!(out.tags.is_empty());
        assert!(out.slug.starts_with("2025-02-03-article-"));
        assert_eq!(out.slug.len(), "2025-02-03-article-".len() + 8);
    }

    #[tokio::test]
    async fn invalid_series_fails_but_batch_continues() {
        let publisher = offline_publisher(TranslationCache::in_memory());
        let mut broken = doc("broken", "創業指南");
        broken.is_series = true;
        let docs = vec![doc("a", "增資"), broken, doc("c", "減資")];
        let progress = RecordingProgress::default();

        let report = publisher.process_batch(&docs, false, &progress).await;

        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.failures[0].id, "broken");
        assert!(report.failures[0].message.contains("series name"));
        assert_eq!(report.outputs[1].id, "c");

        let events = progress.events.lock().unwrap();
        assert_eq!(events.first().map(String::as_str), Some("phase:Processing documents"));
        assert!(events.contains(&"start:broken:2/3".to_string()));
        assert!(events.contains(&"finish:broken:false".to_string()));
        assert_eq!(events.last().map(String::as_str), Some("done:3"));
    }

    #[tokio::test]
    async fn fixture_batch_produces_valid_slugs() {
        let publisher = offline_publisher(TranslationCache::in_memory());
        let docs = fixture_documents();
        let report = publisher.process_batch(&docs, false, &SilentProgress).await;

        assert!(report.is_clean(), "{:?}", report.failures);
        for out in &report.outputs {
            assert!(out.slug.len() <= 80);
            assert!(
                out.slug
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'),
                "{}",
                out.slug
            );
            assert!(!out.slug.starts_with('-') && !out.slug.ends_with('-'));
            assert!(!out.slug.contains("--"));
        }
    }

    #[tokio::test]
    async fn report_serializes_to_json_file() {
        let publisher = offline_publisher(TranslationCache::in_memory());
        let report = publisher
            .process_batch(&[doc("a", "增資")], false, &SilentProgress)
            .await;

        let path = std::env::temp_dir()
            .join(format!("slugforge-report-{}", Uuid::now_v7()))
            .join("report.json");
        report.write_json(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["succeeded"], 1);
        assert!(value["elapsed_ms"].is_u64());
        assert_eq!(value["run_id"], report.run_id.to_string());

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn series_slug_uses_backend_translation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"translatedText": "Startup Guide"})),
            )
            .mount(&server)
            .await;

        let config = AppConfig {
            translation: TranslationConfig {
                backends: vec![BackendConfig {
                    name: "libre".into(),
                    endpoint: server.uri(),
                    protocol: BackendProtocol::LibreTranslate,
                    timeout_secs: 2,
                }],
                batch_delay_ms: 0,
                ..TranslationConfig::default()
            },
            ..AppConfig::default()
        };
        let translator = Arc::new(
            TranslationService::new(&config.translation, Arc::new(TranslationCache::in_memory()))
                .unwrap(),
        );
        let publisher = Publisher::new(Arc::new(KeywordIndex::builtin()), &config, translator);

        let mut d = doc("series", "公司設立第一步");
        d.is_series = true;
        d.series_name = Some("創業指南".into());
        d.episode_number = Some(1);

        let out = publisher.process_document(&d, false).await.unwrap();
        assert!(
            out.slug.starts_with("2025-02-03-registration-startup-guide-ep1"),
            "{}",
            out.slug
        );
        assert_eq!(publisher.translator().sticky_backend(), Some("libre"));
    }

    #[tokio::test]
    async fn batch_spaces_out_backend_requests() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"translatedText": "Capital Change"})),
            )
            .mount(&server)
            .await;

        let delay = std::time::Duration::from_millis(150);
        let config = AppConfig {
            translation: TranslationConfig {
                backends: vec![BackendConfig {
                    name: "libre".into(),
                    endpoint: server.uri(),
                    protocol: BackendProtocol::LibreTranslate,
                    timeout_secs: 2,
                }],
                batch_delay_ms: delay.as_millis() as u64,
                ..TranslationConfig::default()
            },
            ..AppConfig::default()
        };
        let translator = Arc::new(
            TranslationService::new(&config.translation, Arc::new(TranslationCache::in_memory()))
                .unwrap(),
        );
        let publisher = Publisher::new(Arc::new(KeywordIndex::builtin()), &config, translator);

        let docs = vec![doc("a", "增資"), doc("b", "減資")];
        let report = publisher.process_batch(&docs, false, &SilentProgress).await;

        assert!(report.is_clean(), "{:?}", report.failures);
        let requests = report.translation.backend_requests;
        assert!(requests >= 2, "{requests}");
        assert!(
            report.elapsed >= delay * (requests as u32 - 1),
            "{:?} for {requests} requests",
            report.elapsed
        );
    }

    #[tokio::test]
    async fn from_config_falls_back_to_builtin_index() {
        let dir = std::env::temp_dir().join(format!("slugforge-core-{}", Uuid::now_v7()));
        let mut config = AppConfig::default();
        config.paths.keyword_index = dir.join("missing.json").display().to_string();
        config.paths.translation_cache = dir.join("cache.json").display().to_string();
        config.translation.backends = vec![];

        let publisher = Publisher::from_config(&config).unwrap();
        assert_eq!(publisher.classifier().index().categories().len(), 4);
        assert_eq!(publisher.translator().cache().path(), Some(dir.join("cache.json").as_path()));
    }
}

//! Translation cache & failover service.
//!
//! Resolution order for one term:
//!
//! 1. No CJK in the term: returned unchanged.
//! 2. Cached: returned without any network call.
//! 3. Probing: the sticky (last successful) backend is tried first, then the
//!    remaining backends in configured order, each at most once.
//! 4. Fallback: every backend failed, a `<prefix>-<8hex>` fragment derived
//!    from the term's hash is returned. Fallbacks are not cached.
//!
//! Successful translations are normalized and written through to the cache.
//!
//! Network lookups are paced: every lookup after the first waits until
//! `batch_delay` has passed since the previous one, whichever caller made it.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use reqwest::Client;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use slugforge_shared::{Result, SlugforgeError, TranslationConfig};

use crate::backend::Backend;
use crate::cache::TranslationCache;
use crate::normalize::{has_cjk, hash_fragment, normalize_fragment};

/// User-Agent string for backend requests.
const USER_AGENT: &str = concat!("slugforge/", env!("CARGO_PKG_VERSION"));

/// Extra time granted on top of a backend's own timeout before the call is abandoned.
const CALL_GRACE: Duration = Duration::from_secs(2);

const NO_BACKEND: usize = usize::MAX;

/// Placeholder prefix used when no backend could translate a term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackKind {
    /// `untranslated-<8hex>` (tags, title terms, series names).
    Untranslated,
    /// `article-<8hex>` (whole-article placeholders).
    Article,
}

impl FallbackKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Untranslated => "untranslated",
            Self::Article => "article",
        }
    }
}

/// Where a fragment came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationSource {
    /// Input had no CJK and was returned as-is.
    Passthrough,
    /// Served from the cache.
    Cached,
    /// Translated by the named backend.
    Backend(String),
    /// All backends failed; hash placeholder.
    Fallback,
}

/// A fragment together with how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationOutcome {
    pub term: String,
    pub fragment: String,
    pub source: TranslationSource,
}

/// Sticky-backend memory, owned by one service instance.
#[derive(Debug)]
pub struct BackendState {
    last_good: AtomicUsize,
}

impl BackendState {
    fn new() -> Self {
        Self {
            last_good: AtomicUsize::new(NO_BACKEND),
        }
    }

    /// Index of the last backend that answered successfully.
    pub fn last_good(&self) -> Option<usize> {
        match self.last_good.load(Ordering::Relaxed) {
            NO_BACKEND => None,
            idx => Some(idx),
        }
    }

    fn record_success(&self, idx: usize) {
        self.last_good.store(idx, Ordering::Relaxed);
    }
}

/// Counters for the per-run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TranslationStats {
    pub passthrough: usize,
    pub cache_hits: usize,
    pub backend_requests: usize,
    pub backend_failures: usize,
    pub translated: usize,
    pub fallbacks: usize,
}

#[derive(Debug, Default)]
struct StatCounters {
    passthrough: AtomicUsize,
    cache_hits: AtomicUsize,
    backend_requests: AtomicUsize,
    backend_failures: AtomicUsize,
    translated: AtomicUsize,
    fallbacks: AtomicUsize,
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Converts CJK terms into ASCII slug fragments. Never fails.
#[derive(Debug)]
pub struct TranslationService {
    client: Client,
    backends: Vec<Backend>,
    cache: Arc<TranslationCache>,
    state: BackendState,
    source_lang: String,
    target_lang: String,
    fragment_max_len: usize,
    batch_delay: Duration,
    /// Start of the most recent lookup. Held across the pacing sleep so
    /// concurrent callers queue up.
    last_lookup: Mutex<Option<Instant>>,
    stats: StatCounters,
}

impl TranslationService {
    /// Build the service from the `[translation]` config section.
    pub fn new(config: &TranslationConfig, cache: Arc<TranslationCache>) -> Result<Self> {
        let backends = config
            .backends
            .iter()
            .map(Backend::from_config)
            .collect::<Result<Vec<_>>>()?;

        if backends.is_empty() {
            warn!("no translation backends configured, every uncached term will fall back");
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SlugforgeError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            backends,
            cache,
            state: BackendState::new(),
            source_lang: config.source_lang.clone(),
            target_lang: config.target_lang.clone(),
            fragment_max_len: config.fragment_max_len,
            batch_delay: Duration::from_millis(config.batch_delay_ms),
            last_lookup: Mutex::new(None),
            stats: StatCounters::default(),
        })
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    pub fn backends(&self) -> &[Backend] {
        &self.backends
    }

    /// Name of the current sticky backend, if any call has succeeded yet.
    pub fn sticky_backend(&self) -> Option<&str> {
        self.state
            .last_good()
            .and_then(|idx| self.backends.get(idx))
            .map(Backend::name)
    }

    /// Upper bound used when normalizing backend output.
    pub fn fragment_max_len(&self) -> usize {
        self.fragment_max_len
    }

    pub fn stats(&self) -> TranslationStats {
        TranslationStats {
            passthrough: self.stats.passthrough.load(Ordering::Relaxed),
            cache_hits: self.stats.cache_hits.load(Ordering::Relaxed),
            backend_requests: self.stats.backend_requests.load(Ordering::Relaxed),
            backend_failures: self.stats.backend_failures.load(Ordering::Relaxed),
            translated: self.stats.translated.load(Ordering::Relaxed),
            fallbacks: self.stats.fallbacks.load(Ordering::Relaxed),
        }
    }

    /// Translate a term into a slug fragment, falling back to `untranslated-<8hex>`.
    pub async fn translate_to_slug_fragment(&self, term: &str) -> String {
        self.translate(term, FallbackKind::Untranslated).await
    }

    /// Translate a term, choosing the fallback prefix.
    pub async fn translate(&self, term: &str, fallback: FallbackKind) -> String {
        self.translate_detailed(term, fallback).await.fragment
    }

    /// Translate a term and report where the fragment came from.
    pub async fn translate_detailed(&self, term: &str, fallback: FallbackKind) -> TranslationOutcome {
        let term = term.trim();

        if !has_cjk(term) {
            bump(&self.stats.passthrough);
            return TranslationOutcome {
                term: term.to_string(),
                fragment: term.to_string(),
                source: TranslationSource::Passthrough,
            };
        }

        if let Some(fragment) = self.cache.get(term) {
            bump(&self.stats.cache_hits);
            debug!(term, %fragment, "translation cache hit");
            return TranslationOutcome {
                term: term.to_string(),
                fragment,
                source: TranslationSource::Cached,
            };
        }

        match self.lookup(term).await {
            Some((idx, fragment)) => {
                bump(&self.stats.translated);
                let fragment = self.cache.insert(term, &fragment);
                let backend = self.backends[idx].name().to_string();
                debug!(term, %fragment, %backend, "term translated");
                TranslationOutcome {
                    term: term.to_string(),
                    fragment,
                    source: TranslationSource::Backend(backend),
                }
            }
            None => {
                bump(&self.stats.fallbacks);
                let fragment = hash_fragment(fallback.prefix(), term);
                warn!(term, %fragment, "all translation backends failed, using hash fallback");
                TranslationOutcome {
                    term: term.to_string(),
                    fragment,
                    source: TranslationSource::Fallback,
                }
            }
        }
    }

    /// Translate many terms in order.
    ///
    /// The first network call settles the sticky backend; cached and
    /// passthrough terms are not delayed.
    #[instrument(skip_all, fields(terms = terms.len()))]
    pub async fn translate_batch<S: AsRef<str>>(
        &self,
        terms: &[S],
        fallback: FallbackKind,
    ) -> Vec<TranslationOutcome> {
        let requests_before = self.stats.backend_requests.load(Ordering::Relaxed);
        let mut outcomes = Vec::with_capacity(terms.len());

        for term in terms {
            outcomes.push(self.translate_detailed(term.as_ref(), fallback).await);
        }

        info!(
            backend_requests = self.stats.backend_requests.load(Ordering::Relaxed) - requests_before,
            sticky = self.sticky_backend().unwrap_or("none"),
            "batch translation complete"
        );

        outcomes
    }

    /// Translate a vocabulary into the cache ahead of a publish run.
    /// Returns how many terms now have a real (non-fallback) fragment.
    pub async fn prewarm<S: AsRef<str>>(&self, terms: &[S]) -> usize {
        self.translate_batch(terms, FallbackKind::Untranslated)
            .await
            .iter()
            .filter(|o| o.source != TranslationSource::Fallback)
            .count()
    }

    /// Sticky backend first, then every other backend once, in order.
    fn lookup_order(&self) -> Vec<usize> {
        let sticky = self.state.last_good().filter(|idx| *idx < self.backends.len());
        sticky
            .into_iter()
            .chain((0..self.backends.len()).filter(|idx| Some(*idx) != sticky))
            .collect()
    }

    /// Wait out the rest of `batch_delay` since the previous lookup.
    async fn pace(&self) {
        let mut last = self.last_lookup.lock().await;
        if let Some(at) = *last {
            let wait = self.batch_delay.saturating_sub(at.elapsed());
            if !wait.is_zero() {
                debug!(wait_ms = wait.as_millis() as u64, "pacing backend requests");
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn lookup(&self, term: &str) -> Option<(usize, String)> {
        if self.backends.is_empty() {
            return None;
        }
        if !self.batch_delay.is_zero() {
            self.pace().await;
        }

        for idx in self.lookup_order() {
            match self.call_backend(idx, term).await {
                Ok(fragment) => {
                    self.state.record_success(idx);
                    return Some((idx, fragment));
                }
                Err(e) => {
                    bump(&self.stats.backend_failures);
                    warn!(backend = self.backends[idx].name(), term, error = %e, "backend failed, trying next");
                }
            }
        }
        None
    }

    async fn call_backend(&self, idx: usize, term: &str) -> Result<String> {
        let backend = &self.backends[idx];
        bump(&self.stats.backend_requests);

        let call = backend.translate(&self.client, term, &self.source_lang, &self.target_lang);
        let raw = tokio::time::timeout(backend.timeout() + CALL_GRACE, call)
            .await
            .map_err(|_| {
                SlugforgeError::Network(format!("{}: call abandoned after timeout", backend.name()))
            })??;

        let fragment = normalize_fragment(&raw, self.fragment_max_len);
        if fragment.is_empty() {
            return Err(SlugforgeError::Translation(format!(
                "{}: no ASCII content in '{raw}'",
                backend.name()
            )));
        }
        Ok(fragment)
    }
}

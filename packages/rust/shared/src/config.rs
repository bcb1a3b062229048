//! Application configuration for slugforge.
//!
//! User config lives at `~/.slugforge/slugforge.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, SlugforgeError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "slugforge.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".slugforge";

/// Shortest slug budget that still fits a date plus a hash placeholder.
const MIN_SLUG_LEN: usize = 16;

// ---------------------------------------------------------------------------
// Config structs (matching slugforge.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Input/output file locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Classifier scoring knobs.
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Tag extraction weights.
    #[serde(default)]
    pub tags: TagConfig,

    /// Slug length budget and term limits.
    #[serde(default)]
    pub slug: SlugConfig,

    /// Translation backends and batch pacing.
    #[serde(default)]
    pub translation: TranslationConfig,
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Keyword index JSON. When missing, the built-in index is used.
    #[serde(default = "default_keyword_index")]
    pub keyword_index: String,

    /// Persisted translation cache (flat `term -> fragment` JSON).
    #[serde(default = "default_translation_cache")]
    pub translation_cache: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            keyword_index: default_keyword_index(),
            translation_cache: default_translation_cache(),
        }
    }
}

fn default_keyword_index() -> String {
    "~/.slugforge/keyword_index.json".into()
}
fn default_translation_cache() -> String {
    "~/.slugforge/translation_cache.json".into()
}

/// `[classifier]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Number of leading characters treated as title + lead.
    #[serde(default = "default_lead_chars")]
    pub lead_chars: usize,

    /// Weight of a keyword occurrence inside the lead window.
    #[serde(default = "default_lead_multiplier")]
    pub lead_multiplier: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            lead_chars: default_lead_chars(),
            lead_multiplier: default_lead_multiplier(),
        }
    }
}

fn default_lead_chars() -> usize {
    100
}
fn default_lead_multiplier() -> u32 {
    2
}

/// `[tags]` section. The weights are empirically tuned; keep them configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagConfig {
    #[serde(default = "default_max_tags")]
    pub max_tags: usize,

    /// How many top-scored tokens are considered for selection.
    #[serde(default = "default_candidate_pool")]
    pub candidate_pool: usize,

    #[serde(default = "default_title_weight")]
    pub title_weight: f64,

    #[serde(default = "default_summary_weight")]
    pub summary_weight: f64,

    #[serde(default = "default_domain_weight")]
    pub domain_weight: f64,

    /// Bonus for tokens already present in the translation cache.
    #[serde(default = "default_cached_weight")]
    pub cached_weight: f64,
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            max_tags: default_max_tags(),
            candidate_pool: default_candidate_pool(),
            title_weight: default_title_weight(),
            summary_weight: default_summary_weight(),
            domain_weight: default_domain_weight(),
            cached_weight: default_cached_weight(),
        }
    }
}

fn default_max_tags() -> usize {
    3
}
fn default_candidate_pool() -> usize {
    10
}
fn default_title_weight() -> f64 {
    2.0
}
fn default_summary_weight() -> f64 {
    1.5
}
fn default_domain_weight() -> f64 {
    2.0
}
fn default_cached_weight() -> f64 {
    1.5
}

/// `[slug]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlugConfig {
    /// Hard upper bound on slug length.
    #[serde(default = "default_max_len")]
    pub max_len: usize,

    /// Keywords extracted from the title before translation.
    #[serde(default = "default_max_title_terms")]
    pub max_title_terms: usize,

    /// Translated title fragments kept in the slug.
    #[serde(default = "default_max_title_fragments")]
    pub max_title_fragments: usize,
}

impl Default for SlugConfig {
    fn default() -> Self {
        Self {
            max_len: default_max_len(),
            max_title_terms: default_max_title_terms(),
            max_title_fragments: default_max_title_fragments(),
        }
    }
}

fn default_max_len() -> usize {
    80
}
fn default_max_title_terms() -> usize {
    5
}
fn default_max_title_fragments() -> usize {
    3
}

/// Wire protocol spoken by a translation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendProtocol {
    /// JSON POST `{q, source, target}` -> `{translatedText}`.
    LibreTranslate,
    /// GET `/{source}/{target}/{text}` -> `{translation}`.
    Lingva,
    /// GET `?q=&langpair=` -> `{responseData: {translatedText}}`.
    MyMemory,
    /// Form POST `{from, to, text}` -> `{translated-text}`.
    FormPost,
}

/// `[[translation.backends]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Name used in logs and as the sticky-backend identity.
    pub name: String,
    pub endpoint: String,
    pub protocol: BackendProtocol,
    #[serde(default = "default_backend_timeout")]
    pub timeout_secs: u64,
}

impl BackendConfig {
    /// Parse the configured endpoint.
    pub fn endpoint_url(&self) -> Result<Url> {
        Url::parse(&self.endpoint).map_err(|e| {
            SlugforgeError::config(format!(
                "backend {}: invalid endpoint '{}': {e}",
                self.name, self.endpoint
            ))
        })
    }
}

fn default_backend_timeout() -> u64 {
    10
}

/// `[translation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    #[serde(default = "default_source_lang")]
    pub source_lang: String,

    #[serde(default = "default_target_lang")]
    pub target_lang: String,

    /// Pause between network calls in batch mode (free tiers throttle per IP).
    #[serde(default = "default_batch_delay")]
    pub batch_delay_ms: u64,

    /// Upper bound for one normalized fragment.
    #[serde(default = "default_fragment_max_len")]
    pub fragment_max_len: usize,

    /// Backends in failover order.
    #[serde(default = "default_backends")]
    pub backends: Vec<BackendConfig>,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            source_lang: default_source_lang(),
            target_lang: default_target_lang(),
            batch_delay_ms: default_batch_delay(),
            fragment_max_len: default_fragment_max_len(),
            backends: default_backends(),
        }
    }
}

fn default_source_lang() -> String {
    "zh-TW".into()
}
fn default_target_lang() -> String {
    "en".into()
}
fn default_batch_delay() -> u64 {
    1000
}
fn default_fragment_max_len() -> usize {
    40
}
fn default_backends() -> Vec<BackendConfig> {
    vec![
        BackendConfig {
            name: "mymemory".into(),
            endpoint: "https://api.mymemory.translated.net/get".into(),
            protocol: BackendProtocol::MyMemory,
            timeout_secs: default_backend_timeout(),
        },
        BackendConfig {
            name: "lingva".into(),
            endpoint: "https://lingva.ml/api/v1".into(),
            protocol: BackendProtocol::Lingva,
            timeout_secs: default_backend_timeout(),
        },
        BackendConfig {
            name: "libretranslate".into(),
            endpoint: "https://libretranslate.com/translate".into(),
            protocol: BackendProtocol::LibreTranslate,
            timeout_secs: default_backend_timeout(),
        },
    ]
}

impl AppConfig {
    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.slug.max_len < MIN_SLUG_LEN {
            return Err(SlugforgeError::config(format!(
                "slug.max_len must be at least {MIN_SLUG_LEN} (got {})",
                self.slug.max_len
            )));
        }
        if self.tags.max_tags == 0 {
            return Err(SlugforgeError::config("tags.max_tags must be at least 1"));
        }
        if self.translation.fragment_max_len == 0 {
            return Err(SlugforgeError::config(
                "translation.fragment_max_len must be at least 1",
            ));
        }
        for backend in &self.translation.backends {
            backend.endpoint_url()?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.slugforge/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SlugforgeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.slugforge/slugforge.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SlugforgeError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        SlugforgeError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SlugforgeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SlugforgeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SlugforgeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

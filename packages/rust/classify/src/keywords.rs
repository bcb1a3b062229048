//! Keyword index: the static taxonomy and keyword tables.
//!
//! The index is a JSON document with these top-level keys:
//!
//! - `categories`: `name -> {code, subcategories: {name -> code}}`
//! - `keywords`: `subcategory -> [keyword]`, scored by the classifier
//! - `domain_terms`: `category or subcategory name -> [term]`, used by the tagger
//! - `slug_vocabulary`: curated slug terms, root characters, generic verbs
//! - `stop_words`: tokens never used as tags or slug keywords
//! - `default`: the category reported when nothing matches
//!
//! Declaration order is preserved everywhere; the classifier's tie-breaking
//! depends on it.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use slugforge_shared::{ClassificationResult, Result, SlugforgeError};

/// Index shipped with the crate, used when no index file is configured.
const BUILTIN_INDEX: &str = include_str!("../data/keyword_index.json");

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subcategory {
    pub name: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub code: String,
    pub subcategories: Vec<Subcategory>,
}

/// Keywords scored for one subcategory (or tag domain).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordList {
    pub domain: String,
    pub keywords: Vec<String>,
}

/// Category reported when classification finds no signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultCategory {
    pub category: String,
    pub code: String,
    pub subcategory: String,
    pub subcategory_code: String,
}

impl Default for DefaultCategory {
    fn default() -> Self {
        Self {
            category: "財稅知識".into(),
            code: "knowledge".into(),
            subcategory: "一般知識".into(),
            subcategory_code: "general".into(),
        }
    }
}

/// Curated vocabulary consumed by the slug builder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlugVocabulary {
    /// Known professional terms, matched as substrings of titles.
    #[serde(default)]
    pub domain_terms: Vec<String>,
    /// Characters that mark a window as domain-relevant.
    #[serde(default)]
    pub root_chars: String,
    /// Low-information words penalized when ranking title fragments.
    #[serde(default)]
    pub generic_verbs: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawIndex {
    #[serde(default)]
    default: Option<DefaultCategory>,
    categories: Map<String, Value>,
    keywords: Map<String, Value>,
    #[serde(default)]
    domain_terms: Map<String, Value>,
    #[serde(default)]
    slug_vocabulary: SlugVocabulary,
    #[serde(default)]
    stop_words: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawCategory {
    code: String,
    #[serde(default)]
    subcategories: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// KeywordIndex
// ---------------------------------------------------------------------------

/// Immutable taxonomy + keyword tables, loaded once per run.
#[derive(Debug, Clone)]
pub struct KeywordIndex {
    categories: Vec<Category>,
    keyword_lists: Vec<KeywordList>,
    domain_terms: HashMap<String, Vec<String>>,
    slug_vocabulary: SlugVocabulary,
    stop_words: HashSet<String>,
    default: DefaultCategory,
    /// subcategory name -> (category index, subcategory index), first declaration wins.
    parents: HashMap<String, (usize, usize)>,
}

impl KeywordIndex {
    /// Parse an index from its JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawIndex = serde_json::from_str(json)
            .map_err(|e| SlugforgeError::parse(format!("keyword index: {e}")))?;

        let mut categories = Vec::with_capacity(raw.categories.len());
        for (name, raw_category) in ordered::<RawCategory>(raw.categories, "categories")? {
            let subcategories = ordered::<String>(raw_category.subcategories, &name)?
                .into_iter()
                .map(|(name, code)| Subcategory { name, code })
                .collect();
            categories.push(Category {
                name,
                code: raw_category.code,
                subcategories,
            });
        }

        let keyword_lists = ordered::<Vec<String>>(raw.keywords, "keywords")?
            .into_iter()
            .map(|(domain, keywords)| KeywordList {
                domain,
                keywords: keywords.into_iter().filter(|k| !k.trim().is_empty()).collect(),
            })
            .collect();

        let domain_terms = ordered::<Vec<String>>(raw.domain_terms, "domain_terms")?
            .into_iter()
            .collect();

        let mut parents = HashMap::new();
        for (ci, category) in categories.iter().enumerate() {
            for (si, sub) in category.subcategories.iter().enumerate() {
                parents.entry(sub.name.clone()).or_insert((ci, si));
            }
        }

        let index = Self {
            categories,
            keyword_lists,
            domain_terms,
            slug_vocabulary: raw.slug_vocabulary,
            stop_words: raw.stop_words.into_iter().collect(),
            default: raw.default.unwrap_or_default(),
            parents,
        };

        for issue in index.validate() {
            warn!(%issue, "keyword index inconsistency");
        }

        Ok(index)
    }

    /// Load an index file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SlugforgeError::io(path, e))?;
        let index = Self::from_json(&content)?;
        info!(
            path = %path.display(),
            categories = index.categories.len(),
            keyword_lists = index.keyword_lists.len(),
            "keyword index loaded"
        );
        Ok(index)
    }

    /// Load `path`, or fall back to the built-in index when it is missing or
    /// malformed. Configuration problems never abort a run.
    pub fn load_or_builtin(path: &Path) -> Self {
        if !path.exists() {
            info!(path = %path.display(), "keyword index not found, using built-in index");
            return Self::builtin();
        }
        match Self::load(path) {
            Ok(index) => index,
            Err(e) => {
                warn!(error = %e, "failed to load keyword index, using built-in index");
                Self::builtin()
            }
        }
    }

    /// The index embedded in the crate (tax and accounting services).
    pub fn builtin() -> Self {
        Self::from_json(BUILTIN_INDEX).expect("built-in keyword index is valid")
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Keyword lists in declaration order.
    pub fn keyword_lists(&self) -> &[KeywordList] {
        &self.keyword_lists
    }

    /// Parent category of a subcategory.
    pub fn parent_of(&self, subcategory: &str) -> Option<(&Category, &Subcategory)> {
        let (ci, si) = *self.parents.get(subcategory)?;
        let category = &self.categories[ci];
        Some((category, &category.subcategories[si]))
    }

    /// Tag-relevant terms for a category or subcategory name.
    pub fn domain_terms_for(&self, name: &str) -> &[String] {
        self.domain_terms.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn slug_vocabulary(&self) -> &SlugVocabulary {
        &self.slug_vocabulary
    }

    pub fn is_stop_word(&self, token: &str) -> bool {
        self.stop_words.contains(token)
    }

    pub fn stop_words(&self) -> &HashSet<String> {
        &self.stop_words
    }

    pub fn default_category(&self) -> &DefaultCategory {
        &self.default
    }

    /// The no-signal classification with the given confidence.
    pub fn default_result(&self, confidence: u32) -> ClassificationResult {
        ClassificationResult {
            main_category: self.default.category.clone(),
            main_category_code: self.default.code.clone(),
            subcategory: self.default.subcategory.clone(),
            subcategory_code: self.default.subcategory_code.clone(),
            confidence,
        }
    }

    /// Every multi-character term the index knows, for seeding a segmenter.
    pub fn vocabulary(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let names = self.categories.iter().flat_map(|c| {
            std::iter::once(&c.name).chain(c.subcategories.iter().map(|s| &s.name))
        });
        let keywords = self.keyword_lists.iter().flat_map(|l| l.keywords.iter());
        let domain = self.domain_terms.values().flatten();
        let slug = self.slug_vocabulary.domain_terms.iter();

        names
            .chain(keywords)
            .chain(domain)
            .chain(slug)
            .filter(|t| t.chars().count() >= 2)
            .filter(|t| seen.insert(t.as_str()))
            .cloned()
            .collect()
    }

    /// Structural problems: keyword lists without a parent category, a
    /// subcategory declared under several categories, duplicate codes.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        for list in &self.keyword_lists {
            if !self.parents.contains_key(&list.domain) {
                issues.push(format!(
                    "keyword list '{}' has no parent category",
                    list.domain
                ));
            }
        }

        let mut owners: HashMap<&str, usize> = HashMap::new();
        let mut category_codes = HashSet::new();
        for category in &self.categories {
            if !category_codes.insert(category.code.as_str()) {
                issues.push(format!("duplicate category code '{}'", category.code));
            }
            let mut sub_codes = HashSet::new();
            for sub in &category.subcategories {
                *owners.entry(sub.name.as_str()).or_default() += 1;
                if !sub_codes.insert(sub.code.as_str()) {
                    issues.push(format!(
                        "duplicate subcategory code '{}' in '{}'",
                        sub.code, category.name
                    ));
                }
            }
        }

        let mut shared: Vec<_> = owners.into_iter().filter(|(_, n)| *n > 1).collect();
        shared.sort();
        for (name, n) in shared {
            issues.push(format!("subcategory '{name}' declared in {n} categories"));
        }

        issues
    }
}

/// Deserialize each value of an order-preserving JSON object.
fn ordered<T: DeserializeOwned>(map: Map<String, Value>, section: &str) -> Result<Vec<(String, T)>> {
    map.into_iter()
        .map(|(key, value)| match serde_json::from_value(value) {
            Ok(parsed) => Ok((key, parsed)),
            Err(e) => Err(SlugforgeError::parse(format!("{section}.{key}: {e}"))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = r#"{
        "categories": {
            "稅務服務": {"code": "taxation", "subcategories": {"所得稅務": "income-tax"}},
            "工商登記": {"code": "registration", "subcategories": {"公司設立": "company-setup"}}
        },
        "keywords": {
            "公司設立": ["公司設立", ""],
            "所得稅務": ["所得稅"],
            "孤兒分類": ["孤兒"]
        }
    }"#;

    #[test]
    fn builtin_index_parses() {
        let index = KeywordIndex::builtin();
        assert_eq!(index.categories().len(), 4);
        assert_eq!(index.categories()[0].name, "稅務服務");
        assert_eq!(index.categories()[0].code, "taxation");
        assert!(index.validate().is_empty(), "{:?}", index.validate());
    }

    #[test]
    fn declaration_order_is_preserved() {
        let index = KeywordIndex::from_json(SMALL).unwrap();
        let domains: Vec<&str> = index
            .keyword_lists()
            .iter()
            .map(|l| l.domain.as_str())
            .collect();
        assert_eq!(domains, vec!["公司設立", "所得稅務", "孤兒分類"]);
    }

    #[test]
    fn empty_keywords_are_dropped() {
        let index = KeywordIndex::from_json(SMALL).unwrap();
        assert_eq!(index.keyword_lists()[0].keywords, vec!["公司設立".to_string()]);
    }

    #[test]
    fn parent_lookup() {
        let index = KeywordIndex::from_json(SMALL).unwrap();
        let (category, sub) = index.parent_of("所得稅務").expect("parent");
        assert_eq!(category.code, "taxation");
        assert_eq!(sub.code, "income-tax");
        assert!(index.parent_of("孤兒分類").is_none());
    }

    #[test]
    fn validate_reports_orphans_and_duplicates() {
        let json = r#"{
            "categories": {
                "甲": {"code": "a", "subcategories": {"共用": "x", "乙": "x"}},
                "丙": {"code": "a", "subcategories": {"共用": "y"}}
            },
            "keywords": {"孤兒": ["孤兒"]}
        }"#;
        let issues = KeywordIndex::from_json(json).unwrap().validate();
        assert!(issues.iter().any(|i| i.contains("'孤兒' has no parent")));
        assert!(issues.iter().any(|i| i.contains("duplicate category code 'a'")));
        assert!(issues.iter().any(|i| i.contains("duplicate subcategory code 'x'")));
        assert!(issues.iter().any(|i| i.contains("'共用' declared in 2")));
    }

    #[test]
    fn missing_default_uses_builtin_default() {
        let index = KeywordIndex::from_json(SMALL).unwrap();
        let result = index.default_result(0);
        assert_eq!(result.main_category_code, "knowledge");
        assert_eq!(result.confidence, 0);
    }

    #[test]
    fn malformed_index_is_a_parse_error() {
        let err = KeywordIndex::from_json(r#"{"categories": {"甲": {"subcategories": {}}}, "keywords": {}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("categories.甲"));
    }

    #[test]
    fn load_or_builtin_falls_back() {
        let index = KeywordIndex::load_or_builtin(Path::new("/nonexistent/keyword_index.json"));
        assert_eq!(index.categories().len(), 4);
    }

    #[test]
    fn load_from_file() {
        let index = KeywordIndex::load(Path::new("data/keyword_index.json")).expect("load");
        assert!(index.domain_terms_for("稅務服務").contains(&"節稅".to_string()));
        assert!(index.is_stop_word("如何"));
    }

    #[test]
    fn vocabulary_is_deduplicated() {
        let index = KeywordIndex::builtin();
        let vocab = index.vocabulary();
        let unique: HashSet<&String> = vocab.iter().collect();
        assert_eq!(unique.len(), vocab.len());
        assert!(vocab.contains(&"所得稅".to_string()));
        assert!(vocab.iter().all(|t| t.chars().count() >= 2));
    }
}

//! Persisted translation cache.
//!
//! A flat `term -> fragment` JSON object on disk, loaded at startup and
//! merge-written after every new translation. Writes are additive: an entry
//! already on disk is never replaced, and entries written by other runs are
//! adopted into memory. When the file cannot be read or written the cache
//! keeps working in memory for the rest of the run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info, warn};

use slugforge_shared::{Result, SlugforgeError};

/// Thread-safe translation cache with write-through persistence.
#[derive(Debug)]
pub struct TranslationCache {
    path: Option<PathBuf>,
    entries: Mutex<BTreeMap<String, String>>,
    /// Serializes read-merge-write cycles on the cache file.
    persist_lock: Mutex<()>,
    degraded: AtomicBool,
}

impl TranslationCache {
    /// A cache that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(BTreeMap::new()),
            persist_lock: Mutex::new(()),
            degraded: AtomicBool::new(false),
        }
    }

    /// Open the cache file at `path`.
    ///
    /// A missing file yields an empty cache (created on first write). An
    /// unreadable or malformed file is logged and the cache runs in degraded,
    /// memory-only mode so the bad file is left untouched.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut cache = Self::in_memory();

        match read_cache_file(&path) {
            Ok(Some(entries)) => {
                info!(path = %path.display(), entries = entries.len(), "translation cache loaded");
                cache.entries = Mutex::new(entries);
                cache.path = Some(path);
            }
            Ok(None) => {
                debug!(path = %path.display(), "translation cache not found, starting empty");
                cache.path = Some(path);
            }
            Err(e) => {
                warn!(error = %e, "translation cache unreadable, continuing in memory only");
                cache.degraded.store(true, Ordering::Relaxed);
            }
        }

        cache
    }

    /// Seed a cache from existing pairs (memory only).
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let cache = Self::in_memory();
        {
            let mut map = cache.lock_entries();
            for (k, v) in entries {
                map.insert(k.into(), v.into());
            }
        }
        cache
    }

    pub fn get(&self, term: &str) -> Option<String> {
        self.lock_entries().get(term).cloned()
    }

    pub fn contains(&self, term: &str) -> bool {
        self.lock_entries().contains_key(term)
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }

    /// True when persistence failed and the cache is memory-only.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Copy of all entries.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.lock_entries().clone()
    }

    /// Record a translation and write it through to disk.
    ///
    /// An existing entry for `term` wins; the returned value is the fragment
    /// the cache now holds.
    pub fn insert(&self, term: &str, fragment: &str) -> String {
        let stored = self
            .lock_entries()
            .entry(term.to_string())
            .or_insert_with(|| fragment.to_string())
            .clone();

        if let Err(e) = self.persist() {
            warn!(error = %e, term, "failed to persist translation cache, continuing in memory only");
            self.degraded.store(true, Ordering::Relaxed);
        }

        stored
    }

    /// Merge the in-memory entries into the cache file.
    ///
    /// The file is re-read under the persist lock so concurrent writers do not
    /// lose each other's entries; the merged map is written to a temp file and
    /// renamed into place.
    pub fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if self.is_degraded() {
            return Ok(());
        }

        let _guard = self
            .persist_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut merged = read_cache_file(path)?.unwrap_or_default();
        {
            let mut entries = self.lock_entries();
            for (term, fragment) in entries.iter() {
                merged
                    .entry(term.clone())
                    .or_insert_with(|| fragment.clone());
            }
            // Adopt what other runs wrote meanwhile.
            for (term, fragment) in &merged {
                entries
                    .entry(term.clone())
                    .or_insert_with(|| fragment.clone());
            }
        }

        write_cache_file(path, &merged)
    }

    fn lock_entries(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Read the cache file. `Ok(None)` when it does not exist.
fn read_cache_file(path: &Path) -> Result<Option<BTreeMap<String, String>>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(SlugforgeError::io(path, e)),
    };

    if content.trim().is_empty() {
        return Ok(Some(BTreeMap::new()));
    }

    serde_json::from_str(&content).map(Some).map_err(|e| {
        SlugforgeError::Cache(format!("{}: not a flat term map: {e}", path.display()))
    })
}

fn write_cache_file(path: &Path, entries: &BTreeMap<String, String>) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| SlugforgeError::io(parent, e))?;
        }
    }

    let json = serde_json::to_string_pretty(entries)
        .map_err(|e| SlugforgeError::Cache(format!("failed to serialize cache: {e}")))?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(|e| SlugforgeError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| SlugforgeError::io(path, e))?;
    Ok(())
}

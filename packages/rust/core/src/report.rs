//! Per-run batch summary.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use slugforge_shared::{DocumentOutput, Result, RunId, SlugforgeError};
use slugforge_translate::TranslationStats;

/// A document the batch could not process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub id: String,
    pub message: String,
}

/// Outcome of one `process_batch` run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub outputs: Vec<DocumentOutput>,
    pub failures: Vec<BatchFailure>,
    pub succeeded: usize,
    pub failed: usize,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
    pub translation: TranslationStats,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    /// Slugs that were kept from an earlier publish pass.
    pub fn reused(&self) -> usize {
        self.outputs.iter().filter(|o| o.slug_reused).count()
    }

    /// Write the report as pretty JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| SlugforgeError::io(parent, e))?;
            }
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| SlugforgeError::parse(format!("failed to serialize report: {e}")))?;
        std::fs::write(path, json).map_err(|e| SlugforgeError::io(path, e))
    }
}

fn as_millis<S: Serializer>(elapsed: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}

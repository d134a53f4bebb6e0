//! Quote harvesting data model
//!
//! The units that flow through one pipeline run:
//! - [`CandidateUrl`]: a discovered page not yet fetched
//! - [`FetchResult`]: one page retrieval, static or rendered
//! - [`RawQuote`]: extracted text before cleaning
//! - [`Quote`]: cleaned, deduplicated output unit
//! - [`PipelineMetrics`]: run summary counters

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// A discovered page URL that survived discovery filtering
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateUrl(String);

impl CandidateUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for CandidateUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CandidateUrl {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

/// How a page body was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Plain HTTP GET, no script execution
    #[default]
    Static,
    /// Headless browser render with scrolling
    Dynamic,
}

impl std::fmt::Display for RenderMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderMode::Static => f.write_str("static"),
            RenderMode::Dynamic => f.write_str("dynamic"),
        }
    }
}

/// Result of one page retrieval. Owned by the task that fetched it.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub url: String,
    /// Page body, or the error message when the fetch failed
    pub body: Result<String, String>,
    pub mode: RenderMode,
    pub elapsed: Duration,
}

impl FetchResult {
    pub fn html(&self) -> Option<&str> {
        self.body.as_deref().ok()
    }

    pub fn is_ok(&self) -> bool {
        self.body.is_ok()
    }
}

/// Extracted (source, text) pair prior to normalization and dedup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawQuote {
    pub source_url: String,
    pub text: String,
}

impl RawQuote {
    pub fn new(source_url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            text: text.into(),
        }
    }
}

/// A cleaned quote, unique within its result set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub source_url: String,
    #[serde(rename = "quote")]
    pub text: String,
    /// Content hash of the case-folded text
    pub fingerprint: String,
}

impl Quote {
    pub fn new(source_url: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let fingerprint = fingerprint(&text);
        Self {
            source_url: source_url.into(),
            text,
            fingerprint,
        }
    }

    /// Case-insensitive identity key used for deduplication
    pub fn dedup_key(&self) -> String {
        dedup_key(&self.text)
    }
}

/// Lowercased form of already-normalized text
pub fn dedup_key(normalized: &str) -> String {
    normalized.to_lowercase()
}

/// Stable SHA-256 hex digest of the dedup key
pub fn fingerprint(normalized: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(dedup_key(normalized).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Outcome of one per-URL scrape task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutcome {
    /// At least one quote extracted
    Extracted,
    /// Page fetched but nothing extracted
    Empty,
    /// Fetch or task failure, recovered locally
    Failed,
}

/// Per-URL task summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReport {
    pub url: String,
    pub outcome: TaskOutcome,
    pub mode: RenderMode,
    pub quote_count: usize,
    pub elapsed_ms: u64,
    pub error: Option<String>,
}

/// Run summary, computed once per pipeline run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineMetrics {
    pub run_id: Uuid,
    pub started_at: Option<DateTime<Utc>>,
    /// URLs returned by discovery after filtering
    pub discovered: usize,
    /// Quotes extracted across all tasks, before dedup
    pub raw_extracted: usize,
    /// Quotes surviving normalization and dedup
    pub unique: usize,
    /// Tasks that ended in a fetch or task failure
    pub failed: usize,
    /// Tasks whose result came from the headless renderer
    pub rendered: usize,
    /// Quotes kept by the safety pass; equals `unique` when the pass is skipped
    pub kept: usize,
    /// Quotes removed by the safety pass; zero when the pass is skipped
    pub removed: usize,
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_ignores_case() {
        let a = Quote::new("https://a.example", "I will be King of the Pirates");
        let b = Quote::new("https://b.example", "i will be king of the pirates");
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_eq!(a.fingerprint.len(), 64);
    }

    #[test]
    fn test_fetch_result_html() {
        let ok = FetchResult {
            url: "https://a.example".into(),
            body: Ok("<p>hi</p>".into()),
            mode: RenderMode::Static,
            elapsed: Duration::from_millis(5),
        };
        assert_eq!(ok.html(), Some("<p>hi</p>"));

        let failed = FetchResult {
            body: Err("timeout".into()),
            ..ok
        };
        assert!(failed.html().is_none());
        assert!(!failed.is_ok());
    }

    #[test]
    fn test_metrics_serialize_elapsed_ms() {
        let metrics = PipelineMetrics {
            elapsed: Duration::from_millis(1500),
            discovered: 5,
            ..PipelineMetrics::new()
        };
        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["elapsed"], 1500);
        assert_eq!(json["discovered"], 5);
    }
}

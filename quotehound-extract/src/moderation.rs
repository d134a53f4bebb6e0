//! Moderation classifier and safety filter
//!
//! Quotes are classified one by one; a flagged quote or a classifier error
//! both reject the quote (fail closed).

use std::sync::Arc;

use async_openai::config::{Config, OpenAIConfig};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use quotehound_core::Quote;

/// Moderation errors
#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Empty response")]
    EmptyResponse,
}

/// Classifier verdict for one text
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub flagged: bool,
    /// Highest-scoring category and its score, when reported
    pub top_category: Option<(String, f64)>,
}

impl Verdict {
    pub fn safe() -> Self {
        Self {
            flagged: false,
            top_category: None,
        }
    }

    pub fn flagged(category: &str, score: f64) -> Self {
        Self {
            flagged: true,
            top_category: Some((category.to_string(), score)),
        }
    }
}

/// External moderation boundary
#[async_trait]
pub trait Moderator: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Verdict, ModerationError>;

    /// Provider name for logs
    fn name(&self) -> &str;
}

/// Thread-safe reference to a moderator
pub type SharedModerator = Arc<dyn Moderator>;

/// Moderation model used unless configured otherwise
pub const DEFAULT_MODERATION_MODEL: &str = "omni-moderation-latest";

/// OpenAI moderation configuration
#[derive(Debug, Clone)]
pub struct ModerationConfig {
    /// API key (defaults to `OPENAI_API_KEY`)
    pub api_key: Option<String>,
    /// Base URL override for compatible servers
    pub base_url: Option<String>,
    /// Moderation model name sent with every request
    pub model: String,
    /// Concurrent classification requests
    pub concurrency: usize,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            base_url: None,
            model: DEFAULT_MODERATION_MODEL.to_string(),
            concurrency: 4,
        }
    }
}

#[derive(Debug, Serialize)]
struct ModerationRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct ModerationResponse {
    #[serde(default)]
    results: Vec<ModerationResult>,
}

#[derive(Debug, Deserialize)]
struct ModerationResult {
    flagged: bool,
    #[serde(default)]
    category_scores: serde_json::Value,
}

/// OpenAI moderation endpoint client
pub struct OpenAIModerator {
    client: Client,
    openai: OpenAIConfig,
    model: String,
}

impl OpenAIModerator {
    pub fn new(config: &ModerationConfig) -> Result<Self, ModerationError> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ModerationError::Configuration("OPENAI_API_KEY not set".to_string()))?;

        let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base_url) = &config.base_url {
            openai_config = openai_config.with_api_base(base_url);
        }

        Ok(Self {
            client: Client::new(),
            openai: openai_config,
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Moderator for OpenAIModerator {
    async fn classify(&self, text: &str) -> Result<Verdict, ModerationError> {
        let request = ModerationRequest {
            model: &self.model,
            input: text,
        };

        let response = self
            .client
            .post(self.openai.url("/moderations"))
            .headers(self.openai.headers())
            .json(&request)
            .send()
            .await
            .map_err(|e| ModerationError::Api(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModerationError::Api(format!("status {}: {}", status, body)));
        }

        let data: ModerationResponse = response
            .json()
            .await
            .map_err(|e| ModerationError::Api(e.to_string()))?;

        let result = data
            .results
            .into_iter()
            .next()
            .ok_or(ModerationError::EmptyResponse)?;

        Ok(Verdict {
            flagged: result.flagged,
            top_category: top_category(&result.category_scores),
        })
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// Highest numeric entry of a `{category: score}` object
fn top_category(scores: &serde_json::Value) -> Option<(String, f64)> {
    scores
        .as_object()?
        .iter()
        .filter_map(|(name, v)| v.as_f64().map(|score| (name.clone(), score)))
        .max_by(|a, b| a.1.total_cmp(&b.1))
}

/// Outcome of a safety pass
#[derive(Debug, Clone, Default)]
pub struct SafetyReport {
    pub accepted: Vec<Quote>,
    pub rejected: Vec<Quote>,
    /// Rejections caused by classifier errors
    pub errors: usize,
}

impl SafetyReport {
    pub fn kept(&self) -> usize {
        self.accepted.len()
    }

    pub fn removed(&self) -> usize {
        self.rejected.len()
    }
}

/// Partition `quotes` into accepted and rejected, preserving input order
pub async fn safety_filter(
    moderator: &dyn Moderator,
    quotes: Vec<Quote>,
    concurrency: usize,
) -> SafetyReport {
    let verdicts: Vec<_> = stream::iter(quotes)
        .map(|quote| async move {
            let verdict = moderator.classify(&quote.text).await;
            (quote, verdict)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut report = SafetyReport::default();

    for (quote, verdict) in verdicts {
        match verdict {
            Ok(v) if !v.flagged => report.accepted.push(quote),
            Ok(v) => {
                debug!("{} flagged {:?}: {}", moderator.name(), v.top_category, quote.text);
                report.rejected.push(quote);
            }
            Err(e) => {
                warn!("Moderation check failed, rejecting quote: {}", e);
                report.errors += 1;
                report.rejected.push(quote);
            }
        }
    }

    info!(
        "Safety pass kept {} | removed {} ({} classifier errors)",
        report.kept(),
        report.removed(),
        report.errors
    );
    report
}

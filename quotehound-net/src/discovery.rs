//! Candidate URL discovery
//!
//! Queries a web search API with a quote-biased query and filters the
//! organic results down to fetchable HTML pages.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use quotehound_core::{CandidateUrl, QueryError, SearchQuery};

/// Default SerpAPI endpoint
pub const SERPAPI_ENDPOINT: &str = "https://serpapi.com/search";

/// Document extensions that never hold an HTML quote page
pub static BLOCKED_EXTENSIONS: &[&str] = &[".pdf", ".ppt", ".doc", ".zip"];

/// Path fragments marking account pages
pub static BLOCKED_SEGMENTS: &[&str] = &["login", "signup"];

/// Errors that abort discovery
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Search API error: {0}")]
    Upstream(String),

    #[error(transparent)]
    Query(#[from] QueryError),
}

/// Search API configuration
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// SerpAPI key (defaults to `SERPAPI_KEY`)
    pub api_key: Option<String>,
    /// Search endpoint
    pub endpoint: String,
    /// Result country (`gl`)
    pub country: String,
    /// Result language (`hl`)
    pub language: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("SERPAPI_KEY").ok(),
            endpoint: SERPAPI_ENDPOINT.to_string(),
            country: "us".to_string(),
            language: "en".to_string(),
            timeout_secs: 20,
        }
    }
}

/// Capability to turn a query into an ordered list of result URLs
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &str;

    /// Run `query`, returning at most `query.max_results()` URLs in rank order
    async fn search(&self, query: &SearchQuery) -> Result<Vec<String>, DiscoveryError>;
}

#[derive(Debug, Deserialize)]
struct SerpResponse {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    #[serde(default)]
    link: Option<String>,
}

/// SerpAPI Google search client
#[derive(Debug, Clone)]
pub struct SerpApiClient {
    client: Client,
    api_key: String,
    config: SearchConfig,
}

impl SerpApiClient {
    /// Build a client; a missing or blank key is a configuration error
    pub fn new(config: SearchConfig) -> Result<Self, DiscoveryError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                DiscoveryError::Configuration(
                    "SERPAPI_KEY not set. Get one at https://serpapi.com".to_string(),
                )
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DiscoveryError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    fn request_url(&self, query: &SearchQuery) -> String {
        format!(
            "{}?engine=google&q={}&num={}&hl={}&gl={}&api_key={}",
            self.config.endpoint,
            urlencoding::encode(query.query()),
            query.max_results(),
            urlencoding::encode(&self.config.language),
            urlencoding::encode(&self.config.country),
            urlencoding::encode(&self.api_key),
        )
    }
}

#[async_trait]
impl SearchProvider for SerpApiClient {
    fn name(&self) -> &str {
        "serpapi"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<String>, DiscoveryError> {
        debug!("Searching: {}", query.query());

        let response = self
            .client
            .get(self.request_url(query))
            .send()
            .await
            .map_err(|e| DiscoveryError::Upstream(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DiscoveryError::Upstream(format!("status {}: {}", status, text)));
        }

        let data: SerpResponse = response
            .json()
            .await
            .map_err(|e| DiscoveryError::Upstream(e.to_string()))?;

        if let Some(err) = data.error {
            return Err(DiscoveryError::Upstream(err));
        }

        Ok(data
            .organic_results
            .into_iter()
            .filter_map(|r| r.link)
            .filter(|link| link.starts_with("http"))
            .take(query.max_results())
            .collect())
    }
}

/// Discover candidate URLs for `entity`
pub async fn discover(
    provider: &dyn SearchProvider,
    entity: &str,
    max_urls: usize,
) -> Result<Vec<CandidateUrl>, DiscoveryError> {
    let query = SearchQuery::build(entity, max_urls)?;
    discover_query(provider, &query).await
}

/// Discover candidate URLs for a prebuilt query
pub async fn discover_query(
    provider: &dyn SearchProvider,
    query: &SearchQuery,
) -> Result<Vec<CandidateUrl>, DiscoveryError> {
    let urls = provider.search(query).await?;
    let returned = urls.len();
    let candidates = filter_candidates(urls, query.max_results());

    info!(
        "{} returned {} results for {:?}, {} kept",
        provider.name(),
        returned,
        query.entity(),
        candidates.len()
    );
    Ok(candidates)
}

/// Stable filter: drop documents, account pages and repeats, then truncate
pub fn filter_candidates<I>(urls: I, max_urls: usize) -> Vec<CandidateUrl>
where
    I: IntoIterator<Item = String>,
{
    let mut seen: HashSet<String> = HashSet::new();

    urls.into_iter()
        .filter(|u| {
            let lower = u.to_lowercase();
            !BLOCKED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
                && !BLOCKED_SEGMENTS.iter().any(|seg| lower.contains(seg))
        })
        .filter(|u| seen.insert(u.clone()))
        .take(max_urls)
        .map(CandidateUrl::new)
        .collect()
}

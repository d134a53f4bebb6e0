//! Harvest pipeline
//!
//! Query → discovery → orchestrated scrape → dedupe → optional safety pass.
//! Only configuration and discovery failures abort a run; everything per-URL
//! is folded into the returned metrics.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use quotehound_core::{
    dedupe, CandidateUrl, PipelineMetrics, Quote, QueryError, SearchQuery, TaskReport,
    DEFAULT_MAX_URLS,
};
use quotehound_extract::{
    safety_filter, ExtractorRegistry, ModerationConfig, ModerationError, OpenAIModerator,
    SharedModerator,
};
use quotehound_net::{
    discover_query, ChromeRenderer, DiscoveryError, FetchConfig, FetchError, HttpFetcher,
    RenderConfig, SearchConfig, SearchProvider, SerpApiClient,
};

use crate::{FallbackPolicy, Orchestrator, DEFAULT_CONCURRENCY};

/// Errors that abort a run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<DiscoveryError> for PipelineError {
    fn from(err: DiscoveryError) -> Self {
        match err {
            DiscoveryError::Configuration(msg) => PipelineError::Configuration(msg),
            DiscoveryError::Upstream(msg) => PipelineError::Upstream(msg),
            DiscoveryError::Query(e) => e.into(),
        }
    }
}

impl From<QueryError> for PipelineError {
    fn from(err: QueryError) -> Self {
        PipelineError::InvalidInput(err.to_string())
    }
}

impl From<FetchError> for PipelineError {
    fn from(err: FetchError) -> Self {
        PipelineError::Configuration(err.to_string())
    }
}

impl From<ModerationError> for PipelineError {
    fn from(err: ModerationError) -> Self {
        PipelineError::Configuration(err.to_string())
    }
}

/// Per-run knobs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Candidate URL cap
    pub max_urls: usize,
    /// Worker pool size
    pub concurrency: usize,
    /// Dynamic fallback policy
    pub fallback: FallbackPolicy,
    /// Extra query terms after the entity name
    pub context: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_urls: DEFAULT_MAX_URLS,
            concurrency: DEFAULT_CONCURRENCY,
            fallback: FallbackPolicy::Heuristic,
            context: None,
        }
    }
}

/// Everything a run produced
#[derive(Debug, Clone, Serialize)]
pub struct HarvestReport {
    pub entity: String,
    /// Unique quotes that survived the safety pass (or all of them when it
    /// did not run), in task-completion order
    pub quotes: Vec<Quote>,
    /// Quotes removed by the safety pass
    pub rejected: Vec<Quote>,
    /// One report per candidate URL
    pub tasks: Vec<TaskReport>,
    pub metrics: PipelineMetrics,
}

impl HarvestReport {
    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

/// End-to-end harvest runner
pub struct Pipeline {
    search: Arc<dyn SearchProvider>,
    orchestrator: Orchestrator,
    moderator: Option<SharedModerator>,
    moderation_concurrency: usize,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        search: Arc<dyn SearchProvider>,
        orchestrator: Orchestrator,
        config: PipelineConfig,
    ) -> Self {
        Self {
            search,
            orchestrator,
            moderator: None,
            moderation_concurrency: ModerationConfig::default().concurrency,
            config,
        }
    }

    /// Run the safety pass through `moderator` after dedupe
    pub fn with_moderator(mut self, moderator: SharedModerator, concurrency: usize) -> Self {
        self.moderator = Some(moderator);
        self.moderation_concurrency = concurrency.max(1);
        self
    }

    /// Wire the production backends: SerpAPI search, reqwest fetcher, Chrome
    /// renderer (unless the policy is `Disabled`) and, when `moderation` is
    /// given, the OpenAI moderation endpoint.
    ///
    /// Fails before any network traffic when a credential is missing.
    pub fn from_configs(
        search: SearchConfig,
        fetch: &FetchConfig,
        render: RenderConfig,
        moderation: Option<&ModerationConfig>,
        config: PipelineConfig,
    ) -> Result<Self, PipelineError> {
        let search = SerpApiClient::new(search)?;
        let fetcher = HttpFetcher::new(fetch)?;

        let mut orchestrator =
            Orchestrator::new(Arc::new(fetcher), Arc::new(ExtractorRegistry::with_builtin_sites()));
        if config.fallback != FallbackPolicy::Disabled {
            let renderer = ChromeRenderer::from_config(render.clone());
            orchestrator = orchestrator.with_renderer(Arc::new(renderer), render);
        }

        let mut pipeline = Self::new(Arc::new(search), orchestrator, config);
        if let Some(moderation) = moderation {
            let moderator = OpenAIModerator::new(moderation)?;
            pipeline = pipeline.with_moderator(Arc::new(moderator), moderation.concurrency);
        }

        Ok(pipeline)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Discover candidate URLs for `entity` without scraping them
    pub async fn discover(&self, entity: &str) -> Result<Vec<CandidateUrl>, PipelineError> {
        let query = self.query_for(entity)?;
        Ok(discover_query(self.search.as_ref(), &query).await?)
    }

    /// Harvest quotes for `entity`.
    ///
    /// Returns metrics even when no quotes were found.
    pub async fn run(&self, entity: &str) -> Result<HarvestReport, PipelineError> {
        let started = Instant::now();
        let mut metrics = PipelineMetrics::new();

        let query = self.query_for(entity)?;
        info!("Harvesting quotes for {:?} (run {})", query.entity(), metrics.run_id);

        let urls = discover_query(self.search.as_ref(), &query).await?;
        metrics.discovered = urls.len();

        if urls.is_empty() {
            warn!("No candidate URLs for {:?}", query.entity());
        }

        let outcome = self
            .orchestrator
            .scrape_all(&urls, query.entity(), self.config.concurrency, self.config.fallback)
            .await;

        metrics.raw_extracted = outcome.quotes.len();
        metrics.failed = outcome.failed();
        metrics.rendered = outcome.rendered();

        let unique = dedupe(outcome.quotes);
        metrics.unique = unique.len();

        let (quotes, rejected) = match &self.moderator {
            Some(moderator) => {
                let report =
                    safety_filter(moderator.as_ref(), unique, self.moderation_concurrency).await;
                metrics.kept = report.kept();
                metrics.removed = report.removed();
                (report.accepted, report.rejected)
            }
            None => {
                metrics.kept = unique.len();
                (unique, Vec::new())
            }
        };

        metrics.elapsed = started.elapsed();
        info!(
            "Done: {} discovered | {} raw | {} unique | {} kept | {} removed in {:.1}s",
            metrics.discovered,
            metrics.raw_extracted,
            metrics.unique,
            metrics.kept,
            metrics.removed,
            metrics.elapsed.as_secs_f64()
        );

        Ok(HarvestReport {
            entity: query.entity().to_string(),
            quotes,
            rejected,
            tasks: outcome.reports,
            metrics,
        })
    }

    fn query_for(&self, entity: &str) -> Result<SearchQuery, QueryError> {
        SearchQuery::build_with_context(entity, self.config.context.as_deref(), self.config.max_urls)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("search", &self.search.name())
            .field("orchestrator", &self.orchestrator)
            .field("moderator", &self.moderator.as_ref().map(|m| m.name().to_string()))
            .field("config", &self.config)
            .finish()
    }
}

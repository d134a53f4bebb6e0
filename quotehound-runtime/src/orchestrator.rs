//! Per-URL scrape orchestration
//!
//! Fans one task per candidate URL across a bounded pool and merges results
//! in completion order. Each task runs:
//!
//! ```text
//! STATIC_FETCH -> quotes?  -> DONE(extracted)
//!              -> empty    -> CHECK_DYNAMIC -> trigger -> DYNAMIC_FETCH -> DONE
//!                                           -> no trigger              -> DONE(empty)
//! any error                -> DONE(empty), reported as failed
//! ```
//!
//! Tasks share nothing but the renderer's browser gate. A task only ever
//! waits on its own timeouts.

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use quotehound_core::{CandidateUrl, RawQuote, RenderMode, TaskOutcome, TaskReport};
use quotehound_extract::ExtractorRegistry;
use quotehound_net::{fetch_page, looks_dynamic, PageFetcher, PageRenderer, RenderConfig};

/// Default worker pool size
pub const DEFAULT_CONCURRENCY: usize = 8;

/// When an empty static page is retried through the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    /// Never render
    Disabled,
    /// Render when the page looks client-rendered
    #[default]
    Heuristic,
    /// Render every page that yielded nothing statically
    Always,
}

impl From<bool> for FallbackPolicy {
    fn from(allow: bool) -> Self {
        if allow {
            FallbackPolicy::Heuristic
        } else {
            FallbackPolicy::Disabled
        }
    }
}

impl std::str::FromStr for FallbackPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "disabled" | "never" | "off" => Ok(FallbackPolicy::Disabled),
            "heuristic" | "auto" => Ok(FallbackPolicy::Heuristic),
            "always" => Ok(FallbackPolicy::Always),
            other => Err(format!("unknown fallback policy: {}", other)),
        }
    }
}

impl std::fmt::Display for FallbackPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackPolicy::Disabled => f.write_str("disabled"),
            FallbackPolicy::Heuristic => f.write_str("heuristic"),
            FallbackPolicy::Always => f.write_str("always"),
        }
    }
}

/// Merged result of one batch
#[derive(Debug, Clone, Default)]
pub struct ScrapeOutcome {
    /// Raw quotes in task-completion order
    pub quotes: Vec<RawQuote>,
    /// One report per dispatched URL, in completion order
    pub reports: Vec<TaskReport>,
}

impl ScrapeOutcome {
    pub fn failed(&self) -> usize {
        self.count(TaskOutcome::Failed)
    }

    pub fn succeeded(&self) -> usize {
        self.reports.len() - self.failed()
    }

    /// Tasks whose result came from a successful browser render
    pub fn rendered(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| r.mode == RenderMode::Dynamic && r.outcome != TaskOutcome::Failed)
            .count()
    }

    fn count(&self, outcome: TaskOutcome) -> usize {
        self.reports.iter().filter(|r| r.outcome == outcome).count()
    }
}

/// Scrape scheduler
#[derive(Clone)]
pub struct Orchestrator {
    fetcher: Arc<dyn PageFetcher>,
    renderer: Option<Arc<dyn PageRenderer>>,
    registry: Arc<ExtractorRegistry>,
    render_config: RenderConfig,
}

impl Orchestrator {
    pub fn new(fetcher: Arc<dyn PageFetcher>, registry: Arc<ExtractorRegistry>) -> Self {
        Self {
            fetcher,
            renderer: None,
            registry,
            render_config: RenderConfig::default(),
        }
    }

    /// Enable dynamic fallback through `renderer`
    pub fn with_renderer(mut self, renderer: Arc<dyn PageRenderer>, config: RenderConfig) -> Self {
        self.renderer = Some(renderer);
        self.render_config = config;
        self
    }

    pub fn has_renderer(&self) -> bool {
        self.renderer.is_some()
    }

    /// Scrape every URL with at most `concurrency` tasks in flight.
    ///
    /// Returns once every task is done. Per-URL failures are reported, never
    /// raised.
    pub async fn scrape_all(
        &self,
        urls: &[CandidateUrl],
        entity: &str,
        concurrency: usize,
        fallback: FallbackPolicy,
    ) -> ScrapeOutcome {
        let concurrency = concurrency.max(1);
        info!(
            "Scraping {} URLs with {} workers (fallback: {})",
            urls.len(),
            concurrency,
            fallback
        );

        let completed: Vec<(Vec<RawQuote>, TaskReport)> = stream::iter(urls.to_vec())
            .map(|url| {
                let task = ScrapeTask {
                    fetcher: self.fetcher.clone(),
                    renderer: self.renderer.clone(),
                    registry: self.registry.clone(),
                    render_config: self.render_config.clone(),
                    entity: entity.to_string(),
                    fallback,
                };
                async move {
                    let started = Instant::now();
                    let url_str = url.to_string();
                    match tokio::spawn(task.run(url)).await {
                        Ok(done) => done,
                        Err(e) => {
                            warn!("✖ task for {} aborted: {}", url_str, e);
                            let report = report(
                                &url_str,
                                TaskOutcome::Failed,
                                RenderMode::Static,
                                0,
                                started,
                                Some(e.to_string()),
                            );
                            (Vec::new(), report)
                        }
                    }
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut outcome = ScrapeOutcome::default();
        for (quotes, report) in completed {
            outcome.quotes.extend(quotes);
            outcome.reports.push(report);
        }

        info!(
            "Scraped {} raw quotes ({} tasks ok, {} failed, {} rendered)",
            outcome.quotes.len(),
            outcome.succeeded(),
            outcome.failed(),
            outcome.rendered()
        );
        outcome
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("registry", &self.registry)
            .field("has_renderer", &self.has_renderer())
            .field("render_config", &self.render_config)
            .finish()
    }
}

/// Owned state of one URL task
struct ScrapeTask {
    fetcher: Arc<dyn PageFetcher>,
    renderer: Option<Arc<dyn PageRenderer>>,
    registry: Arc<ExtractorRegistry>,
    render_config: RenderConfig,
    entity: String,
    fallback: FallbackPolicy,
}

impl ScrapeTask {
    async fn run(self, url: CandidateUrl) -> (Vec<RawQuote>, TaskReport) {
        let started = Instant::now();
        let url = url.as_str();

        let fetched = fetch_page(self.fetcher.as_ref(), url).await;
        let html = match fetched.body {
            Ok(html) => html,
            Err(e) => {
                warn!("✖ fetch failed {}: {}", url, e);
                let report = report(url, TaskOutcome::Failed, RenderMode::Static, 0, started, Some(e));
                return (Vec::new(), report);
            }
        };

        let quotes = self.registry.extract(&html, url, &self.entity);
        if !quotes.is_empty() {
            return self.done(url, quotes, RenderMode::Static, started);
        }

        let Some(renderer) = self.renderer.as_ref() else {
            return self.done(url, quotes, RenderMode::Static, started);
        };

        let trigger = match self.fallback {
            FallbackPolicy::Disabled => false,
            FallbackPolicy::Always => true,
            FallbackPolicy::Heuristic => looks_dynamic(url, Some(&html), self.fetcher.as_ref()).await,
        };

        if !trigger {
            debug!("{} yielded nothing and does not look dynamic", url);
            return self.done(url, quotes, RenderMode::Static, started);
        }

        info!("Falling back to browser render for {}", url);
        let options = self.render_config.options(Some(&self.registry.scroll_selector(url)));

        match renderer.render(url, &options).await {
            Ok(rendered) => {
                let quotes = self.registry.extract(&rendered, url, &self.entity);
                self.done(url, quotes, RenderMode::Dynamic, started)
            }
            Err(e) => {
                warn!("✖ dynamic fallback failed {}: {}", url, e);
                let report = report(
                    url,
                    TaskOutcome::Failed,
                    RenderMode::Dynamic,
                    0,
                    started,
                    Some(e.to_string()),
                );
                (Vec::new(), report)
            }
        }
    }

    fn done(
        &self,
        url: &str,
        quotes: Vec<RawQuote>,
        mode: RenderMode,
        started: Instant,
    ) -> (Vec<RawQuote>, TaskReport) {
        let outcome = if quotes.is_empty() {
            TaskOutcome::Empty
        } else {
            TaskOutcome::Extracted
        };

        info!("✔ scraped {:3} from {} ({})", quotes.len(), url, mode);
        let report = report(url, outcome, mode, quotes.len(), started, None);
        (quotes, report)
    }
}

fn report(
    url: &str,
    outcome: TaskOutcome,
    mode: RenderMode,
    quote_count: usize,
    started: Instant,
    error: Option<String>,
) -> TaskReport {
    TaskReport {
        url: url.to_string(),
        outcome,
        mode,
        quote_count,
        elapsed_ms: started.elapsed().as_millis() as u64,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quotehound_net::{FetchError, RenderOptions};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Serves canned pages; unknown URLs fail with a 404
    #[derive(Default)]
    struct MapFetcher {
        pages: HashMap<String, String>,
        delays: HashMap<String, Duration>,
    }

    impl MapFetcher {
        fn page(mut self, url: &str, html: &str) -> Self {
            self.pages.insert(url.to_string(), html.to_string());
            self
        }

        fn slow(mut self, url: &str, delay: Duration) -> Self {
            self.delays.insert(url.to_string(), delay);
            self
        }
    }

    #[async_trait]
    impl PageFetcher for MapFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            if let Some(delay) = self.delays.get(url) {
                tokio::time::sleep(*delay).await;
            }
            self.pages.get(url).cloned().ok_or(FetchError::Status(404))
        }
    }

    /// Counts renders and returns a fixed page, or fails when `html` is None
    struct CountingRenderer {
        html: Option<String>,
        calls: AtomicUsize,
        last_selector: std::sync::Mutex<Option<String>>,
    }

    impl CountingRenderer {
        fn new(html: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                html: html.map(str::to_string),
                calls: AtomicUsize::new(0),
                last_selector: std::sync::Mutex::new(None),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PageRenderer for CountingRenderer {
        async fn render(&self, _url: &str, options: &RenderOptions) -> Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_selector.lock().unwrap() = Some(options.selector.clone());
            self.html
                .clone()
                .ok_or_else(|| FetchError::Render("chrome crashed".to_string()))
        }
    }

    const QUOTE_PAGE: &str = r#"<html><body><blockquote>"Never give up on your dreams."</blockquote></body></html>"#;
    const EMPTY_PAGE: &str = "<html><body><div>nothing to see</div></body></html>";

    fn script_heavy_page() -> String {
        let scripts = "<script></script>".repeat(15);
        format!("<html><head>{}</head><body><div id=\"app\"></div></body></html>", scripts)
    }

    fn urls(list: &[&str]) -> Vec<CandidateUrl> {
        list.iter().map(|u| CandidateUrl::from(*u)).collect()
    }

    fn orchestrator(fetcher: MapFetcher) -> Orchestrator {
        Orchestrator::new(Arc::new(fetcher), Arc::new(ExtractorRegistry::default()))
    }

    #[tokio::test]
    async fn test_task_isolation() {
        let mut fetcher = MapFetcher::default();
        let mut list = Vec::new();
        for i in 0..10 {
            let url = format!("https://site{}.example/quotes", i);
            if i % 3 != 0 || i == 0 {
                fetcher = fetcher.page(&url, QUOTE_PAGE);
            }
            list.push(url);
        }
        // site3, site6, site9 are missing and fail with 404
        let list: Vec<&str> = list.iter().map(String::as_str).collect();

        let outcome = orchestrator(fetcher)
            .scrape_all(&urls(&list), "Luffy", 4, FallbackPolicy::Disabled)
            .await;

        assert_eq!(outcome.reports.len(), 10);
        assert_eq!(outcome.failed(), 3);
        assert_eq!(outcome.succeeded(), 7);
        assert_eq!(outcome.quotes.len(), 7);
        assert!(outcome
            .reports
            .iter()
            .filter(|r| r.outcome == TaskOutcome::Failed)
            .all(|r| r.error.as_deref() == Some("HTTP status 404")));
    }

    #[tokio::test]
    async fn test_completion_order_not_dispatch_order() {
        let fetcher = MapFetcher::default()
            .page("https://slow.example/", QUOTE_PAGE)
            .page(
                "https://fast.example/",
                r#"<p>"Fast pages finish first, always."</p>"#,
            )
            .slow("https://slow.example/", Duration::from_millis(200));

        let outcome = orchestrator(fetcher)
            .scrape_all(
                &urls(&["https://slow.example/", "https://fast.example/"]),
                "Luffy",
                2,
                FallbackPolicy::Disabled,
            )
            .await;

        assert_eq!(outcome.reports[0].url, "https://fast.example/");
        assert_eq!(outcome.quotes[0].source_url, "https://fast.example/");
        assert_eq!(outcome.quotes.len(), 2);
    }

    #[tokio::test]
    async fn test_heuristic_fallback_renders_script_heavy_page() {
        let page = script_heavy_page();
        let fetcher = MapFetcher::default().page("https://spa.example/", &page);
        let renderer = CountingRenderer::new(Some(QUOTE_PAGE));

        let outcome = orchestrator(fetcher)
            .with_renderer(renderer.clone(), RenderConfig::default())
            .scrape_all(&urls(&["https://spa.example/"]), "Luffy", 2, FallbackPolicy::Heuristic)
            .await;

        assert_eq!(renderer.calls(), 1);
        assert_eq!(outcome.quotes.len(), 1);
        assert_eq!(outcome.rendered(), 1);
        assert_eq!(outcome.reports[0].outcome, TaskOutcome::Extracted);
        assert_eq!(outcome.reports[0].mode, RenderMode::Dynamic);
    }

    #[tokio::test]
    async fn test_heuristic_skips_static_looking_page() {
        let fetcher = MapFetcher::default().page("https://plain.example/", EMPTY_PAGE);
        let renderer = CountingRenderer::new(Some(QUOTE_PAGE));

        let outcome = orchestrator(fetcher)
            .with_renderer(renderer.clone(), RenderConfig::default())
            .scrape_all(&urls(&["https://plain.example/"]), "Luffy", 2, FallbackPolicy::Heuristic)
            .await;

        assert_eq!(renderer.calls(), 0);
        assert!(outcome.quotes.is_empty());
        assert_eq!(outcome.reports[0].outcome, TaskOutcome::Empty);
    }

    #[tokio::test]
    async fn test_always_and_disabled_policies() {
        let renderer = CountingRenderer::new(Some(QUOTE_PAGE));

        let fetcher = MapFetcher::default().page("https://plain.example/", EMPTY_PAGE);
        let outcome = orchestrator(fetcher)
            .with_renderer(renderer.clone(), RenderConfig::default())
            .scrape_all(&urls(&["https://plain.example/"]), "Luffy", 1, FallbackPolicy::Always)
            .await;
        assert_eq!(renderer.calls(), 1);
        assert_eq!(outcome.quotes.len(), 1);

        let fetcher = MapFetcher::default().page("https://www.ranker.com/list/x", EMPTY_PAGE);
        let outcome = orchestrator(fetcher)
            .with_renderer(renderer.clone(), RenderConfig::default())
            .scrape_all(
                &urls(&["https://www.ranker.com/list/x"]),
                "Luffy",
                1,
                FallbackPolicy::Disabled,
            )
            .await;
        assert_eq!(renderer.calls(), 1);
        assert!(outcome.quotes.is_empty());
    }

    #[tokio::test]
    async fn test_render_uses_site_selector() {
        let fetcher = MapFetcher::default().page("https://www.ranker.com/list/x", EMPTY_PAGE);
        let renderer = CountingRenderer::new(Some(EMPTY_PAGE));

        orchestrator(fetcher)
            .with_renderer(renderer.clone(), RenderConfig::default())
            .scrape_all(
                &urls(&["https://www.ranker.com/list/x"]),
                "Luffy",
                1,
                FallbackPolicy::Heuristic,
            )
            .await;

        assert_eq!(
            renderer.last_selector.lock().unwrap().as_deref(),
            Some("div.richText_container__Kvtj0, blockquote, q, p")
        );
    }

    #[tokio::test]
    async fn test_render_failure_is_isolated() {
        let fetcher = MapFetcher::default()
            .page("https://www.cbr.com/a", EMPTY_PAGE)
            .page("https://ok.example/", QUOTE_PAGE);
        let renderer = CountingRenderer::new(None);

        let outcome = orchestrator(fetcher)
            .with_renderer(renderer.clone(), RenderConfig::default())
            .scrape_all(
                &urls(&["https://www.cbr.com/a", "https://ok.example/"]),
                "Luffy",
                2,
                FallbackPolicy::Heuristic,
            )
            .await;

        assert_eq!(renderer.calls(), 1);
        assert_eq!(outcome.quotes.len(), 1);
        assert_eq!(outcome.failed(), 1);
        let failed = outcome
            .reports
            .iter()
            .find(|r| r.outcome == TaskOutcome::Failed)
            .unwrap();
        assert_eq!(failed.url, "https://www.cbr.com/a");
        assert_eq!(failed.mode, RenderMode::Dynamic);
    }

    #[tokio::test]
    async fn test_no_renderer_means_no_fallback() {
        let page = script_heavy_page();
        let fetcher = MapFetcher::default().page("https://spa.example/", &page);

        let outcome = orchestrator(fetcher)
            .scrape_all(&urls(&["https://spa.example/"]), "Luffy", 1, FallbackPolicy::Always)
            .await;

        assert_eq!(outcome.reports[0].outcome, TaskOutcome::Empty);
        assert_eq!(outcome.rendered(), 0);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let outcome = orchestrator(MapFetcher::default())
            .scrape_all(&[], "Luffy", 8, FallbackPolicy::Heuristic)
            .await;
        assert!(outcome.quotes.is_empty());
        assert!(outcome.reports.is_empty());
    }

    #[test]
    fn test_fallback_policy_parsing() {
        assert_eq!(FallbackPolicy::from(true), FallbackPolicy::Heuristic);
        assert_eq!(FallbackPolicy::from(false), FallbackPolicy::Disabled);
        assert_eq!("ALWAYS".parse::<FallbackPolicy>(), Ok(FallbackPolicy::Always));
        assert_eq!("auto".parse::<FallbackPolicy>(), Ok(FallbackPolicy::Heuristic));
        assert!("sometimes".parse::<FallbackPolicy>().is_err());
    }
}

//! Headless browser renderer
//!
//! Renders a page in headless Chrome, scrolling the last element matching a
//! watched selector into view until the match count stops growing. The
//! [`BrowserGate`] bounds concurrent browser launches; a permit is released
//! as soon as the browser is up, so launched sessions run side by side.

use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info};

use crate::FetchError;

/// Selector watched when the caller supplies none
pub const DEFAULT_SCROLL_SELECTOR: &str = "blockquote, q, p";

/// Extra time allowed on top of the render deadline for browser launch and teardown
const LAUNCH_GRACE: Duration = Duration::from_secs(20);

/// Chrome flags that strip everything the text extractor does not need
const CHROME_ARGS: &[&str] = &[
    "--disable-gpu",
    "--disable-dev-shm-usage",
    "--disable-extensions",
    "--disable-notifications",
    "--blink-settings=imagesEnabled=false",
];

/// Dynamic fetch configuration
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Consecutive unchanged polls before the page counts as stable
    pub max_idle_rounds: u32,
    /// Delay between scroll and re-count, in milliseconds
    pub poll_interval_ms: u64,
    /// Overall deadline for the scroll loop, in seconds
    pub deadline_secs: u64,
    /// Concurrent browser instances allowed
    pub browser_slots: usize,
    /// Browser window size
    pub window_size: (u32, u32),
    /// Explicit Chrome binary; auto-detected when unset
    pub chrome_path: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_idle_rounds: 3,
            poll_interval_ms: 1000,
            deadline_secs: 15,
            browser_slots: 1,
            window_size: (1600, 900),
            chrome_path: None,
        }
    }
}

impl RenderConfig {
    /// Per-call options watching `selector`, or the default selector set
    pub fn options(&self, selector: Option<&str>) -> RenderOptions {
        RenderOptions {
            selector: selector.unwrap_or(DEFAULT_SCROLL_SELECTOR).to_string(),
            max_idle_rounds: self.max_idle_rounds.max(1),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            deadline: Duration::from_secs(self.deadline_secs),
        }
    }
}

/// Parameters of one render
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub selector: String,
    pub max_idle_rounds: u32,
    pub poll_interval: Duration,
    pub deadline: Duration,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderConfig::default().options(None)
    }
}

/// Counting permit limiting concurrent browser launches.
///
/// Cloning shares the same pool of permits.
#[derive(Debug, Clone)]
pub struct BrowserGate {
    permits: Arc<Semaphore>,
    slots: usize,
}

impl BrowserGate {
    pub fn new(slots: usize) -> Self {
        let slots = slots.max(1);
        Self {
            permits: Arc::new(Semaphore::new(slots)),
            slots,
        }
    }

    /// One browser at a time
    pub fn single() -> Self {
        Self::new(1)
    }

    /// Wait for a free slot
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, FetchError> {
        self.permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| FetchError::Render("browser gate closed".to_string()))
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn slots(&self) -> usize {
        self.slots
    }
}

impl Default for BrowserGate {
    fn default() -> Self {
        Self::single()
    }
}

/// Capability to render a page with script execution
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Render `url` and return the final DOM serialized as HTML
    async fn render(&self, url: &str, options: &RenderOptions) -> Result<String, FetchError>;
}

/// headless_chrome-backed renderer
#[derive(Debug, Clone)]
pub struct ChromeRenderer {
    gate: BrowserGate,
    config: RenderConfig,
}

impl ChromeRenderer {
    pub fn new(config: RenderConfig, gate: BrowserGate) -> Self {
        Self { gate, config }
    }

    /// Renderer with its own gate sized from `config.browser_slots`
    pub fn from_config(config: RenderConfig) -> Self {
        let gate = BrowserGate::new(config.browser_slots);
        Self::new(config, gate)
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn gate(&self) -> &BrowserGate {
        &self.gate
    }
}

#[async_trait]
impl PageRenderer for ChromeRenderer {
    async fn render(&self, url: &str, options: &RenderOptions) -> Result<String, FetchError> {
        info!("Rendering {} (watching `{}`)", url, options.selector);

        let url = url.to_string();
        let options = options.clone();
        let config = self.config.clone();
        let budget = options.deadline + LAUNCH_GRACE;

        gated_session(
            &self.gate,
            budget,
            move || launch_browser(&config),
            move |browser| render_session(&browser, &url, &options),
        )
        .await
    }
}

/// Run `launch` on the blocking pool while holding a gate permit, release
/// the permit, then run `session` on the launched browser.
///
/// Waiting for the gate counts against `budget`.
async fn gated_session<B, T, L, S>(
    gate: &BrowserGate,
    budget: Duration,
    launch: L,
    session: S,
) -> Result<T, FetchError>
where
    B: Send + 'static,
    T: Send + 'static,
    L: FnOnce() -> Result<B, FetchError> + Send + 'static,
    S: FnOnce(B) -> Result<T, FetchError> + Send + 'static,
{
    let work = async {
        let permit = gate.acquire().await?;
        tokio::task::spawn_blocking(move || {
            let launched = launch();
            drop(permit);
            session(launched?)
        })
        .await
        .map_err(render_error)?
    };

    match tokio::time::timeout(budget, work).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout(budget)),
    }
}

fn launch_browser(config: &RenderConfig) -> Result<Browser, FetchError> {
    let args: Vec<&OsStr> = CHROME_ARGS.iter().map(OsStr::new).collect();

    Browser::new(LaunchOptions {
        headless: true,
        sandbox: false,
        window_size: Some(config.window_size),
        path: config.chrome_path.clone(),
        args,
        ..Default::default()
    })
    .map_err(|e| FetchError::Render(format!("browser launch failed: {}", e)))
}

fn render_error(err: impl std::fmt::Display) -> FetchError {
    FetchError::Render(err.to_string())
}

fn render_session(browser: &Browser, url: &str, options: &RenderOptions) -> Result<String, FetchError> {
    let tab = browser.new_tab().map_err(render_error)?;

    let started = Instant::now();
    tab.navigate_to(url).map_err(render_error)?;
    tab.wait_until_navigated().map_err(render_error)?;

    let matches = settle(&*tab, options, started)?;
    debug!("Rendered {} with {} matches in {:?}", url, matches, started.elapsed());

    tab.get_content().map_err(render_error)
}

/// Page driven by the scroll loop
trait ScrollTarget {
    /// Scroll the last match into view (or the window when nothing matches)
    fn scroll(&self, selector: &str) -> Result<u64, FetchError>;

    /// Current number of matches
    fn count(&self, selector: &str) -> Result<u64, FetchError>;
}

impl ScrollTarget for Tab {
    fn scroll(&self, selector: &str) -> Result<u64, FetchError> {
        evaluate_count(self, &scroll_script(selector))
    }

    fn count(&self, selector: &str) -> Result<u64, FetchError> {
        evaluate_count(self, &count_script(selector))
    }
}

/// Scroll and re-count until the match count holds for `max_idle_rounds`
/// polls or `deadline` has passed since `started`. Returns the last count.
fn settle<P: ScrollTarget + ?Sized>(
    page: &P,
    options: &RenderOptions,
    started: Instant,
) -> Result<u64, FetchError> {
    let mut last_count = 0u64;
    let mut idle_rounds = 0u32;

    loop {
        page.scroll(&options.selector)?;
        std::thread::sleep(options.poll_interval);

        let count = page.count(&options.selector)?;
        idle_rounds = next_idle_rounds(idle_rounds, last_count, count);
        last_count = count;

        if idle_rounds >= options.max_idle_rounds || started.elapsed() >= options.deadline {
            return Ok(last_count);
        }
    }
}

fn evaluate_count(tab: &Tab, script: &str) -> Result<u64, FetchError> {
    let result = tab.evaluate(script, false).map_err(render_error)?;
    Ok(result.value.and_then(|v| v.as_u64()).unwrap_or(0))
}

/// Idle counter after one poll: grows while the count is unchanged
fn next_idle_rounds(idle_rounds: u32, last_count: u64, count: u64) -> u32 {
    if count == last_count {
        idle_rounds + 1
    } else {
        0
    }
}

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// Scroll the last match into view, or the window when nothing matches
fn scroll_script(selector: &str) -> String {
    format!(
        r#"(() => {{
    const els = document.querySelectorAll({sel});
    if (els.length) {{
        els[els.length - 1].scrollIntoView({{block: 'end'}});
    }} else {{
        window.scrollBy(0, 1000);
    }}
    return els.length;
}})()"#,
        sel = js_string(selector)
    )
}

fn count_script(selector: &str) -> String {
    format!("document.querySelectorAll({}).length", js_string(selector))
}

/// Launch and immediately close a browser, reporting whether Chrome is usable
pub async fn check_browser(config: &RenderConfig) -> Result<(), FetchError> {
    let config = config.clone();
    tokio::task::spawn_blocking(move || launch_browser(&config).map(drop))
        .await
        .map_err(render_error)?
}

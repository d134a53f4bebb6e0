//! quotehound CLI
//!
//! Harvest quotes attributed to a person or character from the open web.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::{filter::LevelFilter, EnvFilter, FmtSubscriber};

use quotehound_core::{slugify, write_records, CandidateUrl, RecordFormat};
use quotehound_extract::ExtractorRegistry;
use quotehound_net::{check_browser, ChromeRenderer, HttpFetcher};
use quotehound_runtime::{FallbackPolicy, HarvestReport, Orchestrator, Pipeline, Settings};

#[derive(Parser)]
#[command(name = "quotehound")]
#[command(author, version, about = "quotehound: parallel quote harvesting from the open web", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (0-3)
    #[arg(short, long, default_value = "1", global = true)]
    verbose: u8,

    /// Settings file (default: ./quotehound.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover, scrape, dedupe and save quotes for an entity
    Harvest {
        /// Person or character name
        entity: String,

        /// Maximum candidate URLs
        #[arg(short = 'n', long)]
        max_urls: Option<usize>,

        /// Concurrent scrape workers
        #[arg(short, long)]
        workers: Option<usize>,

        /// Dynamic fallback policy: disabled, heuristic, always
        #[arg(long)]
        dynamic: Option<FallbackPolicy>,

        /// Extra query terms after the entity (e.g. the franchise)
        #[arg(long)]
        context: Option<String>,

        /// Run the moderation safety pass
        #[arg(long)]
        moderate: bool,

        /// Output format: csv or jsonl
        #[arg(short, long)]
        format: Option<RecordFormat>,

        /// Output file (default: quotes_<entity>_<timestamp>.<ext>)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// SerpAPI key (or set SERPAPI_KEY env var)
        #[arg(long, env = "SERPAPI_KEY", hide_env_values = true)]
        serpapi_key: Option<String>,

        /// OpenAI API key for moderation (or set OPENAI_API_KEY env var)
        #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
        openai_key: Option<String>,
    },

    /// Print the filtered candidate URLs for an entity
    Discover {
        /// Person or character name
        entity: String,

        /// Maximum candidate URLs
        #[arg(short = 'n', long)]
        max_urls: Option<usize>,

        /// Extra query terms after the entity
        #[arg(long)]
        context: Option<String>,

        /// SerpAPI key (or set SERPAPI_KEY env var)
        #[arg(long, env = "SERPAPI_KEY", hide_env_values = true)]
        serpapi_key: Option<String>,
    },

    /// Scrape a single URL and print the raw quotes
    Extract {
        /// Page to scrape
        url: String,

        /// Entity name used by the generic extractor
        #[arg(short, long, default_value = "")]
        entity: String,

        /// Dynamic fallback policy: disabled, heuristic, always
        #[arg(long)]
        dynamic: Option<FallbackPolicy>,
    },

    /// Report configured credentials and whether Chrome can be launched
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(LevelFilter::from_level(log_level).into()));

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let settings = Settings::discover(cli.config.as_deref()).context("loading settings")?;

    match cli.command {
        Commands::Harvest {
            entity,
            max_urls,
            workers,
            dynamic,
            context,
            moderate,
            format,
            output,
            serpapi_key,
            openai_key,
        } => {
            let args = HarvestArgs {
                max_urls,
                workers,
                dynamic,
                context,
                moderate,
                format,
                output,
                serpapi_key,
                openai_key,
            };
            run_harvest(&settings, &entity, args).await?;
        }
        Commands::Discover {
            entity,
            max_urls,
            context,
            serpapi_key,
        } => {
            run_discover(&settings, &entity, max_urls, context, serpapi_key).await?;
        }
        Commands::Extract { url, entity, dynamic } => {
            run_extract(&settings, &url, &entity, dynamic).await?;
        }
        Commands::Check => {
            check_status(&settings).await;
        }
    }

    Ok(())
}

struct HarvestArgs {
    max_urls: Option<usize>,
    workers: Option<usize>,
    dynamic: Option<FallbackPolicy>,
    context: Option<String>,
    moderate: bool,
    format: Option<RecordFormat>,
    output: Option<PathBuf>,
    serpapi_key: Option<String>,
    openai_key: Option<String>,
}

async fn run_harvest(settings: &Settings, entity: &str, args: HarvestArgs) -> Result<()> {
    println!("🔎 quotehound - parallel quote harvesting\n");

    let mut config = settings.pipeline_config();
    if let Some(n) = args.max_urls {
        config.max_urls = n;
    }
    if let Some(w) = args.workers {
        config.concurrency = w.max(1);
    }
    if let Some(policy) = args.dynamic {
        config.fallback = policy;
    }
    if args.context.is_some() {
        config.context = args.context;
    }

    let mut search = settings.search_config();
    if args.serpapi_key.is_some() {
        search.api_key = args.serpapi_key;
    }

    let mut moderation = settings.moderation_config();
    if args.openai_key.is_some() {
        moderation.api_key = args.openai_key;
    }
    let moderate = args.moderate || settings.moderation_enabled();

    let format = args.format.unwrap_or_else(|| settings.record_format());

    println!("🎯 Entity: {}", entity);
    println!(
        "⚙️  URLs: {} | Workers: {} | Dynamic: {} | Safety pass: {}",
        config.max_urls,
        config.concurrency,
        config.fallback,
        if moderate { "on" } else { "off" }
    );
    if let Some(ctx) = &config.context {
        println!("🧭 Context: {}", ctx);
    }
    println!();

    let pipeline = Pipeline::from_configs(
        search,
        &settings.fetch_config(),
        settings.render_config(),
        moderate.then_some(&moderation),
        config,
    )?;

    let report = pipeline.run(entity).await?;

    if report.is_empty() {
        println!("⚠️  No quotes found for {:?}", entity);
        print_metrics(&report);
        return Ok(());
    }

    let output_path = args
        .output
        .unwrap_or_else(|| default_output_path(&report.entity, format));
    write_output(&report, format, &output_path)?;

    println!("✅ Harvest complete!");
    println!("📄 {} quotes saved to: {}", report.quotes.len(), output_path.display());
    print_metrics(&report);

    println!("\n{}", "=".repeat(60));
    for quote in report.quotes.iter().take(10) {
        println!("• {}", quote.text);
    }
    if report.quotes.len() > 10 {
        println!("...\n[{} more in the output file]", report.quotes.len() - 10);
    }

    Ok(())
}

async fn run_discover(
    settings: &Settings,
    entity: &str,
    max_urls: Option<usize>,
    context: Option<String>,
    serpapi_key: Option<String>,
) -> Result<()> {
    let mut config = settings.pipeline_config();
    if let Some(n) = max_urls {
        config.max_urls = n;
    }
    if context.is_some() {
        config.context = context;
    }
    config.fallback = FallbackPolicy::Disabled;

    let mut search = settings.search_config();
    if serpapi_key.is_some() {
        search.api_key = serpapi_key;
    }

    let pipeline = Pipeline::from_configs(
        search,
        &settings.fetch_config(),
        settings.render_config(),
        None,
        config,
    )?;

    let urls = pipeline.discover(entity).await?;
    for url in &urls {
        println!("{}", url);
    }
    eprintln!("\n{} candidate URLs", urls.len());

    Ok(())
}

async fn run_extract(
    settings: &Settings,
    url: &str,
    entity: &str,
    dynamic: Option<FallbackPolicy>,
) -> Result<()> {
    let fallback = dynamic.unwrap_or(settings.pipeline_config().fallback);
    let fetcher = HttpFetcher::new(&settings.fetch_config())?;

    let mut orchestrator = Orchestrator::new(
        Arc::new(fetcher),
        Arc::new(ExtractorRegistry::with_builtin_sites()),
    );
    if fallback != FallbackPolicy::Disabled {
        let render = settings.render_config();
        orchestrator =
            orchestrator.with_renderer(Arc::new(ChromeRenderer::from_config(render.clone())), render);
    }

    let outcome = orchestrator
        .scrape_all(&[CandidateUrl::from(url)], entity, 1, fallback)
        .await;

    for quote in &outcome.quotes {
        println!("{}", quote.text);
    }

    if let Some(report) = outcome.reports.first() {
        eprintln!(
            "\n{} quotes | outcome: {:?} | mode: {} | {} ms",
            report.quote_count, report.outcome, report.mode, report.elapsed_ms
        );
        if let Some(err) = &report.error {
            eprintln!("❌ {}", err);
        }
    }

    Ok(())
}

async fn check_status(settings: &Settings) {
    println!("🔌 Checking configuration...\n");

    let search = settings.search_config();
    let moderation = settings.moderation_config();

    report_key("SERPAPI_KEY", search.api_key.as_deref(), "discovery will fail");
    report_key("OPENAI_API_KEY", moderation.api_key.as_deref(), "--moderate unavailable");
    println!("   Search endpoint: {}", search.endpoint);

    println!("\n🌐 Launching headless Chrome...");
    match check_browser(&settings.render_config()).await {
        Ok(()) => println!("✅ Chrome is available for dynamic fallback"),
        Err(e) => {
            println!("❌ Chrome could not be launched: {}", e);
            println!("   Dynamic fallback will mark rendered pages as failed.");
            println!("   Install Chrome/Chromium or set [render] chrome_path.");
        }
    }
}

fn report_key(name: &str, value: Option<&str>, missing_hint: &str) {
    match value.filter(|v| !v.trim().is_empty()) {
        Some(_) => println!("✅ {} configured", name),
        None => println!("❌ {} not set ({})", name, missing_hint),
    }
}

fn print_metrics(report: &HarvestReport) {
    let m = &report.metrics;
    println!("\n📊 Run {}", m.run_id);
    println!("   Discovered URLs: {}", m.discovered);
    println!("   Raw quotes:      {}", m.raw_extracted);
    println!("   Unique quotes:   {}", m.unique);
    println!("   Failed tasks:    {}", m.failed);
    println!("   Rendered pages:  {}", m.rendered);
    if !report.rejected.is_empty() || m.removed > 0 {
        println!("   Safety pass:     kept {} | removed {}", m.kept, m.removed);
    }
    println!("   Elapsed:         {:.1}s", m.elapsed.as_secs_f64());
}

fn default_output_path(entity: &str, format: RecordFormat) -> PathBuf {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    PathBuf::from(format!(
        "quotes_{}_{}.{}",
        slugify(entity),
        timestamp,
        format.extension()
    ))
}

fn write_output(report: &HarvestReport, format: RecordFormat, path: &Path) -> Result<()> {
    let file = fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(file);
    write_records(&report.quotes, format, &mut out)?;
    out.flush()?;
    Ok(())
}

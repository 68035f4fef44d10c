//! SEOLens CLI
//!
//! Domain-wide SEO keyword analysis from the command line. Results are
//! printed as JSON (or written to `--output`).

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use seolens_core::WeightsUpdate;
use seolens_crawl::{HttpFetcher, SharedFetcher, SitemapResolver, UrlSelector};
use seolens_nlp::EmbedderKind;
use seolens_runtime::{normalize_origin, Analyzer, AnalyzerConfig, WeightStore};

#[derive(Parser)]
#[command(name = "seolens")]
#[command(author, version, about = "SEOLens: domain-wide SEO keyword analysis", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file
    #[arg(short, long, global = true, env = "SEOLENS_CONFIG")]
    config: Option<PathBuf>,

    /// Write JSON output to a file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Verbosity level (0-3)
    #[arg(short, long, global = true, default_value = "1")]
    verbose: u8,

    /// Maximum concurrent requests
    #[arg(long, global = true)]
    max_concurrent: Option<usize>,

    /// Proxy URL for all requests (http, https or socks5)
    #[arg(long, global = true)]
    proxy: Option<String>,

    /// Use OpenAI-compatible embeddings instead of the local hashing embedder
    #[arg(long, global = true)]
    openai_embeddings: bool,

    /// OpenAI API key (or set OPENAI_API_KEY env var)
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a single page
    Page {
        /// Page URL
        url: String,
    },

    /// Analyze a whole domain via its sitemap
    Domain {
        /// Domain or URL (e.g. example.com)
        domain: String,

        /// Maximum pages to analyze
        #[arg(short, long)]
        max_urls: Option<usize>,

        /// Per-page deadline in seconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Print only the domain summary
        #[arg(long)]
        summary_only: bool,
    },

    /// Discover and select URLs without analyzing them
    Sitemap {
        /// Domain or URL (e.g. example.com)
        domain: String,

        /// Maximum URLs to select
        #[arg(short, long)]
        max_urls: Option<usize>,
    },

    /// Show the effective scoring weights, optionally with an update applied
    Weights {
        #[arg(long)]
        frequency: Option<f64>,
        #[arg(long)]
        tfidf: Option<f64>,
        #[arg(long)]
        cooccurrence: Option<f64>,
        #[arg(long)]
        title_position: Option<f64>,
        #[arg(long)]
        brand_similarity: Option<f64>,
    },
}

fn init_logging(verbose: u8) {
    let log_level = match verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let builder = FmtSubscriber::builder()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .compact();

    if std::env::var_os("RUST_LOG").is_some() {
        builder.with_env_filter(EnvFilter::from_default_env()).init();
    } else {
        builder.with_max_level(log_level).init();
    }
}

fn load_config(cli: &Cli) -> Result<AnalyzerConfig> {
    let mut config = match &cli.config {
        Some(path) => AnalyzerConfig::from_toml_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => AnalyzerConfig::default(),
    };

    if let Some(max_concurrent) = cli.max_concurrent {
        config.fetch.max_concurrent_requests = max_concurrent.max(1);
    }
    if let Some(proxy) = &cli.proxy {
        config.fetch.proxy = Some(proxy.clone());
    }
    if cli.openai_embeddings {
        config.embedder.kind = EmbedderKind::OpenAi;
    }
    if config.embedder.kind == EmbedderKind::OpenAi {
        config.embedder.api_key = cli.api_key.clone();
    }

    Ok(config)
}

fn emit<T: Serialize>(value: &T, output: Option<&PathBuf>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            fs::write(path, &json).with_context(|| format!("writing {}", path.display()))?;
            info!("Results saved to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli)?;
    let output = cli.output.as_ref();

    match cli.command {
        Commands::Page { url } => {
            let analyzer = Analyzer::from_config(config)?;
            let analysis = analyzer
                .analyze_page(&url)
                .await
                .with_context(|| format!("analyzing {}", url))?;
            emit(&analysis, output)?;
        }
        Commands::Domain {
            domain,
            max_urls,
            timeout,
            summary_only,
        } => {
            let max_urls = max_urls.unwrap_or(config.analysis.max_urls);
            let timeout = Duration::from_secs(timeout.unwrap_or(config.analysis.page_timeout_secs));

            let analyzer = Analyzer::from_config(config)?;
            let report = analyzer
                .analyze_domain(&domain, max_urls, timeout)
                .await
                .with_context(|| format!("analyzing domain {}", domain))?;

            if summary_only {
                emit(&report.summary, output)?;
            } else {
                emit(&report, output)?;
            }
        }
        Commands::Sitemap { domain, max_urls } => {
            let max_urls = max_urls.unwrap_or(config.analysis.max_urls);
            let (origin, _) = normalize_origin(&domain)?;

            let fetcher: SharedFetcher = Arc::new(HttpFetcher::new(config.fetch.clone())?);
            let discovery = SitemapResolver::new(fetcher, config.sitemap)
                .discover(&origin)
                .await;
            info!(
                "Discovered {} URLs from {}",
                discovery.records.len(),
                discovery.sitemap_url.as_deref().unwrap_or("no sitemap")
            );

            let selected = UrlSelector::new(config.selection).select(
                discovery.records,
                max_urls,
                chrono::Utc::now(),
            );
            emit(&selected, output)?;
        }
        Commands::Weights {
            frequency,
            tfidf,
            cooccurrence,
            title_position,
            brand_similarity,
        } => {
            let store = WeightStore::new(config.weights)?;
            let update = WeightsUpdate {
                frequency,
                tfidf,
                cooccurrence,
                title_position,
                brand_similarity,
            };
            let weights = store.update(&update)?;
            emit(&weights, output)?;
        }
    }

    Ok(())
}

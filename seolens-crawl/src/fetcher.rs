//! HTTP fetch orchestration
//!
//! Polite page acquisition:
//! - Global concurrency cap (one semaphore permit per request attempt)
//! - Per-host minimum interval between requests
//! - Exponential backoff retries; 401/403/404 are terminal
//! - A user agent picked per request; HTML transcoded to UTF-8 from its declared charset

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Proxy};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use url::Url;

use crate::throttle::HostThrottle;

/// Statuses that abort retries immediately
pub const TERMINAL_STATUSES: [u16; 3] = [401, 403, 404];

/// Fetch orchestrator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Backoff base; attempt `n` waits `base * 2^n` seconds
    pub backoff_base_secs: f64,
    /// Minimum gap between requests to one host
    pub min_host_interval_ms: u64,
    /// In-flight request cap across all hosts
    pub max_concurrent_requests: usize,
    /// Fixed user agent (rotates through desktop agents when unset)
    pub user_agent: Option<String>,
    /// Optional HTTP or SOCKS proxy
    pub proxy: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            max_retries: 3,
            backoff_base_secs: 1.0,
            min_host_interval_ms: 1000,
            max_concurrent_requests: 10,
            user_agent: None,
            proxy: None,
        }
    }
}

impl FetchConfig {
    /// Delay before retry number `attempt + 1`
    pub fn backoff(&self, attempt: u32) -> Duration {
        let secs = self.backoff_base_secs.max(0.0) * 2f64.powi(attempt.min(16) as i32);
        Duration::from_secs_f64(secs)
    }
}

/// Errors from fetching a URL
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP {status} for {url}")]
    Permanent { url: String, status: u16 },

    #[error("Fetching {url} failed after {attempts} attempts: {reason}")]
    Transient {
        url: String,
        attempts: u32,
        reason: String,
    },
}

impl FetchError {
    /// Whether retrying later could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Permanent { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A successfully fetched response body
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub final_url: String,
    pub status: u16,
    /// MIME type without parameters, lowercased
    pub content_type: Option<String>,
    /// Charset of `body`; HTML is transcoded to `utf-8` on receipt
    pub encoding: String,
    pub body: Vec<u8>,
}

impl FetchedPage {
    /// Build a page from a content-type header value
    pub fn new(url: &str, status: u16, content_type: Option<&str>, body: Vec<u8>) -> Self {
        let (mime, encoding) = split_content_type(content_type);
        Self {
            url: url.to_string(),
            final_url: url.to_string(),
            status,
            content_type: mime,
            encoding,
            body,
        }
    }

    pub fn is_html(&self) -> bool {
        self.content_type.as_deref().is_some_and(is_html_mime)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

fn is_html_mime(mime: &str) -> bool {
    mime.contains("text/html") || mime.contains("application/xhtml")
}

/// Split `text/html; charset=UTF-8` into mime type and charset
pub fn split_content_type(header: Option<&str>) -> (Option<String>, String) {
    let Some(header) = header else {
        return (None, "utf-8".to_string());
    };
    let mut parts = header.split(';');
    let mime = parts
        .next()
        .map(|m| m.trim().to_ascii_lowercase())
        .filter(|m| !m.is_empty());
    let encoding = parts
        .filter_map(|p| p.trim().split_once('='))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("charset"))
        .map(|(_, v)| v.trim().trim_matches('"').to_ascii_lowercase())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "utf-8".to_string());
    (mime, encoding)
}

/// Anything that can fetch a URL
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

pub type SharedFetcher = Arc<dyn PageFetcher>;

/// User agents for rotation
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:137.0) Gecko/20100101 Firefox/137.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14.7; rv:137.0) Gecko/20100101 Firefox/137.0",
];

/// Get a random user agent
pub fn random_user_agent() -> &'static str {
    use rand::Rng;
    let idx = rand::thread_rng().gen_range(0..USER_AGENTS.len());
    USER_AGENTS[idx]
}

/// User agent for one request: the configured override, else a random desktop agent
pub fn request_user_agent(config: &FetchConfig) -> &str {
    config.user_agent.as_deref().unwrap_or_else(|| random_user_agent())
}

/// Create the shared HTTP client
pub fn create_client(config: &FetchConfig) -> Result<Client, FetchError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        ),
    );
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("es-ES,es;q=0.9,en;q=0.8"),
    );

    let mut builder = Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(10))
        .gzip(true);

    if let Some(proxy) = &config.proxy {
        let proxy = Proxy::all(proxy).map_err(|e| FetchError::ClientBuild(e.to_string()))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| FetchError::ClientBuild(e.to_string()))
}

/// Outcome of a single attempt
enum Attempt {
    Done(FetchedPage),
    Terminal(u16),
    Retry(String),
}

/// Throttled, retrying HTTP fetcher
pub struct HttpFetcher {
    client: Client,
    config: FetchConfig,
    permits: Arc<Semaphore>,
    throttle: HostThrottle,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let client = create_client(&config)?;
        Ok(Self {
            client,
            permits: Arc::new(Semaphore::new(config.max_concurrent_requests.max(1))),
            throttle: HostThrottle::new(Duration::from_millis(config.min_host_interval_ms)),
            config,
        })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    async fn attempt(&self, url: &str, host: &str) -> Attempt {
        let Ok(_permit) = self.permits.acquire().await else {
            return Attempt::Retry("fetcher is shutting down".to_string());
        };
        self.throttle.wait(host).await;

        let request = self
            .client
            .get(url)
            .header(USER_AGENT, request_user_agent(&self.config));
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return Attempt::Retry(e.to_string()),
        };

        let status = response.status().as_u16();
        if TERMINAL_STATUSES.contains(&status) {
            return Attempt::Terminal(status);
        }
        if !response.status().is_success() {
            return Attempt::Retry(format!("HTTP {}", status));
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let html = split_content_type(content_type.as_deref())
            .0
            .is_some_and(|mime| is_html_mime(&mime));
        let body = if html {
            response
                .text_with_charset("utf-8")
                .await
                .map(String::into_bytes)
        } else {
            response.bytes().await.map(|bytes| bytes.to_vec())
        };

        match body {
            Ok(body) => {
                let mut page = FetchedPage::new(url, status, content_type.as_deref(), body);
                page.final_url = final_url;
                if html {
                    page.encoding = "utf-8".to_string();
                }
                Attempt::Done(page)
            }
            Err(e) => Attempt::Retry(e.to_string()),
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(url.to_string()));
        }
        let host = parsed
            .host_str()
            .ok_or_else(|| FetchError::InvalidUrl(url.to_string()))?
            .to_string();

        let attempts = self.config.max_retries + 1;
        let mut reason = String::new();

        for attempt in 0..attempts {
            debug!("Fetching {} (attempt {})", url, attempt + 1);
            match self.attempt(url, &host).await {
                Attempt::Done(page) => {
                    info!("Fetched {} ({} bytes)", url, page.body.len());
                    return Ok(page);
                }
                Attempt::Terminal(status) => {
                    warn!("HTTP {} for {}, not retrying", status, url);
                    return Err(FetchError::Permanent {
                        url: url.to_string(),
                        status,
                    });
                }
                Attempt::Retry(why) => {
                    warn!("Fetch of {} failed: {}", url, why);
                    reason = why;
                }
            }

            if attempt + 1 < attempts {
                let wait = self.config.backoff(attempt);
                debug!("Waiting {:?} before retrying {}", wait, url);
                tokio::time::sleep(wait).await;
            }
        }

        Err(FetchError::Transient {
            url: url.to_string(),
            attempts,
            reason,
        })
    }
}

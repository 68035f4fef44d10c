//! Candidate URL filtering
//!
//! Drops sitemap entries that are not worth analyzing: invalid or off-site
//! URLs, static assets, and utility paths (admin, search, cart, ...).

use std::sync::LazyLock;

use regex::Regex;
use tracing::info;
use url::Url;

use seolens_core::UrlRecord;

use crate::robots::RobotsTxt;

static IRRELEVANT: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\.(pdf|doc|docx|xls|xlsx|ppt|pptx|zip|rar|jpg|jpeg|png|gif|svg|webp|css|js|xml|gz)$",
        r"/(admin|login|logout|register|signup|signin|wp-admin|wp-login)(/|$)",
        r"/(api|ajax|json|rss|feed)(/|$)",
        r"/(search|filter|sort)(/|$)",
        r"/(print|download)(/|$)",
        r"/(cart|checkout|payment|billing)(/|$)",
        r"/(user|profile|account|dashboard)(/|$)",
        r"/(404|error|not-found)(/|$)",
        r"/(test|debug|dev|staging)(/|$)",
    ]
    .iter()
    .map(|p| Regex::new(&format!("(?i){}", p)).unwrap())
    .collect()
});

/// Host with any `www.` prefix removed, lowercased
pub fn site_host(host: &str) -> String {
    let host = host.to_ascii_lowercase();
    host.strip_prefix("www.").unwrap_or(&host).to_string()
}

/// Whether the URL path points at an asset or utility page
pub fn is_irrelevant(url: &Url) -> bool {
    let path = url.path();
    IRRELEVANT.iter().any(|p| p.is_match(path))
}

/// Whether `url` belongs to the same site as `host` (ignoring `www.`)
pub fn is_same_site(url: &Url, host: &str) -> bool {
    url.host_str()
        .is_some_and(|h| site_host(h) == site_host(host))
}

/// Filters discovered URLs down to analyzable pages of one site
#[derive(Debug, Clone)]
pub struct UrlFilter {
    host: String,
    robots: RobotsTxt,
}

impl UrlFilter {
    pub fn new(host: &str, robots: RobotsTxt) -> Self {
        Self {
            host: site_host(host),
            robots,
        }
    }

    /// Check a single URL
    pub fn accepts(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        if !matches!(parsed.scheme(), "http" | "https") {
            return false;
        }
        if !is_same_site(&parsed, &self.host) || is_irrelevant(&parsed) {
            return false;
        }
        let path = match parsed.query() {
            Some(query) => format!("{}?{}", parsed.path(), query),
            None => parsed.path().to_string(),
        };
        self.robots.is_allowed(&path)
    }

    pub fn filter(&self, records: Vec<UrlRecord>) -> Vec<UrlRecord> {
        let before = records.len();
        let kept: Vec<UrlRecord> = records.into_iter().filter(|r| self.accepts(&r.url)).collect();
        info!("Filtered URLs for {}: {} -> {}", self.host, before, kept.len());
        kept
    }
}

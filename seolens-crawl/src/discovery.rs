//! Sitemap discovery
//!
//! Finds a site's sitemap and expands it into filtered URL records:
//! 1. Probe well-known sitemap paths in order
//! 2. Fall back to `Sitemap:` directives in robots.txt
//! 3. Expand indexes recursively and drop irrelevant or disallowed URLs

use tracing::{debug, info, warn};
use url::Url;

use seolens_core::UrlRecord;

use crate::fetcher::SharedFetcher;
use crate::filter::UrlFilter;
use crate::robots::RobotsTxt;
use crate::sitemap::{expand_sitemaps, SitemapConfig};

/// Well-known sitemap locations, probed in order
pub const SITEMAP_CANDIDATES: [&str; 5] = [
    "/sitemap.xml",
    "/sitemap_index.xml",
    "/wp-sitemap.xml",
    "/sitemap.xml.gz",
    "/sitemap_index.xml.gz",
];

/// Resolver progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverState {
    Unresolved,
    TryingCandidatePaths,
    TryingRobotsDirective,
    Resolved,
    NotFound,
}

/// Outcome of sitemap resolution
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Sitemap location, with its body when it was already downloaded
    Found { url: String, body: Option<Vec<u8>> },
    NotFound,
}

/// Result of sitemap discovery for one site
#[derive(Debug, Clone)]
pub struct Discovery {
    pub sitemap_url: Option<String>,
    pub records: Vec<UrlRecord>,
    pub robots: RobotsTxt,
}

/// Origin (`scheme://host[:port]`) of a URL, without trailing slash
pub fn origin_of(url: &Url) -> String {
    url.origin().ascii_serialization()
}

/// Locates and expands sitemaps through a [`PageFetcher`](crate::PageFetcher)
pub struct SitemapResolver {
    fetcher: SharedFetcher,
    config: SitemapConfig,
}

impl SitemapResolver {
    pub fn new(fetcher: SharedFetcher, config: SitemapConfig) -> Self {
        Self { fetcher, config }
    }

    /// Fetch and parse `/robots.txt`; a missing file allows everything
    pub async fn fetch_robots(&self, origin: &str) -> RobotsTxt {
        let url = format!("{}/robots.txt", origin.trim_end_matches('/'));
        match self.fetcher.fetch(&url).await {
            Ok(page) => {
                let robots = RobotsTxt::parse(&page.text());
                debug!("robots.txt for {} declares {} sitemaps", origin, robots.sitemaps.len());
                robots
            }
            Err(e) => {
                debug!("No robots.txt for {}: {}", origin, e);
                RobotsTxt::allow_all()
            }
        }
    }

    async fn probe_candidates(&self, origin: &str) -> Option<Resolution> {
        for path in SITEMAP_CANDIDATES {
            let url = format!("{}{}", origin, path);
            match self.fetcher.fetch(&url).await {
                Ok(page) if page.status == 200 => {
                    info!("Found sitemap at {}", url);
                    return Some(Resolution::Found {
                        url,
                        body: Some(page.body),
                    });
                }
                Ok(page) => debug!("Sitemap probe {} returned {}", url, page.status),
                Err(e) => debug!("Sitemap probe {} failed: {}", url, e),
            }
        }
        None
    }

    /// Find the sitemap location for `origin`
    pub async fn resolve(&self, origin: &str, robots: &RobotsTxt) -> Resolution {
        let origin = origin.trim_end_matches('/');
        let mut state = ResolverState::Unresolved;
        let mut resolution = Resolution::NotFound;

        while !matches!(state, ResolverState::Resolved | ResolverState::NotFound) {
            state = match state {
                ResolverState::Unresolved => ResolverState::TryingCandidatePaths,
                ResolverState::TryingCandidatePaths => match self.probe_candidates(origin).await {
                    Some(found) => {
                        resolution = found;
                        ResolverState::Resolved
                    }
                    None => ResolverState::TryingRobotsDirective,
                },
                ResolverState::TryingRobotsDirective => match robots.sitemaps.first() {
                    Some(url) => {
                        info!("Using sitemap from robots.txt: {}", url);
                        resolution = Resolution::Found {
                            url: url.clone(),
                            body: None,
                        };
                        ResolverState::Resolved
                    }
                    None => ResolverState::NotFound,
                },
                done => done,
            };
        }

        if state == ResolverState::NotFound {
            warn!("No sitemap found for {}", origin);
        }
        resolution
    }

    /// Resolve, expand and filter the sitemap URLs of `origin`
    pub async fn discover(&self, origin: &str) -> Discovery {
        let robots = self.fetch_robots(origin).await;
        let host = Url::parse(origin)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();

        match self.resolve(origin, &robots).await {
            Resolution::Found { url, body } => {
                let records = expand_sitemaps(self.fetcher.as_ref(), &url, body, &self.config).await;
                let records = UrlFilter::new(&host, robots.clone()).filter(records);
                Discovery {
                    sitemap_url: Some(url),
                    records,
                    robots,
                }
            }
            Resolution::NotFound => Discovery {
                sitemap_url: None,
                records: Vec::new(),
                robots,
            },
        }
    }
}

//! Page and domain analysis pipeline
//!
//! A page run is a straight chain: fetch → parse → classify → extract →
//! score → bucket. A domain run wraps it:
//! 1. Discover URLs from the sitemap (or a shallow crawl of the homepage)
//! 2. Select a category-balanced subset
//! 3. Pass 1: analyze selected pages concurrently, each under a deadline
//! 4. Pass 2: re-bucket every page with cross-page keyword frequencies
//! 5. Aggregate into a domain summary

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};
use url::Url;
use uuid::Uuid;

use seolens_core::{
    aggregate_nonempty, domain_frequency, sort_keywords, BucketClassifier, DomainSummary,
    KeywordScorer, PageAnalysis, PageClassifier, PageStats, ParsedPage, ScoringContext,
    ScoringWeights, WeightsError, WeightsUpdate,
};
use seolens_crawl::{
    origin_of, shallow_crawl, FetchError, HtmlPageParser, HttpFetcher, PageParser, ParseError,
    SharedFetcher, SitemapResolver, UrlFilter, UrlSelector,
};
use seolens_nlp::{
    create_embedder, FusionEngine, SemanticProvider, SharedProvider, StatisticalProvider,
};

use crate::config::AnalyzerConfig;
use crate::weights::WeightStore;

/// Analysis errors
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Parse failed: {0}")]
    Parse(#[from] ParseError),

    #[error("{url} is not an HTML page ({content_type})")]
    NotHtml { url: String, content_type: String },

    #[error("Analysis of {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    #[error("No URLs discovered for {0}")]
    NoUrlsDiscovered(String),

    #[error("No pages could be analyzed for {0}")]
    NoPagesAnalyzed(String),

    #[error("Invalid weights: {0}")]
    Weights(#[from] WeightsError),
}

/// Result of a domain run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainReport {
    pub run_id: Uuid,
    pub domain: String,
    pub sitemap_url: Option<String>,
    /// URLs selected for analysis, in selection order
    pub selected_urls: Vec<String>,
    pub summary: DomainSummary,
    /// Successfully analyzed pages, in selection order
    pub pages: Vec<PageAnalysis>,
}

/// Turn `example.com`, `https://www.example.com/path` etc. into an origin URL
pub fn normalize_origin(domain: &str) -> Result<(String, String), AnalysisError> {
    let trimmed = domain.trim();
    if trimmed.is_empty() {
        return Err(AnalysisError::InvalidDomain(domain.to_string()));
    }
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let url = Url::parse(&with_scheme)
        .map_err(|e| AnalysisError::InvalidDomain(format!("{}: {}", domain, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AnalysisError::InvalidDomain(domain.to_string()));
    }
    let host = url
        .host_str()
        .ok_or_else(|| AnalysisError::InvalidDomain(domain.to_string()))?
        .to_string();

    Ok((origin_of(&url), host))
}

/// The SEO analysis pipeline
pub struct Analyzer {
    config: AnalyzerConfig,
    fetcher: SharedFetcher,
    parser: Arc<dyn PageParser>,
    fusion: Arc<FusionEngine>,
    classifier: PageClassifier,
    buckets: BucketClassifier,
    weights: WeightStore,
}

impl Analyzer {
    pub fn new(
        config: AnalyzerConfig,
        fetcher: SharedFetcher,
        parser: Arc<dyn PageParser>,
        fusion: Arc<FusionEngine>,
    ) -> Result<Self, AnalysisError> {
        let weights = WeightStore::new(config.weights)?;
        Ok(Self {
            classifier: PageClassifier::new(config.classifier),
            buckets: BucketClassifier::new(config.buckets),
            config,
            fetcher,
            parser,
            fusion,
            weights,
        })
    }

    /// Wire the HTTP fetcher, HTML parser and configured keyword providers
    pub fn from_config(config: AnalyzerConfig) -> Result<Self, anyhow::Error> {
        let fetcher: SharedFetcher = Arc::new(HttpFetcher::new(config.fetch.clone())?);
        let embedder = create_embedder(&config.embedder)?;
        info!("Using {} embeddings", embedder.name());

        let providers: Vec<SharedProvider> = vec![
            Arc::new(StatisticalProvider::new(config.statistical.clone())),
            Arc::new(SemanticProvider::new(embedder.clone(), config.semantic.clone())),
        ];
        let fusion = FusionEngine::new(providers, Some(embedder), config.fusion.clone());

        Ok(Self::new(
            config,
            fetcher,
            Arc::new(HtmlPageParser::new()),
            Arc::new(fusion),
        )?)
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Current (normalized) scoring weights
    pub fn weights(&self) -> ScoringWeights {
        self.weights.get()
    }

    /// Merge a partial weight update; returns the normalized result
    pub fn set_weights(&self, update: &WeightsUpdate) -> Result<ScoringWeights, AnalysisError> {
        Ok(self.weights.update(update)?)
    }

    /// Classify, extract, score and bucket an already parsed page
    pub async fn analyze_parsed(&self, parsed: &ParsedPage) -> PageAnalysis {
        let url = parsed.url.as_str();
        let classification = self.classifier.classify(parsed, url);

        // Candidates come from the body; title and headings only weigh in at scoring
        let extracted = self.fusion.extract_keywords(&parsed.main_text).await;
        let ctx = ScoringContext::new(parsed, &classification.brand);
        let scorer = KeywordScorer::new(self.weights.get());
        let mut keywords = scorer.score_all(extracted.iter().map(|k| k.term.as_str()), &ctx);
        sort_keywords(&mut keywords);

        let keyword_buckets = self.buckets.classify(
            &keywords,
            classification.page_type,
            &classification.brand,
            None,
        );
        debug!(
            "Analyzed {}: {:?}, {} keywords",
            url,
            classification.page_type,
            keywords.len()
        );

        PageAnalysis {
            url: url.to_string(),
            title: parsed.meta.title.clone(),
            language: parsed.meta.lang.clone(),
            page_type: classification.page_type,
            audiences: classification.audiences,
            intent: classification.intent,
            brand_info: classification.brand,
            keywords,
            keyword_buckets,
            stats: PageStats::from_parsed(parsed),
            analyzed_at: Utc::now(),
        }
    }

    /// Analyze a single URL; every failure is returned to the caller
    pub async fn analyze_page(&self, url: &str) -> Result<PageAnalysis, AnalysisError> {
        let page = self.fetcher.fetch(url).await?;
        if !page.is_html() {
            return Err(AnalysisError::NotHtml {
                url: url.to_string(),
                content_type: page.content_type.clone().unwrap_or_else(|| "unknown".into()),
            });
        }

        let parsed = self.parser.parse(&page.text(), url)?;
        Ok(self.analyze_parsed(&parsed).await)
    }

    async fn analyze_with_deadline(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<PageAnalysis, AnalysisError> {
        match tokio::time::timeout(timeout, self.analyze_page(url)).await {
            Ok(result) => result,
            Err(_) => Err(AnalysisError::Timeout {
                url: url.to_string(),
                secs: timeout.as_secs(),
            }),
        }
    }

    /// Discover candidate URLs and pick at most `max_urls` of them
    async fn select_urls(
        &self,
        origin: &str,
        host: &str,
        max_urls: usize,
    ) -> (Option<String>, Vec<String>) {
        let resolver = SitemapResolver::new(self.fetcher.clone(), self.config.sitemap);
        let discovery = resolver.discover(origin).await;

        if !discovery.records.is_empty() {
            let selected = UrlSelector::new(self.config.selection).select(
                discovery.records,
                max_urls,
                Utc::now(),
            );
            return (
                discovery.sitemap_url,
                selected.into_iter().map(|r| r.url).collect(),
            );
        }

        info!("No sitemap URLs for {}, falling back to a shallow crawl", origin);
        let filter = UrlFilter::new(host, discovery.robots);
        match shallow_crawl(
            self.fetcher.as_ref(),
            self.parser.as_ref(),
            origin,
            max_urls,
            &filter,
        )
        .await
        {
            Ok(records) => (None, records.into_iter().map(|r| r.url).collect()),
            Err(e) => {
                warn!("Shallow crawl of {} failed: {}", origin, e);
                (None, Vec::new())
            }
        }
    }

    /// Analyze up to `max_urls` pages of a domain
    pub async fn analyze_domain(
        &self,
        domain: &str,
        max_urls: usize,
        timeout: Duration,
    ) -> Result<DomainReport, AnalysisError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("domain_run", %run_id, domain = %domain);
        self.run_domain(run_id, domain, max_urls, timeout)
            .instrument(span)
            .await
    }

    async fn run_domain(
        &self,
        run_id: Uuid,
        domain: &str,
        max_urls: usize,
        timeout: Duration,
    ) -> Result<DomainReport, AnalysisError> {
        let (origin, host) = normalize_origin(domain)?;
        info!("Analyzing {} (up to {} pages)", origin, max_urls);

        let (sitemap_url, selected) = self.select_urls(&origin, &host, max_urls).await;
        if selected.is_empty() {
            return Err(AnalysisError::NoUrlsDiscovered(origin));
        }

        // Pass 1
        let concurrency = self.config.fetch.max_concurrent_requests.max(1);
        let mut results: Vec<(usize, PageAnalysis)> = stream::iter(selected.iter().enumerate())
            .map(|(index, url)| async move {
                match self.analyze_with_deadline(url, timeout).await {
                    Ok(analysis) => Some((index, analysis)),
                    Err(e) => {
                        warn!("Skipping {}: {}", url, e);
                        None
                    }
                }
            })
            .buffer_unordered(concurrency)
            .filter_map(|x| async { x })
            .collect()
            .await;
        results.sort_by_key(|(index, _)| *index);
        let mut pages: Vec<PageAnalysis> = results.into_iter().map(|(_, page)| page).collect();

        info!("Analyzed {}/{} pages", pages.len(), selected.len());
        if pages.is_empty() {
            return Err(AnalysisError::NoPagesAnalyzed(origin));
        }

        // Pass 2
        if self.config.analysis.domain_bucketing {
            let frequency = domain_frequency(&pages);
            for page in &mut pages {
                page.keyword_buckets = self.buckets.classify(
                    &page.keywords,
                    page.page_type,
                    &page.brand_info,
                    Some(&frequency),
                );
            }
        }

        let summary = aggregate_nonempty(&pages, &self.config.aggregation)
            .map_err(|_| AnalysisError::NoPagesAnalyzed(origin.clone()))?;

        Ok(DomainReport {
            run_id,
            domain: host,
            sitemap_url,
            selected_urls: selected,
            summary,
            pages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use seolens_core::{Bucket, PageType};
    use seolens_crawl::{FetchedPage, PageFetcher};
    use seolens_nlp::{HashingEmbedder, StatisticalConfig};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory site
    #[derive(Default)]
    struct SiteFetcher {
        pages: HashMap<String, (&'static str, String)>,
        delays: HashMap<String, Duration>,
        requests: Mutex<Vec<String>>,
    }

    impl SiteFetcher {
        fn with(mut self, url: &str, content_type: &'static str, body: impl Into<String>) -> Self {
            self.pages.insert(url.to_string(), (content_type, body.into()));
            self
        }

        fn slow(mut self, url: &str, delay: Duration) -> Self {
            self.delays.insert(url.to_string(), delay);
            self
        }
    }

    #[async_trait]
    impl PageFetcher for SiteFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
            self.requests.lock().unwrap().push(url.to_string());
            if let Some(delay) = self.delays.get(url) {
                tokio::time::sleep(*delay).await;
            }
            match self.pages.get(url) {
                Some((content_type, body)) => Ok(FetchedPage::new(
                    url,
                    200,
                    Some(*content_type),
                    body.clone().into_bytes(),
                )),
                None => Err(FetchError::Permanent {
                    url: url.to_string(),
                    status: 404,
                }),
            }
        }
    }

    fn product_page(name: &str) -> String {
        format!(
            r#"<html lang="en"><head><title>{name} - TechStore</title>
            <meta name="description" content="Buy the {name} gaming laptop at the best price.">
            <script type="application/ld+json">{{"@type": "Product", "name": "{name}",
              "offers": {{"@type": "Offer", "price": "999"}}}}</script></head>
            <body><main><h1>{name}</h1>
            <p>The {name} is a gaming laptop with a fast processor and a bright display.
            Add to cart today and get free shipping on every gaming laptop order.
            Price includes warranty. This gaming laptop ships in two days.</p>
            </main></body></html>"#
        )
    }

    const SITEMAP: &str = r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://techstore.com/product/laptop-1</loc><priority>0.9</priority></url>
  <url><loc>https://techstore.com/product/laptop-2</loc><priority>0.9</priority></url>
  <url><loc>https://techstore.com/product/laptop-3</loc><priority>0.9</priority></url>
  <url><loc>https://techstore.com/cart/</loc></url>
</urlset>"#;

    fn analyzer(fetcher: SiteFetcher) -> Analyzer {
        let config = AnalyzerConfig::default();
        let embedder = Arc::new(HashingEmbedder::default());
        let providers: Vec<SharedProvider> = vec![
            Arc::new(StatisticalProvider::new(StatisticalConfig::default())),
            Arc::new(SemanticProvider::new(embedder.clone(), Default::default())),
        ];
        let fusion = FusionEngine::new(providers, Some(embedder), config.fusion.clone());
        Analyzer::new(
            config,
            Arc::new(fetcher),
            Arc::new(HtmlPageParser::new()),
            Arc::new(fusion),
        )
        .unwrap()
    }

    fn store() -> SiteFetcher {
        SiteFetcher::default()
            .with("https://techstore.com/sitemap.xml", "application/xml", SITEMAP)
            .with("https://techstore.com/product/laptop-1", "text/html", product_page("Laptop One"))
            .with("https://techstore.com/product/laptop-2", "text/html", product_page("Laptop Two"))
            .with("https://techstore.com/product/laptop-3", "text/html; charset=utf-8", product_page("Laptop Three"))
    }

    #[test]
    fn test_normalize_origin() {
        assert_eq!(
            normalize_origin("techstore.com").unwrap(),
            ("https://techstore.com".to_string(), "techstore.com".to_string())
        );
        assert_eq!(
            normalize_origin("http://www.techstore.com/shop?x=1").unwrap().0,
            "http://www.techstore.com"
        );
        assert!(normalize_origin("  ").is_err());
        assert!(normalize_origin("ftp://techstore.com").is_err());
    }

    #[tokio::test]
    async fn test_analyze_page() {
        let analyzer = analyzer(store());
        let page = analyzer
            .analyze_page("https://techstore.com/product/laptop-1")
            .await
            .unwrap();

        assert_eq!(page.page_type, PageType::Ecommerce);
        assert_eq!(page.title.as_deref(), Some("Laptop One - TechStore"));
        assert_eq!(page.language.as_deref(), Some("en"));
        assert_eq!(page.brand_info.domain.as_deref(), Some("techstore.com"));
        assert!(!page.keywords.is_empty());
        assert!(page.keywords.iter().all(|k| (0.0..=1.0).contains(&k.score)));
        assert!(page.stats.words > 0);

        let bucketed = page.keyword_buckets.len();
        assert!(bucketed <= page.keywords.len());
    }

    #[tokio::test]
    async fn test_keywords_come_from_main_text() {
        let page = r#"<html><head><title>Acme Widgets</title>
            <meta name="description" content="Widgets and gadgets catalogue"></head>
            <body><main><h1>Catalogue</h1>
            <p>Our gaming laptop lineup covers every budget. Each gaming laptop ships
            with a fast processor, a bright display and a long battery life.</p>
            </main></body></html>"#;
        let analyzer = analyzer(SiteFetcher::default().with("https://acme.com/", "text/html", page));
        let analysis = analyzer.analyze_page("https://acme.com/").await.unwrap();

        assert!(analysis.keywords.iter().any(|k| k.term.contains("laptop")));
        assert!(
            !analysis.keywords.iter().any(|k| k.term.contains("widgets")),
            "title-only term extracted: {:?}",
            analysis.keywords.iter().map(|k| &k.term).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_analyze_page_errors() {
        let analyzer = analyzer(store().with("https://techstore.com/feed.json", "application/json", "{}"));

        let missing = analyzer.analyze_page("https://techstore.com/missing").await;
        assert!(matches!(
            missing,
            Err(AnalysisError::Fetch(FetchError::Permanent { status: 404, .. }))
        ));

        let json = analyzer.analyze_page("https://techstore.com/feed.json").await;
        assert!(matches!(json, Err(AnalysisError::NotHtml { .. })));
    }

    #[tokio::test]
    async fn test_analyze_domain() {
        let analyzer = analyzer(store());
        let report = analyzer
            .analyze_domain("techstore.com", 10, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(report.domain, "techstore.com");
        assert_eq!(report.sitemap_url.as_deref(), Some("https://techstore.com/sitemap.xml"));
        assert_eq!(report.pages.len(), 3);
        assert_eq!(report.summary.total_urls, 3);
        assert_eq!(report.summary.counts_by_type[&PageType::Ecommerce], 3);
        assert!(!report.selected_urls.iter().any(|u| u.contains("/cart")));

        // Terms on every page are general or client-side, not page-specific
        for page in &report.pages {
            for (bucket, keyword) in page.keyword_buckets.iter() {
                if keyword.term == "gaming laptop" {
                    assert_ne!(bucket, Bucket::PageSpecific);
                }
            }
        }
    }

    #[tokio::test]
    async fn test_domain_with_no_pages() {
        let fetcher = SiteFetcher::default()
            .with("https://techstore.com/sitemap.xml", "application/xml", SITEMAP);
        let result = analyzer(fetcher)
            .analyze_domain("techstore.com", 10, Duration::from_secs(5))
            .await;
        assert!(matches!(result, Err(AnalysisError::NoPagesAnalyzed(_))));
    }

    #[tokio::test]
    async fn test_domain_without_anything_to_analyze() {
        let result = analyzer(SiteFetcher::default())
            .analyze_domain("https://nothing.test", 10, Duration::from_secs(5))
            .await;
        assert!(matches!(result, Err(AnalysisError::NoUrlsDiscovered(_))));
    }

    #[tokio::test]
    async fn test_shallow_crawl_fallback() {
        let home = r#"<html><body><a href="/product/laptop-1">One</a>
            <a href="/product/laptop-2">Two</a></body></html>"#;
        let fetcher = SiteFetcher::default()
            .with("https://techstore.com/", "text/html", home)
            .with("https://techstore.com/product/laptop-1", "text/html", product_page("Laptop One"))
            .with("https://techstore.com/product/laptop-2", "text/html", product_page("Laptop Two"));
        let report = analyzer(fetcher)
            .analyze_domain("techstore.com", 10, Duration::from_secs(5))
            .await
            .unwrap();
        assert!(report.sitemap_url.is_none());
        assert_eq!(
            report.selected_urls,
            vec![
                "https://techstore.com/product/laptop-1",
                "https://techstore.com/product/laptop-2",
            ]
        );
        assert_eq!(report.pages.len(), 2);
    }

    #[tokio::test]
    async fn test_slow_page_times_out_independently() {
        let fetcher = store().slow("https://techstore.com/product/laptop-2", Duration::from_secs(3));
        let report = analyzer(fetcher)
            .analyze_domain("techstore.com", 10, Duration::from_millis(500))
            .await
            .unwrap();

        let urls: Vec<&str> = report.pages.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://techstore.com/product/laptop-1",
                "https://techstore.com/product/laptop-3",
            ]
        );
    }

    #[tokio::test]
    async fn test_weights_roundtrip() {
        let analyzer = analyzer(store());
        let updated = analyzer
            .set_weights(&WeightsUpdate {
                brand_similarity: Some(0.0),
                title_position: Some(0.0),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(analyzer.weights(), updated);
        assert_eq!(updated.brand_similarity, 0.0);
        assert!((updated.sum() - 1.0).abs() < 1e-9);

        let rejected = analyzer.set_weights(&WeightsUpdate {
            frequency: Some(1.5),
            ..Default::default()
        });
        assert!(matches!(rejected, Err(AnalysisError::Weights(_))));
        assert_eq!(analyzer.weights(), updated);
    }
}

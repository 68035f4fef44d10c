//! Shallow-crawl fallback
//!
//! Used when a site has no usable sitemap: the homepage's internal links
//! become the candidate URLs, each with a uniform relevance of 0.5.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use seolens_core::UrlRecord;

use crate::fetcher::{FetchError, PageFetcher};
use crate::filter::UrlFilter;
use crate::parser::PageParser;
use crate::selector::categorize;

/// Relevance assigned to crawled URLs
pub const CRAWL_RELEVANCE: f64 = 0.5;

fn crawl_record(url: &str) -> UrlRecord {
    UrlRecord::new(url)
        .with_category(categorize(url))
        .with_relevance(CRAWL_RELEVANCE)
}

/// Collect up to `max_urls` internal links from the homepage at `origin`
///
/// Falls back to the homepage itself when it links nowhere useful. Fetch
/// failures of the homepage are returned to the caller.
pub async fn shallow_crawl(
    fetcher: &dyn PageFetcher,
    parser: &dyn PageParser,
    origin: &str,
    max_urls: usize,
    filter: &UrlFilter,
) -> Result<Vec<UrlRecord>, FetchError> {
    if max_urls == 0 {
        return Ok(Vec::new());
    }

    let homepage = format!("{}/", origin.trim_end_matches('/'));
    debug!("Shallow crawl of {}", homepage);

    let page = fetcher.fetch(&homepage).await?;
    let parsed = match parser.parse(&page.text(), &page.final_url) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Could not parse homepage {}: {}", homepage, e);
            return Ok(vec![crawl_record(&homepage)]);
        }
    };

    let mut seen = HashSet::new();
    let records: Vec<UrlRecord> = parsed
        .links
        .internal
        .iter()
        .filter(|url| filter.accepts(url))
        .filter(|url| seen.insert(url.trim_end_matches('/').to_string()))
        .take(max_urls)
        .map(|url| crawl_record(url))
        .collect();

    if records.is_empty() {
        info!("No crawlable links on {}, analyzing the homepage only", homepage);
        return Ok(vec![crawl_record(&homepage)]);
    }

    info!("Shallow crawl found {} URLs on {}", records.len(), homepage);
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::HtmlPageParser;
    use crate::robots::RobotsTxt;
    use crate::sitemap::tests::MapFetcher;
    use seolens_core::UrlCategory;

    const HOMEPAGE: &str = r#"<html><body>
        <a href="/product/laptop-1">Laptop</a>
        <a href="/product/laptop-1/">Laptop again</a>
        <a href="/blog/news">News</a>
        <a href="/login">Login</a>
        <a href="https://elsewhere.com/page">Elsewhere</a>
        <a href="/about/">About</a>
    </body></html>"#;

    fn filter() -> UrlFilter {
        UrlFilter::new("shop.com", RobotsTxt::allow_all())
    }

    #[tokio::test]
    async fn test_internal_links_become_candidates() {
        let fetcher = MapFetcher::default().with("https://shop.com/", "text/html", HOMEPAGE);
        let records = shallow_crawl(&fetcher, &HtmlPageParser::new(), "https://shop.com", 10, &filter())
            .await
            .unwrap();

        let urls: Vec<&str> = records.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://shop.com/product/laptop-1",
                "https://shop.com/blog/news",
                "https://shop.com/about/",
            ]
        );
        assert!(records.iter().all(|r| r.relevance_score == CRAWL_RELEVANCE));
        assert_eq!(records[0].category, UrlCategory::Product);
    }

    #[tokio::test]
    async fn test_budget_and_homepage_fallback() {
        let fetcher = MapFetcher::default()
            .with("https://shop.com/", "text/html", HOMEPAGE)
            .with("https://bare.com/", "text/html", "<html><body>Nothing here</body></html>");
        let parser = HtmlPageParser::new();

        let records = shallow_crawl(&fetcher, &parser, "https://shop.com/", 1, &filter())
            .await
            .unwrap();
        assert_eq!(records.len(), 1);

        let bare = UrlFilter::new("bare.com", RobotsTxt::allow_all());
        let records = shallow_crawl(&fetcher, &parser, "https://bare.com", 5, &bare)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].url, "https://bare.com/");
    }

    #[tokio::test]
    async fn test_unreachable_homepage() {
        let fetcher = MapFetcher::default();
        let result = shallow_crawl(&fetcher, &HtmlPageParser::new(), "https://down.com", 5, &filter()).await;
        assert!(matches!(result, Err(FetchError::Permanent { status: 404, .. })));
    }
}

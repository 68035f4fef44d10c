//! Budgeted URL selection
//!
//! Picks a category-balanced subset of sitemap URLs:
//! 1. Prefer recently modified URLs when there are enough of them
//! 2. Categorize each URL by path (product, blog, category, landing, other)
//! 3. Score relevance from sitemap priority, path patterns and depth
//! 4. Fill per-category quotas, then top off by relevance

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use seolens_core::{clamp_unit, UrlCategory, UrlRecord};

fn patterns(list: &[&str]) -> Vec<Regex> {
    list.iter()
        .map(|p| Regex::new(&format!("(?i){}", p)).unwrap())
        .collect()
}

static PRODUCT_PATHS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    patterns(&[
        r"/products?/",
        r"/items?/",
        r"/shop/",
        r"/tienda/",
        r"/comprar/",
        r"/buy/",
        r"/\d+$",
        r"/[a-z0-9-]+-\d+$",
    ])
});
static BLOG_PATHS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    patterns(&[
        r"/blog/",
        r"/news/",
        r"/noticias/",
        r"/articulos/",
        r"/posts?/",
        r"/articles?/",
        r"/tutorial/",
        r"/guia/",
        r"/guide/",
    ])
});
static CATEGORY_PATHS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    patterns(&[
        r"/category/",
        r"/categorias?/",
        r"/section/",
        r"/seccion/",
        r"/departamento/",
        r"/department/",
        r"/rubro/",
    ])
});
// Matched against the path alone: only the site root is a landing page by
// shape, a trailing slash elsewhere says nothing about the page.
static LANDING_PATHS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    patterns(&[
        r"^/$",
        r"/home/",
        r"/inicio/",
        r"/principal/",
        r"/about/",
        r"/acerca/",
        r"/nosotros/",
        r"/contact/",
        r"/contacto/",
        r"/contactanos/",
    ])
});

static CONTENT_BONUS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    patterns(&[
        r"/(producto|product|item)/",
        r"/(articulo|article|post|blog)/",
        r"/(categoria|category)/",
        r"/(servicio|service)/",
        r"/(nosotros|about|sobre)/",
        r"/(contacto|contact)/",
    ])
});
static INTENT_BONUS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    patterns(&[
        r"/(guia|guide|tutorial)/",
        r"/(mejor|best|top)/",
        r"/(precio|price|cost)/",
        r"/(oferta|offer|deal)/",
    ])
});

/// Path segments before the depth penalty applies
const MAX_FREE_DEPTH: usize = 4;

fn url_path(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string())
}

fn any_match(patterns: &[Regex], text: &str) -> bool {
    patterns.iter().any(|p| p.is_match(text))
}

/// Category of a URL; earlier categories take precedence
pub fn categorize(url: &str) -> UrlCategory {
    let path = url_path(url);
    if any_match(&PRODUCT_PATHS, &path) {
        UrlCategory::Product
    } else if any_match(&BLOG_PATHS, &path) {
        UrlCategory::Blog
    } else if any_match(&CATEGORY_PATHS, &path) {
        UrlCategory::Category
    } else if any_match(&LANDING_PATHS, &path) {
        UrlCategory::Landing
    } else {
        UrlCategory::Other
    }
}

/// Relevance from sitemap priority, path patterns and depth, in [0,1]
pub fn relevance(record: &UrlRecord) -> f64 {
    let path = url_path(&record.url);
    let mut score = 0.5 + record.priority * 0.3;

    score += 0.1 * CONTENT_BONUS.iter().filter(|p| p.is_match(&path)).count() as f64;
    score += 0.05 * INTENT_BONUS.iter().filter(|p| p.is_match(&path)).count() as f64;

    let depth = path.split('/').filter(|s| !s.is_empty()).count();
    if depth > MAX_FREE_DEPTH {
        score -= 0.1 * (depth - MAX_FREE_DEPTH) as f64;
    }

    clamp_unit(score)
}

/// Selection settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// URLs modified within this many days count as recent
    pub recency_days: i64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self { recency_days: 5 }
    }
}

/// Quota divisor per category
fn quota_divisor(category: UrlCategory) -> usize {
    match category {
        UrlCategory::Product => 3,
        UrlCategory::Blog => 4,
        UrlCategory::Category => 6,
        UrlCategory::Landing | UrlCategory::Other => 8,
    }
}

/// Relevance desc, then last-modified desc with missing dates last
fn by_relevance_then_recency(a: &UrlRecord, b: &UrlRecord) -> Ordering {
    b.relevance_score
        .partial_cmp(&a.relevance_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.last_modified.cmp(&a.last_modified))
}

/// Category-balanced URL selector
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlSelector {
    config: SelectionConfig,
}

impl UrlSelector {
    pub fn new(config: SelectionConfig) -> Self {
        Self { config }
    }

    /// Annotate records with category and relevance
    pub fn rank(&self, records: Vec<UrlRecord>) -> Vec<UrlRecord> {
        records
            .into_iter()
            .map(|record| {
                let category = categorize(&record.url);
                let relevance = relevance(&record);
                record.with_category(category).with_relevance(relevance)
            })
            .collect()
    }

    /// Select at most `max_urls` records as of `now`
    pub fn select(
        &self,
        records: Vec<UrlRecord>,
        max_urls: usize,
        now: DateTime<Utc>,
    ) -> Vec<UrlRecord> {
        if max_urls == 0 || records.is_empty() {
            return Vec::new();
        }

        let mut seen = HashSet::new();
        let records: Vec<UrlRecord> = records
            .into_iter()
            .filter(|r| seen.insert(r.url.clone()))
            .collect();

        let cutoff = now - Duration::days(self.config.recency_days);
        let recent = records
            .iter()
            .filter(|r| r.last_modified.is_some_and(|m| m >= cutoff))
            .count();
        let pool = if recent < max_urls {
            debug!("Only {} recent URLs, considering all {}", recent, records.len());
            records
        } else {
            records
                .into_iter()
                .filter(|r| r.last_modified.is_some_and(|m| m >= cutoff))
                .collect()
        };

        let pool = self.rank(pool);
        let mut taken = vec![false; pool.len()];
        let mut selected: Vec<usize> = Vec::with_capacity(max_urls);

        for category in UrlCategory::ALL {
            let mut members: Vec<usize> = (0..pool.len())
                .filter(|&i| pool[i].category == category)
                .collect();
            members.sort_by(|&a, &b| by_relevance_then_recency(&pool[a], &pool[b]));

            let quota = (max_urls / quota_divisor(category)).max(1);
            let room = max_urls - selected.len();
            for i in members.into_iter().take(quota.min(room)) {
                taken[i] = true;
                selected.push(i);
            }
            debug!(
                "Category {}: {} selected so far",
                category.as_str(),
                selected.len()
            );
        }

        if selected.len() < max_urls {
            let mut rest: Vec<usize> = (0..pool.len()).filter(|&i| !taken[i]).collect();
            rest.sort_by(|&a, &b| {
                by_relevance_then_recency(&pool[a], &pool[b])
                    .then_with(|| pool[a].category.rank().cmp(&pool[b].category.rank()))
                    .then_with(|| a.cmp(&b))
            });
            let room = max_urls - selected.len();
            selected.extend(rest.into_iter().take(room));
        }

        info!("Selected {} of {} candidate URLs", selected.len(), pool.len());
        let mut pool: Vec<Option<UrlRecord>> = pool.into_iter().map(Some).collect();
        selected
            .into_iter()
            .filter_map(|i| pool[i].take())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn record(url: &str, priority: f64, age_days: i64) -> UrlRecord {
        UrlRecord::new(url)
            .with_priority(priority)
            .with_last_modified(Some(now() - Duration::days(age_days)))
    }

    #[test]
    fn test_categorize() {
        assert_eq!(categorize("https://a.com/product/laptop"), UrlCategory::Product);
        assert_eq!(categorize("https://a.com/laptop-pro-15"), UrlCategory::Product);
        assert_eq!(categorize("https://a.com/blog/how-to"), UrlCategory::Blog);
        assert_eq!(categorize("https://a.com/category/laptops"), UrlCategory::Category);
        assert_eq!(categorize("https://a.com/"), UrlCategory::Landing);
        assert_eq!(categorize("https://a.com/about/"), UrlCategory::Landing);
        assert_eq!(categorize("https://a.com/terms"), UrlCategory::Other);
        // Trailing slashes alone do not make a landing page
        assert_eq!(categorize("https://a.com/terms/"), UrlCategory::Other);
        assert_eq!(categorize("https://a.com/servicios/"), UrlCategory::Other);
        assert_eq!(categorize("https://a.com"), UrlCategory::Landing);
        // Product outranks blog
        assert_eq!(categorize("https://a.com/blog/product/x"), UrlCategory::Product);
    }

    #[test]
    fn test_relevance() {
        let product = record("https://a.com/product/laptop-1", 0.9, 0);
        assert!((relevance(&product) - 0.87).abs() < 1e-9);

        let deep = record("https://a.com/a/b/c/d/e/f", 0.5, 0);
        assert!((relevance(&deep) - 0.45).abs() < 1e-9);

        let loaded = UrlRecord::new("https://a.com/blog/guide/best/price/").with_priority(1.0);
        assert_eq!(relevance(&loaded), 1.0);
    }

    #[test]
    fn test_balanced_selection() {
        let records = vec![
            record("https://shop.com/product/laptop-1", 0.9, 0),
            record("https://shop.com/product/laptop-2", 0.9, 0),
            record("https://shop.com/product/laptop-3", 0.9, 0),
            record("https://shop.com/blog/review-a", 0.5, 30),
            record("https://shop.com/blog/review-b", 0.5, 30),
        ];
        let selected = UrlSelector::default().select(records, 4, now());
        assert_eq!(selected.len(), 4);

        let products = selected
            .iter()
            .filter(|r| r.category == UrlCategory::Product)
            .count();
        let blogs = selected
            .iter()
            .filter(|r| r.category == UrlCategory::Blog)
            .count();
        assert_eq!(products, 3);
        assert_eq!(blogs, 1);
        assert!(selected.iter().all(|r| r.category != UrlCategory::Other));
    }

    #[test]
    fn test_recent_urls_preferred_when_enough() {
        let records = vec![
            record("https://a.com/old-1", 0.5, 60),
            record("https://a.com/new-a", 0.5, 1),
            record("https://a.com/new-b", 0.5, 2),
            record("https://a.com/old-2", 0.5, 90),
        ];
        let selected = UrlSelector::default().select(records, 2, now());
        let urls: Vec<&str> = selected.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a.com/new-a", "https://a.com/new-b"]);
    }

    #[test]
    fn test_budget_bounds() {
        let records: Vec<UrlRecord> = (0..50)
            .map(|i| record(&format!("https://a.com/page-{}/x", i), 0.5, i))
            .collect();
        let selector = UrlSelector::default();
        for max in [0, 1, 3, 7, 15, 60] {
            let selected = selector.select(records.clone(), max, now());
            assert!(selected.len() <= max);
            let unique: HashSet<&str> = selected.iter().map(|r| r.url.as_str()).collect();
            assert_eq!(unique.len(), selected.len());
        }
        assert_eq!(selector.select(records, 60, now()).len(), 50);
    }

    #[test]
    fn test_duplicate_urls_collapse() {
        let records = vec![
            record("https://a.com/product/x-1", 0.5, 0),
            record("https://a.com/product/x-1", 0.9, 0),
        ];
        assert_eq!(UrlSelector::default().select(records, 5, now()).len(), 1);
    }
}

//! Domain aggregation
//!
//! Reduces page analyses into a domain summary. The reduction is order
//! independent: counts are tallied, shared terms are averaged, and ties are
//! broken by term.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::buckets::DomainFrequency;
use crate::model::{sort_keywords, Bucket, DomainSummary, KeywordScore, PageAnalysis};
use crate::text::normalize_term;

#[derive(Debug, Error, PartialEq)]
pub enum AggregationError {
    #[error("No analyzed pages to aggregate")]
    NoData,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Keywords kept per bucket in the summary
    pub top_n: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            top_n: crate::DEFAULT_TOP_N,
        }
    }
}

/// Summarize pages; empty input yields a zero summary
pub fn aggregate(pages: &[PageAnalysis], config: &AggregationConfig) -> DomainSummary {
    let mut summary = DomainSummary::empty();
    summary.total_urls = pages.len();

    for page in pages {
        *summary.counts_by_type.entry(page.page_type).or_default() += 1;
    }

    for bucket in Bucket::ALL {
        let mut totals: HashMap<String, (f64, usize)> = HashMap::new();
        for page in pages {
            for keyword in page.keyword_buckets.get(bucket) {
                let entry = totals.entry(normalize_term(&keyword.term)).or_default();
                entry.0 += keyword.score;
                entry.1 += 1;
            }
        }

        let mut averaged: Vec<KeywordScore> = totals
            .into_iter()
            .map(|(term, (sum, n))| KeywordScore::new(term, sum / n as f64))
            .collect();
        sort_keywords(&mut averaged);
        averaged.truncate(config.top_n);
        *summary.top_keywords.get_mut(bucket) = averaged;
    }

    summary
}

/// Summarize pages, failing when there is nothing to summarize
pub fn aggregate_nonempty(
    pages: &[PageAnalysis],
    config: &AggregationConfig,
) -> Result<DomainSummary, AggregationError> {
    if pages.is_empty() {
        return Err(AggregationError::NoData);
    }
    Ok(aggregate(pages, config))
}

/// Cross-page frequency of every scored keyword
pub fn domain_frequency(pages: &[PageAnalysis]) -> DomainFrequency {
    let mut frequency = DomainFrequency::new();
    for page in pages {
        frequency.add_page(page.keywords.iter().map(|k| k.term.as_str()));
    }
    frequency
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BrandInfo, Intent, KeywordBuckets, PageStats, PageType};
    use chrono::Utc;

    fn page(url: &str, page_type: PageType, general: &[(&str, f64)]) -> PageAnalysis {
        let general: Vec<KeywordScore> = general
            .iter()
            .map(|(t, s)| KeywordScore::new(*t, *s))
            .collect();
        PageAnalysis {
            url: url.into(),
            title: None,
            language: None,
            page_type,
            audiences: Default::default(),
            intent: Intent::Informational,
            brand_info: BrandInfo::default(),
            keywords: general.clone(),
            keyword_buckets: KeywordBuckets {
                general,
                ..Default::default()
            },
            stats: PageStats::default(),
            analyzed_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_input() {
        let config = AggregationConfig::default();
        let summary = aggregate(&[], &config);
        assert_eq!(summary, DomainSummary::empty());
        assert_eq!(aggregate_nonempty(&[], &config), Err(AggregationError::NoData));
    }

    #[test]
    fn test_averages_shared_terms() {
        let pages = vec![
            page("https://a.com/1", PageType::Blog, &[("laptop", 0.8), ("desk", 0.2)]),
            page("https://a.com/2", PageType::Blog, &[("laptop", 0.4)]),
            page("https://a.com/3", PageType::Ecommerce, &[("chair", 0.5)]),
        ];
        let summary = aggregate_nonempty(&pages, &AggregationConfig::default()).unwrap();
        assert_eq!(summary.total_urls, 3);
        assert_eq!(summary.counts_by_type[&PageType::Blog], 2);
        assert_eq!(summary.counts_by_type[&PageType::Ecommerce], 1);
        assert_eq!(summary.counts_by_type[&PageType::Mixed], 0);

        let general = &summary.top_keywords.general;
        assert_eq!(general[0].term, "laptop");
        assert!((general[0].score - 0.6).abs() < 1e-9);
        assert_eq!(general[1].term, "chair");
        assert_eq!(general[2].term, "desk");
    }

    #[test]
    fn test_order_independent() {
        let mut pages = vec![
            page("https://a.com/1", PageType::Blog, &[("laptop", 0.8), ("desk", 0.5)]),
            page("https://a.com/2", PageType::Mixed, &[("laptop", 0.4), ("chair", 0.5)]),
            page("https://a.com/3", PageType::Ecommerce, &[("desk", 0.5)]),
        ];
        let config = AggregationConfig::default();
        let forward = aggregate(&pages, &config);
        pages.reverse();
        assert_eq!(aggregate(&pages, &config), forward);
    }

    #[test]
    fn test_top_n() {
        let terms: Vec<(String, f64)> = (0..30).map(|i| (format!("t{}", i), 0.5)).collect();
        let borrowed: Vec<(&str, f64)> = terms.iter().map(|(t, s)| (t.as_str(), *s)).collect();
        let pages = vec![page("https://a.com/", PageType::Mixed, &borrowed)];
        let summary = aggregate(&pages, &AggregationConfig { top_n: 5 });
        assert_eq!(summary.top_keywords.general.len(), 5);
    }

    #[test]
    fn test_domain_frequency() {
        let pages = vec![
            page("https://a.com/1", PageType::Blog, &[("laptop", 0.8)]),
            page("https://a.com/2", PageType::Blog, &[("Laptop", 0.4), ("desk", 0.1)]),
        ];
        let freq = domain_frequency(&pages);
        assert_eq!(freq.pages(), 2);
        assert_eq!(freq.count("laptop"), 2);
        assert!((freq.frequency("desk") - 0.5).abs() < 1e-9);
    }
}

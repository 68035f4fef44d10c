//! Keyword bucket classification
//!
//! Splits a page's scored keywords into three disjoint buckets:
//! - **client**: brand and domain terms, or terms dominant across the site
//! - **page_specific**: terms tied to this product or post
//! - **general**: generic SEO terms shared with other pages

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::model::{sort_keywords, BrandInfo, Bucket, KeywordBuckets, KeywordScore, PageType};
use crate::text::normalize_term;

/// Vocabulary marking a keyword as specific to a product page
const ECOMMERCE_TERMS: &[&str] = &[
    "precio", "comprar", "oferta", "descuento", "envío", "entrega", "talla", "color", "marca",
    "modelo", "especificaciones", "price", "buy", "offer", "discount", "shipping", "size",
    "model", "specs",
];

/// Vocabulary marking a keyword as specific to a blog post
const BLOG_TERMS: &[&str] = &[
    "tutorial", "guía", "cómo", "paso", "método", "técnica", "ejemplo", "caso", "experiencia",
    "opinión", "review", "guide", "how to", "step", "method", "example",
];

#[derive(Debug, Error)]
pub enum BucketError {
    #[error("Keyword has no usable term")]
    EmptyTerm,

    #[error("Keyword '{0}' has a non-finite score")]
    NonFiniteScore(String),
}

/// Bucket classifier settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketConfig {
    /// Keywords kept per bucket
    pub max_per_bucket: usize,
    /// Fraction of pages above which a term belongs to the client
    pub client_site_threshold: f64,
    /// Pages a term must appear on to count as recurring
    pub min_recurring_pages: usize,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            max_per_bucket: crate::DEFAULT_BUCKET_CAP,
            client_site_threshold: 0.5,
            min_recurring_pages: 2,
        }
    }
}

/// Cross-page keyword occurrence counts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainFrequency {
    pages: usize,
    counts: HashMap<String, usize>,
}

impl DomainFrequency {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the keyword set of one page; repeated terms count once
    pub fn add_page<'a, I>(&mut self, terms: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.pages += 1;
        let mut seen: Vec<String> = terms.into_iter().map(normalize_term).collect();
        seen.sort();
        seen.dedup();
        for term in seen {
            *self.counts.entry(term).or_default() += 1;
        }
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Pages containing the term
    pub fn count(&self, term: &str) -> usize {
        self.counts.get(&normalize_term(term)).copied().unwrap_or(0)
    }

    /// Fraction of pages containing the term
    pub fn frequency(&self, term: &str) -> f64 {
        if self.pages == 0 {
            0.0
        } else {
            self.count(term) as f64 / self.pages as f64
        }
    }
}

/// Assigns keywords to buckets
#[derive(Debug, Clone, Copy, Default)]
pub struct BucketClassifier {
    config: BucketConfig,
}

fn matches_brand(term: &str, brand: &BrandInfo) -> bool {
    let related = |candidate: &str| {
        let candidate = normalize_term(candidate);
        !candidate.is_empty()
            && (term == candidate || term.contains(&candidate) || candidate.contains(term))
    };

    brand.name.as_deref().is_some_and(related)
        || brand.domain.as_deref().is_some_and(|domain| {
            let domain = domain.strip_prefix("www.").unwrap_or(domain);
            related(domain) || related(crate::scoring::domain_label(domain))
        })
}

impl BucketClassifier {
    pub fn new(config: BucketConfig) -> Self {
        Self { config }
    }

    fn recurs(&self, term: &str, frequency: Option<&DomainFrequency>) -> bool {
        frequency.is_some_and(|f| f.count(term) >= self.config.min_recurring_pages)
    }

    /// Bucket for one keyword
    pub fn try_classify(
        &self,
        keyword: &KeywordScore,
        page_type: PageType,
        brand: &BrandInfo,
        frequency: Option<&DomainFrequency>,
    ) -> Result<Bucket, BucketError> {
        let term = normalize_term(&keyword.term);
        if term.is_empty() {
            return Err(BucketError::EmptyTerm);
        }
        if !keyword.score.is_finite() {
            return Err(BucketError::NonFiniteScore(term));
        }

        if matches_brand(&term, brand) {
            return Ok(Bucket::Client);
        }
        if frequency.is_some_and(|f| f.frequency(&term) > self.config.client_site_threshold) {
            return Ok(Bucket::Client);
        }

        let vocabulary = match page_type {
            PageType::Ecommerce => Some(ECOMMERCE_TERMS),
            PageType::Blog => Some(BLOG_TERMS),
            PageType::Mixed => None,
        };
        if let Some(vocabulary) = vocabulary {
            if vocabulary.iter().any(|v| term.contains(v)) {
                return Ok(Bucket::PageSpecific);
            }
        }

        if self.recurs(&term, frequency) {
            Ok(Bucket::General)
        } else {
            Ok(Bucket::PageSpecific)
        }
    }

    /// Bucket for one keyword; failures land in the general bucket
    pub fn classify_keyword(
        &self,
        keyword: &KeywordScore,
        page_type: PageType,
        brand: &BrandInfo,
        frequency: Option<&DomainFrequency>,
    ) -> Bucket {
        self.try_classify(keyword, page_type, brand, frequency)
            .unwrap_or_else(|e| {
                warn!("Bucketing '{}' failed: {}", keyword.term, e);
                Bucket::General
            })
    }

    /// Partition keywords into sorted, capped buckets
    pub fn classify(
        &self,
        keywords: &[KeywordScore],
        page_type: PageType,
        brand: &BrandInfo,
        frequency: Option<&DomainFrequency>,
    ) -> KeywordBuckets {
        let mut buckets = KeywordBuckets::default();
        for keyword in dedup_terms(keywords) {
            let bucket = self.classify_keyword(&keyword, page_type, brand, frequency);
            buckets.get_mut(bucket).push(keyword);
        }
        for bucket in Bucket::ALL {
            let list = buckets.get_mut(bucket);
            sort_keywords(list);
            list.truncate(self.config.max_per_bucket);
        }
        buckets
    }
}

/// Collapse case variants of a term, keeping the highest score
fn dedup_terms(keywords: &[KeywordScore]) -> Vec<KeywordScore> {
    let mut order: Vec<String> = Vec::new();
    let mut best: HashMap<String, KeywordScore> = HashMap::new();
    for keyword in keywords {
        let key = normalize_term(&keyword.term);
        match best.get_mut(&key) {
            Some(existing) => {
                if keyword.score > existing.score {
                    existing.score = keyword.score;
                }
            }
            None => {
                order.push(key.clone());
                best.insert(key, keyword.clone());
            }
        }
    }
    order.into_iter().filter_map(|key| best.remove(&key)).collect()
}

//! Domain model for SEO analysis
//!
//! Records that flow through the pipeline:
//! - `UrlRecord` produced by sitemap discovery and ranked by the selector
//! - `ParsedPage` produced by the HTML parser
//! - `PageAnalysis` produced per page and reduced into a `DomainSummary`

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sitemap `<changefreq>` values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeFrequency {
    Always,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Never,
}

impl ChangeFrequency {
    /// Parse a changefreq value, ignoring case and surrounding whitespace
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "always" => Some(Self::Always),
            "hourly" => Some(Self::Hourly),
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            "yearly" => Some(Self::Yearly),
            "never" => Some(Self::Never),
            _ => None,
        }
    }
}

/// Path-derived URL category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlCategory {
    Product,
    Blog,
    Category,
    Landing,
    Other,
}

impl UrlCategory {
    /// Categories in precedence order (highest first)
    pub const ALL: [UrlCategory; 5] = [
        UrlCategory::Product,
        UrlCategory::Blog,
        UrlCategory::Category,
        UrlCategory::Landing,
        UrlCategory::Other,
    ];

    /// Precedence rank, 0 is highest
    pub fn rank(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Blog => "blog",
            Self::Category => "category",
            Self::Landing => "landing",
            Self::Other => "other",
        }
    }
}

/// A candidate URL with sitemap metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlRecord {
    pub url: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub change_frequency: Option<ChangeFrequency>,
    /// Sitemap priority in [0,1]
    pub priority: f64,
    /// Selection relevance in [0,1]
    pub relevance_score: f64,
    pub category: UrlCategory,
}

impl UrlRecord {
    /// Sitemap default priority
    pub const DEFAULT_PRIORITY: f64 = 0.5;

    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            last_modified: None,
            change_frequency: None,
            priority: Self::DEFAULT_PRIORITY,
            relevance_score: 0.5,
            category: UrlCategory::Other,
        }
    }

    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = clamp_unit(priority);
        self
    }

    pub fn with_last_modified(mut self, last_modified: Option<DateTime<Utc>>) -> Self {
        self.last_modified = last_modified;
        self
    }

    pub fn with_change_frequency(mut self, change_frequency: Option<ChangeFrequency>) -> Self {
        self.change_frequency = change_frequency;
        self
    }

    pub fn with_relevance(mut self, relevance: f64) -> Self {
        self.relevance_score = clamp_unit(relevance);
        self
    }

    pub fn with_category(mut self, category: UrlCategory) -> Self {
        self.category = category;
        self
    }
}

/// A scored keyword
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordScore {
    pub term: String,
    pub score: f64,
}

impl KeywordScore {
    /// Build a keyword score, clamping into [0,1]
    pub fn new(term: impl Into<String>, score: f64) -> Self {
        Self {
            term: term.into(),
            score: clamp_unit(score),
        }
    }
}

/// Sort keywords by score descending, ties broken by term
pub fn sort_keywords(keywords: &mut [KeywordScore]) {
    keywords.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.term.cmp(&b.term))
    });
}

/// Page type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageType {
    Ecommerce,
    Blog,
    Mixed,
}

impl PageType {
    pub const ALL: [PageType; 3] = [PageType::Ecommerce, PageType::Blog, PageType::Mixed];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ecommerce => "ecommerce",
            Self::Blog => "blog",
            Self::Mixed => "mixed",
        }
    }
}

/// Dominant search intent of a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Commercial,
    Consideration,
    Informational,
}

/// Brand signals detected on a page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrandInfo {
    pub name: Option<String>,
    pub domain: Option<String>,
    pub confidence: f64,
}

impl BrandInfo {
    pub fn from_domain(domain: impl Into<String>) -> Self {
        Self {
            name: None,
            domain: Some(domain.into()),
            confidence: 0.0,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>, confidence: f64) -> Self {
        self.name = Some(name.into());
        self.confidence = clamp_unit(confidence);
        self
    }
}

/// Keyword bucket identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Client,
    PageSpecific,
    General,
}

impl Bucket {
    pub const ALL: [Bucket; 3] = [Bucket::Client, Bucket::PageSpecific, Bucket::General];
}

/// Disjoint keyword buckets of a page (or a domain)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeywordBuckets {
    pub client: Vec<KeywordScore>,
    pub page_specific: Vec<KeywordScore>,
    pub general: Vec<KeywordScore>,
}

impl KeywordBuckets {
    pub fn get(&self, bucket: Bucket) -> &[KeywordScore] {
        match bucket {
            Bucket::Client => &self.client,
            Bucket::PageSpecific => &self.page_specific,
            Bucket::General => &self.general,
        }
    }

    pub fn get_mut(&mut self, bucket: Bucket) -> &mut Vec<KeywordScore> {
        match bucket {
            Bucket::Client => &mut self.client,
            Bucket::PageSpecific => &mut self.page_specific,
            Bucket::General => &mut self.general,
        }
    }

    pub fn len(&self) -> usize {
        self.client.len() + self.page_specific.len() + self.general.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate every keyword with its bucket
    pub fn iter(&self) -> impl Iterator<Item = (Bucket, &KeywordScore)> {
        Bucket::ALL
            .into_iter()
            .flat_map(move |bucket| self.get(bucket).iter().map(move |kw| (bucket, kw)))
    }
}

/// Page metadata from `<head>`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMeta {
    pub title: Option<String>,
    pub description: Option<String>,
    pub og_type: Option<String>,
    pub canonical: Option<String>,
    pub lang: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Headings {
    pub h1: Vec<String>,
    pub h2: Vec<String>,
    pub h3: Vec<String>,
}

impl Headings {
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.h1.iter().chain(self.h2.iter()).chain(self.h3.iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Links {
    pub internal: Vec<String>,
    pub external: Vec<String>,
}

/// Structured content of an HTML page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedPage {
    pub url: String,
    pub meta: PageMeta,
    pub headings: Headings,
    pub main_text: String,
    /// schema.org types from JSON-LD and microdata
    pub structured_types: BTreeSet<String>,
    /// Organization/Brand names declared in JSON-LD
    pub organization_names: Vec<String>,
    pub links: Links,
    pub word_count: usize,
}

impl ParsedPage {
    pub fn title(&self) -> &str {
        self.meta.title.as_deref().unwrap_or_default()
    }

    pub fn description(&self) -> &str {
        self.meta.description.as_deref().unwrap_or_default()
    }

    /// Main text plus title and description
    pub fn content_text(&self) -> String {
        format!("{} {} {}", self.main_text, self.title(), self.description())
    }

    /// Main text, title, description and every heading
    pub fn all_text(&self) -> String {
        let mut text = self.content_text();
        for heading in self.headings.iter() {
            text.push(' ');
            text.push_str(heading);
        }
        text
    }

    pub fn has_type(&self, schema_type: &str) -> bool {
        self.structured_types.contains(schema_type)
    }
}

/// Word and link statistics of a page
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PageStats {
    pub words: usize,
    pub reading_time_min: usize,
    pub internal_links: usize,
    pub external_links: usize,
}

/// Words read per minute
const READING_WPM: usize = 200;

impl PageStats {
    pub fn from_parsed(page: &ParsedPage) -> Self {
        let words = page.word_count;
        Self {
            words,
            reading_time_min: if words == 0 { 0 } else { words.div_ceil(READING_WPM) },
            internal_links: page.links.internal.len(),
            external_links: page.links.external.len(),
        }
    }
}

/// Full analysis of a single page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageAnalysis {
    pub url: String,
    pub title: Option<String>,
    pub language: Option<String>,
    pub page_type: PageType,
    pub audiences: BTreeSet<String>,
    pub intent: Intent,
    pub brand_info: BrandInfo,
    /// Every scored keyword, before bucketing
    pub keywords: Vec<KeywordScore>,
    pub keyword_buckets: KeywordBuckets,
    pub stats: PageStats,
    pub analyzed_at: DateTime<Utc>,
}

/// Domain-level reduction of page analyses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainSummary {
    pub total_urls: usize,
    pub counts_by_type: BTreeMap<PageType, usize>,
    pub top_keywords: KeywordBuckets,
}

impl DomainSummary {
    /// Zero summary with every page type present
    pub fn empty() -> Self {
        Self {
            total_urls: 0,
            counts_by_type: PageType::ALL.into_iter().map(|t| (t, 0)).collect(),
            top_keywords: KeywordBuckets::default(),
        }
    }
}

/// Clamp into [0,1], mapping NaN to 0
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_frequency_parse() {
        assert_eq!(ChangeFrequency::parse(" Weekly "), Some(ChangeFrequency::Weekly));
        assert_eq!(ChangeFrequency::parse("fortnightly"), None);
    }

    #[test]
    fn test_url_record_clamps() {
        let record = UrlRecord::new("https://example.com/")
            .with_priority(1.7)
            .with_relevance(f64::NAN);
        assert_eq!(record.priority, 1.0);
        assert_eq!(record.relevance_score, 0.0);
    }

    #[test]
    fn test_page_stats() {
        let page = ParsedPage {
            word_count: 401,
            links: Links {
                internal: vec!["a".into(), "b".into()],
                external: vec!["c".into()],
            },
            ..Default::default()
        };
        let stats = PageStats::from_parsed(&page);
        assert_eq!(stats.reading_time_min, 3);
        assert_eq!(stats.internal_links, 2);
        assert_eq!(stats.external_links, 1);
    }

    #[test]
    fn test_empty_summary_has_all_types() {
        let summary = DomainSummary::empty();
        assert_eq!(summary.counts_by_type.len(), 3);
        assert!(summary.counts_by_type.values().all(|&c| c == 0));
    }

    #[test]
    fn test_summary_serializes_type_keys() {
        let json = serde_json::to_value(DomainSummary::empty()).unwrap();
        assert_eq!(json["counts_by_type"]["ecommerce"], 0);
        assert!(json["top_keywords"]["page_specific"].is_array());
    }
}

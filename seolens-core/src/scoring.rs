//! Multi-factor keyword scoring
//!
//! A keyword's score is the weighted sum of five factors, each in [0,1]:
//! - **Frequency**: occurrence rate across the page text
//! - **TF-IDF**: weight in a single-document vectorization of the page
//! - **Co-occurrence**: presence in title, H1s and leading H2s
//! - **Title position**: how early the keyword appears in the title
//! - **Brand similarity**: overlap with the brand name or domain
//!
//! A factor that fails contributes 0 instead of failing the keyword.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::model::{clamp_unit, BrandInfo, KeywordScore, ParsedPage};
use crate::text::{count_sequence, is_stopword, normalize_term, tokenize};
use crate::weights::ScoringWeights;

/// Errors from an individual scoring factor
#[derive(Debug, Error, PartialEq)]
pub enum ScoringComponentError {
    #[error("Empty keyword")]
    EmptyKeyword,

    #[error("Factor '{factor}' produced a non-finite value")]
    NonFinite { factor: &'static str },
}

/// Leading H2s considered important
const IMPORTANT_H2: usize = 3;

/// Page text prepared once for scoring many keywords
#[derive(Debug, Clone)]
pub struct ScoringContext {
    tokens: Vec<String>,
    tfidf: HashMap<String, f64>,
    units: Vec<String>,
    title: String,
    brand: BrandInfo,
}

impl ScoringContext {
    pub fn new(page: &ParsedPage, brand: &BrandInfo) -> Self {
        let tokens = tokenize(&page.all_text());
        let tfidf = single_document_tfidf(&tokens);

        let mut units = Vec::new();
        units.push(page.title().to_lowercase());
        units.extend(page.headings.h1.iter().map(|h| h.to_lowercase()));
        units.extend(
            page.headings
                .h2
                .iter()
                .take(IMPORTANT_H2)
                .map(|h| h.to_lowercase()),
        );
        units.retain(|u| !u.trim().is_empty());

        Self {
            tokens,
            tfidf,
            units,
            title: page.title().to_lowercase(),
            brand: brand.clone(),
        }
    }
}

/// Per-factor breakdown of a keyword score
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub frequency: f64,
    pub tfidf: f64,
    pub cooccurrence: f64,
    pub title_position: f64,
    pub brand_similarity: f64,
    pub total: f64,
}

fn finite(factor: &'static str, value: f64) -> Result<f64, ScoringComponentError> {
    if value.is_finite() {
        Ok(clamp_unit(value))
    } else {
        Err(ScoringComponentError::NonFinite { factor })
    }
}

fn keyword_tokens(keyword: &str) -> Result<Vec<String>, ScoringComponentError> {
    let tokens = tokenize(keyword);
    if tokens.is_empty() {
        Err(ScoringComponentError::EmptyKeyword)
    } else {
        Ok(tokens)
    }
}

/// Occurrence rate mapped through `min(1, ln(1 + 100·freq))`
pub fn frequency_score(keyword: &str, tokens: &[String]) -> Result<f64, ScoringComponentError> {
    let needle = keyword_tokens(keyword)?;
    if tokens.is_empty() {
        return Ok(0.0);
    }
    let count = count_sequence(tokens, &needle);
    let freq = count as f64 / tokens.len() as f64;
    finite("frequency", (1.0 + 100.0 * freq).ln().min(1.0))
}

/// L2-normalized unigram and bigram counts over stopword-free tokens
///
/// With a single document every idf is 1, so the weights reduce to
/// normalized term counts.
pub fn single_document_tfidf(tokens: &[String]) -> HashMap<String, f64> {
    let content: Vec<&str> = tokens
        .iter()
        .map(String::as_str)
        .filter(|t| !is_stopword(t))
        .collect();

    let mut counts: HashMap<String, f64> = HashMap::new();
    for token in &content {
        *counts.entry((*token).to_string()).or_default() += 1.0;
    }
    for pair in content.windows(2) {
        *counts.entry(format!("{} {}", pair[0], pair[1])).or_default() += 1.0;
    }

    let norm = counts.values().map(|c| c * c).sum::<f64>().sqrt();
    if norm > 0.0 {
        for value in counts.values_mut() {
            *value /= norm;
        }
    }
    counts
}

/// Best tf-idf weight among features containing, or contained in, the keyword
pub fn tfidf_score(
    keyword: &str,
    tfidf: &HashMap<String, f64>,
) -> Result<f64, ScoringComponentError> {
    let needle = keyword_tokens(keyword)?.join(" ");
    let best = tfidf
        .iter()
        .filter(|(feature, _)| feature.contains(&needle) || needle.contains(feature.as_str()))
        .map(|(_, weight)| *weight)
        .fold(0.0, f64::max);
    finite("tfidf", best)
}

/// Fraction of important heading units containing the keyword
pub fn cooccurrence_score(keyword: &str, units: &[String]) -> Result<f64, ScoringComponentError> {
    let needle = normalize_term(keyword);
    if needle.is_empty() {
        return Err(ScoringComponentError::EmptyKeyword);
    }
    if units.is_empty() {
        return Ok(0.0);
    }
    let hits = units.iter().filter(|u| u.contains(&needle)).count();
    finite("cooccurrence", hits as f64 / units.len() as f64)
}

/// `1 − offset/len` for the first occurrence in the title, 0 if absent
pub fn title_position_score(keyword: &str, title: &str) -> Result<f64, ScoringComponentError> {
    let needle = normalize_term(keyword);
    if needle.is_empty() {
        return Err(ScoringComponentError::EmptyKeyword);
    }
    let title = title.to_lowercase();
    let Some(byte_offset) = title.find(&needle) else {
        return Ok(0.0);
    };
    let offset = title[..byte_offset].chars().count();
    let len = title.chars().count();
    finite("title_position", 1.0 - offset as f64 / len as f64)
}

/// First label of a domain with any `www.` prefix removed
pub fn domain_label(domain: &str) -> &str {
    let domain = domain.strip_prefix("www.").unwrap_or(domain);
    domain.split('.').next().unwrap_or(domain)
}

/// Similarity of the keyword to the brand name and domain
pub fn brand_similarity_score(
    keyword: &str,
    brand: &BrandInfo,
) -> Result<f64, ScoringComponentError> {
    let needle = normalize_term(keyword);
    if needle.is_empty() {
        return Err(ScoringComponentError::EmptyKeyword);
    }

    let mut best: f64 = 0.0;

    if let Some(name) = brand.name.as_deref().map(normalize_term).filter(|n| !n.is_empty()) {
        let name_score = if needle == name {
            1.0
        } else if name.contains(&needle) || needle.contains(&name) {
            0.7
        } else if needle
            .split(' ')
            .any(|word| name.split(' ').any(|n| n == word))
        {
            0.5
        } else {
            0.0
        };
        best = best.max(name_score);
    }

    if let Some(domain) = brand.domain.as_deref().map(str::to_lowercase) {
        let domain = domain.strip_prefix("www.").unwrap_or(&domain).to_string();
        let label = domain_label(&domain);
        if !label.is_empty() {
            let domain_score = if needle == label || needle == domain {
                0.8
            } else if label.contains(&needle) || needle.contains(label) {
                0.6
            } else {
                0.0
            };
            best = best.max(domain_score);
        }
    }

    finite("brand_similarity", best)
}

/// Weighted composite scorer
#[derive(Debug, Clone, Copy)]
pub struct KeywordScorer {
    weights: ScoringWeights,
}

impl KeywordScorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Score one keyword against a prepared page
    pub fn breakdown(&self, keyword: &str, ctx: &ScoringContext) -> ScoreBreakdown {
        let factor = |name: &str, result: Result<f64, ScoringComponentError>| match result {
            Ok(value) => value,
            Err(e) => {
                debug!("Scoring factor {} failed for '{}': {}", name, keyword, e);
                0.0
            }
        };

        let frequency = factor("frequency", frequency_score(keyword, &ctx.tokens));
        let tfidf = factor("tfidf", tfidf_score(keyword, &ctx.tfidf));
        let cooccurrence = factor("cooccurrence", cooccurrence_score(keyword, &ctx.units));
        let title_position = factor("title_position", title_position_score(keyword, &ctx.title));
        let brand_similarity = factor(
            "brand_similarity",
            brand_similarity_score(keyword, &ctx.brand),
        );

        let w = &self.weights;
        let total = clamp_unit(
            w.frequency * frequency
                + w.tfidf * tfidf
                + w.cooccurrence * cooccurrence
                + w.title_position * title_position
                + w.brand_similarity * brand_similarity,
        );

        ScoreBreakdown {
            frequency,
            tfidf,
            cooccurrence,
            title_position,
            brand_similarity,
            total,
        }
    }

    pub fn score(&self, keyword: &str, ctx: &ScoringContext) -> f64 {
        self.breakdown(keyword, ctx).total
    }

    /// Score every term, preserving input order
    pub fn score_all<'a, I>(&self, terms: I, ctx: &ScoringContext) -> Vec<KeywordScore>
    where
        I: IntoIterator<Item = &'a str>,
    {
        terms
            .into_iter()
            .map(|term| KeywordScore::new(term, self.score(term, ctx)))
            .collect()
    }
}

/// Score a single keyword against a page
pub fn score(
    keyword: &str,
    page: &ParsedPage,
    brand: &BrandInfo,
    weights: &ScoringWeights,
) -> f64 {
    let ctx = ScoringContext::new(page, brand);
    KeywordScorer::new(*weights).score(keyword, &ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Headings, PageMeta};

    fn sample_page() -> ParsedPage {
        ParsedPage {
            url: "https://example.com/laptops".into(),
            meta: PageMeta {
                title: Some("Gaming Laptop Deals | Example".into()),
                description: Some("The best gaming laptop offers".into()),
                ..Default::default()
            },
            headings: Headings {
                h1: vec!["Gaming laptop deals".into()],
                h2: vec!["Cheap laptops".into(), "Accessories".into()],
                h3: vec![],
            },
            main_text: "A gaming laptop needs a strong GPU. Every gaming laptop here ships fast."
                .into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_brand_domain_exact() {
        let brand = BrandInfo::from_domain("example.com");
        assert_eq!(brand_similarity_score("example", &brand), Ok(0.8));
        assert_eq!(brand_similarity_score("unrelated", &brand), Ok(0.0));
    }

    #[test]
    fn test_brand_name_levels() {
        let brand = BrandInfo::from_domain("www.acme.io").with_name("Acme Tools", 0.8);
        assert_eq!(brand_similarity_score("acme tools", &brand), Ok(1.0));
        assert_eq!(brand_similarity_score("tools", &brand), Ok(0.7));
        assert_eq!(brand_similarity_score("power tools", &brand), Ok(0.5));
        assert_eq!(brand_similarity_score("acme", &brand), Ok(0.8));
    }

    #[test]
    fn test_title_position() {
        let title = "gaming laptop deals";
        assert_eq!(title_position_score("gaming", title), Ok(1.0));
        let score = title_position_score("deals", title).unwrap();
        assert!((score - (1.0 - 14.0 / 19.0)).abs() < 1e-9);
        assert_eq!(title_position_score("phone", title), Ok(0.0));
    }

    #[test]
    fn test_frequency_multiword() {
        let tokens = tokenize("gaming laptop gaming laptop desk");
        let score = frequency_score("gaming laptop", &tokens).unwrap();
        // 2 matches over 5 tokens
        assert!((score - 1.0_f64.min((1.0 + 40.0_f64).ln())).abs() < 1e-9);
        assert_eq!(frequency_score("   ", &tokens), Err(ScoringComponentError::EmptyKeyword));
    }

    #[test]
    fn test_cooccurrence() {
        let units = vec!["gaming laptop deals".to_string(), "accessories".to_string()];
        assert_eq!(cooccurrence_score("Laptop", &units), Ok(0.5));
        assert_eq!(cooccurrence_score("laptop", &[]), Ok(0.0));
    }

    #[test]
    fn test_tfidf_prefers_frequent_terms() {
        let tokens = tokenize("laptop laptop laptop desk chair");
        let model = single_document_tfidf(&tokens);
        let laptop = tfidf_score("laptop", &model).unwrap();
        let chair = tfidf_score("chair", &model).unwrap();
        assert!(laptop > chair);
        assert_eq!(tfidf_score("monitor", &model), Ok(0.0));
    }

    #[test]
    fn test_scores_in_unit_interval() {
        let page = sample_page();
        let brand = BrandInfo::from_domain("example.com").with_name("Example", 0.3);
        let weights = ScoringWeights::default();
        for kw in ["gaming laptop", "example", "gpu", "nothing here", "", "laptop"] {
            let s = score(kw, &page, &brand, &weights);
            assert!((0.0..=1.0).contains(&s), "{} scored {}", kw, s);
        }
    }

    #[test]
    fn test_failing_factor_counts_as_zero() {
        let page = sample_page();
        let ctx = ScoringContext::new(&page, &BrandInfo::default());
        let breakdown = KeywordScorer::new(ScoringWeights::default()).breakdown("!!", &ctx);
        assert_eq!(breakdown.total, 0.0);
    }

    #[test]
    fn test_relevant_keyword_outranks_unrelated() {
        let page = sample_page();
        let brand = BrandInfo::from_domain("example.com");
        let ctx = ScoringContext::new(&page, &brand);
        let scorer = KeywordScorer::new(ScoringWeights::default());
        assert!(scorer.score("gaming laptop", &ctx) > scorer.score("gpu", &ctx));
    }
}

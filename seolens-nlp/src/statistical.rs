//! Statistical keyword provider
//!
//! Unsupervised, single-document keyword scoring in the style of YAKE.
//! Each non-stopword token gets a weight from:
//! - frequency, normalized by the mean and deviation of all term frequencies
//! - position of the sentences it occurs in (earlier is better)
//! - relatedness to its context (many distinct neighbours suggests a
//!   function word rather than a topic)
//! - dispersion across sentences
//!
//! Candidate phrases combine their tokens' weights; lower is better and is
//! mapped to `1 / (1 + s)` so that higher means more relevant.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use seolens_core::{is_stopword, split_sentences};

use crate::traits::{KeywordCandidate, KeywordProvider, ProviderError};

/// Statistical provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticalConfig {
    /// Longest candidate phrase, in words
    pub max_ngram: usize,
    /// Candidates more similar than this to a better one are dropped
    pub dedup_threshold: f64,
    pub top_n: usize,
}

impl Default for StatisticalConfig {
    fn default() -> Self {
        Self {
            max_ngram: 2,
            dedup_threshold: 0.7,
            top_n: 30,
        }
    }
}

#[derive(Debug, Default)]
struct TermStats {
    tf: usize,
    sentences: Vec<usize>,
    left: Vec<String>,
    right: Vec<String>,
}

/// Lowercase words of a sentence
fn words(sentence: &str) -> Vec<String> {
    sentence
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn ignorable(word: &str) -> bool {
    word.chars().count() < 2 || is_stopword(word) || word.chars().all(|c| c.is_ascii_digit())
}

fn distinct_ratio(context: &[String]) -> f64 {
    if context.is_empty() {
        return 0.0;
    }
    let distinct: HashSet<&String> = context.iter().collect();
    distinct.len() as f64 / context.len() as f64
}

fn median(values: &[usize]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.is_empty() {
        0.0
    } else if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) as f64 / 2.0
    } else {
        sorted[mid] as f64
    }
}

/// Levenshtein-based similarity in [0,1]
fn sequence_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0; b.len() + 1];
    for i in 1..=a.len() {
        cur[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            cur[j] = (prev[j] + 1).min(cur[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut cur);
    }

    1.0 - prev[b.len()] as f64 / longest as f64
}

/// YAKE-style keyword provider
#[derive(Debug, Clone, Default)]
pub struct StatisticalProvider {
    config: StatisticalConfig,
}

impl StatisticalProvider {
    pub fn new(config: StatisticalConfig) -> Self {
        Self { config }
    }

    /// Ranked candidates, lowest weight first
    pub fn rank(&self, text: &str) -> Vec<(String, f64)> {
        let sentences: Vec<Vec<String>> = split_sentences(text)
            .into_iter()
            .map(words)
            .filter(|w| !w.is_empty())
            .collect();
        if sentences.is_empty() {
            return Vec::new();
        }

        let mut stats: HashMap<&str, TermStats> = HashMap::new();
        for (index, sentence) in sentences.iter().enumerate() {
            for (pos, word) in sentence.iter().enumerate() {
                if ignorable(word) {
                    continue;
                }
                let entry = stats.entry(word.as_str()).or_default();
                entry.tf += 1;
                if entry.sentences.last() != Some(&index) {
                    entry.sentences.push(index);
                }
                if pos > 0 {
                    entry.left.push(sentence[pos - 1].clone());
                }
                if let Some(next) = sentence.get(pos + 1) {
                    entry.right.push(next.clone());
                }
            }
        }
        if stats.is_empty() {
            return Vec::new();
        }

        let tfs: Vec<f64> = stats.values().map(|s| s.tf as f64).collect();
        let mean = tfs.iter().sum::<f64>() / tfs.len() as f64;
        let std = (tfs.iter().map(|tf| (tf - mean).powi(2)).sum::<f64>() / tfs.len() as f64).sqrt();
        let max_tf = tfs.iter().cloned().fold(0.0, f64::max);
        let total_sentences = sentences.len() as f64;

        let weights: HashMap<&str, f64> = stats
            .iter()
            .map(|(&term, s)| {
                let tf = s.tf as f64;
                let freq = tf / (mean + std);
                let position = (3.0 + median(&s.sentences)).ln().ln();
                let related =
                    1.0 + (distinct_ratio(&s.left) + distinct_ratio(&s.right)) * (tf / max_tf);
                let dispersion = s.sentences.len() as f64 / total_sentences;
                let weight = (related * position) / (freq / related + dispersion / related);
                (term, weight)
            })
            .collect();

        // Candidate phrases and their occurrence counts
        let mut order: Vec<Vec<String>> = Vec::new();
        let mut counts: HashMap<Vec<String>, usize> = HashMap::new();
        for sentence in &sentences {
            for n in 1..=self.config.max_ngram.max(1) {
                for window in sentence.windows(n) {
                    let (Some(first), Some(last)) = (window.first(), window.last()) else {
                        continue;
                    };
                    if ignorable(first) || ignorable(last) {
                        continue;
                    }
                    let count = counts.entry(window.to_vec()).or_insert(0);
                    if *count == 0 {
                        order.push(window.to_vec());
                    }
                    *count += 1;
                }
            }
        }

        let mut scored: Vec<(String, f64)> = order
            .into_iter()
            .map(|phrase| {
                let tf = counts.get(&phrase).copied().unwrap_or(1) as f64;
                let mut product = 1.0;
                let mut sum = 0.0;
                for word in &phrase {
                    if let Some(&w) = weights.get(word.as_str()) {
                        product *= w;
                        sum += w;
                    }
                }
                (phrase.join(" "), product / (tf * (1.0 + sum)))
            })
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        let mut kept: Vec<(String, f64)> = Vec::new();
        for (term, weight) in scored {
            if kept.len() >= self.config.top_n {
                break;
            }
            let duplicate = kept
                .iter()
                .any(|(k, _)| sequence_similarity(k, &term) > self.config.dedup_threshold);
            if !duplicate {
                kept.push((term, weight));
            }
        }
        kept
    }
}

#[async_trait]
impl KeywordProvider for StatisticalProvider {
    fn name(&self) -> &str {
        "statistical"
    }

    async fn extract(&self, text: &str) -> Result<Vec<KeywordCandidate>, ProviderError> {
        let candidates: Vec<KeywordCandidate> = self
            .rank(text)
            .into_iter()
            .map(|(term, weight)| KeywordCandidate::new(term, 1.0 / (1.0 + weight)))
            .collect();
        debug!("Statistical provider extracted {} keywords", candidates.len());
        Ok(candidates)
    }
}

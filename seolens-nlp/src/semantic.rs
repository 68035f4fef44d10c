//! Semantic keyword provider
//!
//! KeyBERT-style extraction: candidate phrases are embedded together with the
//! whole document and ranked by cosine similarity to it. Maximal Marginal
//! Relevance then trades similarity against redundancy among the picks.
//!
//! Only the most frequent phrases are embedded, and embedding requests are
//! split into batches so remote endpoints stay within their input limits.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use seolens_core::{clamp_unit, is_stopword, split_sentences, tokenize};

use crate::traits::{
    cosine_similarity, EmbedError, KeywordCandidate, KeywordProvider, ProviderError,
    SharedEmbedder,
};

/// Semantic provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticConfig {
    pub max_ngram: usize,
    /// 0 = pure relevance, 1 = pure diversity
    pub diversity: f64,
    /// Candidates considered by MMR
    pub nr_candidates: usize,
    pub top_n: usize,
    /// Most frequent phrases sent to the embedder
    pub max_embedded_phrases: usize,
    /// Inputs per embedding request
    pub embed_batch_size: usize,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            max_ngram: 2,
            diversity: 0.5,
            nr_candidates: 50,
            top_n: 30,
            max_embedded_phrases: 200,
            embed_batch_size: 64,
        }
    }
}

fn usable(token: &str) -> bool {
    !is_stopword(token) && !token.chars().all(|c| c.is_ascii_digit())
}

/// Stopword-free n-grams in order of first appearance, with occurrence counts
pub fn phrase_counts(text: &str, max_ngram: usize) -> Vec<(String, usize)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<(String, usize)> = Vec::new();

    for sentence in split_sentences(text) {
        let tokens = tokenize(sentence);
        for n in 1..=max_ngram.max(1) {
            for window in tokens.windows(n) {
                if !window.iter().all(|t| usable(t)) {
                    continue;
                }
                let phrase = window.join(" ");
                match index.get(&phrase) {
                    Some(&i) => counts[i].1 += 1,
                    None => {
                        index.insert(phrase.clone(), counts.len());
                        counts.push((phrase, 1));
                    }
                }
            }
        }
    }

    counts
}

/// Stopword-free n-grams in order of first appearance
pub fn candidate_phrases(text: &str, max_ngram: usize) -> Vec<String> {
    phrase_counts(text, max_ngram)
        .into_iter()
        .map(|(phrase, _)| phrase)
        .collect()
}

/// The `limit` most frequent phrases; ties keep first-appearance order
pub fn frequent_phrases(text: &str, max_ngram: usize, limit: usize) -> Vec<String> {
    let mut counts = phrase_counts(text, max_ngram);
    // stable sort keeps first appearance among equal counts
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.truncate(limit);
    counts.into_iter().map(|(phrase, _)| phrase).collect()
}

/// Maximal Marginal Relevance selection
///
/// `doc_sims[i]` is candidate i's similarity to the document. Returns picked
/// indices in selection order.
pub fn mmr(doc_sims: &[f64], vectors: &[Vec<f32>], top_n: usize, diversity: f64) -> Vec<usize> {
    if top_n == 0 {
        return Vec::new();
    }
    let Some(first) = (0..doc_sims.len()).max_by(|&a, &b| doc_sims[a].total_cmp(&doc_sims[b]))
    else {
        return Vec::new();
    };

    let mut picked = vec![first];
    let mut remaining: Vec<usize> = (0..doc_sims.len()).filter(|&i| i != first).collect();

    while picked.len() < top_n && !remaining.is_empty() {
        let mut best: Option<(usize, f64)> = None;
        for (slot, &candidate) in remaining.iter().enumerate() {
            let redundancy = picked
                .iter()
                .map(|&p| cosine_similarity(&vectors[candidate], &vectors[p]))
                .fold(f64::MIN, f64::max);
            let value = (1.0 - diversity) * doc_sims[candidate] - diversity * redundancy;
            if best.map_or(true, |(_, v)| value > v) {
                best = Some((slot, value));
            }
        }
        let Some((slot, _)) = best else {
            break;
        };
        picked.push(remaining.remove(slot));
    }

    picked
}

/// Embedding-similarity keyword provider
pub struct SemanticProvider {
    embedder: SharedEmbedder,
    config: SemanticConfig,
}

impl SemanticProvider {
    pub fn new(embedder: SharedEmbedder, config: SemanticConfig) -> Self {
        Self { embedder, config }
    }

    /// Embed `inputs` in request-sized batches, preserving order
    async fn embed_batched(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let batch_size = self.config.embed_batch_size.max(1);
        let mut vectors = Vec::with_capacity(inputs.len());
        for batch in inputs.chunks(batch_size) {
            let embedded = self.embedder.embed(batch).await?;
            if embedded.len() != batch.len() {
                return Err(EmbedError::CountMismatch {
                    expected: batch.len(),
                    got: embedded.len(),
                }
                .into());
            }
            vectors.extend(embedded);
        }
        Ok(vectors)
    }
}

#[async_trait]
impl KeywordProvider for SemanticProvider {
    fn name(&self) -> &str {
        "semantic"
    }

    async fn extract(&self, text: &str) -> Result<Vec<KeywordCandidate>, ProviderError> {
        let phrases =
            frequent_phrases(text, self.config.max_ngram, self.config.max_embedded_phrases);
        if phrases.is_empty() {
            return Ok(Vec::new());
        }

        let mut inputs = Vec::with_capacity(phrases.len() + 1);
        inputs.push(text.to_string());
        inputs.extend(phrases.iter().cloned());
        let vectors = self.embed_batched(&inputs).await?;
        let Some((document, phrase_vectors)) = vectors.split_first() else {
            return Ok(Vec::new());
        };

        let mut ranked: Vec<(usize, f64)> = phrase_vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, cosine_similarity(document, v)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(self.config.nr_candidates);

        let sims: Vec<f64> = ranked.iter().map(|(_, s)| *s).collect();
        let pool: Vec<Vec<f32>> = ranked
            .iter()
            .map(|(i, _)| phrase_vectors[*i].clone())
            .collect();

        let candidates: Vec<KeywordCandidate> =
            mmr(&sims, &pool, self.config.top_n, self.config.diversity)
                .into_iter()
                .map(|k| KeywordCandidate::new(phrases[ranked[k].0].clone(), clamp_unit(sims[k])))
                .collect();

        debug!(
            "Semantic provider ({}) extracted {} keywords",
            self.embedder.name(),
            candidates.len()
        );
        Ok(candidates)
    }
}

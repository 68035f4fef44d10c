//! Extraction fusion
//!
//! Runs every keyword provider concurrently over the same text and merges
//! their outputs:
//! 1. Exact merge by case-normalized term (scores averaged, sources unioned)
//! 2. Semantic merge: near-duplicate terms collapse to the better-scored one
//! 3. Sort by score and truncate

use std::collections::HashMap;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use seolens_core::{clamp_unit, normalize_term, normalize_text, KeywordScore};

use crate::traits::{cosine_similarity, KeywordCandidate, SharedEmbedder, SharedProvider};

/// Fusion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Texts shorter than this (after trimming) yield no keywords
    pub min_text_len: usize,
    pub max_keywords: usize,
    /// Cosine similarity at which two terms count as duplicates
    pub similarity_threshold: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            min_text_len: 50,
            max_keywords: 50,
            similarity_threshold: 0.85,
        }
    }
}

/// A merged keyword with the providers that proposed it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedKeyword {
    pub term: String,
    pub score: f64,
    pub sources: Vec<String>,
}

impl From<FusedKeyword> for KeywordScore {
    fn from(keyword: FusedKeyword) -> Self {
        KeywordScore::new(keyword.term, keyword.score)
    }
}

fn by_score(a: &FusedKeyword, b: &FusedKeyword) -> std::cmp::Ordering {
    b.score.total_cmp(&a.score)
}

/// Merge provider outputs by case-normalized term
///
/// Groups keep the first-seen spelling; scores are averaged over every
/// occurrence.
pub fn exact_merge(outputs: &[(String, Vec<KeywordCandidate>)]) -> Vec<FusedKeyword> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, (String, Vec<f64>, Vec<String>)> = HashMap::new();

    for (source, candidates) in outputs {
        for candidate in candidates {
            let key = normalize_term(&candidate.term);
            if key.is_empty() {
                continue;
            }
            let group = groups.entry(key.clone()).or_insert_with(|| {
                order.push(key);
                (candidate.term.trim().to_string(), Vec::new(), Vec::new())
            });
            group.1.push(clamp_unit(candidate.raw_score));
            if !group.2.contains(source) {
                group.2.push(source.clone());
            }
        }
    }

    order
        .into_iter()
        .filter_map(|key| groups.remove(&key))
        .map(|(term, scores, mut sources)| {
            sources.sort();
            FusedKeyword {
                term,
                score: scores.iter().sum::<f64>() / scores.len() as f64,
                sources,
            }
        })
        .collect()
}

/// Collapse near-duplicate terms given their embeddings
///
/// Each pair at or above `threshold` keeps the higher-scoring term (the
/// earlier one on ties); removed terms take no further part.
pub fn dedup_by_vectors(
    keywords: Vec<FusedKeyword>,
    vectors: &[Vec<f32>],
    threshold: f64,
) -> Vec<FusedKeyword> {
    let n = keywords.len();
    let mut removed = vec![false; n];

    for i in 0..n {
        if removed[i] {
            continue;
        }
        for j in (i + 1)..n {
            if removed[j] {
                continue;
            }
            if cosine_similarity(&vectors[i], &vectors[j]) >= threshold {
                if keywords[i].score >= keywords[j].score {
                    removed[j] = true;
                } else {
                    removed[i] = true;
                    break;
                }
            }
        }
    }

    keywords
        .into_iter()
        .zip(removed)
        .filter_map(|(kw, gone)| (!gone).then_some(kw))
        .collect()
}

/// Concurrent multi-provider keyword extraction
pub struct FusionEngine {
    providers: Vec<SharedProvider>,
    embedder: Option<SharedEmbedder>,
    config: FusionConfig,
}

impl FusionEngine {
    pub fn new(
        providers: Vec<SharedProvider>,
        embedder: Option<SharedEmbedder>,
        config: FusionConfig,
    ) -> Self {
        Self {
            providers,
            embedder,
            config,
        }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Drop semantic near-duplicates; embedding failures keep the input
    pub async fn semantic_dedup(&self, keywords: Vec<FusedKeyword>) -> Vec<FusedKeyword> {
        let Some(embedder) = &self.embedder else {
            return keywords;
        };
        if keywords.len() <= 1 {
            return keywords;
        }

        let terms: Vec<String> = keywords.iter().map(|k| k.term.clone()).collect();
        let vectors = match embedder.embed(&terms).await {
            Ok(vectors) if vectors.len() == terms.len() => vectors,
            Ok(vectors) => {
                warn!(
                    "Embedder {} returned {} vectors for {} terms, skipping dedup",
                    embedder.name(),
                    vectors.len(),
                    terms.len()
                );
                return keywords;
            }
            Err(e) => {
                warn!("Semantic dedup skipped: {}", e);
                return keywords;
            }
        };

        let before = keywords.len();
        let kept = dedup_by_vectors(keywords, &vectors, self.config.similarity_threshold);
        debug!("Semantic dedup: {} -> {} keywords", before, kept.len());
        kept
    }

    /// Extract, merge and rank keywords from `text`
    pub async fn extract(&self, text: &str) -> Vec<FusedKeyword> {
        if text.trim().chars().count() < self.config.min_text_len {
            debug!("Text too short for keyword extraction");
            return Vec::new();
        }
        let normalized = normalize_text(text);
        let normalized = normalized.as_str();

        let outputs: Vec<(String, Vec<KeywordCandidate>)> = join_all(
            self.providers
                .iter()
                .map(|provider| async move {
                    let candidates = match provider.extract(normalized).await {
                        Ok(candidates) => candidates,
                        Err(e) => {
                            warn!("Provider {} failed: {}", provider.name(), e);
                            Vec::new()
                        }
                    };
                    (provider.name().to_string(), candidates)
                }),
        )
        .await;

        let merged = exact_merge(&outputs);
        let mut keywords = self.semantic_dedup(merged).await;
        keywords.sort_by(by_score);
        keywords.truncate(self.config.max_keywords);

        info!(
            "Extracted {} keywords from {} characters",
            keywords.len(),
            text.len()
        );
        keywords
    }

    /// Extracted keywords as plain scored terms
    pub async fn extract_keywords(&self, text: &str) -> Vec<KeywordScore> {
        self.extract(text)
            .await
            .into_iter()
            .map(KeywordScore::from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{EmbedError, Embedder, KeywordProvider, ProviderError};
    use async_trait::async_trait;
    use std::sync::Arc;

    const TEXT: &str = "Laptop reviews and buying advice for every budget and every need.";

    struct FixedProvider {
        name: &'static str,
        keywords: Vec<(&'static str, f64)>,
    }

    #[async_trait]
    impl KeywordProvider for FixedProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn extract(&self, _text: &str) -> Result<Vec<KeywordCandidate>, ProviderError> {
            Ok(self
                .keywords
                .iter()
                .map(|(t, s)| KeywordCandidate::new(*t, *s))
                .collect())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl KeywordProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        async fn extract(&self, _text: &str) -> Result<Vec<KeywordCandidate>, ProviderError> {
            Err(ProviderError::Failed {
                provider: "failing".to_string(),
                reason: "model unavailable".to_string(),
            })
        }
    }

    /// Looks terms up in a fixed table, unknown terms get a unique axis
    struct TableEmbedder(Vec<(&'static str, Vec<f32>)>);

    #[async_trait]
    impl Embedder for TableEmbedder {
        fn name(&self) -> &str {
            "table"
        }

        fn dimensions(&self) -> usize {
            8
        }

        async fn embed(&self, terms: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
            Ok(terms
                .iter()
                .enumerate()
                .map(|(i, term)| {
                    self.0
                        .iter()
                        .find(|(t, _)| t == term)
                        .map(|(_, v)| v.clone())
                        .unwrap_or_else(|| {
                            let mut v = vec![0.0; 8];
                            v[2 + i % 6] = 1.0;
                            v
                        })
                })
                .collect())
        }
    }

    struct BrokenEmbedder;

    #[async_trait]
    impl Embedder for BrokenEmbedder {
        fn name(&self) -> &str {
            "broken"
        }

        fn dimensions(&self) -> usize {
            0
        }

        async fn embed(&self, _terms: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
            Err(EmbedError::Api("connection refused".to_string()))
        }
    }

    fn provider(name: &'static str, keywords: Vec<(&'static str, f64)>) -> SharedProvider {
        Arc::new(FixedProvider { name, keywords })
    }

    fn laptop_embedder() -> SharedEmbedder {
        let similar = (1.0f32 - 0.95 * 0.95).sqrt();
        Arc::new(TableEmbedder(vec![
            ("best laptop", vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
            ("top laptop", vec![0.95, similar, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
        ]))
    }

    #[tokio::test]
    async fn test_exact_merge_averages_shared_terms() {
        let engine = FusionEngine::new(
            vec![
                provider("statistical", vec![("laptop", 0.8), ("battery", 0.4)]),
                provider("semantic", vec![("Laptop", 0.6)]),
            ],
            None,
            FusionConfig::default(),
        );

        let keywords = engine.extract(TEXT).await;
        assert_eq!(keywords.len(), 2);
        assert_eq!(keywords[0].term, "laptop");
        assert!((keywords[0].score - 0.7).abs() < 1e-9);
        assert_eq!(keywords[0].sources, vec!["semantic", "statistical"]);
        assert_eq!(keywords[1].sources, vec!["statistical"]);
    }

    #[tokio::test]
    async fn test_semantic_duplicates_collapse() {
        let engine = FusionEngine::new(
            vec![provider(
                "semantic",
                vec![("top laptop", 0.85), ("best laptop", 0.9), ("battery", 0.5)],
            )],
            Some(laptop_embedder()),
            FusionConfig::default(),
        );

        let keywords = engine.extract(TEXT).await;
        let terms: Vec<&str> = keywords.iter().map(|k| k.term.as_str()).collect();
        assert_eq!(terms, vec!["best laptop", "battery"]);
    }

    #[tokio::test]
    async fn test_semantic_dedup_is_idempotent() {
        let engine = FusionEngine::new(Vec::new(), Some(laptop_embedder()), FusionConfig::default());
        let input = vec![
            FusedKeyword {
                term: "best laptop".to_string(),
                score: 0.9,
                sources: vec!["a".to_string()],
            },
            FusedKeyword {
                term: "top laptop".to_string(),
                score: 0.85,
                sources: vec!["a".to_string()],
            },
            FusedKeyword {
                term: "battery".to_string(),
                score: 0.4,
                sources: vec!["a".to_string()],
            },
        ];

        let once = engine.semantic_dedup(input).await;
        let twice = engine.semantic_dedup(once.clone()).await;
        assert_eq!(once, twice);
        assert_eq!(once.len(), 2);
    }

    #[tokio::test]
    async fn test_short_text_yields_nothing() {
        let engine = FusionEngine::new(
            vec![provider("statistical", vec![("laptop", 0.8)])],
            None,
            FusionConfig::default(),
        );
        assert!(engine.extract("   short text   ").await.is_empty());
        assert!(engine.extract("").await.is_empty());
    }

    #[tokio::test]
    async fn test_provider_failure_is_isolated() {
        let failing: SharedProvider = Arc::new(FailingProvider);
        let engine = FusionEngine::new(
            vec![failing, provider("statistical", vec![("laptop", 0.8)])],
            Some(Arc::new(BrokenEmbedder)),
            FusionConfig::default(),
        );

        let keywords = engine.extract_keywords(TEXT).await;
        assert_eq!(keywords.len(), 1);
        assert_eq!(keywords[0].term, "laptop");
    }

    #[tokio::test]
    async fn test_truncates_to_max_keywords() {
        let engine = FusionEngine::new(
            vec![provider(
                "statistical",
                vec![("a1", 0.1), ("b2", 0.9), ("c3", 0.5), ("d4", 0.7)],
            )],
            None,
            FusionConfig {
                max_keywords: 2,
                ..Default::default()
            },
        );
        let terms: Vec<String> = engine.extract(TEXT).await.into_iter().map(|k| k.term).collect();
        assert_eq!(terms, vec!["b2", "d4"]);
    }
}

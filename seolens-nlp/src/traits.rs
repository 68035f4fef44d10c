//! Common traits for keyword providers and embedders

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from keyword providers
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbedError),

    #[error("Provider {provider} failed: {reason}")]
    Failed { provider: String, reason: String },
}

/// Errors from embedders
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Expected {expected} vectors, got {got}")]
    CountMismatch { expected: usize, got: usize },
}

/// A raw keyword candidate as scored by one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordCandidate {
    pub term: String,
    pub raw_score: f64,
}

impl KeywordCandidate {
    pub fn new(term: impl Into<String>, raw_score: f64) -> Self {
        Self {
            term: term.into(),
            raw_score,
        }
    }
}

/// A keyword extraction strategy
#[async_trait]
pub trait KeywordProvider: Send + Sync {
    /// Source tag recorded on fused keywords
    fn name(&self) -> &str;

    /// Extract scored candidates; empty or very short text yields an empty list
    async fn extract(&self, text: &str) -> Result<Vec<KeywordCandidate>, ProviderError>;
}

/// Maps terms to fixed-size vectors
#[async_trait]
pub trait Embedder: Send + Sync {
    fn name(&self) -> &str;

    fn dimensions(&self) -> usize;

    /// One vector per input term, in input order
    async fn embed(&self, terms: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;
}

pub type SharedProvider = Arc<dyn KeywordProvider>;
pub type SharedEmbedder = Arc<dyn Embedder>;

/// Cosine similarity; zero vectors are dissimilar to everything
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

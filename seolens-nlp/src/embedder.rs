//! Term embedders
//!
//! Supports a deterministic local feature-hashing embedder and any
//! OpenAI-compatible embeddings endpoint.

use std::sync::Arc;

use async_openai::{config::OpenAIConfig, types::CreateEmbeddingRequestArgs, Client};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::traits::{EmbedError, Embedder, SharedEmbedder};

/// Default dimensionality of the hashing embedder
pub const HASHING_DIMENSIONS: usize = 256;

/// Word + character-trigram feature hashing
///
/// Features are hashed with SHA-256 into a fixed number of signed buckets and
/// the vector is L2-normalized, so equal terms always map to equal vectors.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(HASHING_DIMENSIONS)
    }
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        let index = (u64::from_le_bytes(bytes) % self.dimensions as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[index] += sign * weight;
    }

    /// Embed a single term
    pub fn vector(&self, term: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let lowered = term.to_lowercase();

        for word in lowered.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            self.add_feature(&mut vector, &format!("w:{}", word), 1.0);

            let padded: Vec<char> = format!(" {} ", word).chars().collect();
            for trigram in padded.windows(3) {
                let trigram: String = trigram.iter().collect();
                self.add_feature(&mut vector, &format!("c:{}", trigram), 0.5);
            }
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn name(&self) -> &str {
        "hashing"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, terms: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(terms.iter().map(|t| self.vector(t)).collect())
    }
}

/// OpenAI-compatible embeddings configuration
#[derive(Debug, Clone)]
pub struct OpenAiEmbedderConfig {
    pub api_key: String,
    /// Base URL (for OpenRouter, local servers, etc.)
    pub base_url: Option<String>,
    pub model: String,
    pub dimensions: usize,
}

impl Default for OpenAiEmbedderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: None,
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

/// Embeddings from an OpenAI-compatible API
pub struct OpenAiEmbedder {
    client: Client<OpenAIConfig>,
    config: OpenAiEmbedderConfig,
}

impl OpenAiEmbedder {
    pub fn new(config: OpenAiEmbedderConfig) -> Result<Self, EmbedError> {
        if config.api_key.is_empty() && config.base_url.is_none() {
            return Err(EmbedError::Config(
                "an API key is required for the hosted embeddings endpoint".to_string(),
            ));
        }

        let mut openai_config = OpenAIConfig::new().with_api_key(&config.api_key);
        if let Some(base_url) = &config.base_url {
            openai_config = openai_config.with_api_base(base_url);
        }

        Ok(Self {
            client: Client::with_config(openai_config),
            config,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn name(&self) -> &str {
        &self.config.model
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    async fn embed(&self, terms: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.config.model)
            .input(terms.to_vec())
            .build()
            .map_err(|e| EmbedError::Api(e.to_string()))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| EmbedError::Api(e.to_string()))?;

        let mut data = response.data;
        if data.len() != terms.len() {
            return Err(EmbedError::CountMismatch {
                expected: terms.len(),
                got: data.len(),
            });
        }
        data.sort_by_key(|d| d.index);
        debug!("Embedded {} terms with {}", terms.len(), self.config.model);

        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

/// Which embedder to build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    #[default]
    Hashing,
    OpenAi,
}

/// Embedder selection and settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedderConfig {
    pub kind: EmbedderKind,
    pub dimensions: usize,
    pub model: String,
    pub base_url: Option<String>,
    /// Never read from config files; supplied from the environment
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            kind: EmbedderKind::Hashing,
            dimensions: HASHING_DIMENSIONS,
            model: "text-embedding-3-small".to_string(),
            base_url: None,
            api_key: None,
        }
    }
}

/// Build the configured embedder
pub fn create_embedder(config: &EmbedderConfig) -> Result<SharedEmbedder, EmbedError> {
    match config.kind {
        EmbedderKind::Hashing => Ok(Arc::new(HashingEmbedder::new(config.dimensions))),
        EmbedderKind::OpenAi => {
            let embedder = OpenAiEmbedder::new(OpenAiEmbedderConfig {
                api_key: config.api_key.clone().unwrap_or_default(),
                base_url: config.base_url.clone(),
                model: config.model.clone(),
                dimensions: config.dimensions,
            })?;
            Ok(Arc::new(embedder))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::cosine_similarity;

    #[tokio::test]
    async fn test_hashing_is_deterministic_and_normalized() {
        let embedder = HashingEmbedder::default();
        let terms = vec!["Gaming Laptop".to_string(), "gaming laptop".to_string()];
        let vectors = embedder.embed(&terms).await.unwrap();

        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0].len(), HASHING_DIMENSIONS);
        assert_eq!(vectors[0], vectors[1]);
        let norm: f32 = vectors[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hashing_similarity_tracks_overlap() {
        let embedder = HashingEmbedder::default();
        let laptop = embedder.vector("laptop");
        let laptops = embedder.vector("laptops");
        let banana = embedder.vector("banana bread");
        assert!(cosine_similarity(&laptop, &laptops) > cosine_similarity(&laptop, &banana));
        assert!(embedder.vector("").iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_create_embedder() {
        let hashing = create_embedder(&EmbedderConfig::default()).unwrap();
        assert_eq!(hashing.name(), "hashing");
        assert_eq!(hashing.dimensions(), HASHING_DIMENSIONS);

        let missing_key = EmbedderConfig {
            kind: EmbedderKind::OpenAi,
            ..Default::default()
        };
        assert!(matches!(create_embedder(&missing_key), Err(EmbedError::Config(_))));
    }
}

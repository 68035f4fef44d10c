//! Analyzer configuration
//!
//! One TOML document with a table per pipeline stage. Every field has a
//! default, so an empty file (or no file) is a valid configuration.
//!
//! ```toml
//! [analysis]
//! max_urls = 20
//!
//! [fetch]
//! max_concurrent_requests = 5
//!
//! [weights]
//! frequency = 0.4
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use seolens_core::{
    AggregationConfig, BucketConfig, ClassifierConfig, ScoringWeights, WeightsError,
};
use seolens_crawl::{FetchConfig, SelectionConfig, SitemapConfig};
use seolens_nlp::{EmbedderConfig, FusionConfig, SemanticConfig, StatisticalConfig};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid weights: {0}")]
    Weights(#[from] WeightsError),
}

/// Domain-run settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Default page budget for a domain run
    pub max_urls: usize,
    /// Deadline for each page's fetch-to-score chain
    pub page_timeout_secs: u64,
    /// Re-bucket pages with cross-page keyword frequencies
    pub domain_bucketing: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_urls: 20,
            page_timeout_secs: 30,
            domain_bucketing: true,
        }
    }
}

/// Complete analyzer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub analysis: AnalysisConfig,
    pub fetch: FetchConfig,
    pub sitemap: SitemapConfig,
    pub selection: SelectionConfig,
    pub statistical: StatisticalConfig,
    pub semantic: SemanticConfig,
    pub embedder: EmbedderConfig,
    pub fusion: FusionConfig,
    pub classifier: ClassifierConfig,
    pub buckets: BucketConfig,
    pub aggregation: AggregationConfig,
    pub weights: ScoringWeights,
}

impl AnalyzerConfig {
    /// Parse a TOML document; weights are validated and normalized
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(content)?;
        config.weights = config.weights.normalized()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }
}

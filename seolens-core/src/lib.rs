//! SEOLens Core - Domain model and scoring for SEO keyword analysis
//!
//! This crate provides the pure, network-free parts of the pipeline:
//! - URL, page and keyword records
//! - Text normalization, tokenization and stopwords
//! - Multi-factor keyword scoring with a normalized weight vector
//! - Page classification (type, audience, intent, brand)
//! - Keyword bucketing and domain aggregation

pub mod model;
pub mod text;
pub mod weights;
pub mod scoring;
pub mod classify;
pub mod buckets;
pub mod aggregate;

pub use model::*;
pub use text::*;
pub use weights::*;
pub use scoring::*;
pub use classify::*;
pub use buckets::*;
pub use aggregate::*;

/// Keywords kept per bucket on a page
pub const DEFAULT_BUCKET_CAP: usize = 30;

/// Keywords kept per bucket in a domain summary
pub const DEFAULT_TOP_N: usize = 20;

//! SEOLens runtime
//!
//! Wires the crawl, extraction and scoring layers into the two public
//! operations:
//! - `analyze_page`: one URL, errors surfaced directly
//! - `analyze_domain`: sitemap-driven multi-page run with domain bucketing
//!
//! Configuration is loaded from TOML (see [`AnalyzerConfig`]).

pub mod analyzer;
pub mod config;
pub mod weights;

pub use analyzer::*;
pub use config::*;
pub use weights::*;

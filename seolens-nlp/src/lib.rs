//! SEOLens keyword extraction
//!
//! Two keyword providers fused into one ranked list:
//! - **Statistical**: YAKE-style single-document scoring
//! - **Semantic**: embedding similarity to the document with MMR diversity
//! - **Fusion**: concurrent execution, exact and semantic merging
//!
//! Embeddings come from a local hashing embedder or any OpenAI-compatible
//! endpoint.

pub mod embedder;
pub mod fusion;
pub mod semantic;
pub mod statistical;
pub mod traits;

pub use embedder::*;
pub use fusion::*;
pub use semantic::*;
pub use statistical::*;
pub use traits::*;

//! SEOLens crawl layer
//!
//! Everything that touches the network or raw HTML:
//! - Throttled, retrying HTTP fetcher with a global concurrency cap
//! - Sitemap discovery, robots.txt rules and URL filtering
//! - Category-balanced URL selection
//! - HTML parsing and the shallow-crawl fallback

pub mod crawler;
pub mod discovery;
pub mod fetcher;
pub mod filter;
pub mod parser;
pub mod robots;
pub mod selector;
pub mod sitemap;
pub mod throttle;

pub use crawler::*;
pub use discovery::*;
pub use fetcher::*;
pub use filter::*;
pub use parser::*;
pub use robots::*;
pub use selector::*;
pub use sitemap::*;
pub use throttle::*;

//! robots.txt rules
//!
//! Wraps `texting_robots` for the groups that apply to this crawler (its own
//! `seolens` group, else `User-agent: *`) and keeps the `Sitemap:`
//! directives used during discovery.

use std::fmt;
use std::sync::Arc;

use texting_robots::Robot;
use tracing::warn;

/// Product token matched against `User-agent` groups
pub const ROBOTS_AGENT: &str = "seolens";

/// Parsed robots.txt rules
#[derive(Clone, Default)]
pub struct RobotsTxt {
    /// Sitemap URLs in declaration order
    pub sitemaps: Vec<String>,
    rules: Option<Arc<Robot>>,
}

impl fmt::Debug for RobotsTxt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RobotsTxt")
            .field("sitemaps", &self.sitemaps)
            .field("has_rules", &self.rules.is_some())
            .finish()
    }
}

impl RobotsTxt {
    /// Rules that allow everything
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Parse a robots.txt body; unparseable files allow everything
    pub fn parse(content: &str) -> Self {
        match Robot::new(ROBOTS_AGENT, content.as_bytes()) {
            Ok(robot) => Self {
                sitemaps: robot.sitemaps.clone(),
                rules: Some(Arc::new(robot)),
            },
            Err(e) => {
                warn!("Ignoring unparseable robots.txt: {}", e);
                Self::allow_all()
            }
        }
    }

    /// Whether a path (with optional query) may be crawled
    pub fn is_allowed(&self, path: &str) -> bool {
        self.rules.as_ref().map_or(true, |robot| robot.allowed(path))
    }
}

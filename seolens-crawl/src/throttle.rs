//! Per-host request spacing
//!
//! Each host owns an async lock around its last request instant. The lock is
//! held across the sleep, so concurrent callers for the same host queue up and
//! leave at least `min_interval` apart. Different hosts never wait on each other.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// Minimum-interval throttle keyed by host
#[derive(Debug)]
pub struct HostThrottle {
    min_interval: Duration,
    hosts: DashMap<String, Arc<Mutex<Option<Instant>>>>,
}

impl HostThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            hosts: DashMap::new(),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until a request to `host` may start, then record it
    pub async fn wait(&self, host: &str) {
        let slot = {
            let entry = self.hosts.entry(host.to_ascii_lowercase()).or_default();
            Arc::clone(entry.value())
        };

        let mut last = slot.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.min_interval;
            if ready_at > Instant::now() {
                debug!("Throttling {} for {:?}", host, ready_at - Instant::now());
                sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Number of hosts seen so far
    pub fn tracked_hosts(&self) -> usize {
        self.hosts.len()
    }
}

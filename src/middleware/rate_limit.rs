//! In-memory sliding-window limiter guarding the login endpoints.
//! Production deployments that run more than one instance should move this
//! to Redis or an edge service.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct RateLimiter {
    requests: Arc<RwLock<HashMap<String, Vec<Instant>>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window_secs: u64) -> Self {
        Self {
            requests: Arc::new(RwLock::new(HashMap::new())),
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    /// Check if a request is allowed for the given identifier (client IP).
    pub async fn check(&self, identifier: &str) -> bool {
        let now = Instant::now();
        let mut requests = self.requests.write().await;

        let history = requests
            .entry(identifier.to_string())
            .or_insert_with(Vec::new);
        history.retain(|&timestamp| now.duration_since(timestamp) < self.window);

        if history.len() < self.max_requests {
            history.push(now);
            true
        } else {
            false
        }
    }

    /// Drops identifiers whose whole history has aged out. Scheduled
    /// periodically so the map does not grow with every unique client.
    pub async fn cleanup(&self) {
        let now = Instant::now();
        let mut requests = self.requests.write().await;

        requests.retain(|_, history| {
            history.retain(|&timestamp| now.duration_since(timestamp) < self.window);
            !history.is_empty()
        });

        tracing::debug!(
            "rate limiter cleanup: {} active identifiers",
            requests.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blocks_after_the_window_is_full() {
        let limiter = RateLimiter::new(3, 60);

        assert!(limiter.check("203.0.113.7").await);
        assert!(limiter.check("203.0.113.7").await);
        assert!(limiter.check("203.0.113.7").await);
        assert!(!limiter.check("203.0.113.7").await);

        // Other clients are unaffected.
        assert!(limiter.check("203.0.113.8").await);
    }

    #[tokio::test]
    async fn cleanup_drops_aged_out_clients() {
        let limiter = RateLimiter::new(5, 1);

        limiter.check("a").await;
        limiter.check("b").await;

        tokio::time::sleep(Duration::from_secs(2)).await;
        limiter.cleanup().await;

        let requests = limiter.requests.read().await;
        assert_eq!(requests.len(), 0);
    }
}

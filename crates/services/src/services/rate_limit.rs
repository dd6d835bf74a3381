//! Per-key sliding-window rate limiting.
//!
//! Each key keeps the instants of its accepted requests inside the current
//! window. A request is accepted while fewer than `max_requests` instants are
//! younger than `window`. Rejections are reported, never retried.

use std::{
    collections::VecDeque,
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::DashMap;
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed { remaining: usize },
    Limited { retry_after: Duration },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Arc<DashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Arc::new(DashMap::new()),
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    pub fn check(&self, key: &str) -> RateLimitDecision {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> RateLimitDecision {
        let RateLimitConfig {
            max_requests,
            window,
        } = self.config;

        let mut hits = self.windows.entry(key.to_string()).or_default();
        while hits
            .front()
            .is_some_and(|oldest| now.saturating_duration_since(*oldest) >= window)
        {
            hits.pop_front();
        }

        if hits.len() >= max_requests {
            let retry_after = hits
                .front()
                .map(|oldest| window.saturating_sub(now.saturating_duration_since(*oldest)))
                .unwrap_or(window);
            debug!(key, ?retry_after, "rate limit exceeded");
            return RateLimitDecision::Limited { retry_after };
        }

        hits.push_back(now);
        RateLimitDecision::Allowed {
            remaining: max_requests - hits.len(),
        }
    }

    /// Drop keys whose whole window has elapsed. Returns how many were removed.
    pub fn purge_idle(&self, now: Instant) -> usize {
        let window = self.config.window;
        let before = self.windows.len();
        self.windows.retain(|_, hits| {
            hits.back()
                .is_some_and(|latest| now.saturating_duration_since(*latest) < window)
        });
        before.saturating_sub(self.windows.len())
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }

    /// Periodically purge idle keys so the map does not grow without bound.
    pub fn spawn_purge_task(&self) -> tokio::task::JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut interval = time::interval(limiter.config.window.max(Duration::from_secs(1)));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let removed = limiter.purge_idle(Instant::now());
                if removed > 0 {
                    debug!(removed, "purged idle rate limit windows");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: usize, window_secs: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            max_requests,
            window: Duration::from_secs(window_secs),
        })
    }

    #[test]
    fn allows_up_to_limit_then_rejects() {
        let limiter = limiter(3, 60);
        let start = Instant::now();

        assert_eq!(
            limiter.check_at("user", start),
            RateLimitDecision::Allowed { remaining: 2 }
        );
        assert_eq!(
            limiter.check_at("user", start + Duration::from_secs(1)),
            RateLimitDecision::Allowed { remaining: 1 }
        );
        assert_eq!(
            limiter.check_at("user", start + Duration::from_secs(2)),
            RateLimitDecision::Allowed { remaining: 0 }
        );
        assert_eq!(
            limiter.check_at("user", start + Duration::from_secs(10)),
            RateLimitDecision::Limited {
                retry_after: Duration::from_secs(50)
            }
        );
    }

    #[test]
    fn window_slides() {
        let limiter = limiter(2, 60);
        let start = Instant::now();

        assert!(limiter.check_at("user", start).is_allowed());
        assert!(limiter.check_at("user", start + Duration::from_secs(30)).is_allowed());
        assert!(!limiter.check_at("user", start + Duration::from_secs(59)).is_allowed());
        // The first hit has left the window; the second is still inside it.
        assert_eq!(
            limiter.check_at("user", start + Duration::from_secs(60)),
            RateLimitDecision::Allowed { remaining: 0 }
        );
        assert!(!limiter.check_at("user", start + Duration::from_secs(61)).is_allowed());
    }

    #[test]
    fn rejected_requests_do_not_consume_capacity() {
        let limiter = limiter(1, 10);
        let start = Instant::now();

        assert!(limiter.check_at("user", start).is_allowed());
        for offset in 1..5 {
            assert!(!limiter.check_at("user", start + Duration::from_secs(offset)).is_allowed());
        }
        assert!(limiter.check_at("user", start + Duration::from_secs(10)).is_allowed());
    }

    #[test]
    fn keys_are_independent() {
        let limiter = limiter(1, 60);
        let start = Instant::now();

        assert!(limiter.check_at("alice", start).is_allowed());
        assert!(limiter.check_at("bob", start).is_allowed());
        assert!(!limiter.check_at("alice", start).is_allowed());
    }

    #[test]
    fn purge_drops_only_idle_keys() {
        let limiter = limiter(5, 60);
        let start = Instant::now();

        limiter.check_at("idle", start);
        limiter.check_at("busy", start + Duration::from_secs(50));

        assert_eq!(limiter.purge_idle(start + Duration::from_secs(61)), 1);
        assert_eq!(limiter.tracked_keys(), 1);
    }
}

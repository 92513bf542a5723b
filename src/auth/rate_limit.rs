use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;

use crate::error::AppError;
use crate::AppState;

/// Invite-code guessing guard: requests per IP per window.
const INVITE_MAX_REQUESTS: u32 = 10;
const INVITE_WINDOW_SECS: u64 = 60;

/// Fixed-window, in-memory limiter. Single instance only.
#[derive(Clone)]
pub struct RateLimitState {
    entries: Arc<Mutex<HashMap<String, RateLimitEntry>>>,
    max_requests: u32,
    window: Duration,
}

struct RateLimitEntry {
    count: u32,
    window_start: Instant,
}

impl Default for RateLimitState {
    fn default() -> Self {
        Self::new(INVITE_MAX_REQUESTS, Duration::from_secs(INVITE_WINDOW_SECS))
    }
}

impl RateLimitState {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            max_requests,
            window,
        }
    }

    /// Ok(remaining) or Err(retry_after).
    pub async fn check(&self, key: &str) -> Result<u32, Duration> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        let entry = entries.entry(key.to_string()).or_insert(RateLimitEntry {
            count: 0,
            window_start: now,
        });

        if now.duration_since(entry.window_start) > self.window {
            entry.count = 0;
            entry.window_start = now;
        }

        if entry.count >= self.max_requests {
            let retry_after = self
                .window
                .saturating_sub(now.duration_since(entry.window_start));
            return Err(retry_after);
        }

        entry.count += 1;
        Ok(self.max_requests - entry.count)
    }

    /// Drops entries whose window ended more than one window ago.
    pub async fn cleanup(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let keep_for = self.window * 2;
        let before = entries.len();
        entries.retain(|_, entry| now.duration_since(entry.window_start) < keep_for);
        before - entries.len()
    }

    pub fn spawn_cleanup_worker(&self) {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(limiter.window * 2);
            loop {
                interval.tick().await;
                let purged = limiter.cleanup().await;
                if purged > 0 {
                    tracing::debug!(purged, "Rate limiter: dropped stale entries");
                }
            }
        });
    }
}

/// Rate limiting for invite-code redemption, keyed by client IP.
pub async fn rate_limit_invites(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ip = addr.ip().to_string();
    let key = format!("invite:{}", ip);

    match state.rate_limiter.check(&key).await {
        Ok(remaining) => {
            tracing::debug!(ip = %ip, remaining, "Invite rate limit check passed");
            Ok(next.run(req).await)
        }
        Err(retry_after) => {
            tracing::warn!(
                ip = %ip,
                retry_after_secs = retry_after.as_secs(),
                "Invite rate limit exceeded"
            );
            Err(AppError::RateLimited)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_allows_under_limit() {
        let limiter = RateLimitState::default();
        for i in 0..INVITE_MAX_REQUESTS {
            let result = limiter.check("ip").await;
            assert!(result.is_ok(), "Request {} should be allowed", i + 1);
        }
    }

    #[tokio::test]
    async fn test_blocks_over_limit() {
        let limiter = RateLimitState::new(2, Duration::from_secs(60));
        assert_eq!(limiter.check("ip").await, Ok(1));
        assert_eq!(limiter.check("ip").await, Ok(0));
        assert!(limiter.check("ip").await.is_err());
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let limiter = RateLimitState::new(1, Duration::from_secs(60));
        assert!(limiter.check("a").await.is_ok());
        assert!(limiter.check("a").await.is_err());
        assert!(limiter.check("b").await.is_ok());
    }

    #[tokio::test]
    async fn test_window_resets() {
        let limiter = RateLimitState::new(1, Duration::from_millis(20));
        assert!(limiter.check("ip").await.is_ok());
        assert!(limiter.check("ip").await.is_err());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(limiter.check("ip").await.is_ok());
    }

    #[tokio::test]
    async fn test_cleanup_drops_stale_entries() {
        let limiter = RateLimitState::new(5, Duration::from_millis(10));
        let _ = limiter.check("old").await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        let _ = limiter.check("fresh").await;
        assert_eq!(limiter.cleanup().await, 1);
    }
}

use super::ip::client_id_for;
use crate::{error::AppError, state::AppState};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{sync::Mutex, time::Instant};

#[derive(Debug, Clone, Copy)]
struct Entry {
    count: usize,
    window_reset_at: Instant,
    last_seen_at: Instant,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    last_sweep: Option<Instant>,
}

/// A per-client fixed-window rate limiter.
///
/// Each identifier gets `max_requests` admissions per window, the window starting at
/// the first request after the previous one elapsed. Stale identifiers are evicted
/// lazily: at most once per window, on the next call to [`RateLimiter::allow`].
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<Inner>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window_seconds: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            max_requests,
            window: Duration::from_secs(window_seconds),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Records a request for `client_id` and reports whether it is admitted.
    pub async fn allow(&self, client_id: &str) -> bool {
        let now = Instant::now();
        let mut inner = self.inner.lock().await;

        let sweep_due = match inner.last_sweep {
            None => true,
            Some(last) => now.duration_since(last) > self.window,
        };
        if sweep_due {
            Self::sweep_locked(&mut inner, now, self.window);
        }

        match inner.entries.get_mut(client_id) {
            Some(entry) if now < entry.window_reset_at => {
                if entry.count < self.max_requests {
                    entry.count += 1;
                    entry.last_seen_at = now;
                    true
                } else {
                    false
                }
            }
            _ => {
                inner.entries.insert(
                    client_id.to_string(),
                    Entry { count: 1, window_reset_at: now + self.window, last_seen_at: now },
                );
                true
            }
        }
    }

    /// Forces an eviction pass regardless of when the last one ran.
    pub async fn sweep(&self) {
        let now = Instant::now();
        let mut inner = self.inner.lock().await;
        Self::sweep_locked(&mut inner, now, self.window);
    }

    /// Number of tracked identifiers.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn sweep_locked(inner: &mut Inner, now: Instant, window: Duration) {
        let before = inner.entries.len();
        inner.entries.retain(|_, e| now < e.window_reset_at || now.duration_since(e.last_seen_at) <= window);
        inner.last_sweep = Some(now);
        let evicted = before - inner.entries.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = inner.entries.len(), "rate limiter sweep");
        }
    }
}

/// Rejects clients over their budget with a 429 `RATE_LIMITED` body and `Retry-After`.
pub async fn rate_limit_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let client = client_id_for(&req, state.config.security.trust_proxy_headers);
    if state.rate_limiter.allow(&client).await {
        return next.run(req).await;
    }
    tracing::warn!(client = %client, path = %req.uri().path(), "rate limit exceeded");
    AppError::RateLimited { retry_after_seconds: state.rate_limiter.window().as_secs() }.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_admits_exactly_limit() {
        let limiter = RateLimiter::new(5, 60);
        for _ in 0..5 {
            assert!(limiter.allow("10.0.0.1").await);
        }
        assert!(!limiter.allow("10.0.0.1").await);
        assert!(!limiter.allow("10.0.0.1").await);
    }

    #[tokio::test]
    async fn test_identifiers_are_independent() {
        let limiter = RateLimiter::new(1, 60);
        assert!(limiter.allow("a").await);
        assert!(limiter.allow("b").await);
        assert!(!limiter.allow("a").await);
        assert!(!limiter.allow("b").await);
        assert_eq!(limiter.len().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_rollover() {
        let limiter = RateLimiter::new(2, 60);
        assert!(limiter.allow("a").await);
        assert!(limiter.allow("a").await);
        assert!(!limiter.allow("a").await);

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(!limiter.allow("a").await);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(limiter.allow("a").await);
        assert!(limiter.allow("a").await);
        assert!(!limiter.allow("a").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejections_do_not_extend_window() {
        let limiter = RateLimiter::new(1, 10);
        assert!(limiter.allow("a").await);
        for _ in 0..9 {
            tokio::time::advance(Duration::from_secs(1)).await;
            assert!(!limiter.allow("a").await);
        }
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(limiter.allow("a").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_sweep_evicts_idle_entries() {
        let limiter = RateLimiter::new(3, 60);
        limiter.allow("a").await;
        limiter.allow("b").await;
        tokio::time::advance(Duration::from_secs(30)).await;
        limiter.allow("b").await;

        tokio::time::advance(Duration::from_secs(31)).await;
        limiter.sweep().await;
        // a: idle 61s, window over. b: still seen within the last window.
        assert_eq!(limiter.len().await, 1);

        tokio::time::advance(Duration::from_secs(60)).await;
        limiter.sweep().await;
        assert!(limiter.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lazy_sweep_on_allow() {
        let limiter = RateLimiter::new(3, 60);
        for i in 0..50 {
            limiter.allow(&format!("client-{}", i)).await;
        }
        assert_eq!(limiter.len().await, 50);

        tokio::time::advance(Duration::from_secs(121)).await;
        assert!(limiter.allow("fresh").await);
        assert_eq!(limiter.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_sweep_within_window() {
        let limiter = RateLimiter::new(3, 60);
        limiter.allow("a").await;
        tokio::time::advance(Duration::from_secs(45)).await;
        limiter.allow("b").await;
        assert_eq!(limiter.len().await, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_admissions_never_exceed_limit() {
        let limiter = RateLimiter::new(50, 60);
        let mut handles = Vec::new();
        for _ in 0..16 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                let mut admitted = 0usize;
                for _ in 0..10 {
                    if limiter.allow("shared").await {
                        admitted += 1;
                    }
                }
                admitted
            }));
        }
        let mut total = 0;
        for h in handles {
            total += h.await.unwrap();
        }
        assert_eq!(total, 50);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_below_limit_admits_all() {
        let limiter = RateLimiter::new(1000, 60);
        let mut handles = Vec::new();
        for _ in 0..8 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                let mut admitted = 0usize;
                for _ in 0..25 {
                    if limiter.allow("shared").await {
                        admitted += 1;
                    }
                }
                admitted
            }));
        }
        let mut total = 0;
        for h in handles {
            total += h.await.unwrap();
        }
        assert_eq!(total, 200);
    }
}

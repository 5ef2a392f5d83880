//! Request rate limiting.
//!
//! A simple in-memory sliding-window limiter keyed per client. Applied as
//! axum middleware: a strict instance guards registration and login, a
//! general instance covers the whole API. Limits are configuration, not
//! part of the API contract.
//!
//! The limiter is thread-safe (`RwLock` around the window state) because
//! handlers run concurrently. To keep memory bounded against key
//! spoofing, stale entries are cleaned up every `CLEANUP_INTERVAL`
//! requests and the number of tracked clients is hard-capped; when the
//! cap is hit and cleanup frees nothing, new clients are rejected.

use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::domain::ErrorBody;

/// Run cleanup every N requests.
const CLEANUP_INTERVAL: u64 = 100;

/// An in-memory rate limiter using a sliding window per client key.
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    max_tracked_clients: usize,
    // Maps client keys to request timestamps inside the window
    state: RwLock<HashMap<String, Vec<Instant>>>,
    // Counter driving periodic cleanup
    request_count: AtomicU64,
}

impl RateLimiter {
    // ---
    pub fn new(max_requests: u32, window: Duration, max_tracked_clients: usize) -> Self {
        // ---
        Self {
            max_requests,
            window,
            max_tracked_clients,
            state: RwLock::new(HashMap::new()),
            request_count: AtomicU64::new(0),
        }
    }

    /// Checks whether a request from `client` is allowed, recording it if
    /// so. Returns false when the client exceeded the window limit or the
    /// tracked-client cap is exhausted.
    pub fn check(&self, client: &str) -> bool {
        // ---
        let count = self.request_count.fetch_add(1, Ordering::Relaxed);
        if count % CLEANUP_INTERVAL == 0 {
            self.cleanup();
        }

        let now = Instant::now();
        let mut state = self.state.write().expect("rate limiter lock poisoned");

        if !state.contains_key(client) && state.len() >= self.max_tracked_clients {
            // Cap reached; try to reclaim expired entries before rejecting.
            let window = self.window;
            state.retain(|_, stamps| {
                stamps.retain(|t| now.duration_since(*t) < window);
                !stamps.is_empty()
            });
            if state.len() >= self.max_tracked_clients {
                return false;
            }
        }

        let stamps = state.entry(client.to_owned()).or_default();
        stamps.retain(|t| now.duration_since(*t) < self.window);

        if stamps.len() >= self.max_requests as usize {
            return false;
        }

        stamps.push(now);
        true
    }

    fn cleanup(&self) {
        // ---
        let now = Instant::now();
        let window = self.window;
        let mut state = self.state.write().expect("rate limiter lock poisoned");
        state.retain(|_, stamps| {
            stamps.retain(|t| now.duration_since(*t) < window);
            !stamps.is_empty()
        });
    }
}

/// Derives the limiter key for a request.
///
/// Trusts `x-forwarded-for` (the deployment fronts this service with a
/// proxy); requests without it share one bucket.
fn client_key(headers: &HeaderMap) -> String {
    // ---
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|ip| ip.trim().to_owned())
        .unwrap_or_else(|| "unknown".to_owned())
}

/// Axum middleware enforcing a [`RateLimiter`].
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    // ---
    let client = client_key(request.headers());

    if !limiter.check(&client) {
        tracing::warn!("rate limit exceeded for client: {client}");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorBody {
                error: "RateLimited",
                message: "too many requests, retry later".to_string(),
            }),
        )
            .into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn allows_up_to_limit_then_blocks() {
        // ---
        let limiter = RateLimiter::new(3, Duration::from_secs(60), 100);

        assert!(limiter.check("10.0.0.1"));
        assert!(limiter.check("10.0.0.1"));
        assert!(limiter.check("10.0.0.1"));
        assert!(!limiter.check("10.0.0.1"));

        // A different client has its own window.
        assert!(limiter.check("10.0.0.2"));
    }

    #[test]
    fn window_expiry_frees_budget() {
        // ---
        let limiter = RateLimiter::new(1, Duration::from_millis(30), 100);

        assert!(limiter.check("10.0.0.1"));
        assert!(!limiter.check("10.0.0.1"));

        std::thread::sleep(Duration::from_millis(40));
        assert!(limiter.check("10.0.0.1"));
    }

    #[test]
    fn tracked_client_cap_rejects_new_clients() {
        // ---
        let limiter = RateLimiter::new(10, Duration::from_secs(60), 2);

        assert!(limiter.check("a"));
        assert!(limiter.check("b"));
        // Cap hit, window entries still live, new client rejected.
        assert!(!limiter.check("c"));
        // Known clients keep working.
        assert!(limiter.check("a"));
    }

    #[test]
    fn client_key_prefers_forwarded_header() {
        // ---
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
        assert_eq!(client_key(&headers), "203.0.113.9");

        assert_eq!(client_key(&HeaderMap::new()), "unknown");
    }
}

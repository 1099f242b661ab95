use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::Mutex,
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::{db::AppState, error::ApiError};

/// Entries beyond this trigger a sweep of expired windows on the next check.
const PURGE_THRESHOLD: usize = 1024;

struct Window {
    started: Instant,
    count: u32,
}

pub struct Decision {
    pub allowed: bool,
    pub remaining: u32,
    /// Seconds until the current window rolls over, rounded up.
    pub retry_after_secs: u64,
}

/// In-process fixed-window counter. The lock is held only for the counter
/// update, never across an await point.
pub struct FixedWindowLimiter {
    limit: u32,
    window: Duration,
    state: Mutex<HashMap<String, Window>>,
}

impl FixedWindowLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            state: Mutex::new(HashMap::new()),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn check(&self, key: &str) -> Decision {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Decision {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.len() > PURGE_THRESHOLD {
            let window = self.window;
            state.retain(|_, w| now.duration_since(w.started) < window);
        }
        let entry = state.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }
        entry.count += 1;
        let rest = self
            .window
            .checked_sub(now.duration_since(entry.started))
            .unwrap_or_default();
        Decision {
            allowed: entry.count <= self.limit,
            remaining: self.limit.saturating_sub(entry.count),
            retry_after_secs: rest.as_secs() + u64::from(rest.subsec_nanos() > 0),
        }
    }
}

/// Client identity for the rate-limit key. Behind a proxy the original
/// client is the first hop of X-Forwarded-For.
fn client_identifier(request: &Request) -> String {
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
    {
        if let Some(ip) = forwarded.split(',').next() {
            return ip.trim().to_string();
        }
    }
    if let Some(real_ip) = request
        .headers()
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
    {
        return real_ip.to_string();
    }
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    "unknown".to_string()
}

/// Applied to signin only, ahead of credential comparison, so brute-force
/// attempts are rejected before any hashing work.
pub async fn signin_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let client = client_identifier(&request);
    let decision = state.signin_limiter.check(&client);

    if !decision.allowed {
        warn!(client = %client, "signin rate limit exceeded");
        return Err(ApiError::TooManyRequests {
            retry_after: decision.retry_after_secs,
        });
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&state.signin_limiter.limit().to_string()) {
        headers.insert("x-ratelimit-limit", value);
    }
    if let Ok(value) = HeaderValue::from_str(&decision.remaining.to_string()) {
        headers.insert("x-ratelimit-remaining", value);
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_the_limit() {
        let limiter = FixedWindowLimiter::new(10, Duration::from_secs(60));
        let now = Instant::now();
        for _ in 0..10 {
            assert!(limiter.check_at("1.2.3.4", now).allowed);
        }
        assert!(!limiter.check_at("1.2.3.4", now).allowed);
    }

    #[test]
    fn keys_are_independent() {
        let limiter = FixedWindowLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();
        assert!(limiter.check_at("1.2.3.4", now).allowed);
        assert!(!limiter.check_at("1.2.3.4", now).allowed);
        assert!(limiter.check_at("5.6.7.8", now).allowed);
    }

    #[test]
    fn window_resets_after_expiry() {
        let limiter = FixedWindowLimiter::new(2, Duration::from_secs(60));
        let start = Instant::now();
        assert!(limiter.check_at("1.2.3.4", start).allowed);
        assert!(limiter.check_at("1.2.3.4", start).allowed);
        assert!(!limiter.check_at("1.2.3.4", start).allowed);
        let later = start + Duration::from_secs(61);
        assert!(limiter.check_at("1.2.3.4", later).allowed);
    }

    #[test]
    fn retry_after_reports_window_remainder() {
        let limiter = FixedWindowLimiter::new(1, Duration::from_secs(60));
        let start = Instant::now();
        assert_eq!(limiter.check_at("1.2.3.4", start).retry_after_secs, 60);
        let denied = limiter.check_at("1.2.3.4", start + Duration::from_secs(45));
        assert!(!denied.allowed);
        assert_eq!(denied.retry_after_secs, 15);
        // Fractions of a second round up, never down to zero.
        let late = limiter.check_at("1.2.3.4", start + Duration::from_millis(59_500));
        assert_eq!(late.retry_after_secs, 1);
    }

    #[test]
    fn remaining_counts_down() {
        let limiter = FixedWindowLimiter::new(3, Duration::from_secs(60));
        let now = Instant::now();
        assert_eq!(limiter.check_at("k", now).remaining, 2);
        assert_eq!(limiter.check_at("k", now).remaining, 1);
        assert_eq!(limiter.check_at("k", now).remaining, 0);
        assert_eq!(limiter.check_at("k", now).remaining, 0);
    }
}

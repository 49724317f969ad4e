//! Fixed-window request limiting keyed by client address.
//!
//! Counters live in a `DashMap` for the lifetime of the router; a window
//! opens on the first request from a key and resets once it has elapsed.
//! The key is the peer address of the connection. Forwarding headers are
//! only consulted when the deployment sits behind a trusted proxy.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tracing::warn;

use crate::config::AppConfig;
use crate::errors::ServiceError;

const LIMIT_HEADER: &str = "x-ratelimit-limit";
const REMAINING_HEADER: &str = "x-ratelimit-remaining";
const RESET_HEADER: &str = "x-ratelimit-reset";
const RETRY_AFTER_HEADER: &str = "retry-after";
const PURGE_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone)]
struct RateLimitEntry {
    count: u32,
    window_start: Instant,
}

impl RateLimitEntry {
    fn new(now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
        }
    }

    /// Counts one request, opening a fresh window when the current one has expired.
    fn record(&mut self, now: Instant, window: Duration) {
        if now.duration_since(self.window_start) >= window {
            self.count = 0;
            self.window_start = now;
        }
        self.count = self.count.saturating_add(1);
    }

    fn time_until_reset(&self, now: Instant, window: Duration) -> Duration {
        window.saturating_sub(now.duration_since(self.window_start))
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests_per_window: u32,
    pub window_duration: Duration,
    /// Key on `X-Forwarded-For` / `X-Real-IP` before the peer address.
    pub trust_proxy_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: 100,
            window_duration: Duration::from_secs(15 * 60),
            trust_proxy_headers: false,
        }
    }
}

impl RateLimitConfig {
    /// `None` when limiting is switched off (zero requests or a zero window).
    pub fn from_app_config(config: &AppConfig) -> Option<Self> {
        if config.rate_limit_requests == 0 || config.rate_limit_window_secs == 0 {
            return None;
        }
        Some(Self {
            requests_per_window: config.rate_limit_requests,
            window_duration: Duration::from_secs(config.rate_limit_window_secs),
            trust_proxy_headers: config.rate_limit_trust_proxy_headers,
        })
    }
}

/// Outcome of a single check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_after: Duration,
}

#[derive(Debug, Clone)]
pub struct RateLimiter {
    entries: Arc<DashMap<String, RateLimitEntry>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            config,
        }
    }

    pub fn check(&self, key: &str) -> RateLimitResult {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> RateLimitResult {
        let limit = self.config.requests_per_window;
        let window = self.config.window_duration;

        if self.entries.len() >= PURGE_THRESHOLD {
            self.purge_expired_at(now);
        }

        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| RateLimitEntry::new(now));
        entry.record(now, window);

        RateLimitResult {
            allowed: entry.count <= limit,
            limit,
            remaining: limit.saturating_sub(entry.count),
            reset_after: entry.time_until_reset(now, window),
        }
    }

    /// Drops counters whose window has already closed.
    fn purge_expired_at(&self, now: Instant) {
        let window = self.config.window_duration;
        self.entries
            .retain(|_, entry| now.duration_since(entry.window_start) < window);
    }
}

fn num_to_header_value<T: ToString>(value: T) -> HeaderValue {
    HeaderValue::from_str(&value.to_string()).unwrap_or_else(|_| HeaderValue::from_static("0"))
}

fn forwarded_ip(request: &Request) -> Option<&str> {
    let headers = request.headers();
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    forwarded.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
    })
}

/// Key for the calling client.
///
/// Forwarding headers win only when `trust_proxy_headers` is set; otherwise
/// the connection's peer address is used. Requests served without connect
/// info (in-process test routers) share the `ip:unknown` bucket.
pub fn extract_ip_key(request: &Request, trust_proxy_headers: bool) -> String {
    if trust_proxy_headers {
        if let Some(ip) = forwarded_ip(request) {
            return format!("ip:{}", ip);
        }
    }

    match request.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => format!("ip:{}", addr.ip()),
        None => "ip:unknown".to_string(),
    }
}

fn apply_headers(response: &mut Response, result: &RateLimitResult) {
    let headers = response.headers_mut();
    headers.insert(LIMIT_HEADER, num_to_header_value(result.limit));
    headers.insert(REMAINING_HEADER, num_to_header_value(result.remaining));
    headers.insert(
        RESET_HEADER,
        num_to_header_value(result.reset_after.as_secs()),
    );
}

/// Rejects a client with 429 once it exceeds its window allowance.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let key = extract_ip_key(&request, limiter.config.trust_proxy_headers);
    let result = limiter.check(&key);

    if !result.allowed {
        warn!(key = %key, limit = result.limit, "rate limit exceeded");
        let mut response = ServiceError::RateLimited.into_response();
        apply_headers(&mut response, &result);
        response.headers_mut().insert(
            RETRY_AFTER_HEADER,
            num_to_header_value(result.reset_after.as_secs().max(1)),
        );
        return response;
    }

    let mut response = next.run(request).await;
    apply_headers(&mut response, &result);
    response
}

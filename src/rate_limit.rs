//! Fixed-window request counter per client IP.
//!
//! Each IP gets a counter in a moka cache whose entries expire one window
//! after creation. Counters are never re-inserted, so the window is fixed
//! from the first request rather than sliding.
//!
//! The client is the socket peer. `X-Forwarded-For` is only consulted when
//! `rate_limit.trust_forwarded_for` is set, i.e. behind a known proxy.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use moka::future::Cache;
use tracing::warn;

use crate::{config::RateLimitConfig, error::ApiError, schemas::AppState};

#[derive(Clone, Debug)]
pub struct RateLimiter {
    hits: Cache<String, Arc<AtomicU64>>,
    max_requests: u64,
    trust_forwarded_for: bool,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let hits = Cache::builder()
            .max_capacity(100_000)
            .time_to_live(Duration::from_secs(config.window_secs))
            .build();
        Self {
            hits,
            max_requests: config.max_requests,
            trust_forwarded_for: config.trust_forwarded_for,
        }
    }

    /// Count one request for `key`; false once the window's budget is spent.
    pub async fn try_acquire(&self, key: &str) -> bool {
        let counter = self
            .hits
            .get_with(key.to_string(), async { Arc::new(AtomicU64::new(0)) })
            .await;
        counter.fetch_add(1, Ordering::Relaxed) < self.max_requests
    }
}

/// The socket peer, or the first `X-Forwarded-For` hop when the proxy is
/// trusted. `"unknown"` when neither is available.
fn client_key(request: &Request, trust_forwarded_for: bool) -> String {
    let forwarded = trust_forwarded_for
        .then(|| request.headers().get("x-forwarded-for"))
        .flatten()
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let key = client_key(&request, state.rate_limiter.trust_forwarded_for);
    if !state.rate_limiter.try_acquire(&key).await {
        warn!(client = %key, "Rate limit exceeded");
        return Err(ApiError::TooManyRequests);
    }
    Ok(next.run(request).await)
}

use crate::error::AppError;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use governor::{
    Quota, RateLimiter,
    clock::{Clock, DefaultClock},
    state::keyed::DashMapStateStore,
};
use std::{
    collections::VecDeque,
    net::{IpAddr, SocketAddr},
    num::NonZeroU32,
    str::FromStr,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::task::JoinHandle;

/// Per-address request limiter shared by every request task.
pub trait RequestLimiter: Send + Sync + 'static {
    /// Record a request from `key`.
    ///
    /// Returns `Err(wait)` with the time until the caller may retry when the
    /// quota is exhausted. Rejected requests are not recorded.
    fn check(&self, key: IpAddr) -> Result<(), Duration>;

    /// Drop state for keys that have been idle for a full window.
    fn evict_expired(&self);

    fn check_and_increment(&self, key: IpAddr) -> bool {
        self.check(key).is_ok()
    }
}

/// Which limiting algorithm backs the IP limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitStrategy {
    /// Exact rolling log of request instants per address.
    SlidingWindow,
    /// Generic cell rate algorithm via `governor`.
    Gcra,
}

impl FromStr for RateLimitStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sliding_window" | "sliding-window" => Ok(RateLimitStrategy::SlidingWindow),
            "gcra" => Ok(RateLimitStrategy::Gcra),
            other => Err(anyhow::anyhow!("Unknown rate limit strategy '{}'", other)),
        }
    }
}

/// Rolling-window limiter: at most `quota` requests in any `window`.
pub struct SlidingWindowLimiter {
    quota: usize,
    window: Duration,
    hits: DashMap<IpAddr, VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    pub fn new(quota: u32, window: Duration) -> Self {
        Self {
            quota: quota.max(1) as usize,
            window,
            hits: DashMap::new(),
        }
    }

    fn check_at(&self, key: IpAddr, now: Instant) -> Result<(), Duration> {
        let mut entry = self.hits.entry(key).or_default();
        let log = entry.value_mut();

        while let Some(&oldest) = log.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                log.pop_front();
            } else {
                break;
            }
        }

        if log.len() >= self.quota {
            let wait = log
                .front()
                .map(|oldest| self.window.saturating_sub(now.saturating_duration_since(*oldest)))
                .unwrap_or(self.window);
            return Err(wait);
        }

        log.push_back(now);
        Ok(())
    }

    fn evict_at(&self, now: Instant) {
        let window = self.window;
        self.hits.retain(|_, log| {
            log.back()
                .is_some_and(|latest| now.saturating_duration_since(*latest) < window)
        });
    }

    /// Number of addresses currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.hits.len()
    }
}

impl RequestLimiter for SlidingWindowLimiter {
    fn check(&self, key: IpAddr) -> Result<(), Duration> {
        self.check_at(key, Instant::now())
    }

    fn evict_expired(&self) {
        self.evict_at(Instant::now());
    }
}

/// Keyed GCRA limiter: bursts up to `quota`, then one request per `window / quota`.
pub struct GcraLimiter {
    limiter: RateLimiter<IpAddr, DashMapStateStore<IpAddr>, DefaultClock>,
}

impl GcraLimiter {
    pub fn new(quota: u32, window: Duration) -> Self {
        let attempts = quota.max(1);
        let period = (window / attempts).max(Duration::from_millis(1));
        let burst = NonZeroU32::new(attempts).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
            .allow_burst(burst);

        Self {
            limiter: RateLimiter::dashmap(quota),
        }
    }
}

impl RequestLimiter for GcraLimiter {
    fn check(&self, key: IpAddr) -> Result<(), Duration> {
        self.limiter
            .check_key(&key)
            .map_err(|negative| negative.wait_time_from(DefaultClock::default().now()))
    }

    fn evict_expired(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }
}

/// Create a limiter keyed by client IP address.
pub fn create_ip_rate_limiter(
    strategy: RateLimitStrategy,
    requests: u32,
    window: Duration,
) -> Arc<dyn RequestLimiter> {
    match strategy {
        RateLimitStrategy::SlidingWindow => Arc::new(SlidingWindowLimiter::new(requests, window)),
        RateLimitStrategy::Gcra => Arc::new(GcraLimiter::new(requests, window)),
    }
}

/// Periodically evict idle limiter state.
pub fn spawn_eviction_task(limiter: Arc<dyn RequestLimiter>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            limiter.evict_expired();
            tracing::debug!("Evicted idle rate limit entries");
        }
    })
}

/// State for [`ip_rate_limit_middleware`].
#[derive(Clone)]
pub struct IpRateLimit {
    pub limiter: Arc<dyn RequestLimiter>,
    /// Use the first `X-Forwarded-For` hop instead of the peer address.
    pub trust_forwarded_for: bool,
}

fn client_ip(request: &Request, trust_forwarded_for: bool) -> Option<IpAddr> {
    let forwarded_ip = if trust_forwarded_for {
        request
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
    } else {
        None
    };

    forwarded_ip.or_else(|| {
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    })
}

/// Middleware for IP-based rate limiting
pub async fn ip_rate_limit_middleware(
    State(state): State<IpRateLimit>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    match client_ip(&request, state.trust_forwarded_for) {
        Some(ip) => match state.limiter.check(ip) {
            Ok(()) => Ok(next.run(request).await),
            Err(wait) => {
                tracing::warn!(client_ip = %ip, path = %request.uri().path(), "Rate limit exceeded");
                Err(AppError::TooManyRequests(
                    "Too many requests from this IP. Please try again later.".to_string(),
                    Some(wait.as_secs().max(1)),
                ))
            }
        },
        None => {
            tracing::warn!("Could not determine IP for rate limiting");
            Ok(next.run(request).await)
        }
    }
}

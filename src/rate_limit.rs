use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::AppError;

/// How long a client stays blocked after hammering the API at twice its limit.
pub const BLOCK_DURATION: Duration = Duration::from_secs(300);

#[derive(Debug, Default)]
struct ClientWindow {
    hits: VecDeque<Instant>,
    blocked_until: Option<Instant>,
}

/// RateLimiter
///
/// Sliding-window request counter keyed by client IP. A request is refused once `limit`
/// requests were seen inside `window`; a client whose attempts reach twice the limit is
/// blocked outright for `BLOCK_DURATION`. A `limit` of 0 disables the limiter.
#[derive(Clone)]
pub struct RateLimiter {
    clients: Arc<Mutex<HashMap<IpAddr, ClientWindow>>>,
    limit: usize,
    window: Duration,
    block: Duration,
}

impl RateLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self::with_block(limit, window, BLOCK_DURATION)
    }

    pub fn per_minute(limit: usize) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    pub fn with_block(limit: usize, window: Duration, block: Duration) -> Self {
        Self {
            clients: Arc::new(Mutex::new(HashMap::new())),
            limit,
            window,
            block,
        }
    }

    pub async fn check(&self, ip: IpAddr) -> bool {
        self.check_at(ip, Instant::now()).await
    }

    async fn check_at(&self, ip: IpAddr, now: Instant) -> bool {
        if self.limit == 0 {
            return true;
        }
        let mut clients = self.clients.lock().await;
        let client = clients.entry(ip).or_default();

        if let Some(until) = client.blocked_until {
            if now < until {
                return false;
            }
            client.blocked_until = None;
            client.hits.clear();
        }

        while let Some(first) = client.hits.front() {
            if now.duration_since(*first) >= self.window {
                client.hits.pop_front();
            } else {
                break;
            }
        }

        // Refused attempts still count, so a client that keeps pushing reaches the block.
        client.hits.push_back(now);
        if client.hits.len() >= self.limit * 2 {
            client.blocked_until = Some(now + self.block);
            warn!(ip = %ip, "client blocked for repeated rate limit violations");
            return false;
        }
        client.hits.len() <= self.limit
    }

    /// Forgets clients with no recent activity and no active block.
    pub async fn purge_stale(&self) {
        let now = Instant::now();
        let mut clients = self.clients.lock().await;
        clients.retain(|_, client| {
            client.blocked_until.is_some_and(|until| until > now)
                || client
                    .hits
                    .back()
                    .is_some_and(|last| now.duration_since(*last) < self.window)
        });
    }
}

/// rate_limit_middleware
///
/// Refuses the request with 429 when the client's budget is spent. Requests whose client
/// address cannot be determined pass through.
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(ip) = extract_client_ip(&req) {
        if !limiter.check(ip).await {
            warn!(ip = %ip, "rate limit exceeded");
            return Err(AppError::RateLimited);
        }
    }

    Ok(next.run(req).await)
}

/// Try ConnectInfo first, then X-Forwarded-For, then X-Real-IP.
pub fn extract_client_ip<B>(req: &Request<B>) -> Option<IpAddr> {
    if let Some(connect_info) = req.extensions().get::<ConnectInfo<std::net::SocketAddr>>() {
        return Some(connect_info.0.ip());
    }

    let header_ip = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .and_then(|first| first.trim().parse::<IpAddr>().ok())
    };

    header_ip("x-forwarded-for").or_else(|| header_ip("x-real-ip"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_allows_up_to_limit() {
        let limiter = RateLimiter::per_minute(3);
        let client = ip("127.0.0.1");

        for _ in 0..3 {
            assert!(limiter.check(client).await);
        }
        assert!(!limiter.check(client).await);
    }

    #[tokio::test]
    async fn test_clients_are_independent() {
        let limiter = RateLimiter::per_minute(1);
        assert!(limiter.check(ip("10.0.0.1")).await);
        assert!(!limiter.check(ip("10.0.0.1")).await);
        assert!(limiter.check(ip("10.0.0.2")).await);
    }

    #[tokio::test]
    async fn test_window_slides() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let client = ip("10.0.0.3");
        let start = Instant::now();

        assert!(limiter.check_at(client, start).await);
        assert!(limiter.check_at(client, start).await);
        assert!(!limiter.check_at(client, start).await);
        assert!(limiter.check_at(client, start + Duration::from_secs(61)).await);
    }

    #[tokio::test]
    async fn test_double_limit_blocks_client() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let client = ip("10.0.0.4");
        let start = Instant::now();

        for _ in 0..3 {
            limiter.check_at(client, start).await;
        }
        // Fourth attempt reaches twice the limit.
        assert!(!limiter.check_at(client, start).await);
        // The window has passed but the block has not.
        assert!(!limiter.check_at(client, start + Duration::from_secs(120)).await);
        assert!(limiter.check_at(client, start + BLOCK_DURATION + Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_zero_limit_disables_limiter() {
        let limiter = RateLimiter::per_minute(0);
        let client = ip("10.0.0.5");
        for _ in 0..50 {
            assert!(limiter.check(client).await);
        }
        assert!(limiter.clients.lock().await.is_empty());
    }

    #[test]
    fn test_client_ip_from_headers() {
        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .body(())
            .unwrap();
        assert_eq!(extract_client_ip(&req), Some(ip("203.0.113.9")));

        let req = Request::builder().header("x-real-ip", "198.51.100.2").body(()).unwrap();
        assert_eq!(extract_client_ip(&req), Some(ip("198.51.100.2")));

        let req = Request::builder().body(()).unwrap();
        assert_eq!(extract_client_ip(&req), None);
    }
}

/// Fixed-window rate limiting for message posting.
///
/// One expiring counter per client IP: the first hit in a window creates the
/// key with a TTL, every hit increments it, and the request is rejected once
/// the counter exceeds the capacity. The counter backend is injected through
/// `CounterStore` so the limiter itself carries no global state.
use actix_web::{
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    middleware::Next,
    web, Error,
};
use deadpool_redis::redis::cmd;
use std::sync::Arc;

use crate::api::error;

#[async_trait::async_trait]
pub trait CounterStore {
    /// Increments the counter behind `key`, creating it with `ttl_secs` to
    /// live when absent. Returns the counter value after the increment.
    async fn incr(&self, key: &str, ttl_secs: u64) -> Result<u64, error::SystemError>;
}

pub struct RedisCounterStore {
    pool: deadpool_redis::Pool,
}

impl RedisCounterStore {
    pub fn new(pool: deadpool_redis::Pool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CounterStore for RedisCounterStore {
    async fn incr(&self, key: &str, ttl_secs: u64) -> Result<u64, error::SystemError> {
        let mut conn = self.pool.get().await?;

        let count: u64 = cmd("INCR").arg(key).query_async(&mut conn).await?;

        // Only the hit that created the key sets the TTL, so the window is
        // anchored at the first request.
        if count == 1 {
            cmd("EXPIRE").arg(key).arg(ttl_secs).query_async::<()>(&mut conn).await?;
        }

        Ok(count)
    }
}

pub struct RateLimiter {
    capacity: u64,
    window_secs: u64,
    store: Arc<dyn CounterStore + Send + Sync>,
}

impl RateLimiter {
    pub fn new(capacity: u64, window_secs: u64, store: Arc<dyn CounterStore + Send + Sync>) -> Self {
        Self { capacity, window_secs, store }
    }

    pub async fn check(&self, client_key: &str) -> Result<(), error::SystemError> {
        let key = format!("ratelimit:message:{}", client_key);
        let count = self.store.incr(&key, self.window_secs).await?;

        if count > self.capacity {
            log::warn!("Rate limit exceeded for {} ({} requests)", client_key, count);
            return Err(error::SystemError::too_many_requests(
                "Too many messages, slow down",
            ));
        }

        Ok(())
    }
}

/// Applies the limiter to message-creating requests, keyed by the caller's IP.
/// Reads and other methods pass through untouched.
pub async fn message_rate_limit<B>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<B>, Error>
where
    B: MessageBody + 'static,
{
    if req.method() == actix_web::http::Method::POST {
        let limiter = req
            .app_data::<web::Data<RateLimiter>>()
            .ok_or_else(error::Error::internal_server_error)?
            .clone();

        let client_key = req
            .connection_info()
            .realip_remote_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        limiter.check(&client_key).await.map_err(error::Error::from)?;
    }

    next.call(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    /// Expiring counters in memory, same contract as the Redis store.
    struct MemCounterStore {
        counters: Mutex<HashMap<String, (u64, Instant)>>,
    }

    impl MemCounterStore {
        fn new() -> Self {
            Self { counters: Mutex::new(HashMap::new()) }
        }
    }

    #[async_trait::async_trait]
    impl CounterStore for MemCounterStore {
        async fn incr(&self, key: &str, ttl_secs: u64) -> Result<u64, error::SystemError> {
            let mut counters = self.counters.lock().unwrap();
            let now = Instant::now();

            let entry = counters
                .entry(key.to_string())
                .and_modify(|(count, expires_at)| {
                    if *expires_at <= now {
                        *count = 0;
                        *expires_at = now + Duration::from_secs(ttl_secs);
                    }
                })
                .or_insert((0, now + Duration::from_secs(ttl_secs)));

            entry.0 += 1;
            Ok(entry.0)
        }
    }

    #[actix_web::test]
    async fn sixth_request_in_window_is_rejected() {
        let limiter = RateLimiter::new(5, 60, Arc::new(MemCounterStore::new()));

        for _ in 0..5 {
            limiter.check("10.0.0.1").await.unwrap();
        }

        let rejected = limiter.check("10.0.0.1").await;
        assert!(matches!(rejected, Err(error::SystemError::TooManyRequests(_))));
    }

    #[actix_web::test]
    async fn clients_are_limited_independently() {
        let limiter = RateLimiter::new(2, 60, Arc::new(MemCounterStore::new()));

        limiter.check("10.0.0.1").await.unwrap();
        limiter.check("10.0.0.1").await.unwrap();
        assert!(limiter.check("10.0.0.1").await.is_err());

        // A different client still has a fresh window.
        limiter.check("10.0.0.2").await.unwrap();
    }

    #[actix_web::test]
    async fn window_expiry_resets_the_counter() {
        let limiter = RateLimiter::new(1, 1, Arc::new(MemCounterStore::new()));

        limiter.check("10.0.0.1").await.unwrap();
        assert!(limiter.check("10.0.0.1").await.is_err());

        std::thread::sleep(Duration::from_millis(1100));

        limiter.check("10.0.0.1").await.unwrap();
    }
}

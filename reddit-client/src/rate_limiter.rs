use filters_core::CoreError;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};
use tokio::time::sleep;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub time_window: Duration,
    pub burst_allowance: u32,
}

impl RateLimitConfig {
    /// One request per `interval`, no bursting.
    pub fn fixed_interval(interval: Duration) -> Self {
        Self {
            max_requests: 1,
            time_window: interval,
            burst_allowance: 1,
        }
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

#[derive(Debug)]
pub struct TokenBucket {
    state: Mutex<BucketState>,
    capacity: f64,
    refill_rate: f64, // tokens per second
}

impl TokenBucket {
    pub fn new(config: &RateLimitConfig) -> Self {
        let capacity = config.burst_allowance.max(1) as f64;
        let refill_rate = config.max_requests as f64 / config.time_window.as_secs_f64();

        Self {
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            capacity,
            refill_rate,
        }
    }

    /// Takes `tokens_needed` tokens, or returns how long to wait until they are available.
    pub async fn acquire(&self, tokens_needed: f64) -> Result<(), Duration> {
        let mut state = self.state.lock().await;
        self.refill(&mut state);

        if state.tokens >= tokens_needed {
            state.tokens -= tokens_needed;
            Ok(())
        } else {
            let missing = tokens_needed - state.tokens;
            Err(Duration::from_secs_f64(missing / self.refill_rate))
        }
    }

    pub async fn get_available_tokens(&self) -> f64 {
        let mut state = self.state.lock().await;
        self.refill(&mut state);
        state.tokens
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill);
        state.tokens = (state.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity);
        state.last_refill = now;
    }
}

/// Process-wide gate in front of upstream requests.
///
/// Callers queue on a fair semaphore, so waiters are served in arrival order.
/// The returned permit is meant to be held for the whole upstream request.
#[derive(Debug)]
pub struct RateLimiter {
    token_bucket: TokenBucket,
    semaphore: Semaphore,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let semaphore = Semaphore::new(config.burst_allowance.max(1) as usize);
        let token_bucket = TokenBucket::new(&config);

        Self {
            token_bucket,
            semaphore,
            config,
        }
    }

    pub async fn acquire_permit(&self) -> Result<RateLimitPermit<'_>, CoreError> {
        let start_time = Instant::now();
        let permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| CoreError::Internal {
                message: "rate limiter closed".to_string(),
            })?;

        loop {
            match self.token_bucket.acquire(1.0).await {
                Ok(()) => break,
                Err(wait_time) => {
                    tracing::debug!("Rate limit reached, waiting {:?}", wait_time);
                    sleep(wait_time).await;
                }
            }
        }

        Ok(RateLimitPermit {
            _permit: permit,
            queue_wait_time: start_time.elapsed(),
        })
    }

    pub fn interval(&self) -> Duration {
        self.config.time_window / self.config.max_requests.max(1)
    }

    pub async fn available_tokens(&self) -> f64 {
        self.token_bucket.get_available_tokens().await
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[derive(Debug)]
pub struct RateLimitPermit<'a> {
    _permit: SemaphorePermit<'a>,
    pub queue_wait_time: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_token_bucket_basic() {
        let config = RateLimitConfig {
            max_requests: 10,
            time_window: Duration::from_secs(10),
            burst_allowance: 5,
        };

        let bucket = TokenBucket::new(&config);

        // Should be able to acquire up to burst allowance
        for _ in 0..5 {
            assert!(bucket.acquire(1.0).await.is_ok());
        }

        // Next acquisition should fail
        assert!(bucket.acquire(1.0).await.is_err());
    }

    #[tokio::test]
    async fn test_token_bucket_refill() {
        let config = RateLimitConfig {
            max_requests: 60, // 1 token per second
            time_window: Duration::from_secs(60),
            burst_allowance: 2,
        };

        let bucket = TokenBucket::new(&config);

        // Use all tokens
        assert!(bucket.acquire(2.0).await.is_ok());
        let wait = bucket.acquire(1.0).await.unwrap_err();
        assert!(wait <= Duration::from_secs(1));

        // Wait for refill
        sleep(Duration::from_millis(1100)).await;

        // Should be able to acquire one token now
        assert!(bucket.acquire(1.0).await.is_ok());
    }

    #[test]
    fn test_fixed_interval_config() {
        let config = RateLimitConfig::fixed_interval(Duration::from_millis(500));
        assert_eq!(config.max_requests, 1);
        assert_eq!(config.burst_allowance, 1);

        let limiter = RateLimiter::new(config);
        assert_eq!(limiter.interval(), Duration::from_millis(500));
        assert_eq!(limiter.available_permits(), 1);
    }

    #[tokio::test]
    async fn test_first_permit_is_immediate() {
        let limiter = RateLimiter::new(RateLimitConfig::fixed_interval(Duration::from_secs(5)));

        let permit = limiter.acquire_permit().await.unwrap();
        assert!(permit.queue_wait_time < Duration::from_secs(1));
        assert_eq!(limiter.available_permits(), 0);

        drop(permit);
        assert_eq!(limiter.available_permits(), 1);
        assert!(limiter.available_tokens().await < 1.0);
    }

    #[tokio::test]
    async fn test_consecutive_permits_are_spaced() {
        let interval = Duration::from_millis(200);
        let limiter = RateLimiter::new(RateLimitConfig::fixed_interval(interval));

        let start = Instant::now();
        drop(limiter.acquire_permit().await.unwrap());
        drop(limiter.acquire_permit().await.unwrap());

        assert!(start.elapsed() >= interval - Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_concurrent_callers_are_serialized() {
        let interval = Duration::from_millis(100);
        let limiter = Arc::new(RateLimiter::new(RateLimitConfig::fixed_interval(interval)));

        let start = Instant::now();
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move {
                    let _permit = limiter.acquire_permit().await.unwrap();
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        // Three requests need two full intervals between them
        assert!(start.elapsed() >= interval * 2 - Duration::from_millis(20));
    }
}

//! Token bucket throttle shared by every lookup of a batch.
//!
//! The classification service enforces a request-rate ceiling. All workers
//! acquire a permit from the same [`Throttle`] before each request, so the
//! ceiling holds no matter how many lookups run concurrently.

use tokio::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};
use tracing::debug;

/// Token bucket refilled with one token per interval.
///
/// A zero interval disables throttling.
pub struct TokenBucket {
    /// Max tokens (= burst size).
    capacity: f64,
    /// Current available tokens.
    tokens: f64,
    /// Time to earn one token.
    interval: Duration,
    /// Last refill time.
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a new token bucket.
    ///
    /// The bucket starts full, allowing `burst` immediate requests.
    pub fn new(burst: u32, interval: Duration) -> Self {
        let capacity = burst.max(1) as f64;
        Self {
            capacity,
            tokens: capacity,
            interval,
            last_refill: Instant::now(),
        }
    }

    /// Whether this bucket never makes callers wait.
    pub fn is_unlimited(&self) -> bool {
        self.interval.is_zero()
    }

    /// Try to acquire a token.
    ///
    /// Returns `Err(wait_duration)` if no token is available yet.
    pub fn try_acquire(&mut self) -> Result<(), Duration> {
        if self.is_unlimited() {
            return Ok(());
        }

        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            Err(self.wait_for_token())
        }
    }

    fn wait_for_token(&self) -> Duration {
        let tokens_needed = 1.0 - self.tokens;
        self.interval.mul_f64(tokens_needed)
    }

    /// Refill tokens based on elapsed time.
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        let earned = elapsed / self.interval.as_secs_f64();
        self.tokens = (self.tokens + earned).min(self.capacity);
        self.last_refill = now;
    }
}

/// Process-wide request throttle.
///
/// The bucket lock is only held while checking for a token, never while
/// sleeping.
pub struct Throttle {
    bucket: Mutex<TokenBucket>,
}

impl Throttle {
    /// Create a throttle allowing `burst` requests, then one per `interval`.
    pub fn new(burst: u32, interval: Duration) -> Self {
        Self {
            bucket: Mutex::new(TokenBucket::new(burst, interval)),
        }
    }

    /// Wait until a request may be sent.
    ///
    /// Returns the total time spent waiting.
    pub async fn acquire(&self) -> Duration {
        let mut waited = Duration::ZERO;
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                match bucket.try_acquire() {
                    Ok(()) => return waited,
                    Err(wait) => wait,
                }
            };
            debug!("Throttle: waiting {:?}", wait);
            sleep(wait).await;
            waited += wait;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_token_bucket_new() {
        let bucket = TokenBucket::new(3, Duration::from_millis(100));
        assert_eq!(bucket.capacity, 3.0);
        assert_eq!(bucket.tokens, 3.0);
        assert!(!bucket.is_unlimited());
    }

    #[test]
    fn test_token_bucket_burst_then_wait() {
        let mut bucket = TokenBucket::new(2, Duration::from_secs(6));

        assert!(bucket.try_acquire().is_ok());
        assert!(bucket.try_acquire().is_ok());

        let wait = bucket.try_acquire().unwrap_err();
        assert!(wait <= Duration::from_secs(6));
        assert!(wait.as_millis() > 0);
    }

    #[test]
    fn test_zero_burst_behaves_like_one() {
        let mut bucket = TokenBucket::new(0, Duration::from_secs(1));
        assert!(bucket.try_acquire().is_ok());
        assert!(bucket.try_acquire().is_err());
    }

    #[test]
    fn test_unlimited_bucket_never_waits() {
        let mut bucket = TokenBucket::new(1, Duration::ZERO);
        for _ in 0..100 {
            assert!(bucket.try_acquire().is_ok());
        }
    }

    #[test]
    fn test_wait_shrinks_as_tokens_refill() {
        let mut bucket = TokenBucket::new(1, Duration::from_secs(10));
        bucket.try_acquire().unwrap();

        let wait = bucket.try_acquire().unwrap_err();
        assert!(wait > Duration::from_secs(9));
        assert!(wait <= Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_token_bucket_refill() {
        let mut bucket = TokenBucket::new(1, Duration::from_millis(1000));
        bucket.try_acquire().unwrap();

        sleep(Duration::from_millis(100)).await;
        bucket.refill();

        // Should have refilled ~0.1 tokens
        assert!(bucket.tokens > 0.05);
        assert!(bucket.tokens < 0.5);
    }

    #[tokio::test]
    async fn test_throttle_spaces_requests() {
        let throttle = Throttle::new(1, Duration::from_millis(30));
        let start = Instant::now();

        for _ in 0..4 {
            throttle.acquire().await;
        }

        // First permit is immediate, the next three each wait one interval.
        assert!(start.elapsed() >= Duration::from_millis(85));
    }

    #[tokio::test]
    async fn test_throttle_is_shared_across_tasks() {
        let throttle = Arc::new(Throttle::new(1, Duration::from_millis(25)));
        let start = Instant::now();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let throttle = Arc::clone(&throttle);
                tokio::spawn(async move { throttle.acquire().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(start.elapsed() >= Duration::from_millis(70));
    }

    #[tokio::test]
    async fn test_unlimited_throttle() {
        let throttle = Throttle::new(1, Duration::ZERO);
        for _ in 0..10 {
            assert_eq!(throttle.acquire().await, Duration::ZERO);
        }
    }
}

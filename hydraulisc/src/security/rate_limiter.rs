//! Sliding-window rate limiting for the credential endpoints.

use super::errors::{RateLimitError, RateLimiterResult};
use std::{
    collections::{HashMap, VecDeque},
    time::{Duration, Instant},
};
use tokio::sync::Mutex;

/// Endpoint name for login attempts
pub const LOGIN_ENDPOINT: &str = "login";

/// Endpoint name for registration attempts
pub const REGISTER_ENDPOINT: &str = "register";

/// Rate limit configuration for an endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum attempts allowed in window
    pub max_attempts: u32,

    /// Sliding window length
    pub window: Duration,
}

impl RateLimitConfig {
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
        }
    }

    /// Configuration for login endpoint
    ///
    /// `RATE_LIMIT_LOGIN_ATTEMPTS` (default 10) per
    /// `RATE_LIMIT_LOGIN_WINDOW_SECS` (default 900).
    pub fn login() -> Self {
        Self {
            max_attempts: env_or("RATE_LIMIT_LOGIN_ATTEMPTS", 10),
            window: Duration::from_secs(env_or("RATE_LIMIT_LOGIN_WINDOW_SECS", 900)),
        }
    }

    /// Configuration for registration endpoint
    ///
    /// `RATE_LIMIT_REGISTER_ATTEMPTS` (default 5) per
    /// `RATE_LIMIT_REGISTER_WINDOW_SECS` (default 3600).
    pub fn register() -> Self {
        Self {
            max_attempts: env_or("RATE_LIMIT_REGISTER_ATTEMPTS", 5),
            window: Duration::from_secs(env_or("RATE_LIMIT_REGISTER_WINDOW_SECS", 3600)),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Rate limiter keyed by `endpoint:identifier`
///
/// Each key keeps the timestamps of its attempts inside the window. Checking
/// and recording happen under one lock, so concurrent requests cannot all
/// slip past the limit.
pub struct RateLimiter {
    attempts: Mutex<HashMap<String, VecDeque<Instant>>>,
    configs: HashMap<String, RateLimitConfig>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    /// Create a rate limiter with the login and register limits
    pub fn new() -> Self {
        let mut configs = HashMap::new();
        configs.insert(LOGIN_ENDPOINT.to_string(), RateLimitConfig::login());
        configs.insert(REGISTER_ENDPOINT.to_string(), RateLimitConfig::register());
        Self::with_configs(configs)
    }

    /// Create a rate limiter with explicit endpoint configurations
    pub fn with_configs(configs: HashMap<String, RateLimitConfig>) -> Self {
        Self {
            attempts: Mutex::new(HashMap::new()),
            configs,
        }
    }

    /// Atomically check rate limit and record attempt
    ///
    /// # Example
    ///
    /// ```
    /// # use hydraulisc::security::{RateLimiter, RateLimitResult};
    /// # async fn example(limiter: &RateLimiter) {
    /// match limiter.check_and_record("login", "192.168.1.1").await {
    ///     Ok(RateLimitResult::Allowed { remaining }) => {
    ///         println!("Request allowed, {} attempts remaining", remaining);
    ///     }
    ///     Ok(RateLimitResult::Locked { retry_after }) => {
    ///         println!("Rate limited, retry after {} seconds", retry_after);
    ///     }
    ///     Err(e) => println!("Error: {}", e),
    /// }
    /// # }
    /// ```
    pub async fn check_and_record(
        &self,
        endpoint: &str,
        identifier: &str,
    ) -> RateLimiterResult<RateLimitResult> {
        let config = self
            .configs
            .get(endpoint)
            .ok_or_else(|| RateLimitError::InvalidEndpoint(endpoint.to_string()))?;

        let key = format!("{}:{}", endpoint, identifier);
        let now = Instant::now();

        let mut attempts = self.attempts.lock().await;
        let timestamps = attempts.entry(key).or_default();

        // Remove timestamps outside the window
        while let Some(ts) = timestamps.front() {
            if now.duration_since(*ts) >= config.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() >= config.max_attempts as usize {
            let retry_after = timestamps
                .front()
                .map(|oldest| config.window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or_default();

            // Round up so callers never retry a moment too early
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            return Ok(RateLimitResult::Locked { retry_after: secs });
        }

        timestamps.push_back(now);
        let remaining = config.max_attempts - timestamps.len() as u32;

        Ok(RateLimitResult::Allowed { remaining })
    }

    /// Like [`check_and_record`](Self::check_and_record), but a lockout is an error
    pub async fn enforce(&self, endpoint: &str, identifier: &str) -> RateLimiterResult<u32> {
        match self.check_and_record(endpoint, identifier).await? {
            RateLimitResult::Allowed { remaining } => Ok(remaining),
            RateLimitResult::Locked { retry_after } => Err(RateLimitError::Exceeded {
                endpoint: endpoint.to_string(),
                retry_after,
            }),
        }
    }

    /// Reset rate limit for an identifier
    pub async fn reset(&self, endpoint: &str, identifier: &str) {
        let key = format!("{}:{}", endpoint, identifier);
        self.attempts.lock().await.remove(&key);
    }

    /// Drop keys whose attempts have all left their window
    pub async fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut attempts = self.attempts.lock().await;
        let before = attempts.len();

        attempts.retain(|key, timestamps| {
            let window = key
                .split_once(':')
                .and_then(|(endpoint, _)| self.configs.get(endpoint))
                .map(|config| config.window)
                .unwrap_or_default();

            timestamps
                .back()
                .is_some_and(|newest| now.duration_since(*newest) < window)
        });

        before - attempts.len()
    }
}

/// Rate limit check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Action is allowed
    Allowed { remaining: u32 },

    /// Action is blocked due to rate limit
    Locked { retry_after: u64 },
}

impl RateLimitResult {
    /// Check if action is allowed
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed { .. })
    }

    /// Get remaining attempts (if allowed)
    pub fn remaining(&self) -> Option<u32> {
        match self {
            RateLimitResult::Allowed { remaining } => Some(*remaining),
            _ => None,
        }
    }

    /// Get retry after seconds (if locked)
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            RateLimitResult::Locked { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::task::JoinSet;

    fn create_test_limiter(max_attempts: u32, window: Duration) -> RateLimiter {
        let mut configs = HashMap::new();
        configs.insert(
            "test_endpoint".to_string(),
            RateLimitConfig::new(max_attempts, window),
        );
        RateLimiter::with_configs(configs)
    }

    #[tokio::test]
    async fn test_check_and_record_allows_within_limit() {
        let limiter = create_test_limiter(5, Duration::from_secs(60));

        for i in 1..=5 {
            let result = limiter
                .check_and_record("test_endpoint", "test_user")
                .await
                .unwrap();
            assert_eq!(result.remaining(), Some(5 - i), "Attempt {}: wrong remaining count", i);
        }

        let result = limiter
            .check_and_record("test_endpoint", "test_user")
            .await
            .unwrap();
        assert!(!result.is_allowed(), "6th attempt should be locked");
        assert!(result.retry_after().unwrap() <= 60);
    }

    #[tokio::test]
    async fn test_concurrent_requests_no_race_condition() {
        let limiter = Arc::new(create_test_limiter(5, Duration::from_secs(60)));

        let mut join_set = JoinSet::new();
        for _ in 0..100 {
            let limiter = Arc::clone(&limiter);
            join_set.spawn(async move {
                limiter
                    .check_and_record("test_endpoint", "concurrent_test_user")
                    .await
            });
        }

        let mut allowed_count = 0;
        let mut locked_count = 0;
        while let Some(result) = join_set.join_next().await {
            match result.unwrap().unwrap() {
                RateLimitResult::Allowed { .. } => allowed_count += 1,
                RateLimitResult::Locked { .. } => locked_count += 1,
            }
        }

        assert_eq!(allowed_count, 5);
        assert_eq!(locked_count, 95);
    }

    #[tokio::test]
    async fn test_window_expiry_allows_new_requests() {
        let limiter = create_test_limiter(2, Duration::from_millis(100));

        assert!(limiter.check_and_record("test_endpoint", "u").await.unwrap().is_allowed());
        assert!(limiter.check_and_record("test_endpoint", "u").await.unwrap().is_allowed());
        assert!(!limiter.check_and_record("test_endpoint", "u").await.unwrap().is_allowed());

        tokio::time::sleep(Duration::from_millis(150)).await;

        let result = limiter.check_and_record("test_endpoint", "u").await.unwrap();
        assert_eq!(result, RateLimitResult::Allowed { remaining: 1 });
    }

    #[tokio::test]
    async fn test_different_identifiers_independent() {
        let limiter = create_test_limiter(1, Duration::from_secs(60));

        assert!(limiter.check_and_record("test_endpoint", "user1").await.unwrap().is_allowed());
        assert!(!limiter.check_and_record("test_endpoint", "user1").await.unwrap().is_allowed());
        assert!(limiter.check_and_record("test_endpoint", "user2").await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_unknown_endpoint_is_an_error() {
        let limiter = create_test_limiter(1, Duration::from_secs(60));
        let err = limiter.check_and_record("nope", "u").await.unwrap_err();
        assert!(matches!(err, RateLimitError::InvalidEndpoint(e) if e == "nope"));
    }

    #[tokio::test]
    async fn test_enforce_and_reset() {
        let limiter = create_test_limiter(1, Duration::from_secs(60));

        assert_eq!(limiter.enforce("test_endpoint", "u").await.unwrap(), 0);
        assert!(matches!(
            limiter.enforce("test_endpoint", "u").await,
            Err(RateLimitError::Exceeded { .. })
        ));

        limiter.reset("test_endpoint", "u").await;
        assert!(limiter.enforce("test_endpoint", "u").await.is_ok());
    }

    #[tokio::test]
    async fn test_cleanup_expired_drops_idle_keys() {
        let limiter = create_test_limiter(5, Duration::from_millis(50));
        limiter.check_and_record("test_endpoint", "a").await.unwrap();
        limiter.check_and_record("test_endpoint", "b").await.unwrap();

        assert_eq!(limiter.cleanup_expired().await, 0);
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(limiter.cleanup_expired().await, 2);
    }

    #[test]
    fn test_default_limits() {
        let login = RateLimitConfig::login();
        assert!(login.max_attempts > 0);
        assert!(login.window > Duration::ZERO);
    }
}

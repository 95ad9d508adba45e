//! Rate limiter for login attempts
//!
//! Two sliding windows guard the login endpoints:
//! - failed attempts per correo (`auth.max_login_attempts` per `auth.login_window_minutes`)
//! - requests per client IP (`auth.ip_requests_per_minute` per minute)

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::AuthConfig;

/// Login rate limiter
pub struct LoginRateLimiter {
    /// Failed login attempts by correo
    correo_attempts: Arc<RwLock<HashMap<String, Vec<DateTime<Utc>>>>>,
    /// Request attempts by IP address
    ip_attempts: Arc<RwLock<HashMap<IpAddr, Vec<DateTime<Utc>>>>>,
    max_attempts: usize,
    window: Duration,
    max_ip_requests: usize,
}

impl LoginRateLimiter {
    /// Create a limiter with the default limits (5 per 15 minutes, 10 IP requests per minute)
    pub fn new() -> Self {
        Self::with_limits(5, Duration::minutes(15), 10)
    }

    pub fn with_limits(max_attempts: usize, window: Duration, max_ip_requests: usize) -> Self {
        Self {
            correo_attempts: Arc::new(RwLock::new(HashMap::new())),
            ip_attempts: Arc::new(RwLock::new(HashMap::new())),
            max_attempts,
            window,
            max_ip_requests,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::with_limits(
            config.max_login_attempts,
            Duration::minutes(config.login_window_minutes),
            config.ip_requests_per_minute,
        )
    }

    /// Length of the per-correo window, for `retry_after`
    pub fn window_seconds(&self) -> u64 {
        self.window.num_seconds().max(0) as u64
    }

    /// Check if a correo has used up its failed attempts
    pub async fn is_correo_limited(&self, correo: &str) -> bool {
        let mut attempts = self.correo_attempts.write().await;
        let cutoff = Utc::now() - self.window;

        let correo_attempts = attempts.entry(correo.trim().to_lowercase()).or_default();
        correo_attempts.retain(|time| *time > cutoff);

        correo_attempts.len() >= self.max_attempts
    }

    /// Record a failed login attempt for a correo
    pub async fn record_failed_attempt(&self, correo: &str) {
        let mut attempts = self.correo_attempts.write().await;
        attempts
            .entry(correo.trim().to_lowercase())
            .or_default()
            .push(Utc::now());
    }

    /// Clear failed attempts for a correo (on successful login)
    pub async fn clear_correo_attempts(&self, correo: &str) {
        let mut attempts = self.correo_attempts.write().await;
        attempts.remove(&correo.trim().to_lowercase());
    }

    /// Check if an IP has exceeded its requests in the last minute
    pub async fn is_ip_limited(&self, ip: IpAddr) -> bool {
        let mut attempts = self.ip_attempts.write().await;
        let cutoff = Utc::now() - Duration::minutes(1);

        let ip_attempts = attempts.entry(ip).or_default();
        ip_attempts.retain(|time| *time > cutoff);

        ip_attempts.len() >= self.max_ip_requests
    }

    /// Record a request from IP
    pub async fn record_ip_request(&self, ip: IpAddr) {
        let mut attempts = self.ip_attempts.write().await;
        attempts.entry(ip).or_default().push(Utc::now());
    }

    /// Drop expired entries. Called periodically from a background task.
    pub async fn cleanup(&self) {
        let now = Utc::now();
        let correo_cutoff = now - self.window;
        let ip_cutoff = now - Duration::minutes(1);

        {
            let mut attempts = self.correo_attempts.write().await;
            attempts.retain(|_, times| {
                times.retain(|time| *time > correo_cutoff);
                !times.is_empty()
            });
        }

        {
            let mut attempts = self.ip_attempts.write().await;
            attempts.retain(|_, times| {
                times.retain(|time| *time > ip_cutoff);
                !times.is_empty()
            });
        }
    }

    /// Number of correos and IPs currently tracked
    pub async fn tracked(&self) -> (usize, usize) {
        let correos = self.correo_attempts.read().await.len();
        let ips = self.ip_attempts.read().await.len();
        (correos, ips)
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[tokio::test]
    async fn test_correo_rate_limit() {
        let limiter = LoginRateLimiter::new();

        for _ in 0..4 {
            assert!(!limiter.is_correo_limited("rh@empresa.mx").await);
            limiter.record_failed_attempt("rh@empresa.mx").await;
        }

        limiter.record_failed_attempt("rh@empresa.mx").await;
        assert!(limiter.is_correo_limited("rh@empresa.mx").await);

        limiter.clear_correo_attempts("rh@empresa.mx").await;
        assert!(!limiter.is_correo_limited("rh@empresa.mx").await);
    }

    #[tokio::test]
    async fn test_ip_rate_limit_from_config() {
        let config = AuthConfig {
            ip_requests_per_minute: 3,
            ..AuthConfig::default()
        };
        let limiter = LoginRateLimiter::from_config(&config);
        let ip = IpAddr::from_str("127.0.0.1").unwrap();

        for _ in 0..3 {
            assert!(!limiter.is_ip_limited(ip).await);
            limiter.record_ip_request(ip).await;
        }
        assert!(limiter.is_ip_limited(ip).await);
    }

    #[tokio::test]
    async fn test_case_insensitive_correo() {
        let limiter = LoginRateLimiter::with_limits(3, Duration::minutes(15), 10);

        limiter.record_failed_attempt("RH@Empresa.mx").await;
        limiter.record_failed_attempt(" rh@empresa.mx").await;
        assert!(!limiter.is_correo_limited("rh@empresa.mx").await);

        limiter.record_failed_attempt("RH@EMPRESA.MX").await;
        assert!(limiter.is_correo_limited("rh@empresa.mx").await);
    }

    #[tokio::test]
    async fn test_cleanup_drops_expired_windows() {
        let limiter = LoginRateLimiter::with_limits(5, Duration::zero(), 10);
        limiter.record_failed_attempt("rh@empresa.mx").await;
        limiter.record_ip_request(IpAddr::from_str("10.0.0.1").unwrap()).await;

        limiter.cleanup().await;

        let (correos, ips) = limiter.tracked().await;
        assert_eq!(correos, 0);
        assert_eq!(ips, 1);
    }
}

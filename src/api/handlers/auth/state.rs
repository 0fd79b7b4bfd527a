//! Auth state and security configuration.

use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::Duration;

use crate::security::audit::{AuditSink, MemoryAuditLog};
use crate::security::crypto;
use crate::security::fraud::{
    DeviceReputation, GeoLocator, NoopGeoLocator, NoopReputation, NoopVpnDetector, VpnDetector,
};
use crate::security::policy;
use crate::security::rate_limit::SlidingWindowRateLimiter;
use crate::store::{InMemoryAccounts, InMemorySessions, TwoFactorChallenges};

const DEFAULT_TEMP_TOKEN_TTL_SECONDS: i64 = 10 * 60;
const DEFAULT_OTP_TTL_SECONDS: i64 = 5 * 60;
const LOGIN_RATE_WINDOW_SECONDS: u64 = 60;
const LOGIN_RATE_MAX_REQUESTS: usize = 5;
const REGISTER_RATE_WINDOW_SECONDS: u64 = 60 * 60;
const REGISTER_RATE_MAX_REQUESTS: usize = 3;

#[derive(Clone, Debug)]
pub struct SecurityConfig {
    frontend_base_url: String,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
    temp_token_ttl_seconds: i64,
    otp_ttl_seconds: i64,
    max_failed_attempts: u32,
    lockout_minutes: i64,
    max_concurrent_sessions: usize,
    enc_key: SecretString,
}

impl SecurityConfig {
    #[must_use]
    pub fn new(frontend_base_url: String, enc_key: SecretString) -> Self {
        Self {
            frontend_base_url,
            access_ttl_seconds: policy::SESSION_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: policy::SESSION_REFRESH_TTL_SECONDS,
            temp_token_ttl_seconds: DEFAULT_TEMP_TOKEN_TTL_SECONDS,
            otp_ttl_seconds: DEFAULT_OTP_TTL_SECONDS,
            max_failed_attempts: policy::MAX_FAILED_ATTEMPTS,
            lockout_minutes: policy::LOCKOUT_DURATION_MINUTES,
            max_concurrent_sessions: policy::MAX_CONCURRENT_SESSIONS,
            enc_key,
        }
    }

    #[must_use]
    pub fn with_access_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_temp_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.temp_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_otp_ttl_seconds(mut self, seconds: i64) -> Self {
        self.otp_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_lockout_minutes(mut self, minutes: i64) -> Self {
        self.lockout_minutes = minutes;
        self
    }

    pub(crate) fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    pub(crate) fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl_seconds
    }

    pub(crate) fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl_seconds
    }

    pub(crate) fn temp_token_ttl_seconds(&self) -> i64 {
        self.temp_token_ttl_seconds
    }

    pub(crate) fn otp_ttl_seconds(&self) -> i64 {
        self.otp_ttl_seconds
    }

    pub(crate) fn max_failed_attempts(&self) -> u32 {
        self.max_failed_attempts
    }

    pub(crate) fn lockout_minutes(&self) -> i64 {
        self.lockout_minutes
    }

    pub(crate) fn max_concurrent_sessions(&self) -> usize {
        self.max_concurrent_sessions
    }

    /// Cipher key for sealing small secrets at rest.
    pub(crate) fn sealing_key(&self) -> [u8; crypto::KEY_LEN] {
        crypto::derive_key(self.enc_key.expose_secret())
    }
}

/// Injected fraud-signal providers; defaults fail open.
#[derive(Clone)]
pub struct FraudProviders {
    pub reputation: Arc<dyn DeviceReputation>,
    pub vpn: Arc<dyn VpnDetector>,
    pub geo: Arc<dyn GeoLocator>,
}

impl Default for FraudProviders {
    fn default() -> Self {
        Self {
            reputation: Arc::new(NoopReputation),
            vpn: Arc::new(NoopVpnDetector),
            geo: Arc::new(NoopGeoLocator),
        }
    }
}

/// Shared state for the auth endpoints: configuration, repositories, the
/// per-endpoint rate limiters, fraud providers, and the audit sink.
pub struct AuthState {
    config: SecurityConfig,
    accounts: Arc<InMemoryAccounts>,
    sessions: Arc<InMemorySessions>,
    challenges: Arc<TwoFactorChallenges>,
    login_limiter: SlidingWindowRateLimiter,
    register_limiter: SlidingWindowRateLimiter,
    providers: FraudProviders,
    audit: Arc<dyn AuditSink>,
}

impl AuthState {
    #[must_use]
    pub fn new(config: SecurityConfig) -> Self {
        Self {
            config,
            accounts: Arc::new(InMemoryAccounts::new()),
            sessions: Arc::new(InMemorySessions::new()),
            challenges: Arc::new(TwoFactorChallenges::new()),
            login_limiter: SlidingWindowRateLimiter::new(
                Duration::from_secs(LOGIN_RATE_WINDOW_SECONDS),
                LOGIN_RATE_MAX_REQUESTS,
            ),
            register_limiter: SlidingWindowRateLimiter::new(
                Duration::from_secs(REGISTER_RATE_WINDOW_SECONDS),
                REGISTER_RATE_MAX_REQUESTS,
            ),
            providers: FraudProviders::default(),
            audit: Arc::new(MemoryAuditLog::new()),
        }
    }

    #[must_use]
    pub fn with_providers(mut self, providers: FraudProviders) -> Self {
        self.providers = providers;
        self
    }

    #[must_use]
    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    #[must_use]
    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    pub(crate) fn accounts(&self) -> &InMemoryAccounts {
        &self.accounts
    }

    pub(crate) fn sessions(&self) -> &InMemorySessions {
        &self.sessions
    }

    pub(crate) fn challenges(&self) -> &TwoFactorChallenges {
        &self.challenges
    }

    pub(crate) fn login_limiter(&self) -> &SlidingWindowRateLimiter {
        &self.login_limiter
    }

    pub(crate) fn register_limiter(&self) -> &SlidingWindowRateLimiter {
        &self.register_limiter
    }

    pub(crate) fn providers(&self) -> &FraudProviders {
        &self.providers
    }

    pub(crate) fn audit(&self) -> &dyn AuditSink {
        self.audit.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SecurityConfig {
        SecurityConfig::new(
            "http://localhost:3000".to_string(),
            SecretString::from("test key".to_string()),
        )
    }

    #[test]
    fn config_defaults_follow_policy() {
        let config = config();
        assert_eq!(config.access_ttl_seconds(), 15 * 60);
        assert_eq!(config.refresh_ttl_seconds(), 7 * 24 * 60 * 60);
        assert_eq!(config.max_failed_attempts(), 3);
        assert_eq!(config.lockout_minutes(), 30);
        assert_eq!(config.max_concurrent_sessions(), 3);
    }

    #[test]
    fn builders_override_defaults() {
        let config = config()
            .with_access_ttl_seconds(60)
            .with_temp_token_ttl_seconds(30)
            .with_otp_ttl_seconds(10)
            .with_lockout_minutes(1)
            .with_refresh_ttl_seconds(120);
        assert_eq!(config.access_ttl_seconds(), 60);
        assert_eq!(config.temp_token_ttl_seconds(), 30);
        assert_eq!(config.otp_ttl_seconds(), 10);
        assert_eq!(config.lockout_minutes(), 1);
        assert_eq!(config.refresh_ttl_seconds(), 120);
    }

    #[test]
    fn sealing_key_is_deterministic_per_secret() {
        let a = config().sealing_key();
        let b = config().sealing_key();
        assert_eq!(a, b);

        let other = SecurityConfig::new(
            "http://localhost:3000".to_string(),
            SecretString::from("another key".to_string()),
        )
        .sealing_key();
        assert_ne!(a, other);
    }
}

//! Security primitives for the authentication path.
//!
//! Password policy, credential hashing, authenticated encryption, device
//! fingerprints, sliding-window rate limiting, fraud scoring, and the audit
//! log. Everything here is pure or keeps only the state it owns; external
//! lookups (geolocation, device reputation) are injected via the traits in
//! [`fraud`] and degrade to conservative defaults when unavailable.

pub mod audit;
pub mod credentials;
pub mod crypto;
pub mod fingerprint;
pub mod fraud;
pub mod policy;
pub mod rate_limit;

/// Failures inside the security primitives.
///
/// Handler-level rejections (validation, rate limiting, bad credentials,
/// lockout) are expressed as HTTP responses with stable machine-readable
/// codes; only the failures that originate down here need their own type.
/// Crypto failures never carry partial plaintext. Dependency failures are
/// absorbed by the caller and replaced with the safest available signal.
#[derive(Debug, thiserror::Error)]
pub enum SecurityError {
    #[error("cryptographic operation failed")]
    Crypto,
    #[error("security dependency unavailable")]
    DependencyUnavailable,
}

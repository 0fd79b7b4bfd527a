//! # Centinela (Account Security & Authentication)
//!
//! `centinela` is an account security and authentication service. Every
//! inbound authentication request passes through a chain of independent
//! gates, each of which can reject the request on its own:
//!
//! rate limiter → password policy / credential verification → fraud
//! scoring → audit logging → session issuance.
//!
//! ## Ordering
//!
//! Rate-limit and lockout checks run **before** credential verification so
//! that rejected requests never pay the intentional hashing cost. This is a
//! deliberate defense against resource-exhaustion attacks.
//!
//! ## Storage
//!
//! Accounts, sessions, and two-factor challenges live in constructor-injected
//! in-memory stores behind the `store` module's method surface. Swapping in a
//! database means replacing that module; none of the policy logic changes.
//! The rate limiter and lockout counters are process-local: a multi-instance
//! deployment needs a shared atomic counter service instead.

pub mod api;
pub mod cli;
pub mod security;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }
}

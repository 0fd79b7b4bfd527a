//! Credential hashing and token generation.
//!
//! Passwords and one-time codes are bcrypt-hashed with a fixed work factor;
//! comparison happens inside bcrypt and is constant-time. Raw tokens are
//! only ever returned to the caller; stores keep hashes.

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::{Rng, RngCore, rngs::OsRng};

/// Work factor for password hashes (rounds-equivalent, per policy ≥ 12).
pub const PASSWORD_COST: u32 = 12;
/// Backup codes are short-lived secrets; a lighter work factor is enough.
pub const BACKUP_CODE_COST: u32 = 10;

pub const BACKUP_CODE_COUNT: usize = 10;
pub const OTP_LENGTH: usize = 6;

/// Hash a password with bcrypt.
///
/// Intentionally expensive; call sites on the request path offload this to a
/// blocking worker so the event loop is never stalled.
///
/// # Errors
/// Returns an error if bcrypt fails to produce a hash.
pub fn hash_password(secret: &str) -> Result<String> {
    bcrypt::hash(secret, PASSWORD_COST).context("failed to hash password")
}

/// Verify a password against a stored bcrypt hash.
///
/// Malformed hashes fail closed (treated as a mismatch).
#[must_use]
pub fn verify_password(secret: &str, digest: &str) -> bool {
    bcrypt::verify(secret, digest).unwrap_or(false)
}

/// Check a candidate against up to the last `history_depth` stored digests.
#[must_use]
pub fn is_password_reused(candidate: &str, history: &[String], history_depth: usize) -> bool {
    history
        .iter()
        .take(history_depth)
        .any(|digest| verify_password(candidate, digest))
}

/// Generate a random token, URL-safe base64 encoded.
///
/// # Errors
/// Returns an error if the OS random source fails.
pub fn generate_token(bytes: usize) -> Result<String> {
    let mut buf = vec![0u8; bytes];
    OsRng
        .try_fill_bytes(&mut buf)
        .context("failed to generate token")?;
    Ok(URL_SAFE_NO_PAD.encode(buf))
}

/// Generate a numeric one-time code.
#[must_use]
pub fn generate_otp(length: usize) -> String {
    let mut rng = OsRng;
    (0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Generate backup codes for two-factor recovery: 8 uppercase hex chars each.
#[must_use]
pub fn generate_backup_codes(count: usize) -> Vec<String> {
    let mut rng = OsRng;
    (0..count)
        .map(|_| {
            let mut bytes = [0u8; 4];
            rng.fill_bytes(&mut bytes);
            bytes.iter().map(|b| format!("{b:02X}")).collect()
        })
        .collect()
}

/// Hash backup codes for storage.
///
/// # Errors
/// Returns an error if bcrypt fails on any code.
pub fn hash_backup_codes(codes: &[String]) -> Result<Vec<String>> {
    codes
        .iter()
        .map(|code| bcrypt::hash(code, BACKUP_CODE_COST).context("failed to hash backup code"))
        .collect()
}

/// Find the stored hash matching a supplied backup code, if any.
///
/// Returns the index so the caller can consume the code after use.
#[must_use]
pub fn match_backup_code(code: &str, hashed: &[String]) -> Option<usize> {
    hashed.iter().position(|digest| verify_password(code, digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_round_trip() {
        let digest = hash_password("Sup3r!Secret").expect("hash");
        assert!(verify_password("Sup3r!Secret", &digest));
        assert!(!verify_password("Sup3r!Secre7", &digest));
    }

    #[test]
    fn malformed_digest_fails_closed() {
        assert!(!verify_password("anything", "not-a-bcrypt-hash"));
    }

    #[test]
    fn reuse_check_only_scans_recent_history() {
        let old = hash_password("Old!Pass1").expect("hash");
        let recent = hash_password("Recent!Pass1").expect("hash");
        let history = vec![recent, old];

        assert!(is_password_reused("Recent!Pass1", &history, 5));
        assert!(is_password_reused("Old!Pass1", &history, 5));
        // Depth 1 only covers the most recent entry.
        assert!(!is_password_reused("Old!Pass1", &history, 1));
        assert!(!is_password_reused("Never!Used1", &history, 5));
    }

    #[test]
    fn tokens_are_unique_and_decodable() {
        let a = generate_token(32).expect("token");
        let b = generate_token(32).expect("token");
        assert_ne!(a, b);
        let decoded = URL_SAFE_NO_PAD.decode(a).expect("decode");
        assert_eq!(decoded.len(), 32);
    }

    #[test]
    fn otp_is_digits_only() {
        let otp = generate_otp(OTP_LENGTH);
        assert_eq!(otp.len(), OTP_LENGTH);
        assert!(otp.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn backup_codes_round_trip() {
        let codes = generate_backup_codes(3);
        assert_eq!(codes.len(), 3);
        for code in &codes {
            assert_eq!(code.len(), 8);
            assert!(code.chars().all(|c| c.is_ascii_hexdigit()));
        }

        let hashed = hash_backup_codes(&codes).expect("hash codes");
        assert_eq!(match_backup_code(&codes[1], &hashed), Some(1));
        assert_eq!(match_backup_code("00000000", &hashed), None);
    }
}

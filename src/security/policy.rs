//! Password, lockout, and session policy constants plus the password
//! strength check.

use chrono::{DateTime, Duration, Utc};

pub const PASSWORD_MIN_LENGTH: usize = 8;
pub const PASSWORD_MAX_LENGTH: usize = 32;
/// A new password may not match any of the last N stored hashes.
pub const PASSWORD_HISTORY_COUNT: usize = 5;
pub const PASSWORD_EXPIRY_DAYS: i64 = 90;

pub const MAX_FAILED_ATTEMPTS: u32 = 3;
pub const LOCKOUT_DURATION_MINUTES: i64 = 30;

pub const SESSION_ACCESS_TTL_SECONDS: i64 = 15 * 60;
pub const SESSION_REFRESH_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
pub const MAX_CONCURRENT_SESSIONS: usize = 3;

const SYMBOLS: &str = r##"!@#$%^&*()_+-=[]{};':"\|,.<>/?"##;

const COMMON_PASSWORDS: &[&str] = &[
    "password",
    "123456",
    "qwerty",
    "abc123",
    "password123",
    "admin123",
];

/// Result of a password policy check.
///
/// `violations` lists every broken rule, not just the first, so the caller
/// can present all issues at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordCheck {
    pub valid: bool,
    pub violations: Vec<String>,
}

/// Validate a candidate password against the policy.
///
/// Pure function over the candidate and the policy constants; deterministic
/// and order-independent in the violations it reports.
#[must_use]
pub fn validate_password(candidate: &str) -> PasswordCheck {
    let mut violations = Vec::new();

    let length = candidate.chars().count();
    if length < PASSWORD_MIN_LENGTH {
        violations.push(format!(
            "Password must be at least {PASSWORD_MIN_LENGTH} characters"
        ));
    }
    if length > PASSWORD_MAX_LENGTH {
        violations.push(format!(
            "Password must be no more than {PASSWORD_MAX_LENGTH} characters"
        ));
    }

    if !candidate.chars().any(|c| c.is_ascii_uppercase()) {
        violations.push("Password must contain at least 1 uppercase letter".to_string());
    }
    if !candidate.chars().any(|c| c.is_ascii_lowercase()) {
        violations.push("Password must contain at least 1 lowercase letter".to_string());
    }
    if !candidate.chars().any(|c| c.is_ascii_digit()) {
        violations.push("Password must contain at least 1 number".to_string());
    }
    if !candidate.chars().any(|c| SYMBOLS.contains(c)) {
        violations
            .push("Password must contain at least 1 special character (!@#$%^&* etc.)".to_string());
    }

    if COMMON_PASSWORDS.contains(&candidate.to_lowercase().as_str()) {
        violations
            .push("Password is too common. Please choose a more unique password.".to_string());
    }

    if is_single_repeated_char(candidate) {
        violations
            .push(r#"Password cannot consist of a repeated character (e.g., "aaa")"#.to_string());
    }

    PasswordCheck {
        valid: violations.is_empty(),
        violations,
    }
}

/// True when the whole password is one character repeated three or more times.
fn is_single_repeated_char(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    candidate.chars().count() >= 3 && chars.all(|c| c == first)
}

#[must_use]
pub fn password_expiry(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::days(PASSWORD_EXPIRY_DAYS)
}

#[must_use]
pub fn is_password_expired(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now > expires_at
}

#[must_use]
pub fn lockout_expiry(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::minutes(LOCKOUT_DURATION_MINUTES)
}

//! Auth handlers and supporting modules.
//!
//! This module coordinates login, registration, mobile verification,
//! two-factor challenges, and session management.
//!
//! ## Gate ordering
//!
//! The login endpoint evaluates its gates in a fixed order: rate limiter,
//! account lookup, lockout, password expiry, credential check, fraud score,
//! then two-factor or session issuance. The limiter runs before any
//! credential work so brute-force traffic never reaches bcrypt.
//!
//! ## Token handling
//!
//! Session and temporary tokens are returned to the client exactly once;
//! stores only ever hold their SHA-256 hashes. One-time codes are bcrypt
//! hashed, and the mobile verification code rests sealed under the service
//! key until redeemed.

pub(crate) mod login;
pub(crate) mod register;
pub(crate) mod session;
mod state;
pub(crate) mod two_factor;
pub(crate) mod types;
mod utils;
pub(crate) mod verify;

pub use login::login;
pub use register::register;
pub use session::{logout, session};
pub use state::{AuthState, FraudProviders, SecurityConfig};
pub use two_factor::verify as two_factor_verify;
pub use verify::verify_mobile;

#[cfg(test)]
mod tests;

//! In-memory stores behind the repository surface.
//!
//! Accounts, sessions, and two-factor challenges are constructor-injected
//! (no module-level singletons) so each test can run against an isolated
//! instance. A production deployment swaps this module for a database-backed
//! implementation with the same method surface; the policy logic above it
//! does not change.

mod accounts;
mod challenges;
mod sessions;

pub use accounts::{
    Account, AccountStatus, InMemoryAccounts, LockoutState, PasswordRecord, StoreError, Violation,
    ViolationSeverity,
};
pub use challenges::{TwoFactorChallenge, TwoFactorChallenges};
pub use sessions::{InMemorySessions, SessionRecord};

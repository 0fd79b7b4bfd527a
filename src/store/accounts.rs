//! Account records and the in-memory account repository.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::security::policy;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error("mobile number already registered")]
    DuplicateMobile,
    #[error("account not found")]
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStatus {
    PendingVerification,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// A recorded security violation; unresolved critical entries feed the fraud
/// scorer.
#[derive(Debug, Clone)]
pub struct Violation {
    pub severity: ViolationSeverity,
    pub description: String,
    pub resolved: bool,
    pub at: DateTime<Utc>,
}

/// Superseded credential kept to block reuse; never used for verification of
/// current logins.
#[derive(Debug, Clone)]
pub struct PasswordRecord {
    pub hash: String,
    pub changed_at: DateTime<Utc>,
}

/// Consecutive-failure tracking.
///
/// Invariant: `locked_until` is only set once `failed_attempts` reached the
/// configured maximum. Any successful authentication resets both fields.
#[derive(Debug, Clone, Default)]
pub struct LockoutState {
    pub failed_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub status: AccountStatus,
    pub password_hash: String,
    /// Most recent first, capped at the policy history depth.
    pub password_history: Vec<PasswordRecord>,
    pub password_changed_at: DateTime<Utc>,
    pub password_expires_at: DateTime<Utc>,
    pub lockout: LockoutState,
    pub two_factor_enabled: bool,
    pub backup_code_hashes: Vec<String>,
    /// Mobile verification code, sealed with the service key.
    pub mobile_verification: Option<Vec<u8>>,
    pub mobile_verified: bool,
    pub trusted_devices: Vec<String>,
    pub known_locations: Vec<String>,
    pub violations: Vec<Violation>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub last_login_ip: Option<String>,
    pub last_login_location: Option<String>,
    pub last_login_coordinates: Option<(f64, f64)>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// A fresh, unverified account with the given credential hash.
    #[must_use]
    pub fn new(
        name: String,
        email: String,
        mobile: String,
        password_hash: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            mobile,
            status: AccountStatus::PendingVerification,
            password_history: vec![PasswordRecord {
                hash: password_hash.clone(),
                changed_at: now,
            }],
            password_hash,
            password_changed_at: now,
            password_expires_at: policy::password_expiry(now),
            lockout: LockoutState::default(),
            two_factor_enabled: false,
            backup_code_hashes: Vec::new(),
            mobile_verification: None,
            mobile_verified: false,
            trusted_devices: Vec::new(),
            known_locations: Vec::new(),
            violations: Vec::new(),
            last_login_at: None,
            last_login_ip: None,
            last_login_location: None,
            last_login_coordinates: None,
            created_at: now,
        }
    }

    /// True when an unresolved critical violation exists.
    #[must_use]
    pub fn has_unresolved_critical_violation(&self) -> bool {
        self.violations
            .iter()
            .any(|v| v.severity == ViolationSeverity::Critical && !v.resolved)
    }
}

/// In-memory account repository.
#[derive(Debug, Default)]
pub struct InMemoryAccounts {
    accounts: RwLock<HashMap<Uuid, Account>>,
}

impl InMemoryAccounts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new account, enforcing identifier uniqueness.
    ///
    /// # Errors
    /// Returns a duplicate error when the email or mobile is already taken.
    pub async fn insert(&self, account: Account) -> Result<Uuid, StoreError> {
        let mut accounts = self.accounts.write().await;
        if accounts.values().any(|a| a.email == account.email) {
            return Err(StoreError::DuplicateEmail);
        }
        if accounts.values().any(|a| a.mobile == account.mobile) {
            return Err(StoreError::DuplicateMobile);
        }
        let id = account.id;
        accounts.insert(id, account);
        Ok(id)
    }

    /// Look up by email or mobile. Email comparison is on the normalized
    /// (trimmed, lowercased) form.
    pub async fn find_by_identifier(&self, identifier: &str) -> Option<Account> {
        let normalized = identifier.trim().to_lowercase();
        let accounts = self.accounts.read().await;
        accounts
            .values()
            .find(|a| a.email == normalized || a.mobile == identifier.trim())
            .cloned()
    }

    pub async fn get(&self, id: Uuid) -> Option<Account> {
        self.accounts.read().await.get(&id).cloned()
    }

    pub async fn count(&self) -> usize {
        self.accounts.read().await.len()
    }

    /// Record a failed attempt; locks the account when the configured
    /// maximum is reached. Returns the updated lockout state.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] for unknown accounts.
    pub async fn record_failed_attempt(
        &self,
        id: Uuid,
        max_attempts: u32,
        locked_until: DateTime<Utc>,
    ) -> Result<LockoutState, StoreError> {
        let mut accounts = self.accounts.write().await;
        let account = accounts.get_mut(&id).ok_or(StoreError::NotFound)?;
        account.lockout.failed_attempts += 1;
        if account.lockout.failed_attempts >= max_attempts {
            account.lockout.locked_until = Some(locked_until);
            account.lockout.reason = Some("Too many failed login attempts".to_string());
        }
        Ok(account.lockout.clone())
    }

    /// Clear an expired lockout so the account is checkable again.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] for unknown accounts.
    pub async fn clear_lockout(&self, id: Uuid) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write().await;
        let account = accounts.get_mut(&id).ok_or(StoreError::NotFound)?;
        account.lockout = LockoutState::default();
        Ok(())
    }

    /// Record a successful login: resets the failure counter and remembers
    /// the device and location for future fraud checks.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] for unknown accounts.
    #[allow(clippy::too_many_arguments)]
    pub async fn record_login(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        ip: &str,
        device_id: &str,
        location: &str,
        coordinates: (f64, f64),
    ) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write().await;
        let account = accounts.get_mut(&id).ok_or(StoreError::NotFound)?;
        account.lockout = LockoutState::default();
        account.last_login_at = Some(now);
        account.last_login_ip = Some(ip.to_string());
        account.last_login_location = Some(location.to_string());
        account.last_login_coordinates = Some(coordinates);
        if !account.trusted_devices.iter().any(|d| d == device_id) {
            account.trusted_devices.push(device_id.to_string());
        }
        if !account.known_locations.iter().any(|l| l == location) {
            account.known_locations.push(location.to_string());
        }
        Ok(())
    }

    /// Mark the mobile number as verified and activate the account.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] for unknown accounts.
    pub async fn mark_mobile_verified(&self, id: Uuid) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write().await;
        let account = accounts.get_mut(&id).ok_or(StoreError::NotFound)?;
        account.mobile_verified = true;
        account.mobile_verification = None;
        account.status = AccountStatus::Active;
        Ok(())
    }

    /// Remove a consumed backup code by index.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] for unknown accounts.
    pub async fn consume_backup_code(&self, id: Uuid, index: usize) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write().await;
        let account = accounts.get_mut(&id).ok_or(StoreError::NotFound)?;
        if index < account.backup_code_hashes.len() {
            account.backup_code_hashes.remove(index);
        }
        Ok(())
    }
}

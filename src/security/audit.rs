//! Append-only audit trail for authentication events.
//!
//! Every terminal transition of the login state machine emits exactly one
//! event. Events are immutable after append and ordered by creation; the
//! in-memory sink also mirrors each event to `tracing` for the log pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;
use ulid::Ulid;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Login,
    LoginFailed,
    AccountLock,
    AccountCreate,
    AccountVerify,
    TwoFactorFailed,
    TwoFactorVerified,
    Logout,
}

impl AuditAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Login => "LOGIN",
            Self::LoginFailed => "LOGIN_FAILED",
            Self::AccountLock => "ACCOUNT_LOCK",
            Self::AccountCreate => "ACCOUNT_CREATE",
            Self::AccountVerify => "ACCOUNT_VERIFY",
            Self::TwoFactorFailed => "TWO_FACTOR_FAILED",
            Self::TwoFactorVerified => "TWO_FACTOR_VERIFIED",
            Self::Logout => "LOGOUT",
        }
    }
}

/// One immutable audit record.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub id: String,
    pub action: AuditAction,
    /// Account id when the subject is known; lookups on unknown identifiers
    /// still produce an event without one.
    pub subject: Option<Uuid>,
    pub identifier: String,
    pub outcome: bool,
    pub ip: String,
    pub device_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    #[must_use]
    pub fn new(action: AuditAction, identifier: &str, outcome: bool, ip: &str, device_id: &str) -> Self {
        Self {
            id: Ulid::new().to_string(),
            action,
            subject: None,
            identifier: identifier.to_string(),
            outcome,
            ip: ip.to_string(),
            device_id: device_id.to_string(),
            detail: None,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_subject(mut self, subject: Uuid) -> Self {
        self.subject = Some(subject);
        self
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Append-only sink consumed by external reporting and dashboards.
pub trait AuditSink: Send + Sync {
    fn append(&self, event: AuditEvent);
}

/// In-memory audit log that also emits each event through `tracing`.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the trail in append order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAuditLog {
    fn append(&self, event: AuditEvent) {
        tracing::info!(
            target: "audit",
            id = %event.id,
            action = event.action.as_str(),
            subject = ?event.subject,
            identifier = %event.identifier,
            outcome = event.outcome,
            ip = %event.ip,
            device_id = %event.device_id,
            detail = ?event.detail,
            "audit event"
        );
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(event);
    }
}

//! Request/response types for auth endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::store::SessionRecord;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    /// Email address or mobile number.
    pub identifier: String,
    pub secret: String,
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub success: bool,
    pub requires_2fa: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
    pub requires_additional_verification: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Rejection payload with a stable machine-readable code plus a
/// human-readable message.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AuthErrorResponse {
    pub success: bool,
    pub code: String,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_until: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_password_reset: Option<bool>,
}

impl AuthErrorResponse {
    #[must_use]
    pub fn new(code: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            code: code.to_string(),
            error: error.into(),
            details: None,
            remaining_attempts: None,
            warning: None,
            locked_until: None,
            retry_after_seconds: None,
            requires_password_reset: None,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    /// International format, e.g. +971500000000.
    pub mobile: String,
    pub secret: String,
    pub consent: Option<Consent>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default, Clone, Copy)]
pub struct Consent {
    #[serde(default)]
    pub marketing: bool,
    #[serde(default)]
    pub analytics: bool,
    #[serde(default)]
    pub third_party: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterResponse {
    pub success: bool,
    pub account_id: Uuid,
    pub requires_verification: bool,
    pub message: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TwoFactorVerifyRequest {
    pub temp_token: String,
    /// One-time code or a backup code.
    pub code: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyMobileRequest {
    pub identifier: String,
    pub code: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyMobileResponse {
    pub success: bool,
    pub message: String,
}

/// Session fields exposed to consumers; read-only outside the issuing logic.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionInfo {
    pub id: Uuid,
    pub account_id: Uuid,
    pub device_id: String,
    pub device_name: String,
    pub ip: String,
    pub location: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl From<SessionRecord> for SessionInfo {
    fn from(record: SessionRecord) -> Self {
        Self {
            id: record.id,
            account_id: record.account_id,
            device_id: record.device_id,
            device_name: record.device_name,
            ip: record.ip,
            location: record.location,
            created_at: record.created_at,
            expires_at: record.expires_at,
            last_activity_at: record.last_activity_at,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionResponse {
    pub session: SessionInfo,
    pub email: String,
}

/// Sanitized account view; never carries hashes or lockout internals.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub two_factor_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_location: Option<String>,
}

//! Session issuance, introspection, and logout.

use anyhow::{Context, Result};
use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::security::audit::{AuditAction, AuditEvent};
use crate::security::{credentials, fingerprint};
use crate::store::{Account, SessionRecord};

use super::state::AuthState;
use super::types::{SessionInfo, SessionResponse, UserProfile};
use super::utils::{extract_bearer_token, extract_client_ip, extract_user_agent, hash_token};

/// Raw bytes of entropy behind each session token.
const SESSION_TOKEN_BYTES: usize = 64;

pub(super) struct IssuedSession {
    /// Returned to the client once; only its hash is stored.
    pub token: String,
    pub record: SessionRecord,
}

/// Issue a session for an authenticated account.
///
/// `remember_me` selects the refresh TTL over the short access TTL. The
/// store evicts the account's oldest session when the concurrency cap is
/// reached.
pub(super) async fn issue_session(
    state: &AuthState,
    account: &Account,
    ip: &str,
    user_agent: &str,
    location: &str,
    remember_me: bool,
    now: DateTime<Utc>,
) -> Result<IssuedSession> {
    let token = credentials::generate_token(SESSION_TOKEN_BYTES)
        .context("failed to generate session token")?;
    let token_hash = hash_token(&token);

    let ttl_seconds = if remember_me {
        state.config().refresh_ttl_seconds()
    } else {
        state.config().access_ttl_seconds()
    };

    let record = SessionRecord {
        id: Uuid::new_v4(),
        account_id: account.id,
        device_id: fingerprint::device_fingerprint(user_agent, ip),
        device_name: fingerprint::device_name(user_agent),
        ip: ip.to_string(),
        location: location.to_string(),
        created_at: now,
        expires_at: now + Duration::seconds(ttl_seconds),
        last_activity_at: now,
    };

    state
        .sessions()
        .insert(token_hash, record.clone(), state.config().max_concurrent_sessions())
        .await;

    Ok(IssuedSession { token, record })
}

/// Sanitized profile embedded in login and session responses.
pub(super) fn profile(account: &Account) -> UserProfile {
    UserProfile {
        id: account.id,
        name: account.name.clone(),
        email: account.email.clone(),
        mobile: account.mobile.clone(),
        two_factor_enabled: account.two_factor_enabled,
        last_login_at: account.last_login_at,
        last_login_location: account.last_login_location.clone(),
    }
}

#[utoipa::path(
    get,
    path = "/v1/auth/session",
    responses(
        (status = 200, description = "Active session", body = SessionResponse),
        (status = 204, description = "No active session")
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn session(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let Some(token) = extract_bearer_token(&headers) else {
        return StatusCode::NO_CONTENT.into_response();
    };

    let now = Utc::now();
    let token_hash = hash_token(&token);
    let Some(record) = state.sessions().find(&token_hash, now).await else {
        return StatusCode::NO_CONTENT.into_response();
    };

    state.sessions().touch(&token_hash, now).await;

    let Some(account) = state.accounts().get(record.account_id).await else {
        // Session for a deleted account; drop it.
        state.sessions().delete(&token_hash).await;
        return StatusCode::NO_CONTENT.into_response();
    };

    let response = SessionResponse {
        session: SessionInfo::from(record),
        email: account.email,
    };
    (StatusCode::OK, Json(response)).into_response()
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Session terminated")
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let Some(token) = extract_bearer_token(&headers) else {
        // Idempotent: nothing to terminate.
        return StatusCode::NO_CONTENT;
    };

    let token_hash = hash_token(&token);
    if let Some(record) = state.sessions().delete(&token_hash).await {
        let ip = extract_client_ip(&headers);
        let user_agent = extract_user_agent(&headers);
        let device_id = fingerprint::device_fingerprint(&user_agent, &ip);
        let identifier = state
            .accounts()
            .get(record.account_id)
            .await
            .map_or_else(String::new, |account| account.email);
        state.audit().append(
            AuditEvent::new(AuditAction::Logout, &identifier, true, &ip, &device_id)
                .with_subject(record.account_id),
        );
    }

    StatusCode::NO_CONTENT
}

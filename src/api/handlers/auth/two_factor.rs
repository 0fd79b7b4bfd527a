//! Two-factor challenge issuance and verification.
//!
//! A correct password on a 2FA-enabled account yields a temporary token and
//! a one-time code; the code hash and TTLs live in the challenge store. The
//! verify endpoint accepts the code or one of the account's backup codes.

use anyhow::{Context, Result};
use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, error};

use crate::security::audit::{AuditAction, AuditEvent};
use crate::security::fraud::GeoLocation;
use crate::security::{credentials, fingerprint};
use crate::store::{Account, TwoFactorChallenge};

use super::session;
use super::state::AuthState;
use super::types::{AuthErrorResponse, LoginResponse, TwoFactorVerifyRequest};
use super::utils::{extract_client_ip, extract_user_agent, hash_token};

const TEMP_TOKEN_BYTES: usize = 32;

/// Create a pending challenge and return the raw temporary token.
///
/// Delivery of the one-time code is out of band; the stub logs it at debug
/// level in place of an SMS gateway.
pub(super) async fn issue_challenge(
    state: &AuthState,
    account: &Account,
    remember_me: bool,
    now: DateTime<Utc>,
) -> Result<String> {
    let temp_token =
        credentials::generate_token(TEMP_TOKEN_BYTES).context("failed to generate temp token")?;
    let code = credentials::generate_otp(credentials::OTP_LENGTH);

    debug!(target: "sms", mobile = %account.mobile, code = %code, "two-factor code issued");

    let code_for_hash = code.clone();
    let code_hash = tokio::task::spawn_blocking(move || {
        bcrypt::hash(&code_for_hash, credentials::BACKUP_CODE_COST)
    })
    .await
    .context("hash task failed")?
    .context("failed to hash one-time code")?;

    let challenge = TwoFactorChallenge {
        account_id: account.id,
        code_hash,
        remember_me,
        token_expires_at: now + Duration::seconds(state.config().temp_token_ttl_seconds()),
        code_expires_at: now + Duration::seconds(state.config().otp_ttl_seconds()),
    };
    state
        .challenges()
        .insert(hash_token(&temp_token), challenge)
        .await;

    Ok(temp_token)
}

#[utoipa::path(
    post,
    path = "/v1/auth/2fa/verify",
    request_body = TwoFactorVerifyRequest,
    responses(
        (status = 200, description = "Two-factor verified, session issued", body = LoginResponse),
        (status = 400, description = "Missing payload", body = AuthErrorResponse),
        (status = 401, description = "Invalid or expired token/code", body = AuthErrorResponse)
    ),
    tag = "auth"
)]
pub async fn verify(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<TwoFactorVerifyRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(AuthErrorResponse::new("missing_payload", "Missing payload")),
        )
            .into_response();
    };

    let now = Utc::now();
    let token_hash = hash_token(request.temp_token.trim());
    let Some(challenge) = state.challenges().find(&token_hash, now).await else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(AuthErrorResponse::new(
                "invalid_temp_token",
                "Invalid or expired verification session. Please log in again.",
            )),
        )
            .into_response();
    };

    let Some(account) = state.accounts().get(challenge.account_id).await else {
        state.challenges().remove(&token_hash).await;
        return (
            StatusCode::UNAUTHORIZED,
            Json(AuthErrorResponse::new(
                "invalid_temp_token",
                "Invalid or expired verification session. Please log in again.",
            )),
        )
            .into_response();
    };

    let client_ip = extract_client_ip(&headers);
    let user_agent = extract_user_agent(&headers);
    let device_id = fingerprint::device_fingerprint(&user_agent, &client_ip);
    let code = request.code.trim().to_string();

    // The one-time code has a shorter life than the temp token; after it
    // lapses only backup codes remain valid.
    let code_matches = if now > challenge.code_expires_at {
        false
    } else {
        let candidate = code.clone();
        let digest = challenge.code_hash.clone();
        match tokio::task::spawn_blocking(move || credentials::verify_password(&candidate, &digest))
            .await
        {
            Ok(matches) => matches,
            Err(err) => {
                error!("Code verification task failed: {err}");
                false
            }
        }
    };

    let backup_index = if code_matches {
        None
    } else {
        credentials::match_backup_code(&code, &account.backup_code_hashes)
    };

    if !code_matches && backup_index.is_none() {
        state.audit().append(
            AuditEvent::new(
                AuditAction::TwoFactorFailed,
                &account.email,
                false,
                &client_ip,
                &device_id,
            )
            .with_subject(account.id),
        );
        return (
            StatusCode::UNAUTHORIZED,
            Json(AuthErrorResponse::new(
                "invalid_code",
                "Invalid verification code",
            )),
        )
            .into_response();
    }

    if let Some(index) = backup_index {
        if let Err(err) = state.accounts().consume_backup_code(account.id, index).await {
            error!("Failed to consume backup code: {err}");
        }
    }
    state.challenges().remove(&token_hash).await;

    let geo = state
        .providers()
        .geo
        .locate(&client_ip)
        .unwrap_or_else(|_| GeoLocation::unknown());
    let location = geo.label();

    if let Err(err) = state
        .accounts()
        .record_login(
            account.id,
            now,
            &client_ip,
            &device_id,
            &location,
            (geo.latitude, geo.longitude),
        )
        .await
    {
        error!("Failed to record login: {err}");
    }

    let issued = match session::issue_session(
        &state,
        &account,
        &client_ip,
        &user_agent,
        &location,
        challenge.remember_me,
        now,
    )
    .await
    {
        Ok(issued) => issued,
        Err(err) => {
            error!("Failed to issue session: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(AuthErrorResponse::new("internal_error", "Login failed")),
            )
                .into_response();
        }
    };

    state.audit().append(
        AuditEvent::new(
            AuditAction::TwoFactorVerified,
            &account.email,
            true,
            &client_ip,
            &device_id,
        )
        .with_subject(account.id)
        .with_detail(if backup_index.is_some() {
            "backup code consumed, session issued"
        } else {
            "session issued"
        }),
    );

    let response = LoginResponse {
        success: true,
        requires_2fa: false,
        temp_token: None,
        token: Some(issued.token),
        session: Some(issued.record.into()),
        user: Some(session::profile(&account)),
        requires_additional_verification: false,
        message: None,
    };
    (StatusCode::OK, Json(response)).into_response()
}

#[cfg(test)]
mod tests {
    use super::super::state::SecurityConfig;
    use super::*;
    use secrecy::SecretString;

    fn state() -> Arc<AuthState> {
        Arc::new(AuthState::new(SecurityConfig::new(
            "http://localhost:3000".to_string(),
            SecretString::from("test key".to_string()),
        )))
    }

    fn account() -> Account {
        let mut account = Account::new(
            "Test User".to_string(),
            "user@example.com".to_string(),
            "+971500000001".to_string(),
            "$2b$12$fake".to_string(),
            Utc::now(),
        );
        account.two_factor_enabled = true;
        account
    }

    #[tokio::test]
    async fn challenge_round_trip() -> Result<()> {
        let state = state();
        let account = account();
        let now = Utc::now();

        let temp_token = issue_challenge(&state, &account, true, now).await?;
        let challenge = state
            .challenges()
            .find(&hash_token(&temp_token), now)
            .await
            .expect("challenge");
        assert_eq!(challenge.account_id, account.id);
        assert!(challenge.remember_me);
        assert_eq!(
            challenge.token_expires_at,
            now + Duration::seconds(10 * 60)
        );
        assert_eq!(challenge.code_expires_at, now + Duration::seconds(5 * 60));
        Ok(())
    }

    #[tokio::test]
    async fn verify_missing_payload() {
        let response = verify(HeaderMap::new(), Extension(state()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn verify_rejects_unknown_temp_token() {
        let request = TwoFactorVerifyRequest {
            temp_token: "bogus".to_string(),
            code: "123456".to_string(),
        };
        let response = verify(HeaderMap::new(), Extension(state()), Some(Json(request)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}

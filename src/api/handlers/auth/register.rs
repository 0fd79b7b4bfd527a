//! Registration endpoint.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

use crate::security::audit::{AuditAction, AuditEvent};
use crate::security::{credentials, crypto, fingerprint, policy};
use crate::store::{Account, StoreError};

use super::state::AuthState;
use super::types::{AuthErrorResponse, RegisterRequest, RegisterResponse};
use super::utils::{
    extract_client_ip, extract_user_agent, normalize_email, valid_email, valid_mobile,
};

#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account created, verification pending", body = RegisterResponse),
        (status = 400, description = "Validation error", body = AuthErrorResponse),
        (status = 409, description = "Identifier already registered", body = AuthErrorResponse),
        (status = 429, description = "Rate limited", body = AuthErrorResponse)
    ),
    tag = "auth"
)]
#[allow(clippy::too_many_lines)]
pub async fn register(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<RegisterRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(AuthErrorResponse::new("missing_payload", "Missing payload")),
        )
            .into_response();
    };

    let client_ip = extract_client_ip(&headers);

    // Registration is abuse-prone; the per-IP window is deliberately tight.
    let now_instant = Instant::now();
    let decision = state
        .register_limiter()
        .check_at(&format!("{client_ip}:register"), now_instant);
    if !decision.allowed {
        let mut body = AuthErrorResponse::new(
            "rate_limited",
            "Too many registration attempts. Please try again later.",
        );
        body.retry_after_seconds = Some(decision.retry_after(now_instant).as_secs());
        return (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    }

    let name = request.name.trim().to_string();
    let email = normalize_email(&request.email);
    let mobile = request.mobile.trim().to_string();

    let mut field_errors = Vec::new();
    if name.is_empty() {
        field_errors.push("Name is required".to_string());
    }
    if !valid_email(&email) {
        field_errors.push("Invalid email address".to_string());
    }
    if !valid_mobile(&mobile) {
        field_errors.push("Mobile number must use international format (e.g. +971500000000)".to_string());
    }
    if !field_errors.is_empty() {
        let mut body = AuthErrorResponse::new("validation_error", "Invalid registration details");
        body.details = Some(field_errors);
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    }

    let check = policy::validate_password(&request.secret);
    if !check.valid {
        let mut body =
            AuthErrorResponse::new("weak_password", "Password does not meet the policy");
        body.details = Some(check.violations);
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    }

    if request.consent.is_none() {
        return (
            StatusCode::BAD_REQUEST,
            Json(AuthErrorResponse::new(
                "consent_required",
                "Consent preferences are required",
            )),
        )
            .into_response();
    }

    let secret = request.secret.clone();
    let password_hash =
        match tokio::task::spawn_blocking(move || credentials::hash_password(&secret)).await {
            Ok(Ok(hash)) => hash,
            Ok(Err(err)) => {
                error!("Password hashing failed: {err}");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(AuthErrorResponse::new(
                        "internal_error",
                        "Registration failed",
                    )),
                )
                    .into_response();
            }
            Err(err) => {
                error!("Password hashing task failed: {err}");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(AuthErrorResponse::new(
                        "internal_error",
                        "Registration failed",
                    )),
                )
                    .into_response();
            }
        };

    let now = Utc::now();
    let mut account = Account::new(name, email.clone(), mobile, password_hash, now);

    // The mobile verification code rests sealed under the service key until
    // the owner proves possession of the number.
    let code = credentials::generate_otp(credentials::OTP_LENGTH);
    debug!(target: "sms", mobile = %account.mobile, code = %code, "verification code issued");
    match crypto::seal(&state.config().sealing_key(), code.as_bytes()) {
        Ok(sealed) => account.mobile_verification = Some(sealed),
        Err(err) => {
            error!("Failed to seal verification code: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(AuthErrorResponse::new(
                    "internal_error",
                    "Registration failed",
                )),
            )
                .into_response();
        }
    }

    let account_id = match state.accounts().insert(account).await {
        Ok(id) => id,
        Err(StoreError::DuplicateEmail) => {
            return (
                StatusCode::CONFLICT,
                Json(AuthErrorResponse::new(
                    "duplicate_email",
                    "An account with this email already exists",
                )),
            )
                .into_response();
        }
        Err(StoreError::DuplicateMobile) => {
            return (
                StatusCode::CONFLICT,
                Json(AuthErrorResponse::new(
                    "duplicate_mobile",
                    "An account with this mobile number already exists",
                )),
            )
                .into_response();
        }
        Err(err) => {
            error!("Failed to store account: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(AuthErrorResponse::new(
                    "internal_error",
                    "Registration failed",
                )),
            )
                .into_response();
        }
    };

    let user_agent = extract_user_agent(&headers);
    let device_id = fingerprint::device_fingerprint(&user_agent, &client_ip);
    state.audit().append(
        AuditEvent::new(AuditAction::AccountCreate, &email, true, &client_ip, &device_id)
            .with_subject(account_id),
    );

    let response = RegisterResponse {
        success: true,
        account_id,
        requires_verification: true,
        message: "Account created. Verify your mobile number to activate it.".to_string(),
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

    fn request() -> RegisterRequest {
        RegisterRequest {
            name: "Test User".to_string(),
            email: "user@example.com".to_string(),
            mobile: "+971500000001".to_string(),
            secret: "Str0ng!Pass".to_string(),
            consent: Some(super::super::types::Consent::default()),
        }
    }

    #[tokio::test]
    async fn register_missing_payload() {
        let response = register(HeaderMap::new(), Extension(state()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn register_rejects_bad_fields() {
        let mut bad = request();
        bad.email = "not-an-email".to_string();
        bad.mobile = "0500000000".to_string();
        let response = register(HeaderMap::new(), Extension(state()), Some(Json(bad)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn register_rejects_weak_password() {
        let mut bad = request();
        bad.secret = "weak".to_string();
        let response = register(HeaderMap::new(), Extension(state()), Some(Json(bad)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn register_requires_consent() {
        let mut bad = request();
        bad.consent = None;
        let response = register(HeaderMap::new(), Extension(state()), Some(Json(bad)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn register_creates_pending_account_and_audits() {
        let state = state();
        let response = register(HeaderMap::new(), Extension(state.clone()), Some(Json(request())))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.accounts().count().await, 1);

        let account = state
            .accounts()
            .find_by_identifier("user@example.com")
            .await
            .expect("account");
        assert!(account.mobile_verification.is_some());
        assert!(!account.mobile_verified);

        let duplicate = register(HeaderMap::new(), Extension(state), Some(Json(request())))
            .await
            .into_response();
        assert_eq!(duplicate.status(), StatusCode::CONFLICT);
    }
}

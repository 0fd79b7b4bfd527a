//! Mobile number verification.
//!
//! The code generated at registration rests sealed under the service key;
//! opening it here proves the store entry was not tampered with. Unknown
//! identifiers and wrong codes get the same answer.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::error;

use crate::security::audit::{AuditAction, AuditEvent};
use crate::security::{crypto, fingerprint};

use super::state::AuthState;
use super::types::{AuthErrorResponse, VerifyMobileRequest, VerifyMobileResponse};
use super::utils::{extract_client_ip, extract_user_agent};

#[utoipa::path(
    post,
    path = "/v1/auth/verify-mobile",
    request_body = VerifyMobileRequest,
    responses(
        (status = 200, description = "Mobile verified, account active", body = VerifyMobileResponse),
        (status = 400, description = "Missing payload or invalid code", body = AuthErrorResponse)
    ),
    tag = "auth"
)]
pub async fn verify_mobile(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<VerifyMobileRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(AuthErrorResponse::new("missing_payload", "Missing payload")),
        )
            .into_response();
    };

    let rejection = (
        StatusCode::BAD_REQUEST,
        Json(AuthErrorResponse::new(
            "invalid_code",
            "Invalid verification code",
        )),
    );

    let Some(account) = state.accounts().find_by_identifier(&request.identifier).await else {
        return rejection.into_response();
    };
    if account.mobile_verified {
        let response = VerifyMobileResponse {
            success: true,
            message: "Mobile number already verified.".to_string(),
        };
        return (StatusCode::OK, Json(response)).into_response();
    }
    let Some(sealed) = account.mobile_verification.as_deref() else {
        return rejection.into_response();
    };

    // Tag mismatch or truncation fails closed; no partial plaintext.
    let Ok(expected) = crypto::open(&state.config().sealing_key(), sealed) else {
        error!(account = %account.id, "Sealed verification code failed to open");
        return rejection.into_response();
    };

    if expected != request.code.trim().as_bytes() {
        return rejection.into_response();
    }

    if let Err(err) = state.accounts().mark_mobile_verified(account.id).await {
        error!("Failed to mark mobile verified: {err}");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(AuthErrorResponse::new(
                "internal_error",
                "Verification failed",
            )),
        )
            .into_response();
    }

    let client_ip = extract_client_ip(&headers);
    let user_agent = extract_user_agent(&headers);
    let device_id = fingerprint::device_fingerprint(&user_agent, &client_ip);
    state.audit().append(
        AuditEvent::new(
            AuditAction::AccountVerify,
            &account.email,
            true,
            &client_ip,
            &device_id,
        )
        .with_subject(account.id),
    );

    let response = VerifyMobileResponse {
        success: true,
        message: "Mobile number verified. Your account is now active.".to_string(),
    };
    (StatusCode::OK, Json(response)).into_response()
}

//! Login endpoint: the ordered gate chain described in the crate docs.
//!
//! Rate limiter first, then lookup, lockout, expiry, credential check,
//! fraud scoring, and finally two-factor or session issuance. Each terminal
//! response appends exactly one audit event.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{Timelike, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, warn};

use crate::security::audit::{AuditAction, AuditEvent};
use crate::security::fraud::{self, FraudCheck, FraudSignals, GeoLocation, TravelPoint};
use crate::security::{credentials, fingerprint, policy};
use crate::store::{Account, SessionRecord};

use super::state::AuthState;
use super::types::{AuthErrorResponse, LoginRequest, LoginResponse};
use super::utils::{extract_client_ip, extract_user_agent};
use super::{session, two_factor};

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated or two-factor challenge issued", body = LoginResponse),
        (status = 400, description = "Missing payload", body = AuthErrorResponse),
        (status = 401, description = "Invalid credentials", body = AuthErrorResponse),
        (status = 403, description = "Account locked, password expired, or rejected", body = AuthErrorResponse),
        (status = 429, description = "Rate limited", body = AuthErrorResponse)
    ),
    tag = "auth"
)]
#[allow(clippy::too_many_lines)]
pub async fn login(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(AuthErrorResponse::new("missing_payload", "Missing payload")),
        )
            .into_response();
    };

    let identifier = request.identifier.trim().to_lowercase();
    let client_ip = extract_client_ip(&headers);
    let user_agent = extract_user_agent(&headers);
    let device_id = fingerprint::device_fingerprint(&user_agent, &client_ip);

    // Gate 1: rate limiting, before any credential work.
    let limiter_key = format!("{client_ip}:{identifier}");
    let now_instant = Instant::now();
    let decision = state.login_limiter().check_at(&limiter_key, now_instant);
    if !decision.allowed {
        let mut body = AuthErrorResponse::new(
            "rate_limited",
            "Too many login attempts. Please try again later.",
        );
        body.retry_after_seconds = Some(decision.retry_after(now_instant).as_secs());
        return (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    }

    let now = Utc::now();

    // Gate 2: account lookup. Unknown identifiers get the same wording as a
    // wrong password.
    let Some(account) = state.accounts().find_by_identifier(&request.identifier).await else {
        state.audit().append(
            AuditEvent::new(
                AuditAction::LoginFailed,
                &identifier,
                false,
                &client_ip,
                &device_id,
            )
            .with_detail("unknown identifier"),
        );
        return invalid_credentials(None).into_response();
    };

    // Gate 3: lockout. Expired locks clear on sight.
    if let Some(locked_until) = account.lockout.locked_until {
        if now < locked_until {
            let minutes = ((locked_until - now).num_seconds() + 59) / 60;
            let mut body = AuthErrorResponse::new(
                "account_locked",
                format!("Account is locked. Try again in {minutes} minutes."),
            );
            body.locked_until = Some(locked_until);
            state.audit().append(
                AuditEvent::new(
                    AuditAction::LoginFailed,
                    &identifier,
                    false,
                    &client_ip,
                    &device_id,
                )
                .with_subject(account.id)
                .with_detail("account locked"),
            );
            return (StatusCode::FORBIDDEN, Json(body)).into_response();
        }
        if let Err(err) = state.accounts().clear_lockout(account.id).await {
            error!("Failed to clear expired lockout: {err}");
        }
    }

    // Gate 4: credential age.
    if policy::is_password_expired(account.password_expires_at, now) {
        let mut body = AuthErrorResponse::new(
            "password_expired",
            "Your password has expired. Please reset it to continue.",
        );
        body.requires_password_reset = Some(true);
        state.audit().append(
            AuditEvent::new(
                AuditAction::LoginFailed,
                &identifier,
                false,
                &client_ip,
                &device_id,
            )
            .with_subject(account.id)
            .with_detail("password expired"),
        );
        return (StatusCode::FORBIDDEN, Json(body)).into_response();
    }

    // Gate 5: the credential itself. bcrypt is deliberately slow, keep it
    // off the event loop.
    let secret = request.secret.clone();
    let digest = account.password_hash.clone();
    let verified =
        match tokio::task::spawn_blocking(move || credentials::verify_password(&secret, &digest))
            .await
        {
            Ok(verified) => verified,
            Err(err) => {
                error!("Password verification task failed: {err}");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(AuthErrorResponse::new("internal_error", "Login failed")),
                )
                    .into_response();
            }
        };

    if !verified {
        return failed_password(&state, &account, &identifier, &client_ip, &device_id)
            .await
            .into_response();
    }

    // The password was right: the consecutive-failure counter resets now,
    // before the fraud check and any two-factor hand-off, so an abandoned
    // challenge does not leave stale failures behind.
    let prior_failures = account.lockout.failed_attempts;
    if prior_failures > 0 {
        if let Err(err) = state.accounts().clear_lockout(account.id).await {
            error!("Failed to reset failure counter: {err}");
        }
    }

    // Gate 6: fraud scoring on the otherwise-valid attempt; the failures
    // that preceded this attempt still count as a signal.
    let (check, location, coordinates) = assess_fraud(
        &state,
        &account,
        &client_ip,
        &device_id,
        prior_failures,
        now.hour(),
    );

    if check.risk_level == fraud::RiskLevel::Critical {
        state.audit().append(
            AuditEvent::new(
                AuditAction::LoginFailed,
                &identifier,
                false,
                &client_ip,
                &device_id,
            )
            .with_subject(account.id)
            .with_detail(format!(
                "critical fraud risk ({}): {}",
                check.risk_score,
                check.flags.join("; ")
            )),
        );
        return (
            StatusCode::FORBIDDEN,
            Json(AuthErrorResponse::new(
                "high_risk",
                "This login attempt was blocked. Please contact support.",
            )),
        )
            .into_response();
    }

    // Gate 7: two-factor challenge or session issuance.
    if account.two_factor_enabled {
        return match two_factor::issue_challenge(&state, &account, request.remember_me, now).await {
            Ok(temp_token) => {
                let response = LoginResponse {
                    success: true,
                    requires_2fa: true,
                    temp_token: Some(temp_token),
                    token: None,
                    session: None,
                    user: None,
                    requires_additional_verification: check.requires_additional_verification,
                    message: Some("Verification code sent to your mobile number.".to_string()),
                };
                (StatusCode::OK, Json(response)).into_response()
            }
            Err(err) => {
                error!("Failed to issue two-factor challenge: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(AuthErrorResponse::new("internal_error", "Login failed")),
                )
                    .into_response()
            }
        };
    }

    let active = state.sessions().active_for_account(account.id, now).await;
    let anomalies = session_anomalies(
        &active,
        &client_ip,
        &location,
        state.config().max_concurrent_sessions(),
    );
    if !anomalies.is_empty() {
        warn!(account = %account.id, ?anomalies, "session anomalies detected");
    }

    if let Err(err) = state
        .accounts()
        .record_login(account.id, now, &client_ip, &device_id, &location, coordinates)
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
        request.remember_me,
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
        AuditEvent::new(AuditAction::Login, &identifier, true, &client_ip, &device_id)
            .with_subject(account.id)
            .with_detail("session issued"),
    );

    let response = LoginResponse {
        success: true,
        requires_2fa: false,
        temp_token: None,
        token: Some(issued.token),
        session: Some(issued.record.into()),
        user: Some(session::profile(&account)),
        requires_additional_verification: check.requires_additional_verification,
        message: None,
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// Record a wrong password: bump the counter, lock at the configured
/// maximum, and answer with generic wording either way.
async fn failed_password(
    state: &AuthState,
    account: &Account,
    identifier: &str,
    client_ip: &str,
    device_id: &str,
) -> axum::response::Response {
    let now = Utc::now();
    let locked_until = now + chrono::Duration::minutes(state.config().lockout_minutes());
    let lockout = match state
        .accounts()
        .record_failed_attempt(account.id, state.config().max_failed_attempts(), locked_until)
        .await
    {
        Ok(lockout) => lockout,
        Err(err) => {
            error!("Failed to record failed attempt: {err}");
            return invalid_credentials(None).into_response();
        }
    };

    if let Some(locked_until) = lockout.locked_until {
        state.audit().append(
            AuditEvent::new(AuditAction::AccountLock, identifier, false, client_ip, device_id)
                .with_subject(account.id)
                .with_detail(format!("locked after {} failed attempts", lockout.failed_attempts)),
        );
        let mut body = AuthErrorResponse::new(
            "account_locked",
            "Account locked due to too many failed attempts. Try again in 30 minutes.",
        );
        body.locked_until = Some(locked_until);
        return (StatusCode::FORBIDDEN, Json(body)).into_response();
    }

    let remaining = state
        .config()
        .max_failed_attempts()
        .saturating_sub(lockout.failed_attempts);
    state.audit().append(
        AuditEvent::new(AuditAction::LoginFailed, identifier, false, client_ip, device_id)
            .with_subject(account.id)
            .with_detail(format!("wrong password, {remaining} attempts remaining")),
    );
    invalid_credentials(Some(remaining)).into_response()
}

fn invalid_credentials(remaining_attempts: Option<u32>) -> (StatusCode, Json<AuthErrorResponse>) {
    let mut body =
        AuthErrorResponse::new("invalid_credentials", "Invalid email/mobile or password");
    body.remaining_attempts = remaining_attempts;
    if remaining_attempts == Some(1) {
        body.warning =
            Some("One more failed attempt will temporarily lock your account.".to_string());
    }
    (StatusCode::UNAUTHORIZED, Json(body))
}

/// Gather per-attempt signals and score them. Provider failures degrade to
/// their conservative defaults; the attempt is never failed on a lookup
/// outage alone.
fn assess_fraud(
    state: &AuthState,
    account: &Account,
    client_ip: &str,
    device_id: &str,
    prior_failures: u32,
    hour_of_day: u32,
) -> (FraudCheck, String, (f64, f64)) {
    let providers = state.providers();

    let reputation = providers
        .reputation
        .assess(device_id, client_ip)
        .unwrap_or_default();
    let vpn_or_tor = providers.vpn.is_vpn_or_tor(client_ip).unwrap_or(false);
    let geo = providers
        .geo
        .locate(client_ip)
        .unwrap_or_else(|_| GeoLocation::unknown());

    let location = geo.label();
    let new_device = !account.trusted_devices.iter().any(|d| d == device_id);
    let new_location = !account.known_locations.is_empty()
        && !account.known_locations.iter().any(|l| *l == location);

    let signals = FraudSignals {
        new_device,
        new_location,
        poor_reputation: reputation.risky,
        known_malicious: reputation.known_malicious,
        vpn_or_tor,
        failed_attempts: prior_failures,
        unresolved_critical_violation: account.has_unresolved_critical_violation(),
        hour_of_day,
    };

    let mut check = fraud::score(&signals);

    // Travel-speed supplement: flags only, the weight table stays as-is.
    if let (Some(at), Some((lat, lon))) = (account.last_login_at, account.last_login_coordinates) {
        let previous = TravelPoint {
            latitude: lat,
            longitude: lon,
            at,
        };
        let next = TravelPoint {
            latitude: geo.latitude,
            longitude: geo.longitude,
            at: Utc::now(),
        };
        if fraud::is_impossible_travel(&previous, &next) {
            check
                .flags
                .push("Impossible travel since previous login".to_string());
        }
    }

    (check, location, (geo.latitude, geo.longitude))
}

/// Flags for sessions that look hijacked: the same account active from
/// another IP or location, or at the concurrency cap.
pub(super) fn session_anomalies(
    active: &[SessionRecord],
    client_ip: &str,
    location: &str,
    max_concurrent: usize,
) -> Vec<String> {
    let mut flags = Vec::new();
    if active.iter().any(|s| s.ip != client_ip) {
        flags.push("Concurrent session from a different IP".to_string());
    }
    if active.iter().any(|s| s.location != location) {
        flags.push("Concurrent session from a different location".to_string());
    }
    if active.len() >= max_concurrent {
        flags.push("Maximum concurrent sessions in use".to_string());
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn record(ip: &str, location: &str) -> SessionRecord {
        let now = Utc::now();
        SessionRecord {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            device_id: "device".to_string(),
            device_name: "Chrome on Windows".to_string(),
            ip: ip.to_string(),
            location: location.to_string(),
            created_at: now,
            expires_at: now + Duration::minutes(15),
            last_activity_at: now,
        }
    }

    #[test]
    fn invalid_credentials_warns_on_last_attempt() {
        let (_, Json(body)) = invalid_credentials(Some(1));
        assert!(body.warning.is_some());
        assert_eq!(body.remaining_attempts, Some(1));

        let (_, Json(body)) = invalid_credentials(Some(2));
        assert!(body.warning.is_none());
    }

    #[test]
    fn anomalies_flag_foreign_ip_and_location() {
        let active = vec![record("203.0.113.7", "Dubai, AE")];
        let flags = session_anomalies(&active, "198.51.100.9", "London, GB", 3);
        assert_eq!(flags.len(), 2);

        let flags = session_anomalies(&active, "203.0.113.7", "Dubai, AE", 3);
        assert!(flags.is_empty());
    }

    #[test]
    fn anomalies_flag_session_cap() {
        let active = vec![
            record("203.0.113.7", "Dubai, AE"),
            record("203.0.113.7", "Dubai, AE"),
            record("203.0.113.7", "Dubai, AE"),
        ];
        let flags = session_anomalies(&active, "203.0.113.7", "Dubai, AE", 3);
        assert_eq!(flags, vec!["Maximum concurrent sessions in use".to_string()]);
    }
}

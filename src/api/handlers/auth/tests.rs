//! Auth module tests: full request flows through the router.

use anyhow::{Context, Result};
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, Response, StatusCode};
use chrono::{DateTime, Duration, Utc};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use super::{AuthState, SecurityConfig};
use crate::api::router;
use crate::security::audit::{AuditAction, MemoryAuditLog};
use crate::security::crypto;
use crate::store::{Account, AccountStatus};

const SECRET: &str = "Str0ng!Pass";
const CLIENT_IP: &str = "203.0.113.7";

fn state_with_audit() -> (Arc<AuthState>, Arc<MemoryAuditLog>) {
    let audit = Arc::new(MemoryAuditLog::new());
    let config = SecurityConfig::new(
        "http://localhost:3000".to_string(),
        SecretString::from("test key".to_string()),
    );
    let state = Arc::new(AuthState::new(config).with_audit_sink(audit.clone()));
    (state, audit)
}

async fn seed_account(state: &AuthState) -> Account {
    // Low bcrypt cost keeps the tests fast; verification is cost-agnostic.
    let mut account = Account::new(
        "Test User".to_string(),
        "user@example.com".to_string(),
        "+971500000001".to_string(),
        bcrypt::hash(SECRET, 4).expect("hash"),
        Utc::now(),
    );
    account.status = AccountStatus::Active;
    account.mobile_verified = true;
    state
        .accounts()
        .insert(account.clone())
        .await
        .expect("insert");
    account
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", CLIENT_IP)
        .header(header::USER_AGENT, "Mozilla/5.0 (Windows NT 10.0) Chrome/120.0")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn get_with_bearer(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .expect("request")
}

async fn send(state: &Arc<AuthState>, request: Request<Body>) -> Response<Body> {
    router(state.clone())
        .oneshot(request)
        .await
        .expect("response")
}

async fn body_json(response: Response<Body>) -> Result<Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .context("failed to read body")?;
    serde_json::from_slice(&bytes).context("body is not JSON")
}

fn login_payload(secret: &str) -> Value {
    json!({ "identifier": "user@example.com", "secret": secret })
}

#[tokio::test]
async fn login_issues_session_and_audits_once() -> Result<()> {
    let (state, audit) = state_with_audit();
    let account = seed_account(&state).await;

    let response = send(&state, post_json("/v1/auth/login", &login_payload(SECRET))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["requires_2fa"], false);
    let token = body["token"].as_str().context("token")?.to_string();
    assert_eq!(body["user"]["email"], "user@example.com");

    let events = audit.snapshot();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, AuditAction::Login);
    assert_eq!(events[0].subject, Some(account.id));

    let stored = state.accounts().get(account.id).await.context("account")?;
    assert_eq!(stored.lockout.failed_attempts, 0);
    assert_eq!(stored.trusted_devices.len(), 1);
    assert!(stored.last_login_at.is_some());

    // The raw token resolves the session until logout.
    let response = send(&state, get_with_bearer("/v1/auth/session", &token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["email"], "user@example.com");

    let logout = Request::builder()
        .method("POST")
        .uri("/v1/auth/logout")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())?;
    let response = send(&state, logout).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&state, get_with_bearer("/v1/auth/session", &token)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    Ok(())
}

#[tokio::test]
async fn three_failures_lock_the_account() -> Result<()> {
    let (state, audit) = state_with_audit();
    let account = seed_account(&state).await;

    let first = send(&state, post_json("/v1/auth/login", &login_payload("Wr0ng!Pass"))).await;
    assert_eq!(first.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(first).await?;
    assert_eq!(body["remaining_attempts"], 2);
    assert!(body.get("warning").is_none());

    let second = send(&state, post_json("/v1/auth/login", &login_payload("Wr0ng!Pass"))).await;
    let body = body_json(second).await?;
    assert_eq!(body["remaining_attempts"], 1);
    assert!(body["warning"].as_str().is_some());

    let before = Utc::now();
    let third = send(&state, post_json("/v1/auth/login", &login_payload("Wr0ng!Pass"))).await;
    assert_eq!(third.status(), StatusCode::FORBIDDEN);
    let body = body_json(third).await?;
    assert_eq!(body["code"], "account_locked");
    let locked_until: DateTime<Utc> =
        serde_json::from_value(body["locked_until"].clone()).context("locked_until")?;
    let expected = before + Duration::minutes(30);
    assert!((locked_until - expected).num_seconds().abs() < 5);

    let events = audit.snapshot();
    assert_eq!(events.last().map(|e| e.action), Some(AuditAction::AccountLock));

    let stored = state.accounts().get(account.id).await.context("account")?;
    assert_eq!(stored.lockout.failed_attempts, 3);

    // Even the correct password bounces off the lock.
    let fourth = send(&state, post_json("/v1/auth/login", &login_payload(SECRET))).await;
    assert_eq!(fourth.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn password_success_resets_counter_before_two_factor() -> Result<()> {
    let (state, _) = state_with_audit();
    let mut account = Account::new(
        "Test User".to_string(),
        "user@example.com".to_string(),
        "+971500000001".to_string(),
        bcrypt::hash(SECRET, 4).expect("hash"),
        Utc::now(),
    );
    account.status = AccountStatus::Active;
    account.mobile_verified = true;
    account.two_factor_enabled = true;
    let account_id = state.accounts().insert(account).await.expect("insert");

    for _ in 0..2 {
        let response =
            send(&state, post_json("/v1/auth/login", &login_payload("Wr0ng!Pass"))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    // The right password clears the failures even though the flow stops at
    // the challenge; abandoning the prompt must not leave the account one
    // typo away from a lock.
    let response = send(&state, post_json("/v1/auth/login", &login_payload(SECRET))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["requires_2fa"], true);

    let stored = state.accounts().get(account_id).await.context("account")?;
    assert_eq!(stored.lockout.failed_attempts, 0);
    Ok(())
}

#[tokio::test]
async fn expired_lockout_clears_on_the_next_attempt() -> Result<()> {
    let audit = Arc::new(MemoryAuditLog::new());
    let config = SecurityConfig::new(
        "http://localhost:3000".to_string(),
        SecretString::from("test key".to_string()),
    )
    .with_lockout_minutes(0);
    let state = Arc::new(AuthState::new(config).with_audit_sink(audit));
    let account = seed_account(&state).await;

    for _ in 0..2 {
        send(&state, post_json("/v1/auth/login", &login_payload("Wr0ng!Pass"))).await;
    }
    let third = send(&state, post_json("/v1/auth/login", &login_payload("Wr0ng!Pass"))).await;
    assert_eq!(third.status(), StatusCode::FORBIDDEN);

    // The zero-minute lock has already expired, so the next correct login
    // clears it and goes through.
    let response = send(&state, post_json("/v1/auth/login", &login_payload(SECRET))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let stored = state.accounts().get(account.id).await.context("account")?;
    assert_eq!(stored.lockout.failed_attempts, 0);
    assert!(stored.lockout.locked_until.is_none());
    Ok(())
}

#[tokio::test]
async fn rate_window_survives_a_successful_login() -> Result<()> {
    let (state, _) = state_with_audit();
    seed_account(&state).await;

    for _ in 0..2 {
        send(&state, post_json("/v1/auth/login", &login_payload("Wr0ng!Pass"))).await;
    }
    let success = send(&state, post_json("/v1/auth/login", &login_payload(SECRET))).await;
    assert_eq!(success.status(), StatusCode::OK);
    for _ in 0..2 {
        send(&state, post_json("/v1/auth/login", &login_payload("Wr0ng!Pass"))).await;
    }

    // Five requests are in the window; success in the middle buys nothing.
    let sixth = send(&state, post_json("/v1/auth/login", &login_payload(SECRET))).await;
    assert_eq!(sixth.status(), StatusCode::TOO_MANY_REQUESTS);
    Ok(())
}

#[tokio::test]
async fn sixth_attempt_in_window_is_rate_limited() -> Result<()> {
    let (state, _) = state_with_audit();
    seed_account(&state).await;

    for _ in 0..5 {
        let response =
            send(&state, post_json("/v1/auth/login", &login_payload("Wr0ng!Pass"))).await;
        assert_ne!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    let sixth = send(&state, post_json("/v1/auth/login", &login_payload(SECRET))).await;
    assert_eq!(sixth.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = body_json(sixth).await?;
    assert_eq!(body["code"], "rate_limited");
    assert!(body["retry_after_seconds"].as_u64().is_some());
    Ok(())
}

#[tokio::test]
async fn two_factor_flow_accepts_backup_code_once() -> Result<()> {
    let (state, audit) = state_with_audit();
    let mut account = Account::new(
        "Test User".to_string(),
        "user@example.com".to_string(),
        "+971500000001".to_string(),
        bcrypt::hash(SECRET, 4).expect("hash"),
        Utc::now(),
    );
    account.status = AccountStatus::Active;
    account.mobile_verified = true;
    account.two_factor_enabled = true;
    account.backup_code_hashes = vec![bcrypt::hash("ABCD1234", 4).expect("hash")];
    let account_id = state.accounts().insert(account).await.expect("insert");

    let response = send(&state, post_json("/v1/auth/login", &login_payload(SECRET))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["requires_2fa"], true);
    assert!(body.get("token").is_none());
    let temp_token = body["temp_token"].as_str().context("temp token")?.to_string();

    let wrong = send(
        &state,
        post_json(
            "/v1/auth/2fa/verify",
            &json!({ "temp_token": temp_token, "code": "000000" }),
        ),
    )
    .await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let verified = send(
        &state,
        post_json(
            "/v1/auth/2fa/verify",
            &json!({ "temp_token": temp_token, "code": "ABCD1234" }),
        ),
    )
    .await;
    assert_eq!(verified.status(), StatusCode::OK);
    let body = body_json(verified).await?;
    assert!(body["token"].as_str().is_some());

    let stored = state.accounts().get(account_id).await.context("account")?;
    assert!(stored.backup_code_hashes.is_empty());

    let actions: Vec<_> = audit.snapshot().iter().map(|e| e.action).collect();
    assert!(actions.contains(&AuditAction::TwoFactorFailed));
    assert!(actions.contains(&AuditAction::TwoFactorVerified));
    Ok(())
}

#[tokio::test]
async fn register_verify_mobile_then_login() -> Result<()> {
    let (state, audit) = state_with_audit();

    let response = send(
        &state,
        post_json(
            "/v1/auth/register",
            &json!({
                "name": "Test User",
                "email": "User@Example.com",
                "mobile": "+971500000001",
                "secret": SECRET,
                "consent": { "marketing": false, "analytics": true, "third_party": false }
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["requires_verification"], true);

    // Recover the sealed verification code the way the delivery worker would.
    let account = state
        .accounts()
        .find_by_identifier("user@example.com")
        .await
        .context("account")?;
    let sealed = account.mobile_verification.as_deref().context("sealed code")?;
    let code = String::from_utf8(crypto::open(&state.config().sealing_key(), sealed)?)?;

    let response = send(
        &state,
        post_json(
            "/v1/auth/verify-mobile",
            &json!({ "identifier": "user@example.com", "code": code }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let account = state
        .accounts()
        .find_by_identifier("user@example.com")
        .await
        .context("account")?;
    assert_eq!(account.status, AccountStatus::Active);
    assert!(account.mobile_verified);

    let response = send(&state, post_json("/v1/auth/login", &login_payload(SECRET))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let actions: Vec<_> = audit.snapshot().iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        vec![
            AuditAction::AccountCreate,
            AuditAction::AccountVerify,
            AuditAction::Login
        ]
    );
    Ok(())
}

#[tokio::test]
async fn register_is_rate_limited_per_ip() -> Result<()> {
    let (state, _) = state_with_audit();

    for i in 0..3 {
        let response = send(
            &state,
            post_json(
                "/v1/auth/register",
                &json!({
                    "name": "Test User",
                    "email": format!("user{i}@example.com"),
                    "mobile": format!("+97150000000{i}"),
                    "secret": SECRET,
                    "consent": {}
                }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let fourth = send(
        &state,
        post_json(
            "/v1/auth/register",
            &json!({
                "name": "Test User",
                "email": "user9@example.com",
                "mobile": "+971500000009",
                "secret": SECRET,
                "consent": {}
            }),
        ),
    )
    .await;
    assert_eq!(fourth.status(), StatusCode::TOO_MANY_REQUESTS);
    Ok(())
}

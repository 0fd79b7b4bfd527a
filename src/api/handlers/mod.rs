//! HTTP handlers.

pub(crate) mod auth;
pub(crate) mod health;

use axum::response::IntoResponse;

pub use auth::{AuthState, FraudProviders, SecurityConfig};

/// Service banner for the root route.
pub async fn root() -> impl IntoResponse {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
}

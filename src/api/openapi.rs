//! `OpenAPI` document for the service.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use super::handlers::auth::types::{
    AuthErrorResponse, Consent, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse,
    SessionInfo, SessionResponse, TwoFactorVerifyRequest, UserProfile, VerifyMobileRequest,
    VerifyMobileResponse,
};
use super::handlers::{auth, health};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "centinela",
        description = "Account security and authentication service"
    ),
    paths(
        health::health,
        auth::login::login,
        auth::register::register,
        auth::two_factor::verify,
        auth::verify::verify_mobile,
        auth::session::session,
        auth::session::logout,
    ),
    components(schemas(
        health::Health,
        LoginRequest,
        LoginResponse,
        AuthErrorResponse,
        RegisterRequest,
        Consent,
        RegisterResponse,
        TwoFactorVerifyRequest,
        VerifyMobileRequest,
        VerifyMobileResponse,
        SessionInfo,
        SessionResponse,
        UserProfile,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Login, registration, and session endpoints"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build(),
                ),
            );
        }
    }
}

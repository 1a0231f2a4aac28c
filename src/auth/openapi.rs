use axum::Json;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use super::{handlers, types};
use crate::error::ErrorBody;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::otp::request_otp,
        handlers::otp::verify_otp,
        handlers::token::me,
        handlers::token::refresh,
        handlers::token::logout,
        handlers::token::logout_all,
    ),
    components(schemas(
        ErrorBody,
        types::Health,
        types::OtpRequest,
        types::OtpRequestResponse,
        types::OtpVerifyRequest,
        types::LoginResponse,
        types::UserProfile,
        types::MeResponse,
        types::RefreshRequest,
        types::TokenResponse,
        types::LogoutRequest,
        types::LogoutResponse,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "otp", description = "Phone login with one-time codes"),
        (name = "session", description = "Token refresh and logout"),
        (name = "health", description = "Service health"),
    )
)]
struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.info.title = env!("CARGO_PKG_NAME").to_string();
    doc.info.version = env!("CARGO_PKG_VERSION").to_string();
    doc
}

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_endpoint() {
        let doc = openapi();
        for path in [
            "/health",
            "/otp/request",
            "/otp/verify",
            "/me",
            "/refresh",
            "/logout",
            "/logout/all",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        assert_eq!(doc.info.version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn document_declares_bearer_scheme() {
        let schemes = openapi()
            .components
            .map(|components| components.security_schemes)
            .unwrap_or_default();
        assert!(schemes.contains_key("bearer"));
    }
}

//! Auth service tests driving the router in-process.

use super::{router, AuthConfig, AuthState};
use crate::{
    server::Environment,
    session::subject_id,
    store::{MemoryStore, SharedStore},
    token::{fingerprint, fingerprint_prefix, TokenService},
};
use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
};
use http_body_util::BodyExt;
use secrecy::SecretString;
use serde_json::{json, Value};
use std::{error::Error, sync::Arc, time::Duration};
use tower::ServiceExt;

type TestResult<T = ()> = Result<T, Box<dyn Error>>;

const PHONE: &str = "9876543210";

fn state(environment: Environment) -> Arc<AuthState> {
    let store: SharedStore = Arc::new(MemoryStore::new());
    let tokens = TokenService::new(
        &SecretString::from("test-secret".to_string()),
        Duration::from_secs(24 * 60 * 60),
        Duration::from_secs(7 * 24 * 60 * 60),
    );
    Arc::new(AuthState::new(AuthConfig::new(environment), store, tokens))
}

fn post(uri: &str, body: &Value, bearer: Option<&str>) -> TestResult<Request<Body>> {
    let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    Ok(builder.body(Body::from(serde_json::to_vec(body)?))?)
}

fn get(uri: &str, bearer: Option<&str>) -> TestResult<Request<Body>> {
    let mut builder = Request::get(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    Ok(builder.body(Body::empty())?)
}

async fn send(
    state: &Arc<AuthState>,
    request: Request<Body>,
) -> TestResult<(StatusCode, HeaderMap, Value)> {
    let response = router(state.clone()).oneshot(request).await?;
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await?.to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, headers, body))
}

fn text<'a>(body: &'a Value, field: &str) -> &'a str {
    body.get(field).and_then(Value::as_str).unwrap_or_default()
}

async fn request_code(state: &Arc<AuthState>) -> TestResult<String> {
    let (status, _, body) = send(
        state,
        post("/otp/request", &json!({ "phoneNumber": PHONE }), None)?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    Ok(text(&body, "_devOtp").to_string())
}

async fn login(state: &Arc<AuthState>) -> TestResult<Value> {
    let code = request_code(state).await?;
    let (status, _, body) = send(
        state,
        post(
            "/otp/verify",
            &json!({ "phoneNumber": PHONE, "otp": code }),
            None,
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    Ok(body)
}

fn other_code(code: &str) -> String {
    if code == "000000" {
        "111111".to_string()
    } else {
        "000000".to_string()
    }
}

#[tokio::test]
async fn otp_request_rejects_bad_phone() -> TestResult {
    let state = state(Environment::Development);
    for body in [json!({ "phoneNumber": "12345" }), json!({})] {
        let (status, _, body) = send(&state, post("/otp/request", &body, None)?).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(text(&body, "code"), "validation_error");
        assert_eq!(text(&body, "error"), "Invalid phone number");
    }
    Ok(())
}

#[tokio::test]
async fn otp_request_exposes_code_only_in_development() -> TestResult {
    let dev = state(Environment::Development);
    let (status, _, body) = send(
        &dev,
        post("/otp/request", &json!({ "phoneNumber": PHONE }), None)?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.get("success"), Some(&json!(true)));
    assert_eq!(body.get("expiresIn"), Some(&json!(300)));
    assert_eq!(text(&body, "_devOtp").len(), 6);

    let prod = state(Environment::Production);
    let (status, _, body) = send(
        &prod,
        post("/otp/request", &json!({ "phoneNumber": PHONE }), None)?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("_devOtp").is_none());
    Ok(())
}

#[tokio::test]
async fn verify_returns_tokens_and_profile() -> TestResult {
    let state = state(Environment::Development);
    let body = login(&state).await?;

    assert_eq!(body.get("success"), Some(&json!(true)));
    assert_eq!(body.get("expiresIn"), Some(&json!(86_400)));
    assert!(!text(&body, "accessToken").is_empty());
    assert!(!text(&body, "refreshToken").is_empty());

    let user = body.get("user").cloned().unwrap_or_default();
    assert_eq!(text(&user, "id"), subject_id(PHONE));
    assert_eq!(text(&user, "phoneNumber"), PHONE);
    assert_eq!(user.get("name"), Some(&Value::Null));
    assert_eq!(user.get("email"), Some(&Value::Null));
    assert_eq!(user.get("isNewUser"), Some(&json!(true)));

    assert!(state.sessions().has_sessions(&subject_id(PHONE)).await?);

    let again = login(&state).await?;
    let user = again.get("user").cloned().unwrap_or_default();
    assert_eq!(user.get("isNewUser"), Some(&json!(false)));
    Ok(())
}

#[tokio::test]
async fn verify_validates_input() -> TestResult {
    let state = state(Environment::Development);

    let cases = [
        (json!({ "phoneNumber": PHONE }), "Phone number and OTP are required"),
        (json!({ "otp": "123456" }), "Phone number and OTP are required"),
        (
            json!({ "phoneNumber": "5876543210", "otp": "123456" }),
            "Invalid phone number",
        ),
        (
            json!({ "phoneNumber": PHONE, "otp": "12ab56" }),
            "Invalid OTP format",
        ),
        (
            json!({ "phoneNumber": PHONE, "otp": "12345" }),
            "Invalid OTP format",
        ),
    ];
    for (body, error) in cases {
        let (status, _, body) = send(&state, post("/otp/verify", &body, None)?).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(text(&body, "error"), error);
    }
    Ok(())
}

#[tokio::test]
async fn wrong_codes_lock_the_phone() -> TestResult {
    let state = state(Environment::Development);
    let code = request_code(&state).await?;
    let wrong = other_code(&code);

    for _ in 0..5 {
        let (status, _, body) = send(
            &state,
            post(
                "/otp/verify",
                &json!({ "phoneNumber": PHONE, "otp": wrong }),
                None,
            )?,
        )
        .await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(text(&body, "error"), "Invalid or expired OTP");
    }

    let (status, _, body) = send(
        &state,
        post(
            "/otp/verify",
            &json!({ "phoneNumber": PHONE, "otp": code }),
            None,
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(text(&body, "code"), "locked");
    assert!(text(&body, "message").contains("15 minutes"));

    // locked before the code format is considered
    let (status, _, body) = send(
        &state,
        post(
            "/otp/verify",
            &json!({ "phoneNumber": PHONE, "otp": "12ab" }),
            None,
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(text(&body, "code"), "locked");

    let (status, _, _) = send(
        &state,
        post("/otp/request", &json!({ "phoneNumber": PHONE }), None)?,
    )
    .await?;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    Ok(())
}

#[tokio::test]
async fn me_requires_access_token() -> TestResult {
    let state = state(Environment::Development);
    let login = login(&state).await?;

    let (status, _, body) = send(&state, get("/me", Some(text(&login, "accessToken")))?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(text(&body, "id"), subject_id(PHONE));
    assert_eq!(text(&body, "phoneNumber"), PHONE);
    assert!(!text(&body, "createdAt").is_empty());

    let (status, _, body) = send(&state, get("/me", Some(text(&login, "refreshToken")))?).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(text(&body, "code"), "token_wrong_kind");

    let (status, _, body) = send(&state, get("/me", None)?).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(text(&body, "code"), "token_missing");

    let (status, _, body) = send(&state, get("/me", Some("garbage"))?).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(text(&body, "code"), "token_invalid");
    Ok(())
}

#[tokio::test]
async fn refresh_rotates_pair_and_session() -> TestResult {
    let state = state(Environment::Development);
    let login = login(&state).await?;
    let old_refresh = text(&login, "refreshToken").to_string();
    let subject = subject_id(PHONE);

    let (status, _, body) = send(
        &state,
        post("/refresh", &json!({ "refreshToken": old_refresh }), None)?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(text(&body, "accessToken"), text(&login, "accessToken"));
    assert_eq!(body.get("expiresIn"), Some(&json!(86_400)));

    let old_hash = fingerprint(&old_refresh);
    assert!(state
        .sessions()
        .record(&subject, fingerprint_prefix(&old_hash))
        .await?
        .is_none());
    let new_hash = fingerprint(text(&body, "refreshToken"));
    assert!(state
        .sessions()
        .record(&subject, fingerprint_prefix(&new_hash))
        .await?
        .is_some());

    // Records are advisory: the rotated-out token still refreshes.
    let (status, _, _) = send(
        &state,
        post("/refresh", &json!({ "refreshToken": old_refresh }), None)?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn refresh_rejects_access_token_and_missing_body() -> TestResult {
    let state = state(Environment::Development);
    let login = login(&state).await?;

    let (status, _, body) = send(
        &state,
        post(
            "/refresh",
            &json!({ "refreshToken": text(&login, "accessToken") }),
            None,
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(text(&body, "code"), "token_wrong_kind");

    let (status, _, body) = send(&state, post("/refresh", &json!({}), None)?).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(text(&body, "error"), "Refresh token required");
    Ok(())
}

#[tokio::test]
async fn logout_always_succeeds() -> TestResult {
    let state = state(Environment::Development);

    let (status, _, body) = send(&state, post("/logout", &json!({}), None)?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.get("success"), Some(&json!(true)));

    let (status, _, _) = send(&state, post("/logout", &json!({}), Some("garbage"))?).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn logout_closes_presented_refresh_session() -> TestResult {
    let state = state(Environment::Development);
    let login = login(&state).await?;
    let subject = subject_id(PHONE);
    assert!(state.sessions().has_sessions(&subject).await?);

    let (status, _, _) = send(
        &state,
        post(
            "/logout",
            &json!({ "refreshToken": text(&login, "refreshToken") }),
            Some(text(&login, "accessToken")),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(!state.sessions().has_sessions(&subject).await?);
    Ok(())
}

#[tokio::test]
async fn logout_all_requires_access_token() -> TestResult {
    let state = state(Environment::Development);
    let first = login(&state).await?;
    login(&state).await?;
    let subject = subject_id(PHONE);

    let (status, _, _) = send(&state, post("/logout/all", &json!({}), None)?).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(state.sessions().has_sessions(&subject).await?);

    let (status, _, body) = send(
        &state,
        post("/logout/all", &json!({}), Some(text(&first, "accessToken")))?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.get("success"), Some(&json!(true)));
    assert!(!state.sessions().has_sessions(&subject).await?);
    Ok(())
}

#[tokio::test]
async fn health_reports_store_and_build() -> TestResult {
    let state = state(Environment::Production);
    let (status, headers, body) = send(&state, get("/health", None)?).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(text(&body, "status"), "healthy");
    assert_eq!(text(&body, "service"), "auth-service");
    assert_eq!(text(&body, "store"), "connected");
    assert_eq!(text(&body, "version"), env!("CARGO_PKG_VERSION"));
    assert!(headers.contains_key("x-app"));
    Ok(())
}

#[tokio::test]
async fn serves_openapi_document() -> TestResult {
    let state = state(Environment::Production);
    let (status, _, body) = send(&state, get("/api-docs/openapi.json", None)?).await?;

    assert_eq!(status, StatusCode::OK);
    assert!(body.pointer("/paths/~1otp~1verify").is_some());
    Ok(())
}

#[tokio::test]
async fn unknown_path_is_json_404() -> TestResult {
    let state = state(Environment::Production);
    let (status, _, body) = send(&state, get("/nope", None)?).await?;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(text(&body, "code"), "not_found");
    Ok(())
}

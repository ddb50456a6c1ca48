use axum::{
    extract::State,
    http::StatusCode,
    response::Response,
    Extension, Json,
};
use serde::Serialize;
use tower_cookies::cookie::{SameSite, time::Duration};
use tower_cookies::{Cookie, Cookies};

use crate::{
    error::Result,
    handlers::json_response,
    middleware_layer::{
        auth::{SESSION_COOKIE, session_token},
        csrf::CSRF_COOKIE,
    },
    models::user::Identity,
    state::AppState,
    validation::auth::{LoginRequest, RegisterRequest},
};

/// The response payload for registration.
#[derive(Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
    pub user: Identity,
}

/// The response payload for login and logout.
#[derive(Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    /// Where the browser should go next.
    pub redirect: String,
}

/// Creates a cookie with the given name, value and max age.
///
/// Only the CSRF cookie is readable from scripts, since the frontend must
/// echo it in a header.
fn create_secure_cookie(name: &'static str, value: String, max_age_secs: i64, production: bool) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);

    cookie.set_http_only(name != CSRF_COOKIE);
    if production {
        cookie.set_secure(true);
    }

    cookie.set_same_site(SameSite::Lax);
    cookie.set_max_age(Duration::seconds(max_age_secs));
    cookie.set_path("/");

    cookie
}

fn expired_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, "");
    cookie.set_max_age(Duration::seconds(0));
    cookie.set_path("/");
    cookie
}

/// Handles user registration. Does not log the new user in.
#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Response> {
    tracing::info!("📝 Register attempt: {:?}", payload);
    let role = payload.validated_role()?;

    let user = state
        .authenticator
        .register(&payload.email, &payload.password, role)
        .await?;

    json_response(
        StatusCode::CREATED,
        &RegisterResponse {
            success: true,
            message: "Registration successful. Please log in.".to_string(),
            user,
        },
    )
}

/// Handles user login: opens a session and points the browser at the
/// dashboard for its role.
#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(payload): Json<LoginRequest>,
) -> Result<Response> {
    tracing::info!("🔐 Login attempt: {:?}", payload);

    let identity = state
        .authenticator
        .authenticate(&payload.email, &payload.password)
        .await?;
    let redirect = identity.role.dashboard_path().to_string();
    let user_id = identity.user_id;

    let issued = state.sessions.start(identity).await?;

    let max_age = state.sessions.max_lifetime().num_seconds();
    let production = state.config.production;
    cookies.add(create_secure_cookie(SESSION_COOKIE, issued.session_token, max_age, production));
    cookies.add(create_secure_cookie(CSRF_COOKIE, issued.csrf_token, max_age, production));

    tracing::info!("✅ User logged in: {}", user_id);

    json_response(
        StatusCode::OK,
        &AuthResponse {
            success: true,
            message: "Login successful".to_string(),
            redirect,
        },
    )
}

/// Handles user logout.
#[axum::debug_handler]
pub async fn logout(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    cookies: Cookies,
) -> Result<Response> {
    if let Some(token) = session_token(&cookies) {
        let csrf_token = cookies.get(CSRF_COOKIE).map(|c| c.value().to_string());
        state.sessions.end(&token, csrf_token.as_deref()).await?;
    }

    cookies.remove(expired_cookie(SESSION_COOKIE));
    cookies.remove(expired_cookie(CSRF_COOKIE));

    tracing::info!("👋 User logged out: {}", identity.user_id);

    json_response(
        StatusCode::OK,
        &AuthResponse {
            success: true,
            message: "Logout successful".to_string(),
            redirect: "/".to_string(),
        },
    )
}

/// The identity bound to the caller's session.
pub async fn me(Extension(identity): Extension<Identity>) -> Result<Response> {
    json_response(StatusCode::OK, &identity)
}

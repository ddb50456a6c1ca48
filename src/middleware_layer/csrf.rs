use axum::{
    body::Body,
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_cookies::Cookies;

use crate::{
    crypto::token::tokens_match,
    error::AppError,
    middleware_layer::auth::session_token,
    state::AppState,
};

pub const CSRF_COOKIE: &str = "csrf_token";
pub const CSRF_HEADER: &str = "x-csrf-token";

/// A middleware that verifies the CSRF token on state-changing requests.
///
/// The `x-csrf-token` header must equal the `csrf_token` cookie, and the
/// token must have been issued for the caller's current session.
pub async fn verify_csrf(
    State(state): State<AppState>,
    cookies: Cookies,
    req: Request<Body>,
    next: Next,
) -> Response {
    if req.method() == Method::GET
        || req.method() == Method::HEAD
        || req.method() == Method::OPTIONS
    {
        return next.run(req).await;
    }

    let Some(csrf_cookie) = cookies.get(CSRF_COOKIE).map(|c| c.value().to_string()) else {
        tracing::warn!("❌ CSRF: csrf_token cookie missing");
        return AppError::Authentication("Missing CSRF token cookie".to_string()).into_response();
    };

    let csrf_header = match req.headers().get(CSRF_HEADER).map(|v| v.to_str()) {
        Some(Ok(token)) => token.to_string(),
        Some(Err(_)) => {
            tracing::warn!("❌ CSRF: header is not valid text");
            return AppError::Authentication("Invalid CSRF token format".to_string())
                .into_response();
        }
        None => {
            tracing::warn!("❌ CSRF: x-csrf-token header missing");
            return AppError::Authentication("Missing CSRF token header".to_string())
                .into_response();
        }
    };

    if !tokens_match(&csrf_cookie, &csrf_header) {
        tracing::warn!("❌ CSRF: cookie and header differ");
        return AppError::Authentication("CSRF token mismatch".to_string()).into_response();
    }

    let Some(session_token) = session_token(&cookies) else {
        return AppError::Unauthenticated.into_response();
    };

    match state.sessions.csrf_belongs_to(&csrf_header, &session_token).await {
        Ok(true) => next.run(req).await,
        Ok(false) => {
            tracing::warn!("❌ CSRF: token expired or issued for another session");
            AppError::Authentication("CSRF token expired or invalid".to_string()).into_response()
        }
        Err(e) => {
            tracing::error!("❌ CSRF: lookup failed: {}", e);
            AppError::Authentication("CSRF validation error".to_string()).into_response()
        }
    }
}

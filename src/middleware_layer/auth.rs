use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_cookies::Cookies;

use crate::{
    models::user::{Identity, Role},
    services::access::{self, AccessError},
    state::AppState,
};

pub const SESSION_COOKIE: &str = "session_id";

/// Extracts the session token from the request cookies.
pub fn session_token(cookies: &Cookies) -> Option<String> {
    cookies
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}

async fn current_identity(state: &AppState, cookies: &Cookies) -> Option<Identity> {
    state
        .sessions
        .current_identity(session_token(cookies).as_deref())
        .await
}

/// A middleware that requires a live session and hands its [`Identity`] to
/// the handler as an extension.
///
/// Anonymous callers are redirected to `/`.
pub async fn require_auth(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let identity = match access::authenticate(current_identity(&state, &cookies).await) {
        Ok(identity) => identity,
        Err(e) => {
            tracing::debug!("🔐 {} {}: {}", request.method(), request.uri().path(), e);
            return crate::error::AppError::from(e).into_response();
        }
    };

    tracing::debug!("✅ User authenticated: {}", identity.user_id);
    request.extensions_mut().insert(identity);
    next.run(request).await
}

async fn require_role(
    state: &AppState,
    cookies: &Cookies,
    role: Role,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let identity = current_identity(state, cookies).await;
    let own_dashboard = identity
        .as_ref()
        .map(|identity| identity.role.dashboard_path())
        .unwrap_or("/");

    match access::authorize(identity, role) {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(AccessError::Forbidden) => {
            tracing::warn!(
                "❌ {} requires role {}, redirecting to {}",
                request.uri().path(),
                role,
                own_dashboard
            );
            Redirect::to(own_dashboard).into_response()
        }
        Err(e) => crate::error::AppError::from(e).into_response(),
    }
}

/// Only `client` sessions pass; staff are sent to their own dashboard.
pub async fn require_client(
    State(state): State<AppState>,
    cookies: Cookies,
    request: Request<Body>,
    next: Next,
) -> Response {
    require_role(&state, &cookies, Role::Client, request, next).await
}

/// Only `staff` sessions pass; clients are sent to their own dashboard.
pub async fn require_staff(
    State(state): State<AppState>,
    cookies: Cookies,
    request: Request<Body>,
    next: Next,
) -> Response {
    require_role(&state, &cookies, Role::Staff, request, next).await
}

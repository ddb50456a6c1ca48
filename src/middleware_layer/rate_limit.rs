use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use sonic_rs::JsonValueTrait;

use crate::{error::AppError, state::AppState};

/// Login bodies are small JSON documents.
const MAX_LOGIN_BODY: usize = 16 * 1024;

/// Extracts the client IP address from the request extensions.
///
/// # Returns
///
/// The IP address as a string, or "unknown" if not found.
fn extract_real_ip(req: &Request<Body>) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn extract_email(body_bytes: &[u8]) -> Option<String> {
    let json = sonic_rs::from_slice::<sonic_rs::Value>(body_bytes).ok()?;
    json.get("email")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

fn minutes(secs: u64) -> u64 {
    secs.div_ceil(60)
}

/// A middleware that limits registrations per client IP.
///
/// Every attempt counts, successful or not.
pub async fn rate_limit_register(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let key = format!("rate_limit:register:{}", extract_real_ip(&req));
    let window = Duration::from_secs(state.config.throttle_window_secs);

    match state.attempts.hit(&key, window).await {
        Ok(attempts) if attempts > state.config.register_max_per_ip => {
            let retry_after = state.attempts.retry_after(&key).await.unwrap_or(0);
            tracing::warn!("❌ Registration limit reached for {}", key);
            AppError::RateLimitExceeded(format!(
                "Registration limit exceeded. Try again in {} minutes",
                minutes(retry_after)
            ))
            .into_response()
        }
        Ok(_) => next.run(req).await,
        Err(e) => e.into_response(),
    }
}

/// A middleware that locks out an email after repeated failed logins.
///
/// Failures are client-error responses from the login handler; a successful
/// login clears the counter.
pub async fn rate_limit_login(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let (parts, body) = req.into_parts();
    let body_bytes = match axum::body::to_bytes(body, MAX_LOGIN_BODY).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return AppError::Validation("Login request body too large".to_string()).into_response();
        }
    };

    let email = extract_email(&body_bytes).unwrap_or_else(|| "unknown".to_string());
    let key = format!("rate_limit:login:{}", email);

    match state.attempts.count(&key).await {
        Ok(failures) if failures >= state.config.login_max_failures => {
            let retry_after = state.attempts.retry_after(&key).await.unwrap_or(0);
            tracing::warn!("❌ Login locked for {}", email);
            return AppError::RateLimitExceeded(format!(
                "Too many failed login attempts. Try again in {} minutes",
                minutes(retry_after)
            ))
            .into_response();
        }
        Ok(_) => {}
        Err(e) => return e.into_response(),
    }

    let response = next.run(Request::from_parts(parts, Body::from(body_bytes))).await;

    let status = response.status();
    if status.is_success() {
        if let Err(e) = state.attempts.reset(&key).await {
            tracing::warn!("Failed to reset login counter: {}", e);
        }
    } else if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
        let window = Duration::from_secs(state.config.throttle_window_secs);
        if let Err(e) = state.attempts.hit(&key, window).await {
            tracing::warn!("Failed to record login failure: {}", e);
        }
    }

    response
}

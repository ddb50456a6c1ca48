use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
};
use http::{HeaderName, HeaderValue, Method, header};
use tower_cookies::CookieManagerLayer;
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{
    handlers::{admin, auth, dashboard, job_cards, manuals, service_orders},
    middleware_layer::{
        auth::{require_auth, require_client, require_staff},
        csrf::{CSRF_HEADER, verify_csrf},
        rate_limit::{rate_limit_login, rate_limit_register},
    },
    state::AppState,
};

/// Room for the text fields sent alongside an upload.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .with_context(|| format!("Invalid CORS origin '{}'", origin))
        })
        .collect::<Result<Vec<_>>>()?;

    let csrf_header = HeaderName::from_static(CSRF_HEADER);

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::COOKIE,
            csrf_header.clone(),
        ])
        .allow_credentials(true)
        .expose_headers([csrf_header])
        .max_age(Duration::from_secs(86400)))
}

/// Builds the full application router.
///
/// Public: registration and login (throttled), static files.
/// Role-gated: the two dashboards, manual upload and user deletion.
/// Everything else needs any live session, and mutating requests a CSRF token.
pub fn build_router(state: AppState) -> Result<Router> {
    let protected_governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(50)
            .burst_size(200)
            .use_headers()
            .finish()
            .context("Invalid rate limiter configuration")?,
    );

    let register_routes = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route_layer(from_fn_with_state(state.clone(), rate_limit_register))
        .with_state(state.clone());

    let login_routes = Router::new()
        .route("/api/auth/login", post(auth::login))
        .route_layer(from_fn_with_state(state.clone(), rate_limit_login))
        .with_state(state.clone());

    let client_routes = Router::new()
        .route("/client", get(dashboard::client_dashboard))
        .route_layer(from_fn_with_state(state.clone(), require_client))
        .with_state(state.clone());

    let staff_routes = Router::new()
        .route("/staff", get(dashboard::staff_dashboard))
        .route("/api/manuals/upload", post(manuals::upload_manual))
        .route("/api/admin/users/{user_id}", delete(admin::delete_user))
        .layer(GovernorLayer::new(protected_governor_conf.clone()))
        .route_layer(from_fn_with_state(state.clone(), verify_csrf))
        .route_layer(from_fn_with_state(state.clone(), require_staff))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route(
            "/api/jobcards",
            get(job_cards::list_job_cards).post(job_cards::create_job_card),
        )
        .route(
            "/api/jobcards/{id}",
            get(job_cards::get_job_card).delete(job_cards::delete_job_card),
        )
        .route(
            "/api/jobcards/{id}/attachment",
            get(job_cards::download_attachment),
        )
        .route(
            "/api/serviceorders",
            get(service_orders::list_service_orders).post(service_orders::create_service_order),
        )
        .route(
            "/api/serviceorders/{id}",
            get(service_orders::get_service_order).delete(service_orders::delete_service_order),
        )
        .route("/api/manuals", get(manuals::list_manuals))
        .route("/api/assistant/ask", post(manuals::ask))
        .layer(GovernorLayer::new(protected_governor_conf))
        .route_layer(from_fn_with_state(state.clone(), verify_csrf))
        .route_layer(from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    let app = Router::new()
        .merge(register_routes)
        .merge(login_routes)
        .merge(client_routes)
        .merge(staff_routes)
        .merge(protected_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default())
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(CookieManagerLayer::new())
        .layer(CompressionLayer::new())
        .layer(DefaultBodyLimit::max(
            state.config.max_upload_bytes + FORM_OVERHEAD_BYTES,
        ))
        .layer(cors_layer(&state.config.cors_origins)?)
        .fallback_service(ServeDir::new(&state.config.static_dir));

    Ok(app)
}

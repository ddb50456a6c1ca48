use axum::{extract::State, http::StatusCode, response::Response, Extension};
use serde::Serialize;

use crate::{
    error::Result, handlers::json_response, models::user::Identity, services::records,
    state::AppState,
};

#[derive(Serialize)]
pub struct DashboardResponse {
    pub user: Identity,
    pub job_cards: usize,
    pub service_orders: usize,
    /// Instruments with a manual. Only on the staff dashboard.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manuals: Option<Vec<String>>,
}

async fn summary(state: &AppState, identity: Identity) -> Result<DashboardResponse> {
    let job_cards = records::list_job_cards(state, &identity).await?.len();
    let service_orders = records::list_service_orders(state, &identity).await?.len();
    Ok(DashboardResponse {
        user: identity,
        job_cards,
        service_orders,
        manuals: None,
    })
}

pub async fn client_dashboard(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Response> {
    json_response(StatusCode::OK, &summary(&state, identity).await?)
}

pub async fn staff_dashboard(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Response> {
    let mut dashboard = summary(&state, identity).await?;
    dashboard.manuals = Some(state.manuals.list().await?);
    json_response(StatusCode::OK, &dashboard)
}

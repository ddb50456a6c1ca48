use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    Extension, Json,
};
use uuid::Uuid;

use crate::{
    error::Result,
    handlers::{MessageResponse, json_response},
    models::user::Identity,
    services::records,
    state::AppState,
    validation::records::ServiceOrderForm,
};

pub async fn list_service_orders(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Response> {
    let orders = records::list_service_orders(&state, &identity).await?;
    json_response(StatusCode::OK, &orders)
}

#[axum::debug_handler]
pub async fn create_service_order(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(form): Json<ServiceOrderForm>,
) -> Result<Response> {
    let order = records::create_service_order(&state, &identity, form).await?;
    json_response(StatusCode::CREATED, &order)
}

pub async fn get_service_order(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    let order = records::get_service_order(&state, &identity, id).await?;
    json_response(StatusCode::OK, &order)
}

pub async fn delete_service_order(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    records::delete_service_order(&state, &identity, id).await?;
    json_response(StatusCode::OK, &MessageResponse::ok("Service order deleted successfully"))
}

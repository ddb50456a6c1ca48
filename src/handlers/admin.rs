use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    Extension,
};
use uuid::Uuid;

use crate::{
    error::Result,
    handlers::{MessageResponse, json_response},
    models::user::Identity,
    services::users,
    state::AppState,
};

/// Deletes a user with all their records and sessions. Staff only.
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(admin): Extension<Identity>,
    Path(user_id): Path<Uuid>,
) -> Result<Response> {
    users::delete_user(&state, &admin, user_id).await?;
    json_response(StatusCode::OK, &MessageResponse::ok("User deleted successfully"))
}

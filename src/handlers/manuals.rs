use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::Response,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, Result},
    handlers::json_response,
    models::user::Identity,
    state::AppState,
};

#[derive(Serialize)]
pub struct ManualsResponse {
    pub instruments: Vec<String>,
}

#[derive(Serialize)]
pub struct ManualUploadResponse {
    pub success: bool,
    pub instrument: String,
}

/// The request payload for an assistant question.
#[derive(Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub instrument: String,
}

#[derive(Serialize)]
pub struct AskResponse {
    pub response: String,
}

pub async fn list_manuals(State(state): State<AppState>) -> Result<Response> {
    let instruments = state.manuals.list().await?;
    json_response(StatusCode::OK, &ManualsResponse { instruments })
}

/// Stores or replaces the manual for an instrument. Staff only.
#[axum::debug_handler]
pub async fn upload_manual(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    mut multipart: Multipart,
) -> Result<Response> {
    let mut instrument = None;
    let mut contents = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Multipart(format!("Parse error: {}", e)))?
    {
        match field.name().unwrap_or("") {
            "instrument" => {
                instrument = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| AppError::Multipart(format!("instrument: {}", e)))?,
                );
            }
            "file" => {
                contents = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| AppError::Multipart(format!("file: {}", e)))?,
                );
            }
            _ => {}
        }
    }

    let instrument = instrument.ok_or(AppError::Validation("Missing instrument".into()))?;
    let contents = contents.ok_or(AppError::Validation("Missing manual file".into()))?;

    let instrument = state.manuals.store(&instrument, &contents).await?;
    tracing::info!("📘 Manual for {} uploaded by {}", instrument, identity.user_id);

    json_response(
        StatusCode::CREATED,
        &ManualUploadResponse {
            success: true,
            instrument,
        },
    )
}

/// Answers a question from an instrument's manual. Always 200; problems are
/// reported in the answer text.
pub async fn ask(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<AskRequest>,
) -> Result<Response> {
    tracing::debug!("🤖 Assistant question from {} about {}", identity.user_id, request.instrument);
    let response = state
        .assistant
        .ask(&state.manuals, &request.query, &request.instrument)
        .await;
    json_response(StatusCode::OK, &AskResponse { response })
}

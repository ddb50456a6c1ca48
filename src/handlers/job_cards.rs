use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    Extension,
};
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    handlers::{MessageResponse, json_response},
    models::user::Identity,
    services::records::{self, UploadedFile},
    state::AppState,
    validation::records::JobCardForm,
};

async fn field_text(field: axum::extract::multipart::Field<'_>, name: &str) -> Result<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::Multipart(format!("{}: {}", name, e)))
}

/// Reads the job-card form. The `file` part is optional; a part with no
/// filename or no content counts as absent.
async fn read_form(mut multipart: Multipart) -> Result<(JobCardForm, Option<UploadedFile>)> {
    let mut form = JobCardForm::default();
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Multipart(format!("Parse error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "equipment_name" => form.equipment_name = Some(field_text(field, &name).await?),
            "maintenance_type" => form.maintenance_type = Some(field_text(field, &name).await?),
            "service_date" => form.service_date = Some(field_text(field, &name).await?),
            "spare_parts_used" => form.spare_parts_used = Some(field_text(field, &name).await?),
            "file" => {
                let filename = field.file_name().unwrap_or("").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Multipart(format!("file: {}", e)))?;
                if !filename.is_empty() && !bytes.is_empty() {
                    upload = Some(UploadedFile { filename, bytes });
                }
            }
            _ => {}
        }
    }

    Ok((form, upload))
}

pub async fn list_job_cards(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Response> {
    let cards = records::list_job_cards(&state, &identity).await?;
    json_response(StatusCode::OK, &cards)
}

#[axum::debug_handler]
pub async fn create_job_card(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    multipart: Multipart,
) -> Result<Response> {
    let (form, upload) = read_form(multipart).await?;
    let card = records::create_job_card(&state, &identity, form, upload).await?;
    json_response(StatusCode::CREATED, &card)
}

pub async fn get_job_card(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    let card = records::get_job_card(&state, &identity, id).await?;
    json_response(StatusCode::OK, &card)
}

pub async fn delete_job_card(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    records::delete_job_card(&state, &identity, id).await?;
    json_response(StatusCode::OK, &MessageResponse::ok("Job card deleted successfully"))
}

/// Streams a job card's attachment back under its original filename.
pub async fn download_attachment(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    let (attachment, file) = records::open_attachment(&state, &identity, id).await?;

    let mut headers = HeaderMap::new();
    let content_type = attachment
        .mime_type
        .as_deref()
        .and_then(|mime| HeaderValue::from_str(mime).ok())
        .unwrap_or(HeaderValue::from_static("application/octet-stream"));
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(attachment.size_bytes));

    let disposition = HeaderValue::from_str(&format!(
        r#"attachment; filename="{}""#,
        attachment.original_filename
    ))
    .unwrap_or(HeaderValue::from_static("attachment"));
    headers.insert(header::CONTENT_DISPOSITION, disposition);

    tracing::debug!("📎 Streaming attachment of job card {}", id);
    Ok((headers, Body::from_stream(ReaderStream::new(file))).into_response())
}

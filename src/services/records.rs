use axum::body::Bytes;
use tokio::fs::File;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{
        job_card::{AttachmentRef, JobCard},
        service_order::ServiceOrder,
        user::Identity,
    },
    services::access::ensure_owner,
    state::AppState,
    validation::records::{JobCardForm, ServiceOrderForm},
};

/// A file received with a job-card form.
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Bytes,
}

/// Creates a job card owned by the caller.
///
/// The attachment, if any, is written before the row is inserted and removed
/// again if the insert fails, so a failed create leaves nothing behind.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `identity` - The caller.
/// * `form` - The submitted text fields.
/// * `upload` - The optional attached file.
///
/// # Returns
///
/// A `Result` containing the stored `JobCard`.
pub async fn create_job_card(
    state: &AppState,
    identity: &Identity,
    form: JobCardForm,
    upload: Option<UploadedFile>,
) -> Result<JobCard> {
    let mut card = form.into_new_job_card(identity.user_id)?;

    if let Some(upload) = upload {
        card.attachment = Some(state.attachments.save(&upload.filename, &upload.bytes).await?);
    }
    let stored_name = card.attachment.as_ref().map(|a| a.stored_name.clone());

    match state.records.insert_job_card(card).await {
        Ok(card) => {
            tracing::info!("✅ Job card {} created by user {}", card.id, identity.user_id);
            Ok(card)
        }
        Err(e) => {
            if let Some(stored_name) = stored_name {
                if let Err(cleanup) = state.attachments.remove(&stored_name).await {
                    tracing::error!("❌ Failed to remove orphaned attachment {}: {}", stored_name, cleanup);
                }
            }
            Err(e)
        }
    }
}

/// The caller's job cards, oldest first.
pub async fn list_job_cards(state: &AppState, identity: &Identity) -> Result<Vec<JobCard>> {
    state.records.job_cards_by_owner(identity.user_id).await
}

pub async fn get_job_card(state: &AppState, identity: &Identity, id: Uuid) -> Result<JobCard> {
    let card = state.records.find_job_card(id).await?.ok_or(AppError::NotFound)?;
    ensure_owner(identity, card.owner_id)?;
    Ok(card)
}

/// Opens the attachment of one of the caller's job cards.
pub async fn open_attachment(
    state: &AppState,
    identity: &Identity,
    id: Uuid,
) -> Result<(AttachmentRef, File)> {
    let attachment = get_job_card(state, identity, id)
        .await?
        .attachment
        .ok_or(AppError::NotFound)?;
    let file = state.attachments.open(&attachment.stored_name).await?;
    Ok((attachment, file))
}

/// Deletes one of the caller's job cards and then its attachment.
///
/// A file that cannot be removed is logged; the row stays deleted.
pub async fn delete_job_card(state: &AppState, identity: &Identity, id: Uuid) -> Result<()> {
    let card = state.records.delete_job_card(id, identity.user_id).await?;

    if let Some(attachment) = card.attachment {
        if let Err(e) = state.attachments.remove(&attachment.stored_name).await {
            tracing::warn!(
                "⚠️ Job card {} deleted but attachment {} remains: {}",
                id,
                attachment.stored_name,
                e
            );
        }
    }

    tracing::info!("🗑️ Job card {} deleted by user {}", id, identity.user_id);
    Ok(())
}

/// Creates a service order owned by the caller. The total is always derived
/// from the two fees.
pub async fn create_service_order(
    state: &AppState,
    identity: &Identity,
    form: ServiceOrderForm,
) -> Result<ServiceOrder> {
    let order = form.into_new_service_order(identity.user_id)?;
    let order = state.records.insert_service_order(order).await?;
    tracing::info!("✅ Service order {} created by user {}", order.id, identity.user_id);
    Ok(order)
}

pub async fn list_service_orders(state: &AppState, identity: &Identity) -> Result<Vec<ServiceOrder>> {
    state.records.service_orders_by_owner(identity.user_id).await
}

pub async fn get_service_order(state: &AppState, identity: &Identity, id: Uuid) -> Result<ServiceOrder> {
    let order = state
        .records
        .find_service_order(id)
        .await?
        .ok_or(AppError::NotFound)?;
    ensure_owner(identity, order.owner_id)?;
    Ok(order)
}

pub async fn delete_service_order(state: &AppState, identity: &Identity, id: Uuid) -> Result<()> {
    state.records.delete_service_order(id, identity.user_id).await?;
    tracing::info!("🗑️ Service order {} deleted by user {}", id, identity.user_id);
    Ok(())
}

use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::user::Identity,
    state::AppState,
};

/// Deletes a user, their records and their sessions, then their uploaded
/// files. Staff cannot delete their own account this way.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `admin` - The staff member performing the deletion.
/// * `user_id` - The ID of the user to delete.
pub async fn delete_user(state: &AppState, admin: &Identity, user_id: Uuid) -> Result<()> {
    if admin.user_id == user_id {
        return Err(AppError::Validation(
            "Staff cannot delete their own account".to_string(),
        ));
    }

    let attachments = state.credentials.delete_user(user_id).await?;
    tracing::info!("🗑️ User {} deleted by {}", user_id, admin.user_id);

    if let Err(e) = state.sessions.end_all_for_user(user_id).await {
        tracing::error!("❌ Failed to revoke sessions of deleted user {}: {}", user_id, e);
    }

    for stored_name in attachments {
        if let Err(e) = state.attachments.remove(&stored_name).await {
            tracing::warn!("⚠️ Failed to remove attachment {}: {}", stored_name, e);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        models::user::Role,
        services::records::{self, UploadedFile},
        validation::records::JobCardForm,
    };
    use axum::body::Bytes;

    #[tokio::test]
    async fn deleting_a_user_removes_records_files_and_sessions() {
        let state = AppState::in_memory(&Config::for_tests()).await.unwrap();
        let admin = state
            .authenticator
            .register("staff@example.com", "pw123", Role::Staff)
            .await
            .unwrap();
        let client = state
            .authenticator
            .register("client@example.com", "pw123", Role::Client)
            .await
            .unwrap();

        let form = JobCardForm {
            equipment_name: Some("Humalyzer".to_string()),
            maintenance_type: Some("repair".to_string()),
            service_date: Some("2024-02-01".to_string()),
            spare_parts_used: None,
        };
        let upload = UploadedFile {
            filename: "photo.txt".to_string(),
            bytes: Bytes::from_static(b"before and after"),
        };
        let card = records::create_job_card(&state, &client, form, Some(upload))
            .await
            .unwrap();
        let stored_name = card.attachment.unwrap().stored_name;
        let issued = state.sessions.start(client.clone()).await.unwrap();

        delete_user(&state, &admin, client.user_id).await.unwrap();

        assert!(state.credentials.find_by_id(client.user_id).await.unwrap().is_none());
        assert!(records::list_job_cards(&state, &client).await.unwrap().is_empty());
        assert!(!state.attachments.root().join(stored_name).exists());
        assert_eq!(
            state.sessions.current_identity(Some(&issued.session_token)).await,
            None
        );

        assert!(matches!(
            delete_user(&state, &admin, client.user_id).await,
            Err(AppError::NotFound)
        ));
    }

    #[tokio::test]
    async fn staff_cannot_delete_themselves() {
        let state = AppState::in_memory(&Config::for_tests()).await.unwrap();
        let admin = state
            .authenticator
            .register("staff@example.com", "pw123", Role::Staff)
            .await
            .unwrap();
        assert!(matches!(
            delete_user(&state, &admin, admin.user_id).await,
            Err(AppError::Validation(_))
        ));
    }
}

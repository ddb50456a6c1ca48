use async_trait::async_trait;
use chrono::Utc;
use tokio_postgres::{Row, error::SqlState};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::user::{Role, User},
    repositories::PgStore,
};

/// Durable home of user identities.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Inserts a user. Fails with [`AppError::DuplicateEmail`] if the email is taken.
    async fn create_user(&self, email: &str, password_hash: &str, role: Role) -> Result<User>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>>;

    /// Removes the user together with every job card and service order they own.
    /// Returns the stored names of the attachments that went with them.
    async fn delete_user(&self, user_id: Uuid) -> Result<Vec<String>>;
}

/// A helper function to map a `tokio_postgres::Row` to a `User`.
fn row_to_user(row: &Row) -> Result<User> {
    let role: String = row
        .try_get("role")
        .map_err(|_| AppError::MissingData("role".to_string()))?;

    Ok(User {
        id: row.try_get("id").map_err(|_| AppError::MissingData("id".to_string()))?,
        email: row.try_get("email").map_err(|_| AppError::MissingData("email".to_string()))?,
        password_hash: row
            .try_get("password_hash")
            .map_err(|_| AppError::MissingData("password_hash".to_string()))?,
        role: role.parse::<Role>().map_err(AppError::MissingData)?,
        created_at: row
            .try_get("created_at")
            .map_err(|_| AppError::MissingData("created_at".to_string()))?,
    })
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn create_user(&self, email: &str, password_hash: &str, role: Role) -> Result<User> {
        let client = self.pool.get().await?;
        let statement = client
            .prepare_cached(
                r#"
                INSERT INTO users (id, email, password_hash, role, created_at)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, email, password_hash, role, created_at
                "#,
            )
            .await?;

        let row = client
            .query_one(
                &statement,
                &[&Uuid::new_v4(), &email, &password_hash, &role.as_str(), &Utc::now()],
            )
            .await
            .map_err(|e| {
                if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
                    AppError::DuplicateEmail
                } else {
                    AppError::from(e)
                }
            })?;

        row_to_user(&row)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let client = self.pool.get().await?;
        let statement = client
            .prepare_cached(
                r#"
                SELECT id, email, password_hash, role, created_at
                FROM users
                WHERE email = $1
                "#,
            )
            .await?;
        let row = client.query_opt(&statement, &[&email]).await?;
        row.map(|r| row_to_user(&r)).transpose()
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>> {
        let client = self.pool.get().await?;
        let statement = client
            .prepare_cached(
                r#"
                SELECT id, email, password_hash, role, created_at
                FROM users
                WHERE id = $1
                "#,
            )
            .await?;
        let row = client.query_opt(&statement, &[&user_id]).await?;
        row.map(|r| row_to_user(&r)).transpose()
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<Vec<String>> {
        let mut client = self.pool.get().await?;
        let transaction = client.transaction().await?;

        // Holding the user row blocks inserts that reference it until commit.
        transaction
            .query_opt("SELECT id FROM users WHERE id = $1 FOR UPDATE", &[&user_id])
            .await?
            .ok_or(AppError::NotFound)?;

        let rows = transaction
            .query(
                "DELETE FROM job_cards WHERE owner_id = $1 RETURNING attachment_ref",
                &[&user_id],
            )
            .await?;
        let mut attachments = Vec::new();
        for row in &rows {
            if let Some(stored_name) = row.try_get::<_, Option<String>>("attachment_ref")? {
                attachments.push(stored_name);
            }
        }

        // Service orders go with the user through ON DELETE CASCADE.
        transaction
            .execute("DELETE FROM users WHERE id = $1", &[&user_id])
            .await?;
        transaction.commit().await?;

        Ok(attachments)
    }
}

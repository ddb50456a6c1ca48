use async_trait::async_trait;
use chrono::Utc;
use tokio_postgres::error::SqlState;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{
        job_card::{JobCard, NewJobCard},
        service_order::{NewServiceOrder, ServiceOrder},
    },
    repositories::PgStore,
};

/// Owner-tagged maintenance records.
///
/// Listing and deleting always take the caller's user id; nothing here
/// returns another user's rows except the unscoped `find_*` lookups, whose
/// callers must check ownership.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fails with [`AppError::NotFound`] if the owner no longer exists.
    async fn insert_job_card(&self, card: NewJobCard) -> Result<JobCard>;

    /// Oldest first.
    async fn job_cards_by_owner(&self, owner_id: Uuid) -> Result<Vec<JobCard>>;

    async fn find_job_card(&self, id: Uuid) -> Result<Option<JobCard>>;

    /// Deletes and returns the card. [`AppError::NotFound`] if it does not
    /// exist, [`AppError::Forbidden`] if `requester` does not own it.
    async fn delete_job_card(&self, id: Uuid, requester: Uuid) -> Result<JobCard>;

    /// Fails with [`AppError::NotFound`] if the owner no longer exists.
    async fn insert_service_order(&self, order: NewServiceOrder) -> Result<ServiceOrder>;

    /// Oldest first.
    async fn service_orders_by_owner(&self, owner_id: Uuid) -> Result<Vec<ServiceOrder>>;

    async fn find_service_order(&self, id: Uuid) -> Result<Option<ServiceOrder>>;

    /// Same contract as [`RecordStore::delete_job_card`].
    async fn delete_service_order(&self, id: Uuid, requester: Uuid) -> Result<ServiceOrder>;
}

const JOB_CARD_COLUMNS: &str = "id, owner_id, equipment_name, maintenance_type, service_date, \
    spare_parts_used, attachment_ref, attachment_filename, attachment_mime, attachment_size, \
    attachment_checksum, created_at";

const SERVICE_ORDER_COLUMNS: &str = "id, owner_id, engineer_name, site, equipment_name, \
    mission_purpose, spare_parts, arrival_date, return_date, mission_fee_cents, \
    transport_fee_cents, total_cost_cents, created_at";

fn owner_missing(e: tokio_postgres::Error) -> AppError {
    if e.code() == Some(&SqlState::FOREIGN_KEY_VIOLATION) {
        AppError::NotFound
    } else {
        AppError::from(e)
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn insert_job_card(&self, card: NewJobCard) -> Result<JobCard> {
        let card = card.into_job_card(Uuid::new_v4(), Utc::now());
        let attachment = card.attachment.as_ref();

        let client = self.pool.get().await?;
        let statement = client
            .prepare_cached(
                r#"
                INSERT INTO job_cards (
                    id, owner_id, equipment_name, maintenance_type, service_date,
                    spare_parts_used, attachment_ref, attachment_filename, attachment_mime,
                    attachment_size, attachment_checksum, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
            )
            .await?;

        client
            .execute(
                &statement,
                &[
                    &card.id,
                    &card.owner_id,
                    &card.equipment_name,
                    &card.maintenance_type,
                    &card.service_date,
                    &card.spare_parts_used,
                    &attachment.map(|a| a.stored_name.as_str()),
                    &attachment.map(|a| a.original_filename.as_str()),
                    &attachment.and_then(|a| a.mime_type.as_deref()),
                    &attachment.map(|a| a.size_bytes),
                    &attachment.map(|a| a.checksum.as_str()),
                    &card.created_at,
                ],
            )
            .await
            .map_err(owner_missing)?;

        tracing::debug!("Job card {} stored for user {}", card.id, card.owner_id);
        Ok(card)
    }

    async fn job_cards_by_owner(&self, owner_id: Uuid) -> Result<Vec<JobCard>> {
        let client = self.pool.get().await?;
        let statement = client
            .prepare_cached(&format!(
                "SELECT {} FROM job_cards WHERE owner_id = $1 ORDER BY created_at ASC, id ASC",
                JOB_CARD_COLUMNS
            ))
            .await?;

        let rows = client.query(&statement, &[&owner_id]).await?;
        rows.iter()
            .map(|row| JobCard::try_from(row).map_err(AppError::from))
            .collect()
    }

    async fn find_job_card(&self, id: Uuid) -> Result<Option<JobCard>> {
        let client = self.pool.get().await?;
        let statement = client
            .prepare_cached(&format!("SELECT {} FROM job_cards WHERE id = $1", JOB_CARD_COLUMNS))
            .await?;

        let row = client.query_opt(&statement, &[&id]).await?;
        row.map(|r| JobCard::try_from(&r).map_err(AppError::from))
            .transpose()
    }

    async fn delete_job_card(&self, id: Uuid, requester: Uuid) -> Result<JobCard> {
        let mut client = self.pool.get().await?;
        let transaction = client.transaction().await?;

        let sql = format!("SELECT {} FROM job_cards WHERE id = $1 FOR UPDATE", JOB_CARD_COLUMNS);
        let row = transaction
            .query_opt(sql.as_str(), &[&id])
            .await?
            .ok_or(AppError::NotFound)?;
        let card = JobCard::try_from(&row)?;

        if card.owner_id != requester {
            return Err(AppError::Forbidden);
        }

        transaction
            .execute("DELETE FROM job_cards WHERE id = $1", &[&id])
            .await?;
        transaction.commit().await?;

        Ok(card)
    }

    async fn insert_service_order(&self, order: NewServiceOrder) -> Result<ServiceOrder> {
        let order = order.into_service_order(Uuid::new_v4(), Utc::now());

        let client = self.pool.get().await?;
        let statement = client
            .prepare_cached(
                r#"
                INSERT INTO service_orders (
                    id, owner_id, engineer_name, site, equipment_name, mission_purpose,
                    spare_parts, arrival_date, return_date, mission_fee_cents,
                    transport_fee_cents, total_cost_cents, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                "#,
            )
            .await?;

        client
            .execute(
                &statement,
                &[
                    &order.id,
                    &order.owner_id,
                    &order.engineer_name,
                    &order.site,
                    &order.equipment_name,
                    &order.mission_purpose,
                    &order.spare_parts,
                    &order.arrival_date,
                    &order.return_date,
                    &order.mission_fee_cents,
                    &order.transport_fee_cents,
                    &order.total_cost_cents,
                    &order.created_at,
                ],
            )
            .await
            .map_err(owner_missing)?;

        tracing::debug!("Service order {} stored for user {}", order.id, order.owner_id);
        Ok(order)
    }

    async fn service_orders_by_owner(&self, owner_id: Uuid) -> Result<Vec<ServiceOrder>> {
        let client = self.pool.get().await?;
        let statement = client
            .prepare_cached(&format!(
                "SELECT {} FROM service_orders WHERE owner_id = $1 ORDER BY created_at ASC, id ASC",
                SERVICE_ORDER_COLUMNS
            ))
            .await?;

        let rows = client.query(&statement, &[&owner_id]).await?;
        rows.iter()
            .map(|row| ServiceOrder::try_from(row).map_err(AppError::from))
            .collect()
    }

    async fn find_service_order(&self, id: Uuid) -> Result<Option<ServiceOrder>> {
        let client = self.pool.get().await?;
        let statement = client
            .prepare_cached(&format!(
                "SELECT {} FROM service_orders WHERE id = $1",
                SERVICE_ORDER_COLUMNS
            ))
            .await?;

        let row = client.query_opt(&statement, &[&id]).await?;
        row.map(|r| ServiceOrder::try_from(&r).map_err(AppError::from))
            .transpose()
    }

    async fn delete_service_order(&self, id: Uuid, requester: Uuid) -> Result<ServiceOrder> {
        let mut client = self.pool.get().await?;
        let transaction = client.transaction().await?;

        let sql = format!(
            "SELECT {} FROM service_orders WHERE id = $1 FOR UPDATE",
            SERVICE_ORDER_COLUMNS
        );
        let row = transaction
            .query_opt(sql.as_str(), &[&id])
            .await?
            .ok_or(AppError::NotFound)?;
        let order = ServiceOrder::try_from(&row)?;

        if order.owner_id != requester {
            return Err(AppError::Forbidden);
        }

        transaction
            .execute("DELETE FROM service_orders WHERE id = $1", &[&id])
            .await?;
        transaction.commit().await?;

        Ok(order)
    }
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;
use uuid::Uuid;

/// A file stored alongside a job card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    /// Opaque name inside the upload directory.
    pub stored_name: String,
    pub original_filename: String,
    pub mime_type: Option<String>,
    pub size_bytes: i64,
    /// BLAKE3, hex encoded.
    pub checksum: String,
}

/// A maintenance record for one piece of equipment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobCard {
    pub id: Uuid,
    /// The ID of the user who owns the job card.
    pub owner_id: Uuid,
    pub equipment_name: String,
    pub maintenance_type: String,
    pub service_date: NaiveDate,
    pub spare_parts_used: Option<String>,
    pub attachment: Option<AttachmentRef>,
    pub created_at: DateTime<Utc>,
}

/// A validated job card that has not been stored yet.
#[derive(Debug, Clone)]
pub struct NewJobCard {
    pub owner_id: Uuid,
    pub equipment_name: String,
    pub maintenance_type: String,
    pub service_date: NaiveDate,
    pub spare_parts_used: Option<String>,
    pub attachment: Option<AttachmentRef>,
}

impl NewJobCard {
    pub fn into_job_card(self, id: Uuid, created_at: DateTime<Utc>) -> JobCard {
        JobCard {
            id,
            owner_id: self.owner_id,
            equipment_name: self.equipment_name,
            maintenance_type: self.maintenance_type,
            service_date: self.service_date,
            spare_parts_used: self.spare_parts_used,
            attachment: self.attachment,
            created_at,
        }
    }
}

impl TryFrom<&Row> for JobCard {
    type Error = tokio_postgres::Error;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        let stored_name: Option<String> = row.try_get("attachment_ref")?;
        let attachment = match stored_name {
            Some(stored_name) => Some(AttachmentRef {
                stored_name,
                original_filename: row.try_get("attachment_filename")?,
                mime_type: row.try_get("attachment_mime")?,
                size_bytes: row.try_get("attachment_size")?,
                checksum: row.try_get("attachment_checksum")?,
            }),
            None => None,
        };

        Ok(Self {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            equipment_name: row.try_get("equipment_name")?,
            maintenance_type: row.try_get("maintenance_type")?,
            service_date: row.try_get("service_date")?,
            spare_parts_used: row.try_get("spare_parts_used")?,
            attachment,
            created_at: row.try_get("created_at")?,
        })
    }
}

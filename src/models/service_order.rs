use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;
use uuid::Uuid;

/// A field visit by an engineer. Amounts are in minor currency units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceOrder {
    pub id: Uuid,
    /// The ID of the user who owns the service order.
    pub owner_id: Uuid,
    pub engineer_name: String,
    /// Site or hospital visited.
    pub site: String,
    pub equipment_name: Option<String>,
    pub mission_purpose: Option<String>,
    pub spare_parts: Option<String>,
    pub arrival_date: NaiveDate,
    pub return_date: NaiveDate,
    pub mission_fee_cents: i64,
    pub transport_fee_cents: i64,
    /// Always `mission_fee_cents + transport_fee_cents`.
    pub total_cost_cents: i64,
    pub created_at: DateTime<Utc>,
}

/// A validated service order that has not been stored yet.
///
/// There is no total field: the total is derived when the order is built.
#[derive(Debug, Clone)]
pub struct NewServiceOrder {
    pub owner_id: Uuid,
    pub engineer_name: String,
    pub site: String,
    pub equipment_name: Option<String>,
    pub mission_purpose: Option<String>,
    pub spare_parts: Option<String>,
    pub arrival_date: NaiveDate,
    pub return_date: NaiveDate,
    pub mission_fee_cents: i64,
    pub transport_fee_cents: i64,
}

impl NewServiceOrder {
    pub fn total_cost_cents(&self) -> i64 {
        self.mission_fee_cents + self.transport_fee_cents
    }

    pub fn into_service_order(self, id: Uuid, created_at: DateTime<Utc>) -> ServiceOrder {
        let total_cost_cents = self.total_cost_cents();
        ServiceOrder {
            id,
            owner_id: self.owner_id,
            engineer_name: self.engineer_name,
            site: self.site,
            equipment_name: self.equipment_name,
            mission_purpose: self.mission_purpose,
            spare_parts: self.spare_parts,
            arrival_date: self.arrival_date,
            return_date: self.return_date,
            mission_fee_cents: self.mission_fee_cents,
            transport_fee_cents: self.transport_fee_cents,
            total_cost_cents,
            created_at,
        }
    }
}

impl TryFrom<&Row> for ServiceOrder {
    type Error = tokio_postgres::Error;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            engineer_name: row.try_get("engineer_name")?,
            site: row.try_get("site")?,
            equipment_name: row.try_get("equipment_name")?,
            mission_purpose: row.try_get("mission_purpose")?,
            spare_parts: row.try_get("spare_parts")?,
            arrival_date: row.try_get("arrival_date")?,
            return_date: row.try_get("return_date")?,
            mission_fee_cents: row.try_get("mission_fee_cents")?,
            transport_fee_cents: row.try_get("transport_fee_cents")?,
            total_cost_cents: row.try_get("total_cost_cents")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

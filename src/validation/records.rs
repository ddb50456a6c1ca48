use chrono::NaiveDate;
use garde::Validate;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{job_card::NewJobCard, service_order::NewServiceOrder},
};

/// Largest fee accepted, in major units.
const MAX_FEE: f64 = 1_000_000_000.0;

fn required(value: Option<String>, field: &str) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{} is required", field)))
}

fn optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn required_date(value: Option<String>, field: &str) -> Result<NaiveDate> {
    let raw = required(value, field)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| {
        AppError::Validation(format!("{} must be a calendar date (YYYY-MM-DD)", field))
    })
}

fn fee_cents(value: Option<f64>, field: &str) -> Result<i64> {
    let fee = value.unwrap_or(0.0);
    if !fee.is_finite() || fee < 0.0 || fee > MAX_FEE {
        return Err(AppError::Validation(format!(
            "{} must be a non-negative amount",
            field
        )));
    }
    Ok((fee * 100.0).round() as i64)
}

/// Text fields of the job-card form.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct JobCardForm {
    #[garde(length(max = 200))]
    pub equipment_name: Option<String>,
    #[garde(length(max = 100))]
    pub maintenance_type: Option<String>,
    #[garde(skip)]
    pub service_date: Option<String>,
    #[garde(length(max = 4000))]
    pub spare_parts_used: Option<String>,
}

impl JobCardForm {
    /// Checks the form and binds it to its owner. The attachment is added
    /// later, once stored.
    pub fn into_new_job_card(self, owner_id: Uuid) -> Result<NewJobCard> {
        self.validate()?;

        Ok(NewJobCard {
            owner_id,
            equipment_name: required(self.equipment_name, "equipment_name")?,
            maintenance_type: required(self.maintenance_type, "maintenance_type")?,
            service_date: required_date(self.service_date, "service_date")?,
            spare_parts_used: optional(self.spare_parts_used),
            attachment: None,
        })
    }
}

/// The request payload for a service order.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ServiceOrderForm {
    #[garde(length(max = 200))]
    pub engineer_name: Option<String>,
    #[garde(length(max = 200))]
    pub site: Option<String>,
    #[garde(length(max = 200))]
    pub equipment_name: Option<String>,
    #[garde(length(max = 4000))]
    pub mission_purpose: Option<String>,
    #[garde(length(max = 4000))]
    pub spare_parts: Option<String>,
    #[garde(skip)]
    pub arrival_date: Option<String>,
    #[garde(skip)]
    pub return_date: Option<String>,
    #[garde(skip)]
    pub mission_fee: Option<f64>,
    #[garde(skip)]
    pub transport_fee: Option<f64>,
    /// Accepted for compatibility and ignored; the total is always recomputed.
    #[garde(skip)]
    pub total_cost: Option<f64>,
}

impl ServiceOrderForm {
    pub fn into_new_service_order(self, owner_id: Uuid) -> Result<NewServiceOrder> {
        self.validate()?;

        let arrival_date = required_date(self.arrival_date, "arrival_date")?;
        let return_date = required_date(self.return_date, "return_date")?;
        if arrival_date > return_date {
            return Err(AppError::Validation(
                "arrival_date must not be after return_date".to_string(),
            ));
        }

        let order = NewServiceOrder {
            owner_id,
            engineer_name: required(self.engineer_name, "engineer_name")?,
            site: required(self.site, "site")?,
            equipment_name: optional(self.equipment_name),
            mission_purpose: optional(self.mission_purpose),
            spare_parts: optional(self.spare_parts),
            arrival_date,
            return_date,
            mission_fee_cents: fee_cents(self.mission_fee, "mission_fee")?,
            transport_fee_cents: fee_cents(self.transport_fee, "transport_fee")?,
        };

        if let Some(submitted) = self.total_cost {
            if (submitted * 100.0).round() as i64 != order.total_cost_cents() {
                tracing::warn!(
                    "Ignoring client-submitted total_cost {} for user {}",
                    submitted,
                    owner_id
                );
            }
        }

        Ok(order)
    }
}

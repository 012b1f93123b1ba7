//! Harvest (yield record) models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// One harvest event on a plot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct YieldRecord {
    pub id: Uuid,
    pub plot_id: Uuid,
    pub harvest_date: NaiveDate,
    /// Dried bark (quills and featherings) in kilograms
    pub yield_amount_kg: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for logging a harvest
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LogHarvestInput {
    pub plot_id: Uuid,
    pub harvest_date: NaiveDate,
    pub yield_amount_kg: Decimal,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Input for correcting a logged harvest
#[derive(Debug, Clone, Deserialize, Validate, Default)]
pub struct CorrectHarvestInput {
    pub harvest_date: Option<NaiveDate>,
    pub yield_amount_kg: Option<Decimal>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

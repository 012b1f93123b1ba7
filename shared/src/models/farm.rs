//! Farm (landholding) models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::types::GpsCoordinates;

/// A landholding made up of plots
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Farm {
    pub id: Uuid,
    pub name: String,
    pub location: Option<GpsCoordinates>,
    /// Total landholding in hectares
    pub total_area_hectares: Option<Decimal>,
    #[serde(flatten)]
    pub aggregates: FarmAggregates,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Farm {
    pub fn new(name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            location: None,
            total_area_hectares: None,
            aggregates: FarmAggregates::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Fields recomputed from the farm's plots
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct FarmAggregates {
    pub active_plots_count: u32,
    pub total_yield_kg: Decimal,
    pub last_activity_date: Option<NaiveDate>,
}

/// Input for creating a farm
#[derive(Debug, Clone, Deserialize, Validate, Default)]
pub struct CreateFarmInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub location: Option<GpsCoordinates>,
    pub total_area_hectares: Option<Decimal>,
}

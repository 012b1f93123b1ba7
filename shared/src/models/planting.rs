//! Planting record models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::Variety;

/// One planting event on a plot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlantingRecord {
    pub id: Uuid,
    pub plot_id: Uuid,
    pub planted_date: NaiveDate,
    pub seedling_count: u32,
    pub variety: Variety,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for planting a plot
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePlantingInput {
    pub plot_id: Uuid,
    pub planted_date: NaiveDate,
    #[validate(range(min = 1))]
    pub seedling_count: u32,
    pub variety: Variety,
}

/// Input for correcting a planting record
#[derive(Debug, Clone, Deserialize, Validate, Default)]
pub struct UpdatePlantingInput {
    pub planted_date: Option<NaiveDate>,
    #[validate(range(min = 1))]
    pub seedling_count: Option<u32>,
    pub variety: Option<Variety>,
}

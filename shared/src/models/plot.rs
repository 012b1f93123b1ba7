//! Farm plot models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A cultivated subdivision of a farm
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plot {
    pub id: Uuid,
    pub farm_id: Uuid,
    pub name: String,
    /// Area in hectares
    pub area_hectares: Option<Decimal>,
    pub variety: Option<Variety>,
    /// Number of trees the grower says are on the plot (a census, not a sample)
    pub declared_tree_count: Option<u32>,
    pub annual_rainfall_mm: Option<f64>,
    pub mean_temperature_celsius: Option<f64>,
    #[serde(flatten)]
    pub lifecycle: PlotLifecycle,
    #[serde(flatten)]
    pub aggregates: PlotAggregates,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Plot {
    pub fn new(farm_id: Uuid, name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            farm_id,
            name: name.into(),
            area_hectares: None,
            variety: None,
            declared_tree_count: None,
            annual_rainfall_mm: None,
            mean_temperature_celsius: None,
            lifecycle: PlotLifecycle::default(),
            aggregates: PlotAggregates::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Most recent dated activity on the plot (planting or harvest)
    pub fn last_activity_date(&self) -> Option<NaiveDate> {
        self.aggregates
            .last_planting_date
            .max(self.aggregates.last_yield_date)
    }
}

/// Lifecycle fields derived from the plot's planting record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PlotLifecycle {
    pub status: PlotStatus,
    /// 0-100
    pub progress_percentage: u8,
    pub age_months: Option<u32>,
}

/// Counts, sums and last-dates recomputed from the plot's children
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PlotAggregates {
    pub planting_count: u32,
    pub yield_count: u32,
    pub tree_count: u32,
    pub total_yield_kg: Decimal,
    pub average_yield_kg: Option<Decimal>,
    pub best_yield_kg: Option<Decimal>,
    pub last_planting_date: Option<NaiveDate>,
    pub last_yield_date: Option<NaiveDate>,
}

/// Plot lifecycle status.
///
/// The declaration order is the hierarchy: a plot only ever moves forward.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum PlotStatus {
    #[default]
    Preparing,
    Planted,
    Growing,
    Mature,
    Harvesting,
}

impl PlotStatus {
    /// Position in the lifecycle hierarchy
    pub fn rank(self) -> u8 {
        match self {
            PlotStatus::Preparing => 0,
            PlotStatus::Planted => 1,
            PlotStatus::Growing => 2,
            PlotStatus::Mature => 3,
            PlotStatus::Harvesting => 4,
        }
    }

    /// Whether the plot counts towards a farm's active plots
    pub fn is_active(self) -> bool {
        matches!(
            self,
            PlotStatus::Growing | PlotStatus::Mature | PlotStatus::Harvesting
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlotStatus::Preparing => "preparing",
            PlotStatus::Planted => "planted",
            PlotStatus::Growing => "growing",
            PlotStatus::Mature => "mature",
            PlotStatus::Harvesting => "harvesting",
        }
    }
}

impl std::fmt::Display for PlotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when a status string is not one of the known statuses
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown plot status: {0}")]
pub struct ParseStatusError(pub String);

impl std::str::FromStr for PlotStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "preparing" => Ok(PlotStatus::Preparing),
            "planted" => Ok(PlotStatus::Planted),
            "growing" => Ok(PlotStatus::Growing),
            "mature" => Ok(PlotStatus::Mature),
            "harvesting" => Ok(PlotStatus::Harvesting),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// Cinnamon varieties and selections grown on the plantations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Variety {
    /// Traditional Ceylon cinnamon (Cinnamomum verum)
    Ceylon,
    SriGemunu,
    SriWijaya,
    Cassia,
    /// Custom variety with name
    Custom(String),
}

impl std::fmt::Display for Variety {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Variety::Ceylon => write!(f, "Ceylon"),
            Variety::SriGemunu => write!(f, "Sri Gemunu"),
            Variety::SriWijaya => write!(f, "Sri Wijaya"),
            Variety::Cassia => write!(f, "Cassia"),
            Variety::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// Input for creating a plot
#[derive(Debug, Clone, Deserialize, Validate, Default)]
pub struct CreatePlotInput {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub area_hectares: Option<Decimal>,
    pub variety: Option<Variety>,
    #[validate(range(min = 1))]
    pub declared_tree_count: Option<u32>,
    #[validate(range(min = 0.0, max = 10000.0))]
    pub annual_rainfall_mm: Option<f64>,
    pub mean_temperature_celsius: Option<f64>,
}

/// Input for updating a plot's user-set characteristics
#[derive(Debug, Clone, Deserialize, Validate, Default)]
pub struct UpdatePlotInput {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    pub area_hectares: Option<Decimal>,
    pub variety: Option<Variety>,
    #[validate(range(min = 1))]
    pub declared_tree_count: Option<u32>,
    #[validate(range(min = 0.0, max = 10000.0))]
    pub annual_rainfall_mm: Option<f64>,
    pub mean_temperature_celsius: Option<f64>,
}

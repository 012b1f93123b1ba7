//! Sampled tree models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A sampled cinnamon bush within a plot.
///
/// Trees are a measurement sample, not a census of the plot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tree {
    pub id: Uuid,
    pub plot_id: Uuid,
    /// Field tag painted on the bush
    pub tag: String,
    pub stem_diameter_mm: Option<f64>,
    pub stem_count: Option<u32>,
    pub age_years: Option<f64>,
    pub fertilizer_applied: Option<bool>,
    pub disease_severity: Option<DiseaseSeverity>,
    /// Reconciled per-tree estimate written by the hybrid yield engine
    pub yield_estimate_kg: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tree {
    /// Number of optional measurements that were actually recorded
    pub fn recorded_measurements(&self) -> usize {
        [
            self.stem_diameter_mm.is_some(),
            self.stem_count.is_some(),
            self.age_years.is_some(),
            self.fertilizer_applied.is_some(),
            self.disease_severity.is_some(),
        ]
        .into_iter()
        .filter(|recorded| *recorded)
        .count()
    }
}

/// Observed disease pressure (leaf spot, stripe canker, ...)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DiseaseSeverity {
    #[default]
    None,
    Mild,
    Severe,
}

impl std::fmt::Display for DiseaseSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiseaseSeverity::None => write!(f, "none"),
            DiseaseSeverity::Mild => write!(f, "mild"),
            DiseaseSeverity::Severe => write!(f, "severe"),
        }
    }
}

/// Input for registering a sampled tree
#[derive(Debug, Clone, Deserialize, Validate, Default)]
pub struct RegisterTreeInput {
    pub plot_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub tag: String,
    #[validate(range(min = 0.0, max = 500.0))]
    pub stem_diameter_mm: Option<f64>,
    #[validate(range(min = 1, max = 100))]
    pub stem_count: Option<u32>,
    #[validate(range(min = 0.0, max = 100.0))]
    pub age_years: Option<f64>,
    pub fertilizer_applied: Option<bool>,
    pub disease_severity: Option<DiseaseSeverity>,
}

/// Input for updating a sampled tree's measurements
#[derive(Debug, Clone, Deserialize, Validate, Default)]
pub struct UpdateTreeInput {
    /// Move the tree to another plot of the same farm
    pub plot_id: Option<Uuid>,
    #[validate(length(min = 1, max = 64))]
    pub tag: Option<String>,
    #[validate(range(min = 0.0, max = 500.0))]
    pub stem_diameter_mm: Option<f64>,
    #[validate(range(min = 1, max = 100))]
    pub stem_count: Option<u32>,
    #[validate(range(min = 0.0, max = 100.0))]
    pub age_years: Option<f64>,
    pub fertilizer_applied: Option<bool>,
    pub disease_severity: Option<DiseaseSeverity>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorded_measurements() {
        let now = Utc::now();
        let mut tree = Tree {
            id: Uuid::new_v4(),
            plot_id: Uuid::new_v4(),
            tag: "A-01".to_string(),
            stem_diameter_mm: None,
            stem_count: None,
            age_years: None,
            fertilizer_applied: None,
            disease_severity: None,
            yield_estimate_kg: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(tree.recorded_measurements(), 0);

        tree.stem_diameter_mm = Some(42.0);
        tree.fertilizer_applied = Some(false);
        assert_eq!(tree.recorded_measurements(), 2);
    }
}

//! Hybrid yield prediction models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tolerance used when checking that blending weights sum to one
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// One reconciled yield prediction for a plot at a point in time.
///
/// Results are append-only: a newer prediction supersedes an older one, it
/// never modifies it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HybridYieldResult {
    pub id: Uuid,
    pub plot_id: Uuid,
    /// Sum of the raw per-tree estimates of the sampled trees
    pub sampled_tree_total_kg: f64,
    /// Sampled total extrapolated to the declared tree population
    pub tree_level_estimate_kg: f64,
    pub farm_level_estimate_kg: f64,
    pub hybrid_estimate_kg: f64,
    pub tree_model_confidence: f64,
    pub farm_model_confidence: f64,
    pub overall_confidence: f64,
    pub blending_weight_tree: f64,
    pub blending_weight_farm: f64,
    pub sampled_tree_count: u32,
    pub declared_total_trees: u32,
    /// Environmental values actually used by the farm-level model
    pub environment: EnvironmentalFactors,
    pub farm_factors: FarmFactorBreakdown,
    pub tree_contributions: Vec<TreeContribution>,
    pub calculated_at: DateTime<Utc>,
}

impl HybridYieldResult {
    /// Whether the result is still within the freshness window at `now`
    pub fn is_fresh(&self, now: DateTime<Utc>, staleness: chrono::Duration) -> bool {
        now.signed_duration_since(self.calculated_at) < staleness
    }
}

/// Caller-supplied environmental overrides
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct EnvironmentalFactors {
    pub rainfall_mm: Option<f64>,
    pub temperature_celsius: Option<f64>,
}

/// Multiplicative factors applied by the farm-level model
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FarmFactorBreakdown {
    pub area_hectares: f64,
    pub variety: f64,
    pub density: f64,
    pub rainfall: f64,
    pub temperature: f64,
    pub age: f64,
}

/// One sampled tree's share of the prediction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TreeContribution {
    pub tree_id: Uuid,
    pub raw_estimate_kg: f64,
    pub reconciled_estimate_kg: f64,
    /// Fraction of optional measurements recorded for the tree (0-1)
    pub completeness: f64,
}

/// Bounds applied when deriving blending weights
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BlendingPolicy {
    pub min_tree_weight: f64,
    pub max_tree_weight: f64,
    /// Upper bound of the sample-representativeness bonus
    pub representativeness_cap: f64,
}

impl Default for BlendingPolicy {
    fn default() -> Self {
        Self {
            min_tree_weight: 0.2,
            max_tree_weight: 0.8,
            representativeness_cap: 0.3,
        }
    }
}

/// Weights given to the tree-level and farm-level estimates
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BlendingWeights {
    pub tree: f64,
    pub farm: f64,
}

impl BlendingWeights {
    /// Derive weights from per-source confidence and sample representativeness.
    ///
    /// The tree weight starts at the confidence ratio, gains up to
    /// `representativeness_cap` for the sampled fraction of the declared
    /// population, and is clamped so neither source dominates completely.
    pub fn derive(
        tree_confidence: f64,
        farm_confidence: f64,
        sampled_trees: u32,
        declared_total_trees: u32,
        policy: &BlendingPolicy,
    ) -> Self {
        let confidence_sum = tree_confidence + farm_confidence;
        let ratio = if confidence_sum > 0.0 {
            tree_confidence / confidence_sum
        } else {
            0.5
        };

        let representativeness = if declared_total_trees > 0 {
            (f64::from(sampled_trees) / f64::from(declared_total_trees))
                .min(policy.representativeness_cap)
        } else {
            0.0
        };

        let tree = (ratio + representativeness)
            .clamp(policy.min_tree_weight, policy.max_tree_weight);

        Self {
            tree,
            farm: 1.0 - tree,
        }
    }

    /// Whether the weights sum to one within tolerance
    pub fn is_normalized(&self) -> bool {
        (self.tree + self.farm - 1.0).abs() <= WEIGHT_SUM_TOLERANCE
    }

    /// Weighted combination of a tree-level and a farm-level value
    pub fn blend(&self, tree_value: f64, farm_value: f64) -> f64 {
        tree_value * self.tree + farm_value * self.farm
    }
}

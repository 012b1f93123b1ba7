//! Yield scoring models
//!
//! The hybrid yield service only talks to these traits. The heuristic
//! implementations are parameterised by configuration; a fitted model can be
//! plugged in through the engine builder instead.

pub mod farm_model;
pub mod tree_model;

pub use farm_model::HeuristicFarmScorer;
pub use tree_model::HeuristicTreeScorer;

use shared::{FarmFactorBreakdown, Tree, Variety};

/// Per-tree yield estimate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeScore {
    pub estimate_kg: f64,
    /// Fraction of optional measurements that were recorded (0-1)
    pub completeness: f64,
}

/// Scores one sampled tree
pub trait TreeYieldScorer: Send + Sync {
    fn score(&self, tree: &Tree) -> TreeScore;
}

/// How the plot's age is known
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AgeEvidence {
    /// From the plot's planting record
    Recorded(f64),
    /// Averaged from the sampled trees' recorded ages
    Inferred(f64),
    Unknown,
}

/// Plot characteristics fed to the farm-level model
#[derive(Debug, Clone, PartialEq)]
pub struct FarmScoringInput {
    pub area_hectares: Option<f64>,
    pub variety: Option<Variety>,
    pub tree_count: Option<u32>,
    pub age: AgeEvidence,
    pub rainfall_mm: Option<f64>,
    pub temperature_celsius: Option<f64>,
}

/// Plot-level yield estimate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FarmScore {
    pub estimate_kg: f64,
    pub confidence: f64,
    pub factors: FarmFactorBreakdown,
}

/// Scores a whole plot from its characteristics
pub trait FarmYieldScorer: Send + Sync {
    fn score(&self, input: &FarmScoringInput) -> FarmScore;
}

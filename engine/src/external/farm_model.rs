//! Heuristic per-hectare yield model

use shared::{FarmFactorBreakdown, Variety};

use super::{AgeEvidence, FarmScore, FarmScoringInput, FarmYieldScorer};
use crate::config::FarmModelConfig;

// Density penalties around the optimal trees per hectare
const UNDER_PLANTED_FLOOR: f64 = 0.4;
const OVER_PLANTED_SLOPE: f64 = 0.25;
const OVER_PLANTED_FLOOR: f64 = 0.6;

// Penalty per mm of rainfall outside the optimal band
const RAINFALL_SLOPE: f64 = 0.0005;
const RAINFALL_FLOOR: f64 = 0.4;

// Penalty per squared degree outside the optimal band
const TEMPERATURE_CURVATURE: f64 = 0.02;
const TEMPERATURE_FLOOR: f64 = 0.3;

// Bark is first cut around year 3 and reaches full yield by year 4
const FIRST_HARVEST_YEARS: f64 = 3.0;
const FULL_YIELD_YEARS: f64 = 4.0;
const YOUNG_PLOT_FACTOR: f64 = 0.1;

const INDICATORS: f64 = 6.0;

/// Relative yield of a cultivar against Ceylon (true cinnamon)
pub fn variety_factor(variety: Option<&Variety>) -> f64 {
    match variety {
        Some(Variety::Ceylon) | None => 1.0,
        Some(Variety::SriGemunu) => 1.15,
        Some(Variety::SriWijaya) => 1.10,
        Some(Variety::Cassia) => 0.85,
        Some(Variety::Custom(_)) => 0.95,
    }
}

/// Plot-level model: base yield per hectare scaled by six factors
#[derive(Debug, Clone)]
pub struct HeuristicFarmScorer {
    config: FarmModelConfig,
}

impl HeuristicFarmScorer {
    pub fn new(config: FarmModelConfig) -> Self {
        Self { config }
    }

    fn density_factor(&self, tree_count: Option<u32>, area_hectares: f64) -> f64 {
        let Some(tree_count) = tree_count else {
            return 1.0;
        };
        if area_hectares <= 0.0 || self.config.optimal_trees_per_hectare <= 0.0 {
            return 1.0;
        }

        let ratio = f64::from(tree_count) / area_hectares / self.config.optimal_trees_per_hectare;
        if ratio < 1.0 {
            UNDER_PLANTED_FLOOR + (1.0 - UNDER_PLANTED_FLOOR) * ratio
        } else {
            (1.0 - OVER_PLANTED_SLOPE * (ratio - 1.0)).max(OVER_PLANTED_FLOOR)
        }
    }

    fn rainfall_factor(&self, rainfall_mm: Option<f64>) -> f64 {
        let Some(rainfall_mm) = rainfall_mm else {
            return 1.0;
        };
        let distance = distance_outside(
            rainfall_mm,
            self.config.optimal_rainfall_min_mm,
            self.config.optimal_rainfall_max_mm,
        );
        (1.0 - RAINFALL_SLOPE * distance).max(RAINFALL_FLOOR)
    }

    fn temperature_factor(&self, temperature_celsius: Option<f64>) -> f64 {
        let Some(temperature_celsius) = temperature_celsius else {
            return 1.0;
        };
        let distance = distance_outside(
            temperature_celsius,
            self.config.optimal_temperature_min_celsius,
            self.config.optimal_temperature_max_celsius,
        );
        (1.0 - TEMPERATURE_CURVATURE * distance * distance).max(TEMPERATURE_FLOOR)
    }

    fn age_factor(&self, age: AgeEvidence) -> f64 {
        let years = match age {
            AgeEvidence::Recorded(years) | AgeEvidence::Inferred(years) => years.max(0.0),
            AgeEvidence::Unknown => self.config.default_age_years,
        };

        if years < FIRST_HARVEST_YEARS {
            YOUNG_PLOT_FACTOR * years / FIRST_HARVEST_YEARS
        } else if years < FULL_YIELD_YEARS {
            YOUNG_PLOT_FACTOR + (1.0 - YOUNG_PLOT_FACTOR) * (years - FIRST_HARVEST_YEARS)
                / (FULL_YIELD_YEARS - FIRST_HARVEST_YEARS)
        } else {
            1.0
        }
    }

    fn confidence(input: &FarmScoringInput) -> f64 {
        let available = |present: bool| if present { 1.0 } else { 0.0 };
        let age = match input.age {
            AgeEvidence::Recorded(_) => 1.0,
            AgeEvidence::Inferred(_) => 0.5,
            AgeEvidence::Unknown => 0.0,
        };

        (available(input.area_hectares.is_some())
            + available(input.variety.is_some())
            + available(input.tree_count.is_some_and(|count| count > 0))
            + age
            + available(input.rainfall_mm.is_some())
            + available(input.temperature_celsius.is_some()))
            / INDICATORS
    }
}

impl Default for HeuristicFarmScorer {
    fn default() -> Self {
        Self::new(FarmModelConfig::default())
    }
}

impl FarmYieldScorer for HeuristicFarmScorer {
    fn score(&self, input: &FarmScoringInput) -> FarmScore {
        let area_hectares = input
            .area_hectares
            .filter(|area| *area > 0.0)
            .unwrap_or(self.config.default_area_hectares);

        let factors = FarmFactorBreakdown {
            area_hectares,
            variety: variety_factor(input.variety.as_ref()),
            density: self.density_factor(input.tree_count, area_hectares),
            rainfall: self.rainfall_factor(input.rainfall_mm),
            temperature: self.temperature_factor(input.temperature_celsius),
            age: self.age_factor(input.age),
        };

        let estimate_kg = self.config.base_yield_per_hectare_kg
            * factors.area_hectares
            * factors.variety
            * factors.density
            * factors.rainfall
            * factors.temperature
            * factors.age;

        FarmScore {
            estimate_kg,
            confidence: Self::confidence(input),
            factors,
        }
    }
}

fn distance_outside(value: f64, min: f64, max: f64) -> f64 {
    if value < min {
        min - value
    } else if value > max {
        value - max
    } else {
        0.0
    }
}

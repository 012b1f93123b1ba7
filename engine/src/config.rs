//! Configuration management for the Plantation Management engine
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with PYM_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use shared::{validate_blending_policy, BlendingPolicy};

/// Main engine configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Hybrid prediction configuration
    pub prediction: PredictionConfig,

    /// Per-tree scoring model parameters
    pub tree_model: TreeModelConfig,

    /// Per-hectare scoring model parameters
    pub farm_model: FarmModelConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset
    pub filter: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PredictionConfig {
    /// A stored prediction younger than this is returned as-is
    pub staleness_hours: i64,

    pub min_tree_weight: f64,

    pub max_tree_weight: f64,

    /// Upper bound of the sample-representativeness bonus
    pub representativeness_cap: f64,

    /// Sample size at which the tree model's sample-adequacy factor saturates
    pub sample_saturation: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TreeModelConfig {
    /// Dry bark yield of a reference bush in kg per season
    pub base_yield_kg: f64,
    pub reference_diameter_mm: f64,
    pub reference_stem_count: f64,
    pub reference_age_years: f64,
    /// Lower and upper bound of every normalized factor
    pub min_factor: f64,
    pub max_factor: f64,
    pub fertilizer_multiplier: f64,
    pub mild_disease_multiplier: f64,
    pub severe_disease_multiplier: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FarmModelConfig {
    /// Dry bark yield of a mature, well-managed hectare in kg per season
    pub base_yield_per_hectare_kg: f64,
    /// Area assumed when the plot's area is unknown
    pub default_area_hectares: f64,
    pub optimal_trees_per_hectare: f64,
    pub optimal_rainfall_min_mm: f64,
    pub optimal_rainfall_max_mm: f64,
    pub optimal_temperature_min_celsius: f64,
    pub optimal_temperature_max_celsius: f64,
    /// Plot age assumed when neither a planting record nor tree ages exist
    pub default_age_years: f64,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("PYM_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = Self::with_defaults(config::Config::builder())?
            .set_default("environment", environment.clone())?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (PYM_ prefix)
            .add_source(
                Environment::with_prefix("PYM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.prediction.validate()?;
        Ok(config)
    }

    fn with_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        let defaults = Self::default();
        builder
            .set_default("environment", defaults.environment)?
            .set_default("logging.filter", defaults.logging.filter)?
            .set_default("logging.json", defaults.logging.json)?
            .set_default("prediction.staleness_hours", defaults.prediction.staleness_hours)?
            .set_default("prediction.min_tree_weight", defaults.prediction.min_tree_weight)?
            .set_default("prediction.max_tree_weight", defaults.prediction.max_tree_weight)?
            .set_default(
                "prediction.representativeness_cap",
                defaults.prediction.representativeness_cap,
            )?
            .set_default(
                "prediction.sample_saturation",
                i64::from(defaults.prediction.sample_saturation),
            )?
            .set_default("tree_model.base_yield_kg", defaults.tree_model.base_yield_kg)?
            .set_default(
                "tree_model.reference_diameter_mm",
                defaults.tree_model.reference_diameter_mm,
            )?
            .set_default(
                "tree_model.reference_stem_count",
                defaults.tree_model.reference_stem_count,
            )?
            .set_default(
                "tree_model.reference_age_years",
                defaults.tree_model.reference_age_years,
            )?
            .set_default("tree_model.min_factor", defaults.tree_model.min_factor)?
            .set_default("tree_model.max_factor", defaults.tree_model.max_factor)?
            .set_default(
                "tree_model.fertilizer_multiplier",
                defaults.tree_model.fertilizer_multiplier,
            )?
            .set_default(
                "tree_model.mild_disease_multiplier",
                defaults.tree_model.mild_disease_multiplier,
            )?
            .set_default(
                "tree_model.severe_disease_multiplier",
                defaults.tree_model.severe_disease_multiplier,
            )?
            .set_default(
                "farm_model.base_yield_per_hectare_kg",
                defaults.farm_model.base_yield_per_hectare_kg,
            )?
            .set_default(
                "farm_model.default_area_hectares",
                defaults.farm_model.default_area_hectares,
            )?
            .set_default(
                "farm_model.optimal_trees_per_hectare",
                defaults.farm_model.optimal_trees_per_hectare,
            )?
            .set_default(
                "farm_model.optimal_rainfall_min_mm",
                defaults.farm_model.optimal_rainfall_min_mm,
            )?
            .set_default(
                "farm_model.optimal_rainfall_max_mm",
                defaults.farm_model.optimal_rainfall_max_mm,
            )?
            .set_default(
                "farm_model.optimal_temperature_min_celsius",
                defaults.farm_model.optimal_temperature_min_celsius,
            )?
            .set_default(
                "farm_model.optimal_temperature_max_celsius",
                defaults.farm_model.optimal_temperature_max_celsius,
            )?
            .set_default(
                "farm_model.default_age_years",
                defaults.farm_model.default_age_years,
            )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            logging: LoggingConfig::default(),
            prediction: PredictionConfig::default(),
            tree_model: TreeModelConfig::default(),
            farm_model: FarmModelConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "plantation_engine=info".to_string(),
            json: false,
        }
    }
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            staleness_hours: 24,
            min_tree_weight: 0.2,
            max_tree_weight: 0.8,
            representativeness_cap: 0.3,
            sample_saturation: 10,
        }
    }
}

impl PredictionConfig {
    pub fn staleness(&self) -> chrono::Duration {
        chrono::Duration::hours(self.staleness_hours)
    }

    pub fn blending_policy(&self) -> BlendingPolicy {
        BlendingPolicy {
            min_tree_weight: self.min_tree_weight,
            max_tree_weight: self.max_tree_weight,
            representativeness_cap: self.representativeness_cap,
        }
    }

    /// Reject tree weight bounds outside [0.2, 0.8] and a negative staleness window
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_blending_policy(&self.blending_policy())
            .map_err(|message| ConfigError::Message(format!("prediction: {}", message)))?;
        if self.staleness_hours < 0 {
            return Err(ConfigError::Message(
                "prediction: staleness_hours must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for TreeModelConfig {
    fn default() -> Self {
        Self {
            base_yield_kg: 0.6,
            reference_diameter_mm: 45.0,
            reference_stem_count: 4.0,
            reference_age_years: 4.0,
            min_factor: 0.25,
            max_factor: 2.0,
            fertilizer_multiplier: 1.15,
            mild_disease_multiplier: 0.90,
            severe_disease_multiplier: 0.70,
        }
    }
}

impl Default for FarmModelConfig {
    fn default() -> Self {
        Self {
            base_yield_per_hectare_kg: 600.0,
            default_area_hectares: 1.0,
            optimal_trees_per_hectare: 2500.0,
            optimal_rainfall_min_mm: 1750.0,
            optimal_rainfall_max_mm: 2500.0,
            optimal_temperature_min_celsius: 24.0,
            optimal_temperature_max_celsius: 30.0,
            default_age_years: 4.0,
        }
    }
}

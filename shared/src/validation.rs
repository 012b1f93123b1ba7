//! Validation utilities for the Plantation Management Platform
//!
//! Checks that the `validator` derives on the input structs cannot express
//! (decimal amounts, cross-field invariants).

use rust_decimal::Decimal;

use crate::models::{BlendingWeights, BlendingPolicy};

// ============================================================================
// Field Validations
// ============================================================================

/// Validate a name or tag still has content once surrounding whitespace is trimmed
pub fn validate_not_blank(value: &str) -> Result<(), &'static str> {
    if value.trim().is_empty() {
        return Err("Must not be blank");
    }
    Ok(())
}

/// Validate a harvested amount is strictly positive
pub fn validate_yield_amount(amount: Decimal) -> Result<(), &'static str> {
    if amount <= Decimal::ZERO {
        return Err("Yield amount must be greater than zero");
    }
    Ok(())
}

/// Validate a plot or farm area is strictly positive
pub fn validate_area(area_hectares: Decimal) -> Result<(), &'static str> {
    if area_hectares <= Decimal::ZERO {
        return Err("Area must be greater than zero");
    }
    Ok(())
}

/// Validate a mean temperature is physically plausible for a growing region
pub fn validate_temperature(celsius: f64) -> Result<(), &'static str> {
    if !celsius.is_finite() || !(-10.0..=50.0).contains(&celsius) {
        return Err("Temperature must be between -10 and 50 °C");
    }
    Ok(())
}

/// Validate the declared number of trees on a plot
pub fn validate_total_trees(total_trees: u32) -> Result<(), &'static str> {
    if total_trees == 0 {
        return Err("Declared total trees must be greater than zero");
    }
    Ok(())
}

// ============================================================================
// Prediction Invariants
// ============================================================================

/// Lowest tree weight any blending policy may allow
pub const TREE_WEIGHT_FLOOR: f64 = 0.2;

/// Highest tree weight any blending policy may allow
pub const TREE_WEIGHT_CEILING: f64 = 0.8;

/// Validate a blending policy keeps the tree weight inside the global bounds
pub fn validate_blending_policy(policy: &BlendingPolicy) -> Result<(), &'static str> {
    let BlendingPolicy {
        min_tree_weight,
        max_tree_weight,
        representativeness_cap,
    } = *policy;
    if !min_tree_weight.is_finite() || !max_tree_weight.is_finite() {
        return Err("Tree weight bounds must be finite");
    }
    if min_tree_weight < TREE_WEIGHT_FLOOR || max_tree_weight > TREE_WEIGHT_CEILING {
        return Err("Tree weight bounds must lie within 0.2 and 0.8");
    }
    if min_tree_weight > max_tree_weight {
        return Err("Minimum tree weight must not exceed the maximum");
    }
    if !representativeness_cap.is_finite() || representativeness_cap < 0.0 {
        return Err("Representativeness cap must be a non-negative number");
    }
    Ok(())
}

/// Validate blending weights sum to one and respect the policy bounds
pub fn validate_blending_weights(
    weights: &BlendingWeights,
    policy: &BlendingPolicy,
) -> Result<(), &'static str> {
    if !weights.tree.is_finite() || !weights.farm.is_finite() {
        return Err("Blending weights must be finite");
    }
    if !weights.is_normalized() {
        return Err("Blending weights must sum to 1");
    }
    let lower = policy.min_tree_weight.max(TREE_WEIGHT_FLOOR);
    let upper = policy.max_tree_weight.min(TREE_WEIGHT_CEILING);
    if weights.tree < lower || weights.tree > upper {
        return Err("Tree blending weight is outside the allowed range");
    }
    Ok(())
}

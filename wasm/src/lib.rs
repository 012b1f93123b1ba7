//! WebAssembly module for the Plantation Management Platform
//!
//! Lets the offline field app preview, without a round trip:
//! - Plot lifecycle status and progress from a planting date
//! - The monotonic status policy
//! - Hybrid yield blending weights
//! - Harvest entry validation

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::lifecycle::*;
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

/// Derive lifecycle fields for a plot planted on `planted_date` (YYYY-MM-DD)
/// as of `now_millis` (milliseconds since the Unix epoch). Returns JSON.
#[wasm_bindgen]
pub fn derive_plot_lifecycle(planted_date: &str, now_millis: f64) -> Result<String, JsValue> {
    lifecycle_json(planted_date, now_millis).map_err(|e| JsValue::from_str(&e))
}

/// Same as [`derive_plot_lifecycle`] using the browser clock
#[wasm_bindgen]
pub fn derive_plot_lifecycle_now(planted_date: &str) -> Result<String, JsValue> {
    derive_plot_lifecycle(planted_date, js_sys::Date::now())
}

/// Resulting status when a derived status meets the stored one
#[wasm_bindgen]
pub fn resolve_plot_status(current: &str, derived: &str) -> Result<String, JsValue> {
    resolve_status(current, derived).map_err(|e| JsValue::from_str(&e))
}

/// Blending weights `[tree, farm]` for the given confidences and sample size
#[wasm_bindgen]
pub fn calculate_blending_weights(
    tree_confidence: f64,
    farm_confidence: f64,
    sampled_trees: u32,
    declared_total_trees: u32,
) -> Vec<f64> {
    let weights = BlendingWeights::derive(
        tree_confidence,
        farm_confidence,
        sampled_trees,
        declared_total_trees,
        &BlendingPolicy::default(),
    );
    vec![weights.tree, weights.farm]
}

/// Validate a harvest amount before queueing it for sync
#[wasm_bindgen]
pub fn validate_harvest_amount(amount_kg: f64) -> bool {
    Decimal::try_from(amount_kg)
        .map(|amount| validate_yield_amount(amount).is_ok())
        .unwrap_or(false)
}

fn lifecycle_json(planted_date: &str, now_millis: f64) -> Result<String, String> {
    let planted = NaiveDate::parse_from_str(planted_date.trim(), "%Y-%m-%d")
        .map_err(|e| format!("Invalid planting date: {}", e))?;
    let now = DateTime::<Utc>::from_timestamp_millis(now_millis as i64)
        .ok_or_else(|| "Invalid timestamp".to_string())?;

    serde_json::to_string(&derive_lifecycle(planted, now))
        .map_err(|e| format!("Serialization failed: {}", e))
}

fn resolve_status(current: &str, derived: &str) -> Result<String, String> {
    let current: PlotStatus = current.parse().map_err(|e: ParseStatusError| e.to_string())?;
    let derived: PlotStatus = derived.parse().map_err(|e: ParseStatusError| e.to_string())?;
    Ok(apply_status_if_advances(current, derived).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2025-01-15T00:00:00Z
    const JAN_15_2025_MILLIS: f64 = 1_736_899_200_000.0;

    #[test]
    fn test_lifecycle_json() {
        let json = lifecycle_json("2024-12-06", JAN_15_2025_MILLIS).unwrap();
        let lifecycle: PlotLifecycle = serde_json::from_str(&json).unwrap();
        assert_eq!(lifecycle.status, PlotStatus::Growing);
        assert_eq!(lifecycle.progress_percentage, 25);
        assert_eq!(lifecycle.age_months, Some(1));
    }

    #[test]
    fn test_lifecycle_rejects_bad_date() {
        assert!(lifecycle_json("06/12/2024", JAN_15_2025_MILLIS).is_err());
    }

    #[test]
    fn test_status_never_regresses() {
        assert_eq!(resolve_status("mature", "growing").unwrap(), "mature");
        assert_eq!(resolve_status("growing", "harvesting").unwrap(), "harvesting");
        assert_eq!(resolve_status("preparing", "planted").unwrap(), "planted");
        assert!(resolve_status("fallow", "growing").is_err());
    }

    #[test]
    fn test_blending_weights() {
        let weights = calculate_blending_weights(0.5, 0.5, 0, 100);
        assert!((weights[0] - 0.5).abs() < 1e-12);
        assert!((weights[0] + weights[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_harvest_amount() {
        assert!(validate_harvest_amount(12.5));
        assert!(!validate_harvest_amount(0.0));
        assert!(!validate_harvest_amount(-4.0));
    }
}

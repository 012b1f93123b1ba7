//! Hybrid yield engine tests
//!
//! Covers:
//! - Blending of tree-level and farm-level estimates
//! - Weight invariant (sum to one, tree weight within bounds)
//! - Reconciliation of per-tree estimates with the blended total
//! - Freshness caching and forced recalculation
//! - Rejection paths that must leave no prediction behind

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use plantation_engine::external::{TreeScore, TreeYieldScorer};
use plantation_engine::services::hybrid_yield::reconcile;
use plantation_engine::{AppError, Clock, Config, Engine, FixedClock, InMemoryStore, Repository};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    BlendingPolicy, BlendingWeights, CreateFarmInput, CreatePlotInput, DiseaseSeverity,
    EnvironmentalFactors, Plot, RegisterTreeInput, Tree, Variety,
};
use uuid::Uuid;

// ============================================================================
// Fixtures
// ============================================================================

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 8, 0, 0).unwrap()
}

/// Clock the test can move forward after handing it to the engine
#[derive(Clone)]
struct ManualClock(Arc<Mutex<DateTime<Utc>>>);

impl ManualClock {
    fn advance(&self, by: Duration) {
        let mut now = self.0.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

fn engine() -> Engine {
    Engine::builder(Config::default())
        .clock(FixedClock(now()))
        .build()
}

/// 2.5 ha Ceylon plot with 2500 mm rainfall and 26 °C
fn ceylon_plot(engine: &Engine, store: &mut InMemoryStore) -> Plot {
    let farm = engine
        .farms()
        .create_farm(
            store,
            CreateFarmInput {
                name: "Ratnapura Estate".to_string(),
                ..Default::default()
            },
        )
        .unwrap();

    engine
        .plots()
        .create_plot(
            store,
            farm.id,
            CreatePlotInput {
                name: "Ridge".to_string(),
                area_hectares: Some(Decimal::new(25, 1)),
                variety: Some(Variety::Ceylon),
                declared_tree_count: Some(50),
                annual_rainfall_mm: Some(2500.0),
                mean_temperature_celsius: Some(26.0),
            },
        )
        .unwrap()
}

/// Five trees: 40-50 mm, three stems, four years, no fertilizer, no disease
fn sample_trees(engine: &Engine, store: &mut InMemoryStore, plot_id: Uuid) {
    for (i, diameter) in [40.0, 42.0, 45.0, 48.0, 50.0].into_iter().enumerate() {
        engine
            .trees()
            .register_tree(
                store,
                RegisterTreeInput {
                    plot_id,
                    tag: format!("R-{:02}", i + 1),
                    stem_diameter_mm: Some(diameter),
                    stem_count: Some(3),
                    age_years: Some(4.0),
                    fertilizer_applied: Some(false),
                    disease_severity: Some(DiseaseSeverity::None),
                },
            )
            .unwrap();
    }
}

fn strictly_between(value: f64, a: f64, b: f64) -> bool {
    value > a.min(b) && value < a.max(b)
}

// ============================================================================
// Blending
// ============================================================================

#[test]
fn test_blended_values_lie_between_sources() {
    let engine = engine();
    let mut store = InMemoryStore::new();
    let plot = ceylon_plot(&engine, &mut store);
    sample_trees(&engine, &mut store, plot.id);

    let result = engine
        .predict_hybrid_yield(&mut store, plot.id, 50, None, false)
        .unwrap();

    // 0.6 kg × d/45 × 3/4 per tree
    assert!((result.sampled_tree_total_kg - 2.25).abs() < 1e-9);
    assert!((result.tree_level_estimate_kg - 22.5).abs() < 1e-9);
    assert!((result.tree_model_confidence - 0.5).abs() < 1e-12);

    // 600 × 2.5 × density(20 trees/ha)
    assert!((result.farm_level_estimate_kg - 607.2).abs() < 1e-6);
    assert!((result.farm_model_confidence - 5.5 / 6.0).abs() < 1e-12);
    assert!((result.farm_factors.density - 0.4048).abs() < 1e-12);

    assert!(result.blending_weight_tree >= 0.2 && result.blending_weight_tree <= 0.8);
    assert!((result.blending_weight_tree + result.blending_weight_farm - 1.0).abs() < 1e-9);
    assert!(strictly_between(
        result.hybrid_estimate_kg,
        result.tree_level_estimate_kg,
        result.farm_level_estimate_kg
    ));
    assert!(strictly_between(
        result.overall_confidence,
        result.tree_model_confidence,
        result.farm_model_confidence
    ));

    assert_eq!(result.sampled_tree_count, 5);
    assert_eq!(result.declared_total_trees, 50);
    assert_eq!(result.environment.rainfall_mm, Some(2500.0));
}

#[test]
fn test_reconciled_estimates_are_written_back() {
    let engine = engine();
    let mut store = InMemoryStore::new();
    let plot = ceylon_plot(&engine, &mut store);
    sample_trees(&engine, &mut store, plot.id);

    let result = engine
        .predict_hybrid_yield(&mut store, plot.id, 50, None, false)
        .unwrap();

    let trees: Vec<Tree> = store.list_trees(plot.id).unwrap();
    let reconciled: Vec<f64> = trees
        .iter()
        .map(|tree| tree.yield_estimate_kg.expect("estimate written"))
        .collect();
    let extrapolated = reconciled.iter().sum::<f64>() * 50.0 / 5.0;
    assert!((extrapolated - result.hybrid_estimate_kg).abs() < 1e-6);

    for contribution in &result.tree_contributions {
        let tree = trees.iter().find(|tree| tree.id == contribution.tree_id).unwrap();
        assert_eq!(tree.yield_estimate_kg, Some(contribution.reconciled_estimate_kg));
        assert_eq!(contribution.completeness, 1.0);
    }
}

#[test]
fn test_environment_overrides_plot_values() {
    let engine = engine();
    let mut store = InMemoryStore::new();
    let plot = ceylon_plot(&engine, &mut store);
    sample_trees(&engine, &mut store, plot.id);

    let result = engine
        .predict_hybrid_yield(
            &mut store,
            plot.id,
            50,
            Some(EnvironmentalFactors {
                rainfall_mm: Some(1000.0),
                temperature_celsius: None,
            }),
            false,
        )
        .unwrap();

    assert_eq!(result.environment.rainfall_mm, Some(1000.0));
    assert_eq!(result.environment.temperature_celsius, Some(26.0));
    assert!((result.farm_factors.rainfall - 0.625).abs() < 1e-12);
}

#[test]
fn test_custom_tree_scorer_is_used() {
    struct FlatScorer;

    impl TreeYieldScorer for FlatScorer {
        fn score(&self, _tree: &Tree) -> TreeScore {
            TreeScore {
                estimate_kg: 1.0,
                completeness: 1.0,
            }
        }
    }

    let engine = Engine::builder(Config::default())
        .clock(FixedClock(now()))
        .tree_scorer(FlatScorer)
        .build();
    let mut store = InMemoryStore::new();
    let plot = ceylon_plot(&engine, &mut store);
    sample_trees(&engine, &mut store, plot.id);

    let result = engine
        .predict_hybrid_yield(&mut store, plot.id, 80, None, false)
        .unwrap();
    assert!((result.tree_level_estimate_kg - 80.0).abs() < 1e-9);
}

// ============================================================================
// Caching
// ============================================================================

#[test]
fn test_fresh_prediction_is_reused_until_forced() {
    let engine = engine();
    let mut store = InMemoryStore::new();
    let plot = ceylon_plot(&engine, &mut store);
    sample_trees(&engine, &mut store, plot.id);

    let first = engine
        .predict_hybrid_yield(&mut store, plot.id, 50, None, false)
        .unwrap();
    let cached = engine
        .predict_hybrid_yield(&mut store, plot.id, 50, None, false)
        .unwrap();
    assert_eq!(cached, first);

    let forced = engine
        .predict_hybrid_yield(&mut store, plot.id, 50, None, true)
        .unwrap();
    assert_ne!(forced.id, first.id);

    let history = engine.yields().prediction_history(&store, plot.id).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, forced.id);
    assert_eq!(
        engine.get_latest_prediction(&store, plot.id).unwrap().map(|latest| latest.id),
        Some(forced.id)
    );
}

#[test]
fn test_stale_prediction_is_recalculated() {
    let clock = ManualClock(Arc::new(Mutex::new(now())));
    let engine = Engine::builder(Config::default())
        .clock(clock.clone())
        .build();
    let mut store = InMemoryStore::new();
    let plot = ceylon_plot(&engine, &mut store);
    sample_trees(&engine, &mut store, plot.id);

    let first = engine
        .predict_hybrid_yield(&mut store, plot.id, 50, None, false)
        .unwrap();

    clock.advance(Duration::hours(23));
    let cached = engine
        .predict_hybrid_yield(&mut store, plot.id, 50, None, false)
        .unwrap();
    assert_eq!(cached.id, first.id);

    clock.advance(Duration::hours(2));
    let fresh = engine
        .predict_hybrid_yield(&mut store, plot.id, 50, None, false)
        .unwrap();
    assert_ne!(fresh.id, first.id);
    assert_eq!(fresh.calculated_at, now() + Duration::hours(25));
}

// ============================================================================
// Rejection Paths
// ============================================================================

#[test]
fn test_plot_without_trees_is_rejected() {
    let engine = engine();
    let mut store = InMemoryStore::new();
    let plot = ceylon_plot(&engine, &mut store);

    let result = engine.predict_hybrid_yield(&mut store, plot.id, 50, None, false);
    assert!(matches!(result, Err(AppError::ValidationError(_))));
    assert!(engine.get_latest_prediction(&store, plot.id).unwrap().is_none());
}

#[test]
fn test_zero_declared_trees_is_rejected() {
    let engine = engine();
    let mut store = InMemoryStore::new();
    let plot = ceylon_plot(&engine, &mut store);
    sample_trees(&engine, &mut store, plot.id);

    let result = engine.predict_hybrid_yield(&mut store, plot.id, 0, None, false);
    match result {
        Err(AppError::Validation { field, .. }) => assert_eq!(field, "total_trees"),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(store.list_predictions(plot.id).unwrap().is_empty());
    assert!(store
        .list_trees(plot.id)
        .unwrap()
        .iter()
        .all(|tree| tree.yield_estimate_kg.is_none()));
}

#[test]
fn test_unknown_plot_is_not_found() {
    let engine = engine();
    let mut store = InMemoryStore::new();
    let result = engine.predict_hybrid_yield(&mut store, Uuid::new_v4(), 50, None, false);
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[test]
fn test_inverted_weight_bounds_fail_without_persisting() {
    let mut config = Config::default();
    config.prediction.min_tree_weight = 0.9;
    config.prediction.max_tree_weight = 0.1;
    let engine = Engine::builder(config).clock(FixedClock(now())).build();
    let mut store = InMemoryStore::new();
    let plot = ceylon_plot(&engine, &mut store);
    sample_trees(&engine, &mut store, plot.id);

    let result = engine.predict_hybrid_yield(&mut store, plot.id, 50, None, false);
    assert!(matches!(result, Err(AppError::Internal(_))));
    assert!(store.list_predictions(plot.id).unwrap().is_empty());
}

#[test]
fn test_predictions_survive_plot_deletion() {
    let engine = engine();
    let mut store = InMemoryStore::new();
    let plot = ceylon_plot(&engine, &mut store);
    sample_trees(&engine, &mut store, plot.id);
    engine
        .predict_hybrid_yield(&mut store, plot.id, 50, None, false)
        .unwrap();

    engine.plots().delete_plot(&mut store, plot.id).unwrap();
    assert_eq!(store.list_predictions(plot.id).unwrap().len(), 1);
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    /// Weights always sum to one and the tree weight stays within bounds
    #[test]
    fn prop_weights_are_normalized_and_bounded(
        tree_confidence in 0.0f64..=1.0,
        farm_confidence in 0.0f64..=1.0,
        sampled in 1u32..500,
        declared in 1u32..10_000,
    ) {
        let policy = BlendingPolicy::default();
        let weights =
            BlendingWeights::derive(tree_confidence, farm_confidence, sampled, declared, &policy);

        prop_assert!((weights.tree + weights.farm - 1.0).abs() < 1e-9);
        prop_assert!(weights.tree >= 0.2 && weights.tree <= 0.8);
        prop_assert!(shared::validate_blending_weights(&weights, &policy).is_ok());
    }

    /// Reconciled per-tree estimates extrapolate back to the final total
    #[test]
    fn prop_reconciliation_matches_final_total(
        raw in prop::collection::vec(0.01f64..50.0, 1..40),
        final_kg in 0.0f64..100_000.0,
        extra_trees in 0u32..5_000,
    ) {
        let declared = raw.len() as u32 + extra_trees;
        let reconciled = reconcile(&raw, final_kg, declared);

        prop_assert_eq!(reconciled.len(), raw.len());
        let extrapolated = reconciled.iter().sum::<f64>() * f64::from(declared) / raw.len() as f64;
        prop_assert!((extrapolated - final_kg).abs() <= 1e-6 * final_kg.max(1.0));
    }
}

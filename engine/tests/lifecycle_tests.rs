//! Plot lifecycle tests
//!
//! Covers:
//! - Lifecycle derivation through the engine clock
//! - Monotonic status across arbitrary planting edits

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use plantation_engine::{Config, Engine, FixedClock, InMemoryStore, Repository};
use proptest::prelude::*;
use shared::{
    CreateFarmInput, CreatePlantingInput, CreatePlotInput, PlotStatus, UpdatePlantingInput,
    Variety,
};
use uuid::Uuid;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 8, 0, 0).unwrap()
}

fn engine() -> Engine {
    Engine::builder(Config::default())
        .clock(FixedClock(now()))
        .build()
}

fn new_plot(engine: &Engine, store: &mut InMemoryStore) -> Uuid {
    let farm = engine
        .farms()
        .create_farm(
            store,
            CreateFarmInput {
                name: "Kalutara Estate".to_string(),
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
                name: "Lower terrace".to_string(),
                ..Default::default()
            },
        )
        .unwrap()
        .id
}

// ============================================================================
// Unit Tests
// ============================================================================

#[test]
fn test_forty_days_after_planting() {
    let lifecycle = engine().derive_lifecycle(now().date_naive() - Duration::days(40));
    assert_eq!(lifecycle.status, PlotStatus::Growing);
    assert_eq!(lifecycle.progress_percentage, 25);
    assert_eq!(lifecycle.age_months, Some(1));
}

#[test]
fn test_new_plot_is_preparing() {
    let engine = engine();
    let mut store = InMemoryStore::new();
    let plot_id = new_plot(&engine, &mut store);

    let plot = store.get_plot(plot_id).unwrap().unwrap();
    assert_eq!(plot.lifecycle.status, PlotStatus::Preparing);
    assert_eq!(plot.lifecycle.progress_percentage, 0);
    assert_eq!(plot.lifecycle.age_months, None);
}

#[test]
fn test_future_planting_stays_preparing() {
    let engine = engine();
    let mut store = InMemoryStore::new();
    let plot_id = new_plot(&engine, &mut store);

    engine
        .plots()
        .plant(
            &mut store,
            CreatePlantingInput {
                plot_id,
                planted_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
                seedling_count: 250,
                variety: Variety::SriWijaya,
            },
        )
        .unwrap();

    let plot = store.get_plot(plot_id).unwrap().unwrap();
    assert_eq!(plot.lifecycle.status, PlotStatus::Preparing);
    assert_eq!(plot.lifecycle.progress_percentage, 0);
}

#[test]
fn test_removing_planting_keeps_status() {
    let engine = engine();
    let mut store = InMemoryStore::new();
    let plot_id = new_plot(&engine, &mut store);

    let planting = engine
        .plots()
        .plant(
            &mut store,
            CreatePlantingInput {
                plot_id,
                planted_date: NaiveDate::from_ymd_opt(2020, 6, 1).unwrap(),
                seedling_count: 250,
                variety: Variety::Ceylon,
            },
        )
        .unwrap();
    engine.plots().remove_planting(&mut store, planting.id).unwrap();

    let plot = store.get_plot(plot_id).unwrap().unwrap();
    assert_eq!(plot.lifecycle.status, PlotStatus::Harvesting);
    assert_eq!(plot.aggregates.planting_count, 0);
    assert_eq!(plot.aggregates.last_planting_date, None);
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// No sequence of planting edits moves a plot's status backwards
    #[test]
    fn prop_status_never_regresses(days_ago in prop::collection::vec(-60i64..2_000, 1..8)) {
        let engine = engine();
        let mut store = InMemoryStore::new();
        let plot_id = new_plot(&engine, &mut store);

        let planting = engine
            .plots()
            .plant(
                &mut store,
                CreatePlantingInput {
                    plot_id,
                    planted_date: now().date_naive() - Duration::days(days_ago[0]),
                    seedling_count: 100,
                    variety: Variety::Ceylon,
                },
            )
            .unwrap();

        let mut previous = store.get_plot(plot_id).unwrap().unwrap().lifecycle.status;
        for days in days_ago.iter().skip(1) {
            engine
                .plots()
                .update_planting(
                    &mut store,
                    planting.id,
                    UpdatePlantingInput {
                        planted_date: Some(now().date_naive() - Duration::days(*days)),
                        ..Default::default()
                    },
                )
                .unwrap();

            let status = store.get_plot(plot_id).unwrap().unwrap().lifecycle.status;
            prop_assert!(status.rank() >= previous.rank());
            previous = status;
        }
    }
}

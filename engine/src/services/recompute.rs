//! Aggregate recomputers for plots and farms
//!
//! Every recompute is a projection of the parent's complete current child
//! set. Nothing is patched incrementally, so running a recompute twice with
//! unchanged children yields identical fields.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::{
    derive_lifecycle, merge_lifecycle, FarmAggregates, PlantingRecord, Plot, PlotAggregates,
    PlotLifecycle, Tree, YieldRecord,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::store::Repository;

/// Which plot fields a recompute refreshes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecomputeScope {
    /// Counts, sums and last-dates only
    Aggregates,
    /// Aggregates plus the lifecycle derived from the latest planting
    WithLifecycle,
}

/// Project a plot's aggregates from its children
pub fn project_plot_aggregates(
    plantings: &[PlantingRecord],
    yields: &[YieldRecord],
    trees: &[Tree],
) -> PlotAggregates {
    let total_yield_kg: Decimal = yields.iter().map(|record| record.yield_amount_kg).sum();
    let average_yield_kg = if yields.is_empty() {
        None
    } else {
        Some(total_yield_kg / Decimal::from(yields.len()))
    };

    PlotAggregates {
        planting_count: count(plantings.len()),
        yield_count: count(yields.len()),
        tree_count: count(trees.len()),
        total_yield_kg,
        average_yield_kg,
        best_yield_kg: yields.iter().map(|record| record.yield_amount_kg).max(),
        last_planting_date: plantings.iter().map(|planting| planting.planted_date).max(),
        last_yield_date: yields.iter().map(|record| record.harvest_date).max(),
    }
}

/// Derive the lifecycle from the latest planting and merge it monotonically.
///
/// Without any planting record the stored lifecycle is kept as-is.
pub fn refresh_lifecycle(
    current: &PlotLifecycle,
    plantings: &[PlantingRecord],
    now: DateTime<Utc>,
) -> PlotLifecycle {
    match plantings.iter().map(|planting| planting.planted_date).max() {
        Some(planted_date) => merge_lifecycle(current, &derive_lifecycle(planted_date, now)),
        None => current.clone(),
    }
}

/// Project a farm's aggregates from its plots
pub fn project_farm_aggregates(plots: &[Plot]) -> FarmAggregates {
    FarmAggregates {
        active_plots_count: count(
            plots
                .iter()
                .filter(|plot| plot.lifecycle.status.is_active())
                .count(),
        ),
        total_yield_kg: plots.iter().map(|plot| plot.aggregates.total_yield_kg).sum(),
        last_activity_date: plots.iter().filter_map(Plot::last_activity_date).max(),
    }
}

/// Recompute a plot's derived fields from its current children.
///
/// A missing plot is a no-op: the parent may have been deleted in the same
/// unit of work.
pub fn recompute_plot(
    repo: &mut dyn Repository,
    plot_id: Uuid,
    scope: RecomputeScope,
    now: DateTime<Utc>,
) -> AppResult<()> {
    let Some(mut plot) = repo.get_plot(plot_id)? else {
        tracing::warn!(%plot_id, "Skipping recompute of missing plot");
        return Ok(());
    };

    let plantings = repo.list_plantings(plot_id)?;
    let yields = repo.list_yield_records(plot_id)?;
    let trees = repo.list_trees(plot_id)?;

    let aggregates = project_plot_aggregates(&plantings, &yields, &trees);
    let lifecycle = match scope {
        RecomputeScope::Aggregates => plot.lifecycle.clone(),
        RecomputeScope::WithLifecycle => refresh_lifecycle(&plot.lifecycle, &plantings, now),
    };

    if aggregates == plot.aggregates && lifecycle == plot.lifecycle {
        tracing::debug!(%plot_id, "Plot aggregates unchanged");
        return Ok(());
    }

    tracing::debug!(
        %plot_id,
        status = %lifecycle.status,
        trees = aggregates.tree_count,
        harvests = aggregates.yield_count,
        "Plot aggregates recomputed"
    );
    plot.aggregates = aggregates;
    plot.lifecycle = lifecycle;
    plot.updated_at = now;
    repo.save_plot(&plot)
}

/// Recompute a farm's derived fields from its current plots.
///
/// A missing farm is a no-op.
pub fn recompute_farm(
    repo: &mut dyn Repository,
    farm_id: Uuid,
    now: DateTime<Utc>,
) -> AppResult<()> {
    let Some(mut farm) = repo.get_farm(farm_id)? else {
        tracing::warn!(%farm_id, "Skipping recompute of missing farm");
        return Ok(());
    };

    let plots = repo.list_plots(farm_id)?;
    let aggregates = project_farm_aggregates(&plots);

    if aggregates == farm.aggregates {
        tracing::debug!(%farm_id, "Farm aggregates unchanged");
        return Ok(());
    }

    tracing::debug!(
        %farm_id,
        active_plots = aggregates.active_plots_count,
        total_yield_kg = %aggregates.total_yield_kg,
        "Farm aggregates recomputed"
    );
    farm.aggregates = aggregates;
    farm.updated_at = now;
    repo.save_farm(&farm)
}

fn count(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

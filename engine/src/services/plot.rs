//! Plot management service for plot operations

use std::sync::Arc;

use shared::{
    validate_area, validate_not_blank, validate_temperature, CreatePlantingInput,
    CreatePlotInput, EntityKind, PlantingRecord, Plot, UpdatePlantingInput, UpdatePlotInput,
};
use uuid::Uuid;
use validator::Validate;

use crate::clock::Clock;
use crate::error::{AppError, AppResult};
use crate::store::{with_transaction, Repository};

use super::cascade::{CascadeBus, CascadeEvent};
use super::recompute::{self, RecomputeScope};

/// Plot service for managing farm plots
#[derive(Clone)]
pub struct PlotService {
    bus: Arc<CascadeBus>,
    clock: Arc<dyn Clock>,
}

impl PlotService {
    /// Create a new PlotService instance
    pub fn new(bus: Arc<CascadeBus>, clock: Arc<dyn Clock>) -> Self {
        Self { bus, clock }
    }

    /// Get a plot by ID
    pub fn get_plot(&self, repo: &dyn Repository, plot_id: Uuid) -> AppResult<Plot> {
        repo.get_plot(plot_id)?
            .ok_or_else(|| AppError::NotFound("Plot".to_string()))
    }

    /// Get all plots for a farm
    pub fn list_plots(&self, repo: &dyn Repository, farm_id: Uuid) -> AppResult<Vec<Plot>> {
        repo.list_plots(farm_id)
    }

    /// Create a new plot
    pub fn create_plot(
        &self,
        repo: &mut dyn Repository,
        farm_id: Uuid,
        input: CreatePlotInput,
    ) -> AppResult<Plot> {
        input.validate()?;
        validate_characteristics(&input.area_hectares, &input.mean_temperature_celsius)?;

        if repo.get_farm(farm_id)?.is_none() {
            return Err(AppError::NotFound("Farm".to_string()));
        }
        validate_not_blank(&input.name).map_err(|message| AppError::invalid("name", message))?;
        ensure_unique_name(repo, farm_id, &input.name, None)?;

        let mut plot = Plot::new(farm_id, input.name.trim(), self.clock.now());
        plot.area_hectares = input.area_hectares;
        plot.variety = input.variety;
        plot.declared_tree_count = input.declared_tree_count;
        plot.annual_rainfall_mm = input.annual_rainfall_mm;
        plot.mean_temperature_celsius = input.mean_temperature_celsius;

        with_transaction(repo, |repo| {
            repo.save_plot(&plot)?;
            self.bus.dispatch(
                repo,
                &CascadeEvent::created(EntityKind::Plot, plot.id, Some(farm_id), &plot),
            )
        })?;

        tracing::info!(plot_id = %plot.id, %farm_id, "Plot created: {}", plot.name);
        Ok(plot)
    }

    /// Update a plot's user-set characteristics
    pub fn update_plot(
        &self,
        repo: &mut dyn Repository,
        plot_id: Uuid,
        input: UpdatePlotInput,
    ) -> AppResult<Plot> {
        input.validate()?;
        validate_characteristics(&input.area_hectares, &input.mean_temperature_celsius)?;

        let existing = self.get_plot(repo, plot_id)?;
        if let Some(ref name) = input.name {
            validate_not_blank(name).map_err(|message| AppError::invalid("name", message))?;
            ensure_unique_name(repo, existing.farm_id, name, Some(plot_id))?;
        }

        let mut plot = existing.clone();
        if let Some(name) = input.name {
            plot.name = name.trim().to_string();
        }
        plot.area_hectares = input.area_hectares.or(existing.area_hectares);
        plot.variety = input.variety.or_else(|| existing.variety.clone());
        plot.declared_tree_count = input.declared_tree_count.or(existing.declared_tree_count);
        plot.annual_rainfall_mm = input.annual_rainfall_mm.or(existing.annual_rainfall_mm);
        plot.mean_temperature_celsius = input
            .mean_temperature_celsius
            .or(existing.mean_temperature_celsius);
        plot.updated_at = self.clock.now();

        with_transaction(repo, |repo| {
            repo.save_plot(&plot)?;
            self.bus.dispatch(
                repo,
                &CascadeEvent::updated(
                    EntityKind::Plot,
                    plot_id,
                    Some(plot.farm_id),
                    Some(existing.farm_id),
                    &existing,
                    &plot,
                ),
            )
        })?;

        self.get_plot(repo, plot_id)
    }

    /// Delete a plot and everything recorded on it.
    ///
    /// Prediction history is kept.
    pub fn delete_plot(&self, repo: &mut dyn Repository, plot_id: Uuid) -> AppResult<()> {
        let plot = self.get_plot(repo, plot_id)?;

        with_transaction(repo, |repo| {
            delete_plot_children(repo, plot_id)?;
            repo.delete_plot(plot_id)?;
            self.bus.dispatch(
                repo,
                &CascadeEvent::deleted(EntityKind::Plot, plot_id, Some(plot.farm_id), &plot),
            )
        })?;

        tracing::info!(%plot_id, farm_id = %plot.farm_id, "Plot deleted: {}", plot.name);
        Ok(())
    }

    /// Recompute a plot's aggregates and lifecycle from its current children
    pub fn recompute_plot(&self, repo: &mut dyn Repository, plot_id: Uuid) -> AppResult<()> {
        recompute::recompute_plot(repo, plot_id, RecomputeScope::WithLifecycle, self.clock.now())
    }

    // ========================================================================
    // Planting Operations
    // ========================================================================

    /// Record the planting of a plot.
    ///
    /// A plot carries at most one planting record; replanting goes through
    /// [`PlotService::update_planting`].
    pub fn plant(
        &self,
        repo: &mut dyn Repository,
        input: CreatePlantingInput,
    ) -> AppResult<PlantingRecord> {
        input.validate()?;
        let plot = self.get_plot(repo, input.plot_id)?;

        if !repo.list_plantings(plot.id)?.is_empty() {
            return Err(AppError::Conflict {
                resource: "planting".to_string(),
                message: "Plot has already been planted".to_string(),
            });
        }

        let now = self.clock.now();
        let planting = PlantingRecord {
            id: Uuid::new_v4(),
            plot_id: plot.id,
            planted_date: input.planted_date,
            seedling_count: input.seedling_count,
            variety: input.variety,
            created_at: now,
            updated_at: now,
        };

        with_transaction(repo, |repo| {
            repo.save_planting(&planting)?;
            self.bus.dispatch(
                repo,
                &CascadeEvent::created(
                    EntityKind::PlantingRecord,
                    planting.id,
                    Some(planting.plot_id),
                    &planting,
                ),
            )
        })?;

        tracing::info!(
            planting_id = %planting.id,
            plot_id = %planting.plot_id,
            planted_date = %planting.planted_date,
            "Plot planted with {} seedlings of {}",
            planting.seedling_count,
            planting.variety
        );
        Ok(planting)
    }

    /// Correct a planting record. The plot's status never moves backwards.
    pub fn update_planting(
        &self,
        repo: &mut dyn Repository,
        planting_id: Uuid,
        input: UpdatePlantingInput,
    ) -> AppResult<PlantingRecord> {
        input.validate()?;
        let existing = repo
            .get_planting(planting_id)?
            .ok_or_else(|| AppError::NotFound("Planting record".to_string()))?;

        let mut planting = existing.clone();
        if let Some(planted_date) = input.planted_date {
            planting.planted_date = planted_date;
        }
        if let Some(seedling_count) = input.seedling_count {
            planting.seedling_count = seedling_count;
        }
        if let Some(variety) = input.variety {
            planting.variety = variety;
        }
        planting.updated_at = self.clock.now();

        with_transaction(repo, |repo| {
            repo.save_planting(&planting)?;
            self.bus.dispatch(
                repo,
                &CascadeEvent::updated(
                    EntityKind::PlantingRecord,
                    planting_id,
                    Some(planting.plot_id),
                    None,
                    &existing,
                    &planting,
                ),
            )
        })?;

        tracing::info!(%planting_id, plot_id = %planting.plot_id, "Planting record updated");
        Ok(planting)
    }

    /// Remove a planting record
    pub fn remove_planting(&self, repo: &mut dyn Repository, planting_id: Uuid) -> AppResult<()> {
        let planting = repo
            .get_planting(planting_id)?
            .ok_or_else(|| AppError::NotFound("Planting record".to_string()))?;

        with_transaction(repo, |repo| {
            repo.delete_planting(planting_id)?;
            self.bus.dispatch(
                repo,
                &CascadeEvent::deleted(
                    EntityKind::PlantingRecord,
                    planting_id,
                    Some(planting.plot_id),
                    &planting,
                ),
            )
        })?;

        tracing::info!(%planting_id, plot_id = %planting.plot_id, "Planting record removed");
        Ok(())
    }
}

/// Remove planting records, harvests and sampled trees of a plot.
///
/// No cascade events are fired: the parent is going away with them.
pub(crate) fn delete_plot_children(repo: &mut dyn Repository, plot_id: Uuid) -> AppResult<()> {
    for planting in repo.list_plantings(plot_id)? {
        repo.delete_planting(planting.id)?;
    }
    for record in repo.list_yield_records(plot_id)? {
        repo.delete_yield_record(record.id)?;
    }
    for tree in repo.list_trees(plot_id)? {
        repo.delete_tree(tree.id)?;
    }
    Ok(())
}

fn validate_characteristics(
    area_hectares: &Option<rust_decimal::Decimal>,
    mean_temperature_celsius: &Option<f64>,
) -> AppResult<()> {
    if let Some(area) = area_hectares {
        validate_area(*area).map_err(|message| AppError::invalid("area_hectares", message))?;
    }
    if let Some(temperature) = mean_temperature_celsius {
        validate_temperature(*temperature)
            .map_err(|message| AppError::invalid("mean_temperature_celsius", message))?;
    }
    Ok(())
}

fn ensure_unique_name(
    repo: &dyn Repository,
    farm_id: Uuid,
    name: &str,
    exclude: Option<Uuid>,
) -> AppResult<()> {
    let name = name.trim();
    let duplicate = repo
        .list_plots(farm_id)?
        .into_iter()
        .any(|plot| Some(plot.id) != exclude && plot.name.eq_ignore_ascii_case(name));

    if duplicate {
        return Err(AppError::Conflict {
            resource: "plot".to_string(),
            message: "A plot with this name already exists on the farm".to_string(),
        });
    }
    Ok(())
}

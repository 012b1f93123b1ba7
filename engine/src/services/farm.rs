//! Farm management service

use std::sync::Arc;

use shared::{validate_area, validate_not_blank, CreateFarmInput, EntityKind, Farm};
use uuid::Uuid;
use validator::Validate;

use crate::clock::Clock;
use crate::error::{AppError, AppResult};
use crate::store::{with_transaction, Repository};

use super::cascade::{CascadeBus, CascadeEvent};
use super::recompute;

/// Farm service for managing landholdings
#[derive(Clone)]
pub struct FarmService {
    bus: Arc<CascadeBus>,
    clock: Arc<dyn Clock>,
}

impl FarmService {
    /// Create a new FarmService instance
    pub fn new(bus: Arc<CascadeBus>, clock: Arc<dyn Clock>) -> Self {
        Self { bus, clock }
    }

    /// Get a farm by ID
    pub fn get_farm(&self, repo: &dyn Repository, farm_id: Uuid) -> AppResult<Farm> {
        repo.get_farm(farm_id)?
            .ok_or_else(|| AppError::NotFound("Farm".to_string()))
    }

    /// Get all farms
    pub fn list_farms(&self, repo: &dyn Repository) -> AppResult<Vec<Farm>> {
        repo.list_farms()
    }

    /// Create a new farm
    pub fn create_farm(
        &self,
        repo: &mut dyn Repository,
        input: CreateFarmInput,
    ) -> AppResult<Farm> {
        input.validate()?;
        validate_not_blank(&input.name).map_err(|message| AppError::invalid("name", message))?;
        if let Some(area) = input.total_area_hectares {
            validate_area(area)
                .map_err(|message| AppError::invalid("total_area_hectares", message))?;
        }

        let mut farm = Farm::new(input.name.trim(), self.clock.now());
        farm.location = input.location;
        farm.total_area_hectares = input.total_area_hectares;

        with_transaction(repo, |repo| {
            repo.save_farm(&farm)?;
            self.bus
                .dispatch(repo, &CascadeEvent::created(EntityKind::Farm, farm.id, None, &farm))
        })?;

        tracing::info!(farm_id = %farm.id, "Farm created: {}", farm.name);
        Ok(farm)
    }

    /// Delete a farm together with its plots and all of their children.
    ///
    /// Prediction history is kept.
    pub fn delete_farm(&self, repo: &mut dyn Repository, farm_id: Uuid) -> AppResult<()> {
        let farm = self.get_farm(repo, farm_id)?;

        with_transaction(repo, |repo| {
            let mut removed_plots = 0usize;
            for plot in repo.list_plots(farm_id)? {
                super::plot::delete_plot_children(repo, plot.id)?;
                repo.delete_plot(plot.id)?;
                removed_plots += 1;
            }
            repo.delete_farm(farm_id)?;
            tracing::debug!(%farm_id, removed_plots, "Farm subtree removed");

            self.bus
                .dispatch(repo, &CascadeEvent::deleted(EntityKind::Farm, farm_id, None, &farm))
        })?;

        tracing::info!(%farm_id, "Farm deleted: {}", farm.name);
        Ok(())
    }

    /// Recompute a farm's derived fields from its current plots
    pub fn recompute_farm(&self, repo: &mut dyn Repository, farm_id: Uuid) -> AppResult<()> {
        recompute::recompute_farm(repo, farm_id, self.clock.now())
    }
}

//! Persistence accessor
//!
//! The engine never talks to a database itself. Callers hand it a
//! [`Repository`] whose reads and writes happen inside the caller's unit of
//! work. [`InMemoryStore`] is the reference implementation used by the
//! offline field app and the test suite.

use std::collections::HashMap;

use shared::{Farm, HybridYieldResult, PlantingRecord, Plot, Tree, YieldRecord};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Get/list/save/delete access to every entity kind, plus a unit of work
pub trait Repository {
    // Farms
    fn get_farm(&self, id: Uuid) -> AppResult<Option<Farm>>;
    fn list_farms(&self) -> AppResult<Vec<Farm>>;
    fn save_farm(&mut self, farm: &Farm) -> AppResult<()>;
    fn delete_farm(&mut self, id: Uuid) -> AppResult<Option<Farm>>;

    // Plots
    fn get_plot(&self, id: Uuid) -> AppResult<Option<Plot>>;
    fn list_plots(&self, farm_id: Uuid) -> AppResult<Vec<Plot>>;
    fn save_plot(&mut self, plot: &Plot) -> AppResult<()>;
    fn delete_plot(&mut self, id: Uuid) -> AppResult<Option<Plot>>;

    // Planting records
    fn get_planting(&self, id: Uuid) -> AppResult<Option<PlantingRecord>>;
    fn list_plantings(&self, plot_id: Uuid) -> AppResult<Vec<PlantingRecord>>;
    fn save_planting(&mut self, planting: &PlantingRecord) -> AppResult<()>;
    fn delete_planting(&mut self, id: Uuid) -> AppResult<Option<PlantingRecord>>;

    // Yield records
    fn get_yield_record(&self, id: Uuid) -> AppResult<Option<YieldRecord>>;
    fn list_yield_records(&self, plot_id: Uuid) -> AppResult<Vec<YieldRecord>>;
    fn save_yield_record(&mut self, record: &YieldRecord) -> AppResult<()>;
    fn delete_yield_record(&mut self, id: Uuid) -> AppResult<Option<YieldRecord>>;

    // Trees
    fn get_tree(&self, id: Uuid) -> AppResult<Option<Tree>>;
    fn list_trees(&self, plot_id: Uuid) -> AppResult<Vec<Tree>>;
    fn save_tree(&mut self, tree: &Tree) -> AppResult<()>;
    fn delete_tree(&mut self, id: Uuid) -> AppResult<Option<Tree>>;

    // Predictions (append-only)
    fn append_prediction(&mut self, result: &HybridYieldResult) -> AppResult<()>;
    /// Newest first; ties on `calculated_at` go to the later append
    fn list_predictions(&self, plot_id: Uuid) -> AppResult<Vec<HybridYieldResult>>;

    fn latest_prediction(&self, plot_id: Uuid) -> AppResult<Option<HybridYieldResult>> {
        Ok(self.list_predictions(plot_id)?.into_iter().next())
    }

    // Unit of work
    fn begin(&mut self) -> AppResult<()>;
    fn commit(&mut self) -> AppResult<()>;
    fn rollback(&mut self) -> AppResult<()>;
}

/// Run `f` inside a unit of work: commit on success, roll back on error
pub fn with_transaction<T>(
    repo: &mut dyn Repository,
    f: impl FnOnce(&mut dyn Repository) -> AppResult<T>,
) -> AppResult<T> {
    repo.begin()?;
    match f(&mut *repo) {
        Ok(value) => {
            repo.commit()?;
            Ok(value)
        }
        Err(error) => {
            if let Err(rollback_error) = repo.rollback() {
                tracing::error!("Rollback failed after {}: {}", error, rollback_error);
            }
            Err(error)
        }
    }
}

#[derive(Debug, Clone, Default)]
struct StoreState {
    farms: HashMap<Uuid, Farm>,
    plots: HashMap<Uuid, Plot>,
    plantings: HashMap<Uuid, PlantingRecord>,
    yield_records: HashMap<Uuid, YieldRecord>,
    trees: HashMap<Uuid, Tree>,
    predictions: Vec<HybridYieldResult>,
}

/// In-memory repository.
///
/// `begin` snapshots the whole state and `rollback` restores the snapshot,
/// so nested units of work behave like savepoints.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: StoreState,
    savepoints: Vec<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open units of work
    pub fn transaction_depth(&self) -> usize {
        self.savepoints.len()
    }
}

impl Repository for InMemoryStore {
    fn get_farm(&self, id: Uuid) -> AppResult<Option<Farm>> {
        Ok(self.state.farms.get(&id).cloned())
    }

    fn list_farms(&self) -> AppResult<Vec<Farm>> {
        let mut farms: Vec<Farm> = self.state.farms.values().cloned().collect();
        farms.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(farms)
    }

    fn save_farm(&mut self, farm: &Farm) -> AppResult<()> {
        self.state.farms.insert(farm.id, farm.clone());
        Ok(())
    }

    fn delete_farm(&mut self, id: Uuid) -> AppResult<Option<Farm>> {
        Ok(self.state.farms.remove(&id))
    }

    fn get_plot(&self, id: Uuid) -> AppResult<Option<Plot>> {
        Ok(self.state.plots.get(&id).cloned())
    }

    fn list_plots(&self, farm_id: Uuid) -> AppResult<Vec<Plot>> {
        let mut plots: Vec<Plot> = self
            .state
            .plots
            .values()
            .filter(|plot| plot.farm_id == farm_id)
            .cloned()
            .collect();
        plots.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(plots)
    }

    fn save_plot(&mut self, plot: &Plot) -> AppResult<()> {
        self.state.plots.insert(plot.id, plot.clone());
        Ok(())
    }

    fn delete_plot(&mut self, id: Uuid) -> AppResult<Option<Plot>> {
        Ok(self.state.plots.remove(&id))
    }

    fn get_planting(&self, id: Uuid) -> AppResult<Option<PlantingRecord>> {
        Ok(self.state.plantings.get(&id).cloned())
    }

    fn list_plantings(&self, plot_id: Uuid) -> AppResult<Vec<PlantingRecord>> {
        let mut plantings: Vec<PlantingRecord> = self
            .state
            .plantings
            .values()
            .filter(|planting| planting.plot_id == plot_id)
            .cloned()
            .collect();
        plantings.sort_by(|a, b| a.planted_date.cmp(&b.planted_date).then(a.id.cmp(&b.id)));
        Ok(plantings)
    }

    fn save_planting(&mut self, planting: &PlantingRecord) -> AppResult<()> {
        self.state.plantings.insert(planting.id, planting.clone());
        Ok(())
    }

    fn delete_planting(&mut self, id: Uuid) -> AppResult<Option<PlantingRecord>> {
        Ok(self.state.plantings.remove(&id))
    }

    fn get_yield_record(&self, id: Uuid) -> AppResult<Option<YieldRecord>> {
        Ok(self.state.yield_records.get(&id).cloned())
    }

    fn list_yield_records(&self, plot_id: Uuid) -> AppResult<Vec<YieldRecord>> {
        let mut records: Vec<YieldRecord> = self
            .state
            .yield_records
            .values()
            .filter(|record| record.plot_id == plot_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.harvest_date.cmp(&b.harvest_date).then(a.id.cmp(&b.id)));
        Ok(records)
    }

    fn save_yield_record(&mut self, record: &YieldRecord) -> AppResult<()> {
        self.state.yield_records.insert(record.id, record.clone());
        Ok(())
    }

    fn delete_yield_record(&mut self, id: Uuid) -> AppResult<Option<YieldRecord>> {
        Ok(self.state.yield_records.remove(&id))
    }

    fn get_tree(&self, id: Uuid) -> AppResult<Option<Tree>> {
        Ok(self.state.trees.get(&id).cloned())
    }

    fn list_trees(&self, plot_id: Uuid) -> AppResult<Vec<Tree>> {
        let mut trees: Vec<Tree> = self
            .state
            .trees
            .values()
            .filter(|tree| tree.plot_id == plot_id)
            .cloned()
            .collect();
        trees.sort_by(|a, b| a.tag.cmp(&b.tag).then(a.id.cmp(&b.id)));
        Ok(trees)
    }

    fn save_tree(&mut self, tree: &Tree) -> AppResult<()> {
        self.state.trees.insert(tree.id, tree.clone());
        Ok(())
    }

    fn delete_tree(&mut self, id: Uuid) -> AppResult<Option<Tree>> {
        Ok(self.state.trees.remove(&id))
    }

    fn append_prediction(&mut self, result: &HybridYieldResult) -> AppResult<()> {
        if self.state.predictions.iter().any(|existing| existing.id == result.id) {
            return Err(AppError::Conflict {
                resource: "prediction".to_string(),
                message: format!("Prediction {} already exists and cannot be replaced", result.id),
            });
        }
        self.state.predictions.push(result.clone());
        Ok(())
    }

    fn list_predictions(&self, plot_id: Uuid) -> AppResult<Vec<HybridYieldResult>> {
        let mut results: Vec<HybridYieldResult> = self
            .state
            .predictions
            .iter()
            .rev()
            .filter(|result| result.plot_id == plot_id)
            .cloned()
            .collect();
        results.sort_by(|a, b| b.calculated_at.cmp(&a.calculated_at));
        Ok(results)
    }

    fn begin(&mut self) -> AppResult<()> {
        self.savepoints.push(self.state.clone());
        Ok(())
    }

    fn commit(&mut self) -> AppResult<()> {
        self.savepoints
            .pop()
            .map(|_| ())
            .ok_or_else(|| AppError::StorageError("commit without an open transaction".to_string()))
    }

    fn rollback(&mut self) -> AppResult<()> {
        let snapshot = self.savepoints.pop().ok_or_else(|| {
            AppError::StorageError("rollback without an open transaction".to_string())
        })?;
        self.state = snapshot;
        Ok(())
    }
}

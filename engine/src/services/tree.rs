//! Sampled tree service

use std::sync::Arc;

use shared::{validate_not_blank, EntityKind, RegisterTreeInput, Tree, UpdateTreeInput};
use uuid::Uuid;
use validator::Validate;

use crate::clock::Clock;
use crate::error::{AppError, AppResult};
use crate::store::{with_transaction, Repository};

use super::cascade::{CascadeBus, CascadeEvent};

#[derive(Clone)]
pub struct TreeService {
    bus: Arc<CascadeBus>,
    clock: Arc<dyn Clock>,
}

impl TreeService {
    pub fn new(bus: Arc<CascadeBus>, clock: Arc<dyn Clock>) -> Self {
        Self { bus, clock }
    }

    pub fn get_tree(&self, repo: &dyn Repository, tree_id: Uuid) -> AppResult<Tree> {
        repo.get_tree(tree_id)?
            .ok_or_else(|| AppError::NotFound("Tree".to_string()))
    }

    pub fn list_trees(&self, repo: &dyn Repository, plot_id: Uuid) -> AppResult<Vec<Tree>> {
        repo.list_trees(plot_id)
    }

    /// Register a sampled tree on a plot
    pub fn register_tree(
        &self,
        repo: &mut dyn Repository,
        input: RegisterTreeInput,
    ) -> AppResult<Tree> {
        input.validate()?;
        validate_not_blank(&input.tag).map_err(|message| AppError::invalid("tag", message))?;
        let plot = repo
            .get_plot(input.plot_id)?
            .ok_or_else(|| AppError::NotFound("Plot".to_string()))?;

        if let Some(declared) = plot.declared_tree_count {
            if plot.aggregates.tree_count >= declared {
                tracing::warn!(
                    plot_id = %plot.id,
                    declared,
                    "Sampling more trees than the plot declares"
                );
            }
        }

        let now = self.clock.now();
        let tree = Tree {
            id: Uuid::new_v4(),
            plot_id: plot.id,
            tag: input.tag.trim().to_string(),
            stem_diameter_mm: input.stem_diameter_mm,
            stem_count: input.stem_count,
            age_years: input.age_years,
            fertilizer_applied: input.fertilizer_applied,
            disease_severity: input.disease_severity,
            yield_estimate_kg: None,
            created_at: now,
            updated_at: now,
        };

        with_transaction(repo, |repo| {
            repo.save_tree(&tree)?;
            self.bus.dispatch(
                repo,
                &CascadeEvent::created(EntityKind::Tree, tree.id, Some(tree.plot_id), &tree),
            )
        })?;

        tracing::info!(
            tree_id = %tree.id,
            plot_id = %tree.plot_id,
            "Tree registered: {}",
            tree.tag
        );
        Ok(tree)
    }

    /// Update a tree's measurements, optionally moving it to another plot of
    /// the same farm. Both plots are recomputed on a move.
    pub fn update_tree(
        &self,
        repo: &mut dyn Repository,
        tree_id: Uuid,
        input: UpdateTreeInput,
    ) -> AppResult<Tree> {
        input.validate()?;
        if let Some(ref tag) = input.tag {
            validate_not_blank(tag).map_err(|message| AppError::invalid("tag", message))?;
        }
        let existing = self.get_tree(repo, tree_id)?;

        if let Some(target_plot_id) = input.plot_id.filter(|id| *id != existing.plot_id) {
            let target = repo
                .get_plot(target_plot_id)?
                .ok_or_else(|| AppError::NotFound("Plot".to_string()))?;
            let source = repo
                .get_plot(existing.plot_id)?
                .ok_or_else(|| AppError::NotFound("Plot".to_string()))?;
            if target.farm_id != source.farm_id {
                return Err(AppError::invalid(
                    "plot_id",
                    "Trees can only move between plots of the same farm",
                ));
            }
        }

        let mut tree = existing.clone();
        if let Some(plot_id) = input.plot_id {
            tree.plot_id = plot_id;
        }
        if let Some(tag) = input.tag {
            tree.tag = tag.trim().to_string();
        }
        tree.stem_diameter_mm = input.stem_diameter_mm.or(existing.stem_diameter_mm);
        tree.stem_count = input.stem_count.or(existing.stem_count);
        tree.age_years = input.age_years.or(existing.age_years);
        tree.fertilizer_applied = input.fertilizer_applied.or(existing.fertilizer_applied);
        tree.disease_severity = input.disease_severity.or(existing.disease_severity);
        tree.updated_at = self.clock.now();

        with_transaction(repo, |repo| {
            repo.save_tree(&tree)?;
            self.bus.dispatch(
                repo,
                &CascadeEvent::updated(
                    EntityKind::Tree,
                    tree_id,
                    Some(tree.plot_id),
                    Some(existing.plot_id),
                    &existing,
                    &tree,
                ),
            )
        })?;

        tracing::info!(%tree_id, plot_id = %tree.plot_id, "Tree updated");
        Ok(tree)
    }

    pub fn remove_tree(&self, repo: &mut dyn Repository, tree_id: Uuid) -> AppResult<()> {
        let tree = self.get_tree(repo, tree_id)?;

        with_transaction(repo, |repo| {
            repo.delete_tree(tree_id)?;
            self.bus.dispatch(
                repo,
                &CascadeEvent::deleted(EntityKind::Tree, tree_id, Some(tree.plot_id), &tree),
            )
        })?;

        tracing::info!(%tree_id, plot_id = %tree.plot_id, "Tree removed");
        Ok(())
    }
}

//! Hybrid yield prediction service
//!
//! Blends a bottom-up estimate from the sampled trees with a top-down
//! estimate from the plot's characteristics, then scales the per-tree
//! estimates so they agree with the blended total.

use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;
use shared::{
    validate_blending_policy, validate_blending_weights, validate_temperature,
    validate_total_trees, BlendingWeights, EnvironmentalFactors, HybridYieldResult,
    PlantingRecord, Plot, Tree, TreeContribution,
};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::PredictionConfig;
use crate::error::{AppError, AppResult};
use crate::external::{AgeEvidence, FarmScoringInput, FarmYieldScorer, TreeYieldScorer};
use crate::store::{with_transaction, Repository};

const DAYS_PER_YEAR: f64 = 365.25;

/// Scale per-tree estimates so that, extrapolated to the declared population,
/// they add up to `final_kg`.
///
/// When every raw estimate is zero the total is shared evenly.
pub fn reconcile(raw_estimates: &[f64], final_kg: f64, declared_total_trees: u32) -> Vec<f64> {
    if raw_estimates.is_empty() || declared_total_trees == 0 {
        return Vec::new();
    }

    let sampled = raw_estimates.len() as f64;
    let declared = f64::from(declared_total_trees);
    let sampled_total: f64 = raw_estimates.iter().sum();

    if sampled_total > 0.0 {
        let scale = final_kg * sampled / (declared * sampled_total);
        raw_estimates.iter().map(|raw| raw * scale).collect()
    } else {
        vec![final_kg / declared; raw_estimates.len()]
    }
}

/// Hybrid yield service
#[derive(Clone)]
pub struct HybridYieldService {
    config: PredictionConfig,
    tree_scorer: Arc<dyn TreeYieldScorer>,
    farm_scorer: Arc<dyn FarmYieldScorer>,
    clock: Arc<dyn Clock>,
}

impl HybridYieldService {
    pub fn new(
        config: PredictionConfig,
        tree_scorer: Arc<dyn TreeYieldScorer>,
        farm_scorer: Arc<dyn FarmYieldScorer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            tree_scorer,
            farm_scorer,
            clock,
        }
    }

    /// Predict a plot's yield from its sampled trees and characteristics.
    ///
    /// A stored prediction still inside the staleness window is returned
    /// unchanged unless `force_recalculate` is set. On success the reconciled
    /// per-tree estimates are written back to the trees and the result is
    /// appended to the plot's history; on error nothing is persisted.
    pub fn predict_hybrid_yield(
        &self,
        repo: &mut dyn Repository,
        plot_id: Uuid,
        total_trees: u32,
        environment: Option<EnvironmentalFactors>,
        force_recalculate: bool,
    ) -> AppResult<HybridYieldResult> {
        validate_total_trees(total_trees)
            .map_err(|message| AppError::invalid("total_trees", message))?;
        if let Some(temperature) = environment.and_then(|env| env.temperature_celsius) {
            validate_temperature(temperature)
                .map_err(|message| AppError::invalid("temperature_celsius", message))?;
        }

        let plot = repo
            .get_plot(plot_id)?
            .ok_or_else(|| AppError::NotFound("Plot".to_string()))?;
        let now = self.clock.now();

        if !force_recalculate {
            if let Some(latest) = repo.latest_prediction(plot_id)? {
                if latest.is_fresh(now, self.config.staleness()) {
                    tracing::debug!(
                        %plot_id,
                        prediction_id = %latest.id,
                        "Returning cached prediction"
                    );
                    return Ok(latest);
                }
            }
        }

        let trees = repo.list_trees(plot_id)?;
        if trees.is_empty() {
            return Err(AppError::ValidationError(
                "Plot has no sampled trees to predict from".to_string(),
            ));
        }
        let sampled_tree_count = u32::try_from(trees.len())
            .map_err(|_| AppError::ValidationError("Too many sampled trees".to_string()))?;
        if sampled_tree_count > total_trees {
            tracing::warn!(
                %plot_id,
                sampled_tree_count,
                total_trees,
                "More trees sampled than declared on the plot"
            );
        }

        // Tree-level estimate
        let scores: Vec<_> = trees.iter().map(|tree| self.tree_scorer.score(tree)).collect();
        let sampled_tree_total_kg: f64 = scores.iter().map(|score| score.estimate_kg).sum();
        let tree_level_estimate_kg =
            sampled_tree_total_kg * f64::from(total_trees) / f64::from(sampled_tree_count);

        let mean_completeness = scores.iter().map(|score| score.completeness).sum::<f64>()
            / f64::from(sampled_tree_count);
        let sample_adequacy = if self.config.sample_saturation == 0 {
            1.0
        } else {
            (f64::from(sampled_tree_count) / f64::from(self.config.sample_saturation)).min(1.0)
        };
        let tree_model_confidence = mean_completeness * sample_adequacy;

        // Farm-level estimate
        let plantings = repo.list_plantings(plot_id)?;
        let resolved = EnvironmentalFactors {
            rainfall_mm: environment
                .and_then(|env| env.rainfall_mm)
                .or(plot.annual_rainfall_mm),
            temperature_celsius: environment
                .and_then(|env| env.temperature_celsius)
                .or(plot.mean_temperature_celsius),
        };
        let farm_input = farm_scoring_input(&plot, &plantings, &trees, total_trees, resolved, now);
        let farm_score = self.farm_scorer.score(&farm_input);

        // Blend
        let policy = self.config.blending_policy();
        validate_blending_policy(&policy)
            .map_err(|message| AppError::Internal(format!("Blending policy: {}", message)))?;
        let weights = BlendingWeights::derive(
            tree_model_confidence,
            farm_score.confidence,
            sampled_tree_count,
            total_trees,
            &policy,
        );
        validate_blending_weights(&weights, &policy)
            .map_err(|message| AppError::ValidationError(message.to_string()))?;

        let hybrid_estimate_kg = weights.blend(tree_level_estimate_kg, farm_score.estimate_kg);
        let overall_confidence = weights.blend(tree_model_confidence, farm_score.confidence);
        if !hybrid_estimate_kg.is_finite() {
            return Err(AppError::ValidationError(
                "Hybrid estimate is not a finite number".to_string(),
            ));
        }

        // Reconcile
        let raw: Vec<f64> = scores.iter().map(|score| score.estimate_kg).collect();
        let reconciled = reconcile(&raw, hybrid_estimate_kg, total_trees);
        let tree_contributions: Vec<TreeContribution> = trees
            .iter()
            .zip(scores.iter())
            .zip(reconciled.iter())
            .map(|((tree, score), reconciled)| TreeContribution {
                tree_id: tree.id,
                raw_estimate_kg: score.estimate_kg,
                reconciled_estimate_kg: *reconciled,
                completeness: score.completeness,
            })
            .collect();

        let result = HybridYieldResult {
            id: Uuid::new_v4(),
            plot_id,
            sampled_tree_total_kg,
            tree_level_estimate_kg,
            farm_level_estimate_kg: farm_score.estimate_kg,
            hybrid_estimate_kg,
            tree_model_confidence,
            farm_model_confidence: farm_score.confidence,
            overall_confidence,
            blending_weight_tree: weights.tree,
            blending_weight_farm: weights.farm,
            sampled_tree_count,
            declared_total_trees: total_trees,
            environment: resolved,
            farm_factors: farm_score.factors,
            tree_contributions,
            calculated_at: now,
        };

        with_transaction(repo, |repo| {
            for (tree, contribution) in trees.iter().zip(result.tree_contributions.iter()) {
                let mut tree = tree.clone();
                tree.yield_estimate_kg = Some(contribution.reconciled_estimate_kg);
                tree.updated_at = now;
                repo.save_tree(&tree)?;
            }
            repo.append_prediction(&result)
        })?;

        tracing::info!(
            %plot_id,
            prediction_id = %result.id,
            tree_weight = result.blending_weight_tree,
            confidence = result.overall_confidence,
            "Hybrid yield predicted: {:.2} kg (tree {:.2} kg, farm {:.2} kg)",
            result.hybrid_estimate_kg,
            result.tree_level_estimate_kg,
            result.farm_level_estimate_kg
        );
        Ok(result)
    }

    /// Newest prediction for a plot, if any
    pub fn get_latest_prediction(
        &self,
        repo: &dyn Repository,
        plot_id: Uuid,
    ) -> AppResult<Option<HybridYieldResult>> {
        repo.latest_prediction(plot_id)
    }

    /// Every prediction for a plot, newest first
    pub fn prediction_history(
        &self,
        repo: &dyn Repository,
        plot_id: Uuid,
    ) -> AppResult<Vec<HybridYieldResult>> {
        repo.list_predictions(plot_id)
    }
}

fn farm_scoring_input(
    plot: &Plot,
    plantings: &[PlantingRecord],
    trees: &[Tree],
    total_trees: u32,
    environment: EnvironmentalFactors,
    now: chrono::DateTime<chrono::Utc>,
) -> FarmScoringInput {
    let latest_planting = plantings.iter().max_by_key(|planting| planting.planted_date);

    FarmScoringInput {
        area_hectares: plot.area_hectares.and_then(|area| area.to_f64()),
        variety: plot
            .variety
            .clone()
            .or_else(|| latest_planting.map(|planting| planting.variety.clone())),
        tree_count: Some(total_trees),
        age: age_evidence(latest_planting, trees, now),
        rainfall_mm: environment.rainfall_mm,
        temperature_celsius: environment.temperature_celsius,
    }
}

fn age_evidence(
    latest_planting: Option<&PlantingRecord>,
    trees: &[Tree],
    now: chrono::DateTime<chrono::Utc>,
) -> AgeEvidence {
    if let Some(planting) = latest_planting {
        let days = (now.date_naive() - planting.planted_date).num_days().max(0);
        return AgeEvidence::Recorded(days as f64 / DAYS_PER_YEAR);
    }

    let ages: Vec<f64> = trees.iter().filter_map(|tree| tree.age_years).collect();
    if ages.is_empty() {
        AgeEvidence::Unknown
    } else {
        AgeEvidence::Inferred(ages.iter().sum::<f64>() / ages.len() as f64)
    }
}

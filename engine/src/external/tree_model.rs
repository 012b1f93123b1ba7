//! Heuristic per-tree yield model

use shared::{DiseaseSeverity, Tree};

use super::{TreeScore, TreeYieldScorer};
use crate::config::TreeModelConfig;

const MEASUREMENT_FIELDS: f64 = 5.0;

/// Scores a bush relative to a reference bush.
///
/// Diameter, stem count and age each contribute a factor `value / reference`
/// clamped to `[min_factor, max_factor]`; a missing measurement counts as
/// the reference value.
#[derive(Debug, Clone)]
pub struct HeuristicTreeScorer {
    config: TreeModelConfig,
}

impl HeuristicTreeScorer {
    pub fn new(config: TreeModelConfig) -> Self {
        Self { config }
    }

    fn factor(&self, value: Option<f64>, reference: f64) -> f64 {
        match value {
            Some(value) if reference > 0.0 && value.is_finite() => {
                (value / reference).clamp(self.config.min_factor, self.config.max_factor)
            }
            _ => 1.0,
        }
    }

    fn disease_multiplier(&self, severity: Option<DiseaseSeverity>) -> f64 {
        match severity {
            Some(DiseaseSeverity::Mild) => self.config.mild_disease_multiplier,
            Some(DiseaseSeverity::Severe) => self.config.severe_disease_multiplier,
            Some(DiseaseSeverity::None) | None => 1.0,
        }
    }
}

impl Default for HeuristicTreeScorer {
    fn default() -> Self {
        Self::new(TreeModelConfig::default())
    }
}

impl TreeYieldScorer for HeuristicTreeScorer {
    fn score(&self, tree: &Tree) -> TreeScore {
        let config = &self.config;

        let mut estimate_kg = config.base_yield_kg
            * self.factor(tree.stem_diameter_mm, config.reference_diameter_mm)
            * self.factor(tree.stem_count.map(f64::from), config.reference_stem_count)
            * self.factor(tree.age_years, config.reference_age_years);

        if tree.fertilizer_applied == Some(true) {
            estimate_kg *= config.fertilizer_multiplier;
        }
        estimate_kg *= self.disease_multiplier(tree.disease_severity);

        TreeScore {
            estimate_kg,
            completeness: tree.recorded_measurements() as f64 / MEASUREMENT_FIELDS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn tree() -> Tree {
        let now = Utc::now();
        Tree {
            id: Uuid::new_v4(),
            plot_id: Uuid::new_v4(),
            tag: "T-1".to_string(),
            stem_diameter_mm: None,
            stem_count: None,
            age_years: None,
            fertilizer_applied: None,
            disease_severity: None,
            yield_estimate_kg: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_unmeasured_tree_scores_as_reference() {
        let score = HeuristicTreeScorer::default().score(&tree());
        assert!((score.estimate_kg - 0.6).abs() < 1e-12);
        assert_eq!(score.completeness, 0.0);
    }

    #[test]
    fn test_measurements_scale_the_estimate() {
        let mut tree = tree();
        tree.stem_diameter_mm = Some(40.0);
        tree.stem_count = Some(3);
        tree.age_years = Some(4.0);
        tree.fertilizer_applied = Some(false);
        tree.disease_severity = Some(DiseaseSeverity::None);

        let score = HeuristicTreeScorer::default().score(&tree);
        // 0.6 * 40/45 * 3/4 * 1
        assert!((score.estimate_kg - 0.4).abs() < 1e-12);
        assert_eq!(score.completeness, 1.0);
    }

    #[test]
    fn test_factors_are_capped() {
        let mut huge = tree();
        huge.stem_diameter_mm = Some(450.0);
        let score = HeuristicTreeScorer::default().score(&huge);
        assert!((score.estimate_kg - 1.2).abs() < 1e-12);

        let mut tiny = tree();
        tiny.stem_diameter_mm = Some(1.0);
        let score = HeuristicTreeScorer::default().score(&tiny);
        assert!((score.estimate_kg - 0.15).abs() < 1e-12);
    }

    #[test]
    fn test_fertilizer_and_disease_multipliers() {
        let scorer = HeuristicTreeScorer::default();

        let mut fertilized = tree();
        fertilized.fertilizer_applied = Some(true);
        assert!((scorer.score(&fertilized).estimate_kg - 0.69).abs() < 1e-12);

        let mut mild = tree();
        mild.disease_severity = Some(DiseaseSeverity::Mild);
        assert!((scorer.score(&mild).estimate_kg - 0.54).abs() < 1e-12);

        let mut severe = tree();
        severe.fertilizer_applied = Some(true);
        severe.disease_severity = Some(DiseaseSeverity::Severe);
        assert!((scorer.score(&severe).estimate_kg - 0.6 * 1.15 * 0.7).abs() < 1e-12);
    }
}

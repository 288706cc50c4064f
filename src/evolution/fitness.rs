//! Fitness evaluation interface.
//!
//! The engine never scores genomes itself. An evaluator returns a map of
//! named metrics and owns the policy that folds them into one scalar.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::schema::{Genome, MetricMap};

/// Failure to evaluate a single genome.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EvaluationError {
    #[error("Evaluation of {genome} failed: {reason}")]
    Failed { genome: String, reason: String },
    #[error("Evaluator returned no metrics for {0}")]
    NoMetrics(String),
}

/// Scores genomes.
///
/// `evaluate_fitness` must be a function of genome content only; the engine
/// may evaluate many genomes concurrently.
pub trait FitnessEvaluator: Send + Sync {
    /// Compute named metrics for a genome.
    fn evaluate_fitness(
        &self,
        genome: &Genome,
    ) -> impl Future<Output = Result<MetricMap, EvaluationError>> + Send;

    /// Fold metrics into one comparable scalar.
    fn aggregate_fitness(&self, metrics: &MetricMap) -> f32;
}

/// Metric weights for a weighted-mean aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricWeights {
    pub weights: Vec<(String, f32)>,
}

impl MetricWeights {
    /// Weighted mean of the metrics present in `weights`; missing metrics
    /// count as zero.
    pub fn aggregate(&self, metrics: &MetricMap) -> f32 {
        let total_weight: f32 = self.weights.iter().map(|(_, w)| w).sum();
        let combined: f32 = self
            .weights
            .iter()
            .map(|(name, w)| metrics.get(name).copied().unwrap_or(0.0) * w)
            .sum();
        combined / total_weight.max(1e-6)
    }
}

impl Default for MetricWeights {
    fn default() -> Self {
        Self {
            weights: vec![
                ("connectivity".to_string(), 1.0),
                ("expressiveness".to_string(), 1.0),
                ("efficiency".to_string(), 0.5),
                ("coherence".to_string(), 0.5),
                ("balance".to_string(), 0.5),
            ],
        }
    }
}

/// Reference evaluator that rewards well-connected, pattern-rich grammars
/// that stay small. Every metric lies in [0, 1).
#[derive(Debug, Clone, Default)]
pub struct StructuralEvaluator {
    pub weights: MetricWeights,
    /// Node count beyond which efficiency falls to zero.
    pub node_budget: Option<usize>,
}

impl StructuralEvaluator {
    pub fn new(weights: MetricWeights) -> Self {
        Self {
            weights,
            node_budget: None,
        }
    }

    /// Compute metrics synchronously.
    pub fn metrics(&self, genome: &Genome) -> MetricMap {
        let s = &genome.structure;
        let nodes = s.nodes.len() as f32;
        let budget = self.node_budget.unwrap_or(20) as f32;

        // Saturating ratio: 0 at zero, approaches 1.
        let saturate = |x: f32| x / (1.0 + x);

        let connectivity = if nodes > 0.0 {
            saturate(s.edges.len() as f32 / nodes)
        } else {
            0.0
        };

        let pattern_score: f32 = s
            .patterns
            .iter()
            .map(|p| p.applicability * p.recursion_depth.min(4) as f32 / 4.0)
            .sum();
        let expressiveness = saturate(pattern_score);

        let efficiency = (1.0 - nodes / budget).clamp(0.0, 0.99);

        let coherence = if s.edges.is_empty() {
            0.0
        } else {
            0.99 * s.edges.iter().map(|e| e.weight).sum::<f32>() / s.edges.len() as f32
        };

        let norms: Vec<f32> = genome.parameters.tensors().iter().map(|t| t.norm()).collect();
        let mean = norms.iter().sum::<f32>() / norms.len() as f32;
        let spread = norms.iter().map(|n| (n - mean).abs()).sum::<f32>() / norms.len() as f32;
        let balance = 1.0 / (1.0 + spread + (mean - 1.0).abs());

        [
            ("connectivity", connectivity),
            ("expressiveness", expressiveness),
            ("efficiency", efficiency),
            ("coherence", coherence),
            ("balance", balance.min(0.99)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }
}

impl FitnessEvaluator for StructuralEvaluator {
    async fn evaluate_fitness(&self, genome: &Genome) -> Result<MetricMap, EvaluationError> {
        Ok(self.metrics(genome))
    }

    fn aggregate_fitness(&self, metrics: &MetricMap) -> f32 {
        self.weights.aggregate(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolution::rng::{GenomeRng, random_genome};
    use crate::schema::{
        EdgeType, GenomeConstraints, GenomeOrigin, GrammarEdge, GrammarPrimitive, IdSequence,
    };

    fn genome() -> Genome {
        let mut rng = GenomeRng::new(11);
        let mut ids = IdSequence::new();
        random_genome(
            &mut rng,
            ids.next_id(0, GenomeOrigin::Random),
            &[GrammarPrimitive::new("p", "noun", 1.0)],
            &GenomeConstraints::default(),
        )
    }

    #[test]
    fn test_weighted_aggregate() {
        let weights = MetricWeights {
            weights: vec![("a".to_string(), 1.0), ("b".to_string(), 3.0)],
        };
        let metrics: MetricMap = [("a".to_string(), 1.0), ("b".to_string(), 0.0)]
            .into_iter()
            .collect();
        assert!((weights.aggregate(&metrics) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_custom_weights_select_metrics() {
        let evaluator = StructuralEvaluator::new(MetricWeights {
            weights: vec![("expressiveness".to_string(), 1.0)],
        });
        let metrics = evaluator.metrics(&genome());

        assert_eq!(evaluator.aggregate_fitness(&metrics), metrics["expressiveness"]);
    }

    #[test]
    fn test_structural_metrics_in_unit_range() {
        let evaluator = StructuralEvaluator::default();
        let metrics = evaluator.metrics(&genome());

        assert_eq!(metrics.len(), 5);
        for (name, value) in &metrics {
            assert!((0.0..1.0).contains(value), "{} = {}", name, value);
        }
        assert!(evaluator.aggregate_fitness(&metrics) < 1.0);
    }

    #[test]
    fn test_edges_raise_connectivity() {
        let evaluator = StructuralEvaluator::default();
        let mut g = genome();
        let before = evaluator.metrics(&g)["connectivity"];

        g.structure.edges.push(GrammarEdge {
            id: 0,
            source: 0,
            target: 1,
            weight: 0.8,
            edge_type: EdgeType::Semantic,
        });
        let after = evaluator.metrics(&g)["connectivity"];
        assert!(after > before);
    }

    #[test]
    fn test_async_evaluation() {
        let evaluator = StructuralEvaluator::default();
        let g = genome();
        let metrics = pollster::block_on(evaluator.evaluate_fitness(&g)).unwrap();
        assert_eq!(metrics, evaluator.metrics(&g));
    }
}

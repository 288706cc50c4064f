//! Per-generation statistics and run outcome types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Statistics recorded once per generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionStats {
    pub generation: usize,
    pub population_size: usize,
    /// Mean pairwise dissimilarity (1 - similarity) across the population.
    pub diversity: f32,
    /// Fitness summaries exclude genomes whose evaluation failed.
    pub average_fitness: f32,
    pub best_fitness: f32,
    pub worst_fitness: f32,
    /// Change in best fitness since the previous generation.
    pub convergence_rate: f32,
    /// Generations since the best-ever fitness last improved.
    pub stagnation_count: usize,
    pub fitness_variance: f32,
    /// Structural mutation rate in effect.
    pub mutation_rate: f32,
    /// Adaptive parametric mutation strength in effect.
    pub mutation_strength: f32,
    pub crossover_rate: f32,
    /// Heuristic observations about this generation.
    pub insights: Vec<Insight>,
}

/// Heuristic labels attached to a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Insight {
    /// Population has collapsed onto near-identical genomes.
    LowDiversity,
    /// Population is spread widely across the search space.
    HighDiversity,
    /// Best fitness improved noticeably this generation.
    RapidImprovement,
    /// Best fitness has not improved for several generations.
    Stagnating,
    /// Fitness values are nearly identical across the population.
    Converged,
    /// Some evaluations failed this generation.
    EvaluationFailures,
}

impl Insight {
    pub fn label(self) -> &'static str {
        match self {
            Self::LowDiversity => "low diversity: population collapsing",
            Self::HighDiversity => "high diversity: broad exploration",
            Self::RapidImprovement => "rapid improvement in best fitness",
            Self::Stagnating => "stagnating: no recent improvement",
            Self::Converged => "converged: fitness variance near zero",
            Self::EvaluationFailures => "evaluator failures in population",
        }
    }
}

impl fmt::Display for Insight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Reason evolution stopped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    /// Reached maximum generations.
    MaxGenerations,
    /// Reached target fitness.
    TargetReached,
    /// Best fitness flat across the stagnation window.
    Stagnation,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::MaxGenerations => "maximum generations reached",
            Self::TargetReached => "fitness threshold reached",
            Self::Stagnation => "stagnation limit hit",
        };
        f.write_str(text)
    }
}

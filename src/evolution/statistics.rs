//! Per-generation diagnostics and insight heuristics.

use crate::schema::{EvolutionParams, EvolutionStats, Genome, Insight};

use super::diversity::population_diversity;

/// Diversity below this is flagged as collapsing.
const LOW_DIVERSITY: f32 = 0.1;
/// Diversity above this is flagged as broad exploration.
const HIGH_DIVERSITY: f32 = 0.6;
/// Best-fitness gain per generation flagged as rapid.
const RAPID_IMPROVEMENT: f32 = 0.05;
/// Generations without improvement before flagging stagnation.
const STAGNATION_GENERATIONS: usize = 5;
/// Variance below this is flagged as converged.
const CONVERGED_VARIANCE: f32 = 1e-6;

/// Inputs for one statistics record beyond the population itself.
#[derive(Debug, Clone, Copy)]
pub struct GenerationContext<'a> {
    pub generation: usize,
    pub params: &'a EvolutionParams,
    /// Best-ever fitness after this generation.
    pub best_ever: f32,
    pub mutation_strength: f32,
}

/// Summarize a population into a statistics record.
///
/// Fitness summaries only cover genomes that evaluated successfully.
pub fn compute_stats(
    population: &[Genome],
    history: &[EvolutionStats],
    ctx: GenerationContext<'_>,
) -> EvolutionStats {
    let fitness: Vec<f32> = population
        .iter()
        .filter(|g| g.is_viable())
        .map(|g| g.fitness)
        .collect();
    let failures = population.len() - fitness.len();

    let (average, best, worst, variance) = if fitness.is_empty() {
        (0.0, 0.0, 0.0, 0.0)
    } else {
        let n = fitness.len() as f32;
        let average = fitness.iter().sum::<f32>() / n;
        let best = fitness.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let worst = fitness.iter().copied().fold(f32::INFINITY, f32::min);
        let variance = fitness.iter().map(|f| (f - average).powi(2)).sum::<f32>() / n;
        (average, best, worst, variance)
    };

    let previous = history.last();
    let convergence_rate = previous.map(|p| best - p.best_fitness).unwrap_or(0.0);

    let best_ever = if ctx.best_ever.is_finite() {
        ctx.best_ever
    } else {
        best
    };
    let stagnation_count = match previous {
        Some(p) if best_ever <= best_ever_before(history) => p.stagnation_count + 1,
        _ => 0,
    };

    let diversity = population_diversity(population);

    let mut stats = EvolutionStats {
        generation: ctx.generation,
        population_size: population.len(),
        diversity,
        average_fitness: average,
        best_fitness: best,
        worst_fitness: worst,
        convergence_rate,
        stagnation_count,
        fitness_variance: variance,
        mutation_rate: ctx.params.mutation.structural_rate,
        mutation_strength: ctx.mutation_strength,
        crossover_rate: ctx.params.crossover_rate,
        insights: Vec::new(),
    };
    stats.insights = derive_insights(&stats, failures);
    stats
}

/// Highest best-of-generation fitness in the history.
fn best_ever_before(history: &[EvolutionStats]) -> f32 {
    history
        .iter()
        .map(|s| s.best_fitness)
        .fold(f32::NEG_INFINITY, f32::max)
}

/// Heuristic labels for a statistics record.
pub fn derive_insights(stats: &EvolutionStats, failures: usize) -> Vec<Insight> {
    let mut insights = Vec::new();

    if stats.population_size > 1 {
        if stats.diversity < LOW_DIVERSITY {
            insights.push(Insight::LowDiversity);
        } else if stats.diversity > HIGH_DIVERSITY {
            insights.push(Insight::HighDiversity);
        }
    }
    if stats.convergence_rate > RAPID_IMPROVEMENT {
        insights.push(Insight::RapidImprovement);
    }
    if stats.stagnation_count >= STAGNATION_GENERATIONS {
        insights.push(Insight::Stagnating);
    }
    if stats.population_size > 1 && stats.fitness_variance < CONVERGED_VARIANCE {
        insights.push(Insight::Converged);
    }
    if failures > 0 {
        insights.push(Insight::EvaluationFailures);
    }

    insights
}

//! Self-tuning of the search rates.
//!
//! Two independent controls: a periodic adjustment of the mutation and
//! crossover rates, and a per-generation mutation strength derived from the
//! recent fitness trend.

use log::info;

use crate::schema::{EvolutionParams, EvolutionStats};

/// Average improvement below this counts as stagnation.
pub const STAGNATION_IMPROVEMENT: f32 = 0.001;
/// Average improvement above this counts as fast progress.
pub const FAST_IMPROVEMENT: f32 = 0.01;

pub const MUTATION_RATE_BOUNDS: (f32, f32) = (0.01, 0.5);
pub const CROSSOVER_RATE_BOUNDS: (f32, f32) = (0.1, 0.9);

/// Direction of a meta-optimizer adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateAdjustment {
    /// Raise mutation, lower crossover.
    Explore,
    /// Lower mutation, raise crossover.
    Exploit,
    Unchanged,
}

/// Mean per-generation change of average fitness over the last `window`
/// records. `None` with fewer than two usable records.
pub fn average_improvement(history: &[EvolutionStats], window: usize) -> Option<f32> {
    let recent = &history[history.len().saturating_sub(window)..];
    let first = recent.first()?;
    let last = recent.last()?;
    if recent.len() < 2 || !first.average_fitness.is_finite() || !last.average_fitness.is_finite()
    {
        return None;
    }
    Some((last.average_fitness - first.average_fitness) / (recent.len() - 1) as f32)
}

/// Adjust rates in `params` from the recent history.
pub fn meta_optimize(params: &mut EvolutionParams, history: &[EvolutionStats]) -> RateAdjustment {
    let Some(improvement) = average_improvement(history, params.schedule.meta_window) else {
        return RateAdjustment::Unchanged;
    };

    let (mutation_factor, crossover_factor, adjustment) = if improvement < STAGNATION_IMPROVEMENT {
        (1.1, 0.9, RateAdjustment::Explore)
    } else if improvement > FAST_IMPROVEMENT {
        (0.9, 1.1, RateAdjustment::Exploit)
    } else {
        return RateAdjustment::Unchanged;
    };

    let (lo, hi) = MUTATION_RATE_BOUNDS;
    let mutation = &mut params.mutation;
    mutation.structural_rate = (mutation.structural_rate * mutation_factor).clamp(lo, hi);
    mutation.parametric_rate = (mutation.parametric_rate * mutation_factor).clamp(lo, hi);

    let (lo, hi) = CROSSOVER_RATE_BOUNDS;
    params.crossover_rate = (params.crossover_rate * crossover_factor).clamp(lo, hi);

    info!(
        "meta-optimizer: {:?} (improvement {:.5}) -> structural {:.3}, parametric {:.3}, crossover {:.3}",
        adjustment,
        improvement,
        params.mutation.structural_rate,
        params.mutation.parametric_rate,
        params.crossover_rate
    );

    adjustment
}

/// Parametric mutation strength for the next generation.
///
/// Improving trend shrinks the step, a declining trend widens it, and a flat
/// trend widens it slightly. Without enough history the base rate is used.
pub fn adaptive_mutation_strength(base_rate: f32, history: &[EvolutionStats], window: usize) -> f32 {
    match average_improvement(history, window) {
        Some(trend) if trend > FAST_IMPROVEMENT => base_rate * 0.8,
        Some(trend) if trend < -FAST_IMPROVEMENT => base_rate * 1.3,
        Some(_) => base_rate * 1.1,
        None => base_rate,
    }
}

//! Parent and survivor selection.

use std::cmp::Ordering;

use crate::schema::{Genome, SelectionMethod};

use super::diversity::maintains_diversity;
use super::rng::GenomeRng;

/// Descending fitness order with non-finite values last.
pub fn by_fitness_desc(a: &Genome, b: &Genome) -> Ordering {
    match (a.is_viable(), b.is_viable()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => b.fitness.total_cmp(&a.fitness),
    }
}

/// Sort genomes fittest first.
pub fn sort_by_fitness(genomes: &mut [Genome]) {
    genomes.sort_by(by_fitness_desc);
}

/// Tournament size for a population of `n`.
pub fn tournament_size(n: usize) -> usize {
    (n / 10).max(2)
}

/// Select `count` parents.
///
/// `population` must be sorted fittest first. The top
/// `floor(count * elite_ratio)` viable genomes are always included; the rest
/// are drawn with `method`. `front` is only consulted by Pareto selection.
pub fn select_parents<'a>(
    population: &'a [Genome],
    front: &'a [Genome],
    method: SelectionMethod,
    elite_ratio: f32,
    count: usize,
    rng: &mut GenomeRng,
) -> Vec<&'a Genome> {
    let mut parents = Vec::with_capacity(count);
    if population.is_empty() {
        return parents;
    }

    let elite_count = ((count as f32 * elite_ratio).floor() as usize).min(count);
    parents.extend(
        population
            .iter()
            .filter(|g| g.is_viable())
            .take(elite_count),
    );

    let remaining = count - parents.len();
    match method {
        SelectionMethod::Tournament => {
            parents.extend((0..remaining).map(|_| tournament(population, rng)));
        }
        SelectionMethod::Roulette => {
            let weights: Vec<f32> = population
                .iter()
                .map(|g| if g.is_viable() { g.fitness.max(0.0) } else { 0.0 })
                .collect();
            for _ in 0..remaining {
                // All-zero weights: no fitness signal, draw uniformly.
                let idx = match rng.weighted_index(&weights) {
                    Some(idx) => idx,
                    None => rng.index(population.len()),
                };
                parents.push(&population[idx]);
            }
        }
        SelectionMethod::Rank => {
            for _ in 0..remaining {
                parents.push(&population[rank_index(population.len(), rng)]);
            }
        }
        SelectionMethod::Pareto => {
            let from_front = remaining.min(front.len());
            parents.extend(front.iter().take(from_front));
            parents.extend((from_front..remaining).map(|_| tournament(population, rng)));
        }
    }

    parents
}

/// Fittest of a uniformly sampled tournament.
fn tournament<'a>(population: &'a [Genome], rng: &mut GenomeRng) -> &'a Genome {
    let size = tournament_size(population.len());
    let mut best = &population[rng.index(population.len())];
    for _ in 1..size {
        let contender = &population[rng.index(population.len())];
        if by_fitness_desc(contender, best) == Ordering::Less {
            best = contender;
        }
    }
    best
}

/// Quadratically biased rank: `floor(r^2 / n)` for uniform `r` in `[0, n)`.
fn rank_index(n: usize, rng: &mut GenomeRng) -> usize {
    let r = rng.index(n);
    (r * r / n).min(n - 1)
}

/// Environmental selection over the merged parent and offspring pool.
///
/// The fittest viable genome always survives. Further candidates are taken in
/// fitness order when they are no more than `threshold` similar to every
/// survivor so far; if that leaves slots open, the diversity filter is
/// dropped and the next-best remaining candidates fill them. Genomes whose
/// evaluation failed never survive, so the result can be shorter than
/// `target`.
pub fn select_survivors(mut pool: Vec<Genome>, target: usize, threshold: f32) -> Vec<Genome> {
    pool.retain(Genome::is_viable);
    sort_by_fitness(&mut pool);

    let mut survivors: Vec<Genome> = Vec::with_capacity(target);
    let mut skipped = Vec::new();

    for candidate in pool {
        if survivors.len() >= target {
            break;
        }
        if survivors.is_empty() || maintains_diversity(&candidate, &survivors, threshold) {
            survivors.push(candidate);
        } else {
            skipped.push(candidate);
        }
    }

    let shortfall = target.saturating_sub(survivors.len());
    survivors.extend(skipped.into_iter().take(shortfall));
    sort_by_fitness(&mut survivors);
    survivors
}

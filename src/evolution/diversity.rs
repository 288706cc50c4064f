//! Genome similarity and diversity maintenance.

use crate::schema::Genome;
use crate::tensor::cosine_similarity;

/// Similarity of graph sizes in [0, 1].
pub fn structural_similarity(a: &Genome, b: &Genome) -> f32 {
    let normalized_diff = |x: usize, y: usize| {
        let max = x.max(y);
        if max == 0 {
            0.0
        } else {
            x.abs_diff(y) as f32 / max as f32
        }
    };

    let diff = (normalized_diff(a.node_count(), b.node_count())
        + normalized_diff(a.edge_count(), b.edge_count())
        + normalized_diff(a.pattern_count(), b.pattern_count()))
        / 3.0;

    (1.0 - diff).max(0.0)
}

/// Mean cosine similarity of the four parameter tensors.
pub fn parametric_similarity(a: &Genome, b: &Genome) -> f32 {
    let total: f32 = a
        .parameters
        .tensors()
        .iter()
        .zip(b.parameters.tensors())
        .map(|(x, y)| cosine_similarity(x, y))
        .sum();
    total / 4.0
}

/// Overall similarity in [0, 1]; symmetric in its arguments.
pub fn similarity(a: &Genome, b: &Genome) -> f32 {
    ((structural_similarity(a, b) + parametric_similarity(a, b)) / 2.0).clamp(0.0, 1.0)
}

/// True if `candidate` is no more than `threshold` similar to every retained
/// genome.
pub fn maintains_diversity(candidate: &Genome, retained: &[Genome], threshold: f32) -> bool {
    retained
        .iter()
        .all(|other| similarity(candidate, other) <= threshold)
}

/// Mean pairwise dissimilarity, 0 for fewer than two genomes.
pub fn population_diversity(genomes: &[Genome]) -> f32 {
    if genomes.len() < 2 {
        return 0.0;
    }

    let mut total = 0.0f32;
    let mut count = 0;
    for i in 0..genomes.len() {
        for j in (i + 1)..genomes.len() {
            total += 1.0 - similarity(&genomes[i], &genomes[j]);
            count += 1;
        }
    }
    total / count as f32
}

/// Drop genomes that are too similar to an earlier one.
///
/// Scans pairs in index order and removes the later genome of every pair above
/// `threshold`. Earlier genomes always win, so with a fitness-sorted input the
/// fitter of two near-duplicates survives; with any other order the result
/// depends on position. Returns the number of genomes removed.
pub fn maintain_diversity(genomes: &mut Vec<Genome>, threshold: f32) -> usize {
    let before = genomes.len();
    let mut i = 0;
    while i < genomes.len() {
        let mut j = i + 1;
        while j < genomes.len() {
            if similarity(&genomes[i], &genomes[j]) > threshold {
                genomes.remove(j);
            } else {
                j += 1;
            }
        }
        i += 1;
    }
    before - genomes.len()
}

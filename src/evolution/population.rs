//! Population manager: current generation, best-ever genome and the Pareto
//! front approximation.

use std::collections::HashSet;

use crate::schema::Genome;

use super::selection::sort_by_fitness;

/// Upper bound on Pareto front members.
pub const MAX_FRONT_SIZE: usize = 10;

/// Front size for a population of `size`: ten percent rounded up, at least
/// one and at most [`MAX_FRONT_SIZE`].
pub fn front_size(size: usize) -> usize {
    size.div_ceil(10).clamp(1, MAX_FRONT_SIZE)
}

/// Current generation plus derived views.
#[derive(Debug, Clone, Default)]
pub struct Population {
    genomes: Vec<Genome>,
    best: Option<Genome>,
    front: Vec<Genome>,
    front_capacity: usize,
}

impl Population {
    /// Build from evaluated genomes and initialize the derived views.
    pub fn new(mut genomes: Vec<Genome>, target_size: usize) -> Self {
        sort_by_fitness(&mut genomes);
        let mut population = Self {
            genomes,
            best: None,
            front: Vec::new(),
            front_capacity: front_size(target_size),
        };
        population.refresh();
        population
    }

    /// Replace the whole generation and refresh best/front.
    pub fn replace(&mut self, mut genomes: Vec<Genome>) {
        sort_by_fitness(&mut genomes);
        self.genomes = genomes;
        self.refresh();
    }

    /// Genomes of the current generation, fittest first.
    pub fn genomes(&self) -> &[Genome] {
        &self.genomes
    }

    pub fn len(&self) -> usize {
        self.genomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genomes.is_empty()
    }

    /// Best genome ever seen.
    pub fn best(&self) -> Option<&Genome> {
        self.best.as_ref()
    }

    pub fn best_fitness(&self) -> f32 {
        self.best
            .as_ref()
            .map(|g| g.fitness)
            .unwrap_or(f32::NEG_INFINITY)
    }

    /// Pareto front approximation, fittest first.
    pub fn front(&self) -> &[Genome] {
        &self.front
    }

    /// Take the genomes out for in-place editing; pair with [`Self::replace`].
    pub fn take(&mut self) -> Vec<Genome> {
        std::mem::take(&mut self.genomes)
    }

    fn refresh(&mut self) {
        if let Some(top) = self.genomes.first().filter(|g| g.is_viable())
            && top.fitness > self.best_fitness()
        {
            self.best = Some(top.clone());
        }
        self.update_front();
    }

    /// Merge the current top genomes into the front, keeping the fittest
    /// distinct members up to capacity.
    fn update_front(&mut self) {
        let mut merged: Vec<Genome> = self
            .front
            .drain(..)
            .chain(
                self.genomes
                    .iter()
                    .filter(|g| g.is_viable())
                    .take(self.front_capacity)
                    .cloned(),
            )
            .collect();
        sort_by_fitness(&mut merged);

        let mut seen = HashSet::new();
        merged.retain(|g| seen.insert(g.id));
        merged.truncate(self.front_capacity);
        self.front = merged;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolution::rng::{GenomeRng, random_genome};
    use crate::schema::{GenomeConstraints, GenomeOrigin, GrammarPrimitive, IdSequence};

    fn genomes(fitness: &[f32], ids: &mut IdSequence) -> Vec<Genome> {
        let mut rng = GenomeRng::new(1);
        let prims = vec![GrammarPrimitive::new("p", "noun", 1.0)];
        fitness
            .iter()
            .map(|&f| {
                let mut g = random_genome(
                    &mut rng,
                    ids.next_id(0, GenomeOrigin::Random),
                    &prims,
                    &GenomeConstraints::default(),
                );
                g.fitness = f;
                g
            })
            .collect()
    }

    #[test]
    fn test_front_size() {
        assert_eq!(front_size(1), 1);
        assert_eq!(front_size(20), 2);
        assert_eq!(front_size(25), 3);
        assert_eq!(front_size(500), 10);
    }

    #[test]
    fn test_new_sorts_and_tracks_best() {
        let mut ids = IdSequence::new();
        let pop = Population::new(genomes(&[0.1, 0.7, 0.3], &mut ids), 3);

        assert_eq!(pop.genomes()[0].fitness, 0.7);
        assert_eq!(pop.best_fitness(), 0.7);
        assert_eq!(pop.front().len(), 1);
    }

    #[test]
    fn test_best_never_regresses() {
        let mut ids = IdSequence::new();
        let mut pop = Population::new(genomes(&[0.5, 0.4], &mut ids), 2);
        let best_id = pop.best().map(|g| g.id);

        pop.replace(genomes(&[0.2, 0.1], &mut ids));
        assert_eq!(pop.best_fitness(), 0.5);
        assert_eq!(pop.best().map(|g| g.id), best_id);

        pop.replace(genomes(&[0.9], &mut ids));
        assert_eq!(pop.best_fitness(), 0.9);
    }

    #[test]
    fn test_front_keeps_fittest_distinct() {
        let mut ids = IdSequence::new();
        let mut pop = Population::new(genomes(&[0.5; 20], &mut ids), 20);
        assert_eq!(pop.front().len(), 2);

        let current = pop.genomes().to_vec();
        pop.replace(current);
        assert_eq!(pop.front().len(), 2);

        pop.replace(genomes(&[0.8, 0.1], &mut ids));
        assert_eq!(pop.front()[0].fitness, 0.8);
        assert_eq!(pop.front()[1].fitness, 0.5);
    }

    #[test]
    fn test_failed_genomes_never_best() {
        let mut ids = IdSequence::new();
        let pop = Population::new(genomes(&[f32::NEG_INFINITY], &mut ids), 1);
        assert!(pop.best().is_none());
        assert!(pop.front().is_empty());
    }
}

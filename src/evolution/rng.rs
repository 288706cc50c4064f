//! Seedable randomness for genome operations.
//!
//! Every random decision the engine makes goes through one `GenomeRng`, so a
//! fixed seed replays a run exactly.

use rand::distributions::WeightedIndex;
use rand::prelude::*;

use crate::schema::{
    Genome, GenomeConstraints, GenomeId, GenomeParameters, GenomeStructure, GrammarNode,
    GrammarPrimitive,
};
use crate::tensor::{ParamTensor, random_tensor};

/// Random number generator wrapper for genome operations.
pub struct GenomeRng {
    rng: StdRng,
}

impl GenomeRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create with random seed.
    pub fn random() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// True with probability `p`.
    pub fn chance(&mut self, p: f32) -> bool {
        self.rng.r#gen::<f32>() < p
    }

    pub fn coin(&mut self) -> bool {
        self.rng.gen_bool(0.5)
    }

    /// Uniform index in `0..len`. `len` must be non-zero.
    pub fn index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }

    /// Uniform integer in the inclusive range.
    pub fn range_inclusive(&mut self, bounds: (usize, usize)) -> usize {
        self.rng.gen_range(bounds.0..=bounds.1)
    }

    /// Uniform float in `[0, 1)`.
    pub fn unit(&mut self) -> f32 {
        self.rng.r#gen()
    }

    /// Uniform float in `[-amount, amount]`.
    pub fn jitter(&mut self, amount: f32) -> f32 {
        self.rng.gen_range(-amount..=amount)
    }

    /// Pick an index with probability proportional to its weight.
    /// Returns `None` when every weight is zero.
    pub fn weighted_index(&mut self, weights: &[f32]) -> Option<usize> {
        let dist = WeightedIndex::new(weights).ok()?;
        Some(dist.sample(&mut self.rng))
    }

    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        items.choose(&mut self.rng)
    }

    /// Sample `amount` distinct items.
    pub fn sample<T: Copy>(&mut self, items: &[T], amount: usize) -> Vec<T> {
        items
            .choose_multiple(&mut self.rng, amount)
            .copied()
            .collect()
    }

    /// Gaussian noise tensor.
    pub fn tensor(&mut self, shape: &[usize], scale: f32) -> ParamTensor {
        random_tensor(shape, scale, &mut self.rng)
    }

    /// Random parameter set with the configured shape and scale.
    pub fn random_parameters(&mut self, constraints: &GenomeConstraints) -> GenomeParameters {
        let shape = &constraints.parameter_shape;
        let scale = constraints.init_scale;
        GenomeParameters {
            complexity: self.tensor(shape, scale),
            expressiveness: self.tensor(shape, scale),
            efficiency: self.tensor(shape, scale),
            adaptability: self.tensor(shape, scale),
        }
    }

    /// Build a node from a primitive.
    pub fn random_node(
        &mut self,
        id: u32,
        primitive: &GrammarPrimitive,
        constraints: &GenomeConstraints,
    ) -> GrammarNode {
        GrammarNode {
            id,
            kind: primitive.kind.clone(),
            activation: (0..constraints.activation_len)
                .map(|_| self.unit())
                .collect(),
            complexity: primitive.complexity,
        }
    }

    /// Random structure with no edges or patterns; node kinds cycle through
    /// the primitives. `primitives` must be non-empty.
    pub fn random_structure(
        &mut self,
        primitives: &[GrammarPrimitive],
        constraints: &GenomeConstraints,
    ) -> GenomeStructure {
        let (min, max) = constraints.initial_nodes;
        let max = max.min(constraints.max_nodes).max(min);
        let count = self.range_inclusive((min, max));

        let nodes = (0..count)
            .map(|i| self.random_node(i as u32, &primitives[i % primitives.len()], constraints))
            .collect();

        GenomeStructure {
            nodes,
            edges: Vec::new(),
            patterns: Vec::new(),
        }
    }
}

/// Random generation-0 style genome, unevaluated.
pub fn random_genome(
    rng: &mut GenomeRng,
    id: GenomeId,
    primitives: &[GrammarPrimitive],
    constraints: &GenomeConstraints,
) -> Genome {
    Genome {
        id,
        primitives: primitives.to_vec(),
        structure: rng.random_structure(primitives, constraints),
        parameters: rng.random_parameters(constraints),
        fitness: 0.0,
        metrics: Default::default(),
        generation: id.generation,
        lineage: Vec::new(),
    }
}

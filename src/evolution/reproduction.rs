//! Crossover and mutation operators.
//!
//! Operators never touch their inputs: every call returns new genomes with
//! fresh ids and lineage pointing at the sources.

use log::debug;

use crate::schema::{
    EdgeType, EvolutionParams, Genome, GenomeId, GenomeOrigin, GenomeParameters, GenomeStructure,
    GrammarEdge, GrammarPattern, GrammarPrimitive, IdSequence,
};
use crate::tensor::{TensorError, add_tensors, blend_tensors};

use super::rng::GenomeRng;

/// Largest number of nodes a freshly added pattern references.
const MAX_PATTERN_NODES: usize = 3;
/// Recursion depth range for new patterns.
const PATTERN_DEPTH: (usize, usize) = (1, 4);
/// Step used when perturbing edge weights and pattern applicability.
const WEIGHT_STEP: f32 = 0.1;

/// Kind of structural edit applied by a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralEdit {
    AddNode,
    RemoveNode,
    AddEdge,
    ModifyEdge,
    AddPattern,
    ModifyPattern,
    /// The chosen edit was impossible for this genome.
    None,
}

/// Breeding context for one generation.
pub struct Reproduction<'a> {
    rng: &'a mut GenomeRng,
    ids: &'a mut IdSequence,
    params: &'a EvolutionParams,
    generation: usize,
    mutation_strength: f32,
}

impl<'a> Reproduction<'a> {
    pub fn new(
        rng: &'a mut GenomeRng,
        ids: &'a mut IdSequence,
        params: &'a EvolutionParams,
        generation: usize,
        mutation_strength: f32,
    ) -> Self {
        Self {
            rng,
            ids,
            params,
            generation,
            mutation_strength,
        }
    }

    /// Produce `count` offspring from an ordered parent pool.
    ///
    /// Consecutive parents form pairs. A pair is crossed over with probability
    /// `crossover_rate`, otherwise each parent is mutated on its own.
    pub fn breed(&mut self, parents: &[&Genome], count: usize) -> Result<Vec<Genome>, TensorError> {
        let mut offspring = Vec::with_capacity(count);
        if parents.is_empty() {
            return Ok(offspring);
        }

        let mut i = 0;
        while offspring.len() < count {
            let a = parents[i % parents.len()];
            let b = parents[(i + 1) % parents.len()];
            i += 2;

            let remaining = count - offspring.len();
            if remaining >= 2 && self.rng.chance(self.params.crossover_rate) {
                offspring.extend(self.crossover(a, b)?);
            } else {
                offspring.push(self.mutate(a)?);
                if remaining >= 2 {
                    offspring.push(self.mutate(b)?);
                }
            }
        }

        Ok(offspring)
    }

    /// Recombine two parents into two complementary children.
    pub fn crossover(&mut self, a: &Genome, b: &Genome) -> Result<[Genome; 2], TensorError> {
        // Primitives: uniform per position, padded to the longer list.
        let len = a.primitives.len().max(b.primitives.len());
        let mut prims_a = Vec::with_capacity(len);
        let mut prims_b = Vec::with_capacity(len);
        for pos in 0..len {
            match (a.primitives.get(pos), b.primitives.get(pos)) {
                (Some(pa), Some(pb)) => {
                    if self.rng.coin() {
                        prims_a.push(pa.clone());
                        prims_b.push(pb.clone());
                    } else {
                        prims_a.push(pb.clone());
                        prims_b.push(pa.clone());
                    }
                }
                (Some(p), None) | (None, Some(p)) => {
                    prims_a.push(p.clone());
                    prims_b.push(p.clone());
                }
                (None, None) => {}
            }
        }

        // Structure: whole-field inheritance, chosen independently per field.
        let nodes_from_a = self.rng.coin();
        let edges_from_a = self.rng.coin();
        let patterns_from_a = self.rng.coin();
        let pick = |from_a: bool| if from_a { (a, b) } else { (b, a) };

        let mut structure_a = GenomeStructure {
            nodes: pick(nodes_from_a).0.structure.nodes.clone(),
            edges: pick(edges_from_a).0.structure.edges.clone(),
            patterns: pick(patterns_from_a).0.structure.patterns.clone(),
        };
        let mut structure_b = GenomeStructure {
            nodes: pick(nodes_from_a).1.structure.nodes.clone(),
            edges: pick(edges_from_a).1.structure.edges.clone(),
            patterns: pick(patterns_from_a).1.structure.patterns.clone(),
        };
        for structure in [&mut structure_a, &mut structure_b] {
            let pruned = structure.prune_dangling();
            if pruned > 0 {
                debug!("crossover pruned {} dangling references", pruned);
            }
        }

        let alpha = self.params.blend_alpha;
        let params_a = a
            .parameters
            .try_zip(&b.parameters, |x, y| blend_tensors(x, y, alpha))?;
        let params_b = b
            .parameters
            .try_zip(&a.parameters, |x, y| blend_tensors(x, y, alpha))?;

        let lineage = vec![a.id, b.id];
        let mut children = [
            self.child(prims_a, structure_a, params_a, lineage.clone()),
            self.child(prims_b, structure_b, params_b, lineage),
        ];

        for child in &mut children {
            if self.rng.chance(self.params.mutation.structural_rate) {
                self.apply_mutation(child)?;
            }
        }

        Ok(children)
    }

    /// Copy `parent` under a fresh id and mutate the copy.
    pub fn mutate(&mut self, parent: &Genome) -> Result<Genome, TensorError> {
        let mut child = Genome {
            id: self.ids.next_id(self.generation, GenomeOrigin::Mutation),
            primitives: parent.primitives.clone(),
            structure: parent.structure.clone(),
            parameters: parent.parameters.clone(),
            fitness: 0.0,
            metrics: Default::default(),
            generation: self.generation,
            lineage: vec![parent.id],
        };
        self.apply_mutation(&mut child)?;
        Ok(child)
    }

    fn child(
        &mut self,
        primitives: Vec<GrammarPrimitive>,
        structure: GenomeStructure,
        parameters: GenomeParameters,
        lineage: Vec<GenomeId>,
    ) -> Genome {
        Genome {
            id: self.ids.next_id(self.generation, GenomeOrigin::Crossover),
            primitives,
            structure,
            parameters,
            fitness: 0.0,
            metrics: Default::default(),
            generation: self.generation,
            lineage,
        }
    }

    /// Structural and parametric mutation of a genome that is not yet part of
    /// any population.
    fn apply_mutation(&mut self, genome: &mut Genome) -> Result<(), TensorError> {
        if self.rng.chance(self.params.mutation.structural_rate) {
            self.structural_edit(genome);
        }

        if self.rng.chance(self.params.mutation.parametric_rate) {
            let strength = self.mutation_strength;
            let rng = &mut *self.rng;
            genome.parameters = genome.parameters.try_map(|t| {
                let noise = rng.tensor(t.shape(), strength);
                add_tensors(t, &noise)
            })?;
        }

        Ok(())
    }

    /// Apply exactly one structural edit, chosen uniformly among node,
    /// edge and pattern edits.
    pub fn structural_edit(&mut self, genome: &mut Genome) -> StructuralEdit {
        let edit = match self.rng.index(3) {
            0 => self.edit_nodes(genome),
            1 => self.edit_edges(&mut genome.structure),
            _ => self.edit_patterns(&mut genome.structure),
        };
        debug_assert!(genome.structure.validate().is_ok());
        edit
    }

    fn edit_nodes(&mut self, genome: &mut Genome) -> StructuralEdit {
        let max_nodes = self.params.constraints.max_nodes;
        let structure = &mut genome.structure;

        if structure.nodes.len() < max_nodes && self.rng.coin() {
            let kind_source = if genome.primitives.is_empty() {
                None
            } else {
                Some(self.rng.index(genome.primitives.len()))
            };
            let id = structure.next_node_id();
            let node = match kind_source {
                Some(idx) => {
                    self.rng
                        .random_node(id, &genome.primitives[idx], &self.params.constraints)
                }
                None => match structure.nodes.first() {
                    Some(template) => {
                        let mut node = template.clone();
                        node.id = id;
                        node
                    }
                    None => return StructuralEdit::None,
                },
            };
            structure.nodes.push(node);
            StructuralEdit::AddNode
        } else if structure.nodes.len() >= 2 {
            let victim = structure.nodes[self.rng.index(structure.nodes.len())].id;
            structure.remove_node(victim);
            StructuralEdit::RemoveNode
        } else {
            StructuralEdit::None
        }
    }

    fn edit_edges(&mut self, structure: &mut GenomeStructure) -> StructuralEdit {
        if structure.edges.is_empty() || self.rng.coin() {
            if structure.nodes.len() < 2 {
                return StructuralEdit::None;
            }
            let ids: Vec<_> = structure.nodes.iter().map(|n| n.id).collect();
            let ends = self.rng.sample(&ids, 2);
            let edge_type = *self.rng.choose(&EdgeType::ALL).unwrap_or(&EdgeType::Semantic);
            structure.edges.push(GrammarEdge {
                id: structure.next_edge_id(),
                source: ends[0],
                target: ends[1],
                weight: self.rng.unit(),
                edge_type,
            });
            StructuralEdit::AddEdge
        } else {
            let idx = self.rng.index(structure.edges.len());
            let delta = self.rng.jitter(WEIGHT_STEP);
            let edge = &mut structure.edges[idx];
            edge.weight = (edge.weight + delta).clamp(0.0, 1.0);
            StructuralEdit::ModifyEdge
        }
    }

    fn edit_patterns(&mut self, structure: &mut GenomeStructure) -> StructuralEdit {
        if structure.patterns.is_empty() || self.rng.coin() {
            if structure.nodes.is_empty() {
                return StructuralEdit::None;
            }
            let ids: Vec<_> = structure.nodes.iter().map(|n| n.id).collect();
            let amount = self.rng.range_inclusive((1, MAX_PATTERN_NODES.min(ids.len())));
            let id = structure.next_pattern_id();
            structure.patterns.push(GrammarPattern {
                id,
                name: format!("pattern-{}", id),
                nodes: self.rng.sample(&ids, amount),
                recursion_depth: self.rng.range_inclusive(PATTERN_DEPTH) as u32,
                applicability: self.rng.unit(),
            });
            StructuralEdit::AddPattern
        } else {
            let idx = self.rng.index(structure.patterns.len());
            let deepen = self.rng.coin();
            let delta = self.rng.jitter(WEIGHT_STEP);
            let pattern = &mut structure.patterns[idx];
            pattern.recursion_depth = if deepen {
                pattern.recursion_depth + 1
            } else {
                pattern.recursion_depth.saturating_sub(1).max(1)
            };
            pattern.applicability = (pattern.applicability + delta).clamp(0.0, 1.0);
            StructuralEdit::ModifyPattern
        }
    }
}

//! Genome types for evolved grammar rules.
//!
//! A genome is a small directed multigraph of grammar nodes plus four
//! parameter tensors. Nodes, edges and patterns live in flat arenas and refer
//! to each other only by id.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tensor::ParamTensor;

/// Named fitness metrics returned by an evaluator.
pub type MetricMap = BTreeMap<String, f32>;

pub type NodeId = u32;
pub type EdgeId = u32;
pub type PatternId = u32;

/// How a genome came into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenomeOrigin {
    Random,
    Crossover,
    Mutation,
}

impl GenomeOrigin {
    fn tag(self) -> &'static str {
        match self {
            Self::Random => "rnd",
            Self::Crossover => "xo",
            Self::Mutation => "mut",
        }
    }
}

/// Unique genome identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenomeId {
    pub generation: usize,
    pub origin: GenomeOrigin,
    pub serial: u64,
}

impl fmt::Display for GenomeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}-{}-{}", self.generation, self.origin.tag(), self.serial)
    }
}

/// Monotonic source of genome ids.
#[derive(Debug, Default, Clone)]
pub struct IdSequence {
    next: u64,
}

impl IdSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self, generation: usize, origin: GenomeOrigin) -> GenomeId {
        let serial = self.next;
        self.next += 1;
        GenomeId {
            generation,
            origin,
            serial,
        }
    }
}

/// A grammar primitive supplied as seed material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrammarPrimitive {
    pub id: String,
    /// Type tag copied onto the nodes built from this primitive.
    pub kind: String,
    #[serde(default = "default_primitive_complexity")]
    pub complexity: f32,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

fn default_primitive_complexity() -> f32 {
    1.0
}

impl GrammarPrimitive {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, complexity: f32) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            complexity,
            dependencies: Vec::new(),
        }
    }
}

/// Relationship carried by an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeType {
    Semantic,
    Syntactic,
    Causal,
    Temporal,
}

impl EdgeType {
    pub const ALL: [EdgeType; 4] = [
        EdgeType::Semantic,
        EdgeType::Syntactic,
        EdgeType::Causal,
        EdgeType::Temporal,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrammarNode {
    pub id: NodeId,
    /// Primitive type tag.
    pub kind: String,
    pub activation: Vec<f32>,
    pub complexity: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrammarEdge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    /// Always within [0, 1].
    pub weight: f32,
    pub edge_type: EdgeType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrammarPattern {
    pub id: PatternId,
    pub name: String,
    pub nodes: Vec<NodeId>,
    /// At least 1.
    pub recursion_depth: u32,
    /// Always within [0, 1].
    pub applicability: f32,
}

/// Referential integrity violations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StructureError {
    #[error("Edge {edge} references missing node {node}")]
    DanglingEdge { edge: EdgeId, node: NodeId },
    #[error("Pattern {pattern} references missing node {node}")]
    DanglingPattern { pattern: PatternId, node: NodeId },
    #[error("Edge {edge} weight {weight} outside [0, 1]")]
    EdgeWeight { edge: EdgeId, weight: f32 },
    #[error("Pattern {pattern} has recursion depth 0")]
    RecursionDepth { pattern: PatternId },
    #[error("Duplicate node id {0}")]
    DuplicateNode(NodeId),
}

/// The graph part of a genome.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GenomeStructure {
    pub nodes: Vec<GrammarNode>,
    pub edges: Vec<GrammarEdge>,
    pub patterns: Vec<GrammarPattern>,
}

impl GenomeStructure {
    pub fn node_ids(&self) -> HashSet<NodeId> {
        self.nodes.iter().map(|n| n.id).collect()
    }

    /// Targets of the edges leaving `node`.
    pub fn connections(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.edges
            .iter()
            .filter(move |e| e.source == node)
            .map(|e| e.target)
    }

    pub fn next_node_id(&self) -> NodeId {
        self.nodes.iter().map(|n| n.id + 1).max().unwrap_or(0)
    }

    pub fn next_edge_id(&self) -> EdgeId {
        self.edges.iter().map(|e| e.id + 1).max().unwrap_or(0)
    }

    pub fn next_pattern_id(&self) -> PatternId {
        self.patterns.iter().map(|p| p.id + 1).max().unwrap_or(0)
    }

    /// Remove a node together with every edge touching it. Pattern references
    /// to the node are dropped; patterns left without nodes are removed.
    pub fn remove_node(&mut self, id: NodeId) {
        self.nodes.retain(|n| n.id != id);
        self.edges.retain(|e| e.source != id && e.target != id);
        for pattern in &mut self.patterns {
            pattern.nodes.retain(|&n| n != id);
        }
        self.patterns.retain(|p| !p.nodes.is_empty());
    }

    /// Drop edges and pattern references that point at missing nodes.
    /// Returns the number of edges and patterns removed.
    pub fn prune_dangling(&mut self) -> usize {
        let ids = self.node_ids();
        let before = self.edges.len() + self.patterns.len();

        self.edges
            .retain(|e| ids.contains(&e.source) && ids.contains(&e.target));
        for pattern in &mut self.patterns {
            pattern.nodes.retain(|n| ids.contains(n));
        }
        self.patterns.retain(|p| !p.nodes.is_empty());

        before - (self.edges.len() + self.patterns.len())
    }

    /// Check referential integrity and value ranges.
    pub fn validate(&self) -> Result<(), StructureError> {
        let ids = self.node_ids();
        if ids.len() != self.nodes.len() {
            let mut seen = HashSet::new();
            if let Some(dup) = self.nodes.iter().find(|n| !seen.insert(n.id)) {
                return Err(StructureError::DuplicateNode(dup.id));
            }
        }

        for edge in &self.edges {
            for node in [edge.source, edge.target] {
                if !ids.contains(&node) {
                    return Err(StructureError::DanglingEdge {
                        edge: edge.id,
                        node,
                    });
                }
            }
            if !(0.0..=1.0).contains(&edge.weight) {
                return Err(StructureError::EdgeWeight {
                    edge: edge.id,
                    weight: edge.weight,
                });
            }
        }

        for pattern in &self.patterns {
            if pattern.recursion_depth == 0 {
                return Err(StructureError::RecursionDepth {
                    pattern: pattern.id,
                });
            }
            if let Some(&node) = pattern.nodes.iter().find(|n| !ids.contains(n)) {
                return Err(StructureError::DanglingPattern {
                    pattern: pattern.id,
                    node,
                });
            }
        }

        Ok(())
    }
}

/// The four parameter tensors of a genome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenomeParameters {
    pub complexity: ParamTensor,
    pub expressiveness: ParamTensor,
    pub efficiency: ParamTensor,
    pub adaptability: ParamTensor,
}

impl GenomeParameters {
    pub fn tensors(&self) -> [&ParamTensor; 4] {
        [
            &self.complexity,
            &self.expressiveness,
            &self.efficiency,
            &self.adaptability,
        ]
    }

    /// Build a new parameter set by applying `f` to each tensor in order.
    pub fn try_map<E>(
        &self,
        mut f: impl FnMut(&ParamTensor) -> Result<ParamTensor, E>,
    ) -> Result<Self, E> {
        Ok(Self {
            complexity: f(&self.complexity)?,
            expressiveness: f(&self.expressiveness)?,
            efficiency: f(&self.efficiency)?,
            adaptability: f(&self.adaptability)?,
        })
    }

    /// Combine matching tensors of two parameter sets.
    pub fn try_zip<E>(
        &self,
        other: &GenomeParameters,
        mut f: impl FnMut(&ParamTensor, &ParamTensor) -> Result<ParamTensor, E>,
    ) -> Result<Self, E> {
        Ok(Self {
            complexity: f(&self.complexity, &other.complexity)?,
            expressiveness: f(&self.expressiveness, &other.expressiveness)?,
            efficiency: f(&self.efficiency, &other.efficiency)?,
            adaptability: f(&self.adaptability, &other.adaptability)?,
        })
    }
}

/// One candidate grammar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    pub id: GenomeId,
    pub primitives: Vec<GrammarPrimitive>,
    pub structure: GenomeStructure,
    pub parameters: GenomeParameters,
    /// Aggregated fitness; negative infinity after a failed evaluation.
    pub fitness: f32,
    /// Metrics from the last evaluation.
    #[serde(default)]
    pub metrics: MetricMap,
    pub generation: usize,
    /// Parent ids: empty for random genomes, one for mutants, two for
    /// crossover children.
    pub lineage: Vec<GenomeId>,
}

impl Genome {
    pub fn node_count(&self) -> usize {
        self.structure.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.structure.edges.len()
    }

    pub fn pattern_count(&self) -> usize {
        self.structure.patterns.len()
    }

    /// Whether the genome has a usable (finite) fitness.
    pub fn is_viable(&self) -> bool {
        self.fitness.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: NodeId) -> GrammarNode {
        GrammarNode {
            id,
            kind: "noun".to_string(),
            activation: vec![0.0; 2],
            complexity: 1.0,
        }
    }

    fn edge(id: EdgeId, source: NodeId, target: NodeId) -> GrammarEdge {
        GrammarEdge {
            id,
            source,
            target,
            weight: 0.5,
            edge_type: EdgeType::Causal,
        }
    }

    fn sample_structure() -> GenomeStructure {
        GenomeStructure {
            nodes: vec![node(0), node(1), node(2)],
            edges: vec![edge(0, 0, 1), edge(1, 1, 2), edge(2, 0, 2)],
            patterns: vec![GrammarPattern {
                id: 0,
                name: "chain".to_string(),
                nodes: vec![1],
                recursion_depth: 2,
                applicability: 0.4,
            }],
        }
    }

    #[test]
    fn test_genome_id_display() {
        let mut ids = IdSequence::new();
        let first = ids.next_id(3, GenomeOrigin::Mutation);
        let second = ids.next_id(3, GenomeOrigin::Crossover);
        assert_eq!(first.to_string(), "g3-mut-0");
        assert_eq!(second.to_string(), "g3-xo-1");
        assert_ne!(first, second);
    }

    #[test]
    fn test_connections_derived_from_edges() {
        let structure = sample_structure();
        let mut out: Vec<_> = structure.connections(0).collect();
        out.sort();
        assert_eq!(out, vec![1, 2]);
        assert_eq!(structure.connections(2).count(), 0);
    }

    #[test]
    fn test_remove_node_drops_touching_edges() {
        let mut structure = sample_structure();
        structure.remove_node(1);

        assert_eq!(structure.nodes.len(), 2);
        assert_eq!(structure.edges.len(), 1);
        assert!(structure.patterns.is_empty());
        assert!(structure.validate().is_ok());
    }

    #[test]
    fn test_validate_detects_dangling_edge() {
        let mut structure = sample_structure();
        structure.edges.push(edge(9, 0, 42));
        assert_eq!(
            structure.validate(),
            Err(StructureError::DanglingEdge { edge: 9, node: 42 })
        );

        assert_eq!(structure.prune_dangling(), 1);
        assert!(structure.validate().is_ok());
    }

    #[test]
    fn test_next_ids() {
        let structure = sample_structure();
        assert_eq!(structure.next_node_id(), 3);
        assert_eq!(structure.next_edge_id(), 3);
        assert_eq!(structure.next_pattern_id(), 1);
        assert_eq!(GenomeStructure::default().next_node_id(), 0);
    }
}

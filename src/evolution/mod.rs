//! Evolutionary optimization of grammar genomes.
//!
//! # Overview
//!
//! - **Random generation** (`rng`): Seeded sampling of structures and parameters
//! - **Fitness** (`fitness`): Pluggable async evaluators and metric aggregation
//! - **Selection** (`selection`): Parent selection methods and survivor filtering
//! - **Reproduction** (`reproduction`): Crossover, structural and parametric mutation
//! - **Diversity** (`diversity`): Genome similarity and population pruning
//! - **Population** (`population`): Current generation, best-ever and Pareto front
//! - **Meta-optimization** (`meta`): Rate tuning from the fitness trend
//! - **Statistics** (`statistics`): Per-generation diagnostics
//! - **Engine** (`engine`): The generational loop
//!
//! # Example
//!
//! ```rust,no_run
//! use grammar_evolution::evolution::{EvolutionEngine, StructuralEvaluator};
//! use grammar_evolution::schema::{EvolutionParams, GrammarPrimitive};
//!
//! let primitives = vec![
//!     GrammarPrimitive::new("subject", "noun", 1.0),
//!     GrammarPrimitive::new("action", "verb", 1.5),
//! ];
//!
//! let mut engine = EvolutionEngine::new(EvolutionParams::default(), StructuralEvaluator::default());
//! engine.initialize(primitives).unwrap();
//! let best = engine.evolve_with_callback(50, |stats| {
//!     println!("Generation {}: best fitness = {:.3}", stats.generation, stats.best_fitness);
//! }).unwrap();
//! println!("Best genome {} with {} nodes", best.id, best.node_count());
//! ```

pub mod diversity;
pub mod engine;
pub mod fitness;
pub mod meta;
pub mod population;
pub mod reproduction;
pub mod rng;
pub mod selection;
pub mod statistics;

pub use diversity::{maintain_diversity, population_diversity, similarity};
pub use engine::{EvolutionEngine, EvolutionError};
pub use fitness::{EvaluationError, FitnessEvaluator, MetricWeights, StructuralEvaluator};
pub use meta::{RateAdjustment, adaptive_mutation_strength, meta_optimize};
pub use population::Population;
pub use reproduction::{Reproduction, StructuralEdit};
pub use rng::{GenomeRng, random_genome};
pub use selection::{select_parents, select_survivors};
pub use statistics::compute_stats;

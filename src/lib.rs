//! Grammar Evolution - Evolutionary optimization of grammar genomes.
//!
//! A genome pairs a set of seed grammar primitives with a graph of nodes,
//! typed weighted edges and recursive patterns, plus four parameter tensors.
//! The engine evolves a population of genomes against a pluggable fitness
//! evaluator, tuning its own mutation and crossover rates as it goes.
//!
//! # Architecture
//!
//! - `schema`: Genome model, parameters and statistics records
//! - `tensor`: Dense parameter tensors
//! - `evolution`: Selection, reproduction, diversity and the engine loop
//!
//! # Example
//!
//! ```rust,no_run
//! use grammar_evolution::{EvolutionEngine, EvolutionParams, GrammarPrimitive, StructuralEvaluator};
//!
//! let params = EvolutionParams::default();
//! let primitives = vec![
//!     GrammarPrimitive::new("subject", "noun", 1.0),
//!     GrammarPrimitive::new("action", "verb", 1.5),
//!     GrammarPrimitive::new("modifier", "adjective", 0.5),
//! ];
//!
//! let mut engine = EvolutionEngine::new(params, StructuralEvaluator::default());
//! engine.initialize(primitives).unwrap();
//! let best = engine.evolve(100).unwrap();
//!
//! println!("Best fitness after {} generations: {:.4}", engine.generation(), best.fitness);
//! ```

pub mod evolution;
pub mod schema;
pub mod tensor;

// Re-export commonly used types
pub use evolution::{EvolutionEngine, EvolutionError, FitnessEvaluator, StructuralEvaluator};
pub use schema::{EvolutionParams, EvolutionStats, Genome, GrammarPrimitive, StopReason};

//! Evolution parameters for grammar optimization runs.
//!
//! All fields carry serde defaults so partial JSON files are accepted.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Top-level configuration for an evolutionary run.
///
/// Fixed for the duration of a run except for the rates the meta-optimizer
/// adjusts (`crossover_rate` and the two mutation rates).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionParams {
    /// Population size and elitism.
    #[serde(default)]
    pub population: PopulationParams,
    /// Parent selection strategy.
    #[serde(default)]
    pub selection: SelectionMethod,
    /// Probability that a parent pair undergoes crossover (0.0-1.0).
    #[serde(default = "default_crossover_rate")]
    pub crossover_rate: f32,
    /// Blend factor for parameter crossover (`alpha * a + (1 - alpha) * b`).
    #[serde(default = "default_blend_alpha")]
    pub blend_alpha: f32,
    /// Mutation probabilities.
    #[serde(default)]
    pub mutation: MutationParams,
    /// Maximum similarity two survivors may share.
    #[serde(default = "default_diversity_threshold")]
    pub diversity_threshold: f32,
    /// Genome shape constraints.
    #[serde(default)]
    pub constraints: GenomeConstraints,
    /// Termination conditions.
    #[serde(default)]
    pub termination: TerminationParams,
    /// How often periodic passes run.
    #[serde(default)]
    pub schedule: ScheduleParams,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for EvolutionParams {
    fn default() -> Self {
        Self {
            population: PopulationParams::default(),
            selection: SelectionMethod::default(),
            crossover_rate: default_crossover_rate(),
            blend_alpha: default_blend_alpha(),
            mutation: MutationParams::default(),
            diversity_threshold: default_diversity_threshold(),
            constraints: GenomeConstraints::default(),
            termination: TerminationParams::default(),
            schedule: ScheduleParams::default(),
            random_seed: None,
        }
    }
}

fn default_crossover_rate() -> f32 {
    0.7
}
fn default_blend_alpha() -> f32 {
    0.5
}
fn default_diversity_threshold() -> f32 {
    0.95
}

/// Population settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationParams {
    /// Number of genomes per generation.
    #[serde(default = "default_population_size")]
    pub size: usize,
    /// Fraction of the population carried into the parent pool unconditionally.
    #[serde(default = "default_elite_ratio")]
    pub elite_ratio: f32,
}

impl Default for PopulationParams {
    fn default() -> Self {
        Self {
            size: default_population_size(),
            elite_ratio: default_elite_ratio(),
        }
    }
}

fn default_population_size() -> usize {
    50
}
fn default_elite_ratio() -> f32 {
    0.1
}

/// Parent selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMethod {
    /// Fittest member of random tournaments.
    #[default]
    Tournament,
    /// Fitness-proportionate.
    Roulette,
    /// Quadratically biased rank draw.
    Rank,
    /// Pareto front members first, tournament for the rest.
    Pareto,
}

impl fmt::Display for SelectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Tournament => "tournament",
            Self::Roulette => "roulette",
            Self::Rank => "rank",
            Self::Pareto => "pareto",
        };
        f.write_str(name)
    }
}

impl FromStr for SelectionMethod {
    type Err = ParamsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tournament" => Ok(Self::Tournament),
            "roulette" | "roulette_wheel" => Ok(Self::Roulette),
            "rank" | "rank_based" => Ok(Self::Rank),
            "pareto" => Ok(Self::Pareto),
            other => Err(ParamsError::UnknownSelection(other.to_string())),
        }
    }
}

/// Mutation probabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationParams {
    /// Probability of one structural graph edit per mutation.
    #[serde(default = "default_structural_rate")]
    pub structural_rate: f32,
    /// Probability of perturbing the parameter vectors, also the base
    /// mutation strength.
    #[serde(default = "default_parametric_rate")]
    pub parametric_rate: f32,
}

impl Default for MutationParams {
    fn default() -> Self {
        Self {
            structural_rate: default_structural_rate(),
            parametric_rate: default_parametric_rate(),
        }
    }
}

fn default_structural_rate() -> f32 {
    0.2
}
fn default_parametric_rate() -> f32 {
    0.3
}

/// Genome shape constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenomeConstraints {
    /// Upper bound on nodes per genome.
    #[serde(default = "default_max_nodes")]
    pub max_nodes: usize,
    /// Node count range for randomly created genomes.
    #[serde(default = "default_initial_nodes")]
    pub initial_nodes: (usize, usize),
    /// Shape shared by the four parameter tensors.
    #[serde(default = "default_parameter_shape")]
    pub parameter_shape: Vec<usize>,
    /// Scale of randomly initialized parameters.
    #[serde(default = "default_init_scale")]
    pub init_scale: f32,
    /// Length of each node's activation vector.
    #[serde(default = "default_activation_len")]
    pub activation_len: usize,
}

impl Default for GenomeConstraints {
    fn default() -> Self {
        Self {
            max_nodes: default_max_nodes(),
            initial_nodes: default_initial_nodes(),
            parameter_shape: default_parameter_shape(),
            init_scale: default_init_scale(),
            activation_len: default_activation_len(),
        }
    }
}

fn default_max_nodes() -> usize {
    20
}
fn default_initial_nodes() -> (usize, usize) {
    (3, 10)
}
fn default_parameter_shape() -> Vec<usize> {
    vec![16]
}
fn default_init_scale() -> f32 {
    1.0
}
fn default_activation_len() -> usize {
    4
}

/// Conditions that end the outer loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminationParams {
    #[serde(default = "default_max_generations")]
    pub max_generations: usize,
    /// Stop once the best fitness reaches this value.
    #[serde(default = "default_fitness_threshold")]
    pub fitness_threshold: f32,
    /// Stop if best fitness moved less than 0.001 across this many generations.
    #[serde(default = "default_stagnation_limit")]
    pub stagnation_limit: usize,
}

impl Default for TerminationParams {
    fn default() -> Self {
        Self {
            max_generations: default_max_generations(),
            fitness_threshold: default_fitness_threshold(),
            stagnation_limit: default_stagnation_limit(),
        }
    }
}

fn default_max_generations() -> usize {
    100
}
fn default_fitness_threshold() -> f32 {
    0.95
}
fn default_stagnation_limit() -> usize {
    20
}

/// Intervals and windows for the periodic passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleParams {
    /// Diversity maintenance runs every N generations.
    #[serde(default = "default_diversity_interval")]
    pub diversity_interval: usize,
    /// Meta-optimization runs every N generations.
    #[serde(default = "default_meta_interval")]
    pub meta_interval: usize,
    /// Number of stats records the meta-optimizer inspects.
    #[serde(default = "default_meta_window")]
    pub meta_window: usize,
    /// Number of stats records used for adaptive mutation strength.
    #[serde(default = "default_strength_window")]
    pub strength_window: usize,
}

impl Default for ScheduleParams {
    fn default() -> Self {
        Self {
            diversity_interval: default_diversity_interval(),
            meta_interval: default_meta_interval(),
            meta_window: default_meta_window(),
            strength_window: default_strength_window(),
        }
    }
}

fn default_diversity_interval() -> usize {
    5
}
fn default_meta_interval() -> usize {
    10
}
fn default_meta_window() -> usize {
    10
}
fn default_strength_window() -> usize {
    5
}

// ============================================================================
// Validation
// ============================================================================

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ParamsError {
    #[error("Population size must be at least 1")]
    PopulationTooSmall,
    #[error("No seed primitives supplied")]
    EmptyPrimitives,
    #[error("Unknown selection method: {0}")]
    UnknownSelection(String),
    #[error("Invalid rate: {0}")]
    InvalidRate(String),
    #[error("Invalid constraint: {0}")]
    InvalidConstraint(String),
    #[error("Failed to read params: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse params: {0}")]
    Parse(#[from] serde_json::Error),
}

impl EvolutionParams {
    /// Parse parameters from JSON and validate them.
    pub fn from_json_str(json: &str) -> Result<Self, ParamsError> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    /// Load parameters from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ParamsError> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Validate parameters.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.population.size == 0 {
            return Err(ParamsError::PopulationTooSmall);
        }

        let check_unit = |value: f32, name: &str| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(ParamsError::InvalidRate(format!(
                    "{} ({}) must be within [0, 1]",
                    name, value
                )))
            }
        };

        check_unit(self.population.elite_ratio, "elite_ratio")?;
        check_unit(self.crossover_rate, "crossover_rate")?;
        check_unit(self.blend_alpha, "blend_alpha")?;
        check_unit(self.mutation.structural_rate, "structural_rate")?;
        check_unit(self.mutation.parametric_rate, "parametric_rate")?;
        check_unit(self.diversity_threshold, "diversity_threshold")?;

        let c = &self.constraints;
        let (min_nodes, max_initial) = c.initial_nodes;
        if min_nodes == 0 || min_nodes > max_initial {
            return Err(ParamsError::InvalidConstraint(format!(
                "initial_nodes ({}, {}) must be a non-empty range starting at 1 or more",
                min_nodes, max_initial
            )));
        }
        if c.max_nodes < min_nodes {
            return Err(ParamsError::InvalidConstraint(format!(
                "max_nodes ({}) below minimum initial node count ({})",
                c.max_nodes, min_nodes
            )));
        }
        if c.parameter_shape.is_empty() || c.parameter_shape.contains(&0) {
            return Err(ParamsError::InvalidConstraint(format!(
                "parameter_shape {:?} must be non-empty with positive dimensions",
                c.parameter_shape
            )));
        }
        if !c.init_scale.is_finite() || c.init_scale < 0.0 {
            return Err(ParamsError::InvalidConstraint(format!(
                "init_scale ({}) must be finite and non-negative",
                c.init_scale
            )));
        }

        let s = &self.schedule;
        if s.diversity_interval == 0 || s.meta_interval == 0 {
            return Err(ParamsError::InvalidConstraint(
                "schedule intervals must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

//! Evolution driver: runs generations and checks termination.

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::schema::{
    EvolutionParams, EvolutionStats, Genome, GenomeOrigin, GrammarPrimitive, IdSequence,
    ParamsError, StopReason,
};
use crate::tensor::TensorError;

use super::diversity::maintain_diversity;
use super::fitness::{EvaluationError, FitnessEvaluator};
use super::meta::{RateAdjustment, adaptive_mutation_strength, meta_optimize};
use super::population::Population;
use super::reproduction::Reproduction;
use super::rng::{GenomeRng, random_genome};
use super::selection::{select_parents, select_survivors, sort_by_fitness};
use super::statistics::{GenerationContext, compute_stats};

/// Best fitness must move at least this much across the stagnation window.
pub const STAGNATION_RANGE: f32 = 0.001;

/// Engine-level errors.
#[derive(Debug, thiserror::Error)]
pub enum EvolutionError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ParamsError),
    #[error("Engine used before initialize()")]
    NotInitialized,
    #[error("No genome has been evaluated successfully")]
    NoViableGenome,
    #[error("Parameter tensor error: {0}")]
    Tensor(#[from] TensorError),
}

/// Evolution engine that runs the search.
pub struct EvolutionEngine<E: FitnessEvaluator> {
    params: EvolutionParams,
    evaluator: E,
    rng: GenomeRng,
    ids: IdSequence,
    primitives: Vec<GrammarPrimitive>,
    population: Population,
    history: Vec<EvolutionStats>,
    generation: usize,
    mutation_strength: f32,
    stop_reason: Option<StopReason>,
}

impl<E: FitnessEvaluator> EvolutionEngine<E> {
    /// Create a new evolution engine. Nothing is validated until
    /// [`Self::initialize`].
    pub fn new(params: EvolutionParams, evaluator: E) -> Self {
        let rng = match params.random_seed {
            Some(seed) => GenomeRng::new(seed),
            None => GenomeRng::random(),
        };
        let mutation_strength = params.mutation.parametric_rate;

        Self {
            params,
            evaluator,
            rng,
            ids: IdSequence::new(),
            primitives: Vec::new(),
            population: Population::default(),
            history: Vec::new(),
            generation: 0,
            mutation_strength,
            stop_reason: None,
        }
    }

    /// Create and evaluate the generation-0 population.
    pub fn initialize(&mut self, primitives: Vec<GrammarPrimitive>) -> Result<(), EvolutionError> {
        self.params.validate()?;
        if primitives.is_empty() {
            return Err(ParamsError::EmptyPrimitives.into());
        }

        self.primitives = primitives;
        self.generation = 0;
        self.history.clear();
        self.stop_reason = None;
        self.mutation_strength = self.params.mutation.parametric_rate;

        let size = self.params.population.size;
        let mut genomes = fresh_genomes(
            &mut self.rng,
            &mut self.ids,
            &self.primitives,
            &self.params,
            size,
            0,
        );
        let failures = evaluate_genomes(&self.evaluator, &mut genomes);
        self.population = Population::new(genomes, size);
        self.record_stats();

        info!(
            "initialized {} genomes from {} primitives ({} evaluation failures), best fitness {:.4}",
            size,
            self.primitives.len(),
            failures,
            self.population.best_fitness()
        );
        Ok(())
    }

    /// Run one generation: select, reproduce, evaluate, survive, then the
    /// periodic diversity and meta-optimization passes.
    pub fn step(&mut self) -> Result<&EvolutionStats, EvolutionError> {
        if self.population.is_empty() {
            return Err(EvolutionError::NotInitialized);
        }

        let next_gen = self.generation + 1;
        let size = self.params.population.size;
        let threshold = self.params.diversity_threshold;

        self.mutation_strength = adaptive_mutation_strength(
            self.params.mutation.parametric_rate,
            &self.history,
            self.params.schedule.strength_window,
        );

        let mut offspring = {
            let parents = select_parents(
                self.population.genomes(),
                self.population.front(),
                self.params.selection,
                self.params.population.elite_ratio,
                size,
                &mut self.rng,
            );
            let mut reproduction = Reproduction::new(
                &mut self.rng,
                &mut self.ids,
                &self.params,
                next_gen,
                self.mutation_strength,
            );
            reproduction.breed(&parents, size)?
        };
        let failures = evaluate_genomes(&self.evaluator, &mut offspring);
        if failures > 0 {
            warn!(
                "generation {}: {} of {} offspring failed evaluation",
                next_gen,
                failures,
                offspring.len()
            );
        }

        let mut pool = self.population.take();
        pool.extend(offspring);
        let mut survivors = select_survivors(pool, size, threshold);
        self.pad(&mut survivors, size, next_gen);
        self.population.replace(survivors);

        if next_gen % self.params.schedule.diversity_interval == 0 {
            let mut genomes = self.population.take();
            sort_by_fitness(&mut genomes);
            let removed = maintain_diversity(&mut genomes, threshold);
            if removed > 0 {
                debug!("generation {}: diversity pass removed {}", next_gen, removed);
            }
            self.pad(&mut genomes, size, next_gen);
            self.population.replace(genomes);
        }

        self.generation = next_gen;
        self.record_stats();

        let adjustment = if next_gen % self.params.schedule.meta_interval == 0 {
            meta_optimize(&mut self.params, &self.history)
        } else {
            RateAdjustment::Unchanged
        };

        let stats = &self.history[self.history.len() - 1];
        debug!(
            "generation {}: best {:.4}, avg {:.4}, diversity {:.3}, strength {:.3}, rates {:?}",
            stats.generation,
            stats.best_fitness,
            stats.average_fitness,
            stats.diversity,
            stats.mutation_strength,
            adjustment
        );
        Ok(stats)
    }

    /// Fill `genomes` up to `size` with fresh random genomes.
    fn pad(&mut self, genomes: &mut Vec<Genome>, size: usize, generation: usize) {
        let missing = size.saturating_sub(genomes.len());
        if missing == 0 {
            return;
        }

        warn!(
            "generation {}: padding population with {} random genomes",
            generation, missing
        );
        let mut fresh = fresh_genomes(
            &mut self.rng,
            &mut self.ids,
            &self.primitives,
            &self.params,
            missing,
            generation,
        );
        evaluate_genomes(&self.evaluator, &mut fresh);
        genomes.extend(fresh);
    }

    fn record_stats(&mut self) {
        let stats = compute_stats(
            self.population.genomes(),
            &self.history,
            GenerationContext {
                generation: self.generation,
                params: &self.params,
                best_ever: self.population.best_fitness(),
                mutation_strength: self.mutation_strength,
            },
        );
        self.history.push(stats);
    }

    /// Why the run should stop now, if at all.
    pub fn termination_reason(&self, max_generations: usize) -> Option<StopReason> {
        if self.history.is_empty() {
            return None;
        }
        if self.generation >= max_generations {
            return Some(StopReason::MaxGenerations);
        }

        if self.population.best_fitness() >= self.params.termination.fitness_threshold {
            return Some(StopReason::TargetReached);
        }

        let limit = self.params.termination.stagnation_limit;
        if limit > 0 && self.history.len() >= limit.max(2) {
            let window = &self.history[self.history.len() - limit.max(2)..];
            let (lo, hi) = window.iter().fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), s| {
                (lo.min(s.best_fitness), hi.max(s.best_fitness))
            });
            if hi - lo < STAGNATION_RANGE {
                return Some(StopReason::Stagnation);
            }
        }

        None
    }

    /// Evolve for at most `max_generations` and return the best genome seen.
    pub fn evolve(&mut self, max_generations: usize) -> Result<Genome, EvolutionError> {
        self.evolve_with_callback(max_generations, |_| {})
    }

    /// Evolve with a callback invoked after every generation.
    pub fn evolve_with_callback<F>(
        &mut self,
        max_generations: usize,
        mut callback: F,
    ) -> Result<Genome, EvolutionError>
    where
        F: FnMut(&EvolutionStats),
    {
        if self.population.is_empty() {
            return Err(EvolutionError::NotInitialized);
        }

        let reason = loop {
            if let Some(reason) = self.termination_reason(max_generations) {
                break reason;
            }
            let stats = self.step()?;
            callback(stats);
        };

        info!(
            "evolution stopped after {} generations: {}, best fitness {:.4}",
            self.generation,
            reason,
            self.population.best_fitness()
        );
        self.stop_reason = Some(reason);

        self.population
            .best()
            .cloned()
            .ok_or(EvolutionError::NoViableGenome)
    }

    /// Evolve up to the configured maximum generation count.
    pub fn run(&mut self) -> Result<Genome, EvolutionError> {
        self.evolve(self.params.termination.max_generations)
    }

    /// Snapshot of the current population, fittest first.
    pub fn population(&self) -> Vec<Genome> {
        self.population.genomes().to_vec()
    }

    /// Best genome seen so far.
    pub fn best_genome(&self) -> Option<Genome> {
        self.population.best().cloned()
    }

    /// Snapshot of the Pareto front.
    pub fn pareto_front(&self) -> Vec<Genome> {
        self.population.front().to_vec()
    }

    /// All statistics records, one per generation including generation 0.
    pub fn stats_history(&self) -> Vec<EvolutionStats> {
        self.history.clone()
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Current parameters, including meta-optimizer adjustments.
    pub fn params(&self) -> EvolutionParams {
        self.params.clone()
    }

    pub fn mutation_strength(&self) -> f32 {
        self.mutation_strength
    }

    /// Why the last `evolve` call stopped.
    pub fn last_stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }
}

/// Random genomes for generation `generation`.
fn fresh_genomes(
    rng: &mut GenomeRng,
    ids: &mut IdSequence,
    primitives: &[GrammarPrimitive],
    params: &EvolutionParams,
    count: usize,
    generation: usize,
) -> Vec<Genome> {
    (0..count)
        .map(|_| {
            random_genome(
                rng,
                ids.next_id(generation, GenomeOrigin::Random),
                primitives,
                &params.constraints,
            )
        })
        .collect()
}

/// Evaluate genomes in parallel. A failed evaluation leaves the genome with
/// negative infinite fitness. Returns the number of failures.
fn evaluate_genomes<E: FitnessEvaluator>(evaluator: &E, genomes: &mut [Genome]) -> usize {
    genomes
        .par_iter_mut()
        .map(|genome| {
            let result = pollster::block_on(evaluator.evaluate_fitness(genome)).and_then(|m| {
                if m.is_empty() {
                    Err(EvaluationError::NoMetrics(genome.id.to_string()))
                } else {
                    Ok(m)
                }
            });

            match result {
                Ok(metrics) => {
                    let fitness = evaluator.aggregate_fitness(&metrics);
                    genome.metrics = metrics;
                    if fitness.is_finite() {
                        genome.fitness = fitness;
                        0
                    } else {
                        warn!("{}: non-finite fitness {}", genome.id, fitness);
                        genome.fitness = f32::NEG_INFINITY;
                        1
                    }
                }
                Err(e) => {
                    warn!("{}", e);
                    genome.fitness = f32::NEG_INFINITY;
                    genome.metrics.clear();
                    1
                }
            }
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        MetricMap, MutationParams, PopulationParams, SelectionMethod, TerminationParams,
    };

    /// Deterministic evaluator rewarding larger, more connected graphs.
    struct SizeEvaluator;

    impl FitnessEvaluator for SizeEvaluator {
        async fn evaluate_fitness(&self, genome: &Genome) -> Result<MetricMap, EvaluationError> {
            let mut metrics = MetricMap::new();
            metrics.insert("nodes".to_string(), genome.node_count() as f32);
            metrics.insert("edges".to_string(), genome.edge_count() as f32);
            metrics.insert("patterns".to_string(), genome.pattern_count() as f32);
            Ok(metrics)
        }

        fn aggregate_fitness(&self, metrics: &MetricMap) -> f32 {
            let total: f32 = metrics.values().sum();
            (total / 100.0).min(0.99)
        }
    }

    /// Returns the same fitness for every genome.
    struct ConstantEvaluator(f32);

    impl FitnessEvaluator for ConstantEvaluator {
        async fn evaluate_fitness(&self, _genome: &Genome) -> Result<MetricMap, EvaluationError> {
            Ok([("constant".to_string(), self.0)].into_iter().collect())
        }

        fn aggregate_fitness(&self, metrics: &MetricMap) -> f32 {
            metrics["constant"]
        }
    }

    /// Scores large graphs as positive infinity.
    struct UnboundedEvaluator;

    impl FitnessEvaluator for UnboundedEvaluator {
        async fn evaluate_fitness(&self, genome: &Genome) -> Result<MetricMap, EvaluationError> {
            SizeEvaluator.evaluate_fitness(genome).await
        }

        fn aggregate_fitness(&self, metrics: &MetricMap) -> f32 {
            if metrics["nodes"] >= 9.0 {
                f32::INFINITY
            } else {
                metrics["nodes"] / 10.0
            }
        }
    }

    /// Fails for genomes with an odd serial, or for all genomes.
    struct FlakyEvaluator {
        fail_all: bool,
    }

    impl FitnessEvaluator for FlakyEvaluator {
        async fn evaluate_fitness(&self, genome: &Genome) -> Result<MetricMap, EvaluationError> {
            if self.fail_all || genome.id.serial % 2 == 1 {
                return Err(EvaluationError::Failed {
                    genome: genome.id.to_string(),
                    reason: "simulated".to_string(),
                });
            }
            SizeEvaluator.evaluate_fitness(genome).await
        }

        fn aggregate_fitness(&self, metrics: &MetricMap) -> f32 {
            SizeEvaluator.aggregate_fitness(metrics)
        }
    }

    fn primitives(n: usize) -> Vec<GrammarPrimitive> {
        (0..n)
            .map(|i| GrammarPrimitive::new(format!("p{}", i), format!("kind{}", i), 1.0 + i as f32))
            .collect()
    }

    fn params(size: usize, max_generations: usize) -> EvolutionParams {
        EvolutionParams {
            population: PopulationParams {
                size,
                ..Default::default()
            },
            termination: TerminationParams {
                max_generations,
                fitness_threshold: 1.0,
                stagnation_limit: 0,
            },
            mutation: MutationParams {
                structural_rate: 0.5,
                parametric_rate: 0.3,
            },
            random_seed: Some(42),
            ..Default::default()
        }
    }

    #[test]
    fn test_initialize_rejects_empty_primitives() {
        let mut engine = EvolutionEngine::new(params(10, 5), SizeEvaluator);
        assert!(matches!(
            engine.initialize(Vec::new()),
            Err(EvolutionError::Config(ParamsError::EmptyPrimitives))
        ));
    }

    #[test]
    fn test_initialize_rejects_zero_population() {
        let mut engine = EvolutionEngine::new(params(0, 5), SizeEvaluator);
        assert!(matches!(
            engine.initialize(primitives(3)),
            Err(EvolutionError::Config(ParamsError::PopulationTooSmall))
        ));
    }

    #[test]
    fn test_step_before_initialize() {
        let mut engine = EvolutionEngine::new(params(10, 5), SizeEvaluator);
        assert!(matches!(engine.step(), Err(EvolutionError::NotInitialized)));
        assert!(matches!(engine.evolve(5), Err(EvolutionError::NotInitialized)));
    }

    #[test]
    fn test_initial_population() {
        let mut engine = EvolutionEngine::new(params(20, 5), SizeEvaluator);
        engine.initialize(primitives(5)).unwrap();

        let population = engine.population();
        assert_eq!(population.len(), 20);
        assert!(population.windows(2).all(|w| w[0].fitness >= w[1].fitness));
        assert!(population.iter().all(|g| g.generation == 0 && g.lineage.is_empty()));
        assert_eq!(engine.best_genome().map(|g| g.id), Some(population[0].id));
        assert_eq!(engine.pareto_front().len(), 2);
        assert_eq!(engine.stats_history().len(), 1);
        assert_eq!(engine.generation(), 0);
    }

    #[test]
    fn test_runs_exact_generations_with_unreachable_threshold() {
        let mut engine = EvolutionEngine::new(params(20, 10), SizeEvaluator);
        engine.initialize(primitives(5)).unwrap();
        let initial_best = engine.best_genome().unwrap().fitness;

        let best = engine.evolve(10).unwrap();

        assert_eq!(engine.generation(), 10);
        assert_eq!(engine.stats_history().len(), 11);
        assert_eq!(engine.last_stop_reason(), Some(StopReason::MaxGenerations));
        assert!(best.fitness >= initial_best);

        let max_seen = engine
            .stats_history()
            .iter()
            .map(|s| s.best_fitness)
            .fold(f32::NEG_INFINITY, f32::max);
        assert_eq!(best.fitness, max_seen);
    }

    #[test]
    fn test_generation_invariants() {
        for method in ["tournament", "roulette", "rank", "pareto"] {
            let mut p = params(16, 12);
            p.selection = method.parse().unwrap();
            let mut engine = EvolutionEngine::new(p, SizeEvaluator);
            engine.initialize(primitives(4)).unwrap();

            let mut previous_best = engine.best_genome().unwrap().fitness;
            for _ in 0..12 {
                let stats = engine.step().unwrap().clone();
                assert_eq!(stats.population_size, 16);
                assert!(stats.best_fitness >= previous_best);
                previous_best = stats.best_fitness;

                for genome in engine.population() {
                    assert!(genome.structure.validate().is_ok());
                    assert!(genome.node_count() >= 1);
                }
            }
        }
    }

    #[test]
    fn test_target_reached_stops_immediately() {
        let mut p = params(10, 50);
        p.termination.fitness_threshold = 0.0;
        let mut engine = EvolutionEngine::new(p, SizeEvaluator);
        engine.initialize(primitives(3)).unwrap();

        engine.evolve(50).unwrap();
        assert_eq!(engine.generation(), 0);
        assert_eq!(engine.last_stop_reason(), Some(StopReason::TargetReached));
    }

    #[test]
    fn test_stagnation_stops_run() {
        let mut p = params(10, 50);
        p.termination.stagnation_limit = 3;
        let mut engine = EvolutionEngine::new(p, ConstantEvaluator(0.5));
        engine.initialize(primitives(3)).unwrap();

        engine.evolve(50).unwrap();
        assert_eq!(engine.generation(), 2);
        assert_eq!(engine.last_stop_reason(), Some(StopReason::Stagnation));
    }

    #[test]
    fn test_termination_on_empty_history() {
        let engine = EvolutionEngine::new(params(10, 5), SizeEvaluator);
        assert_eq!(engine.termination_reason(5), None);
    }

    #[test]
    fn test_meta_optimizer_explores_when_flat() {
        let mut engine = EvolutionEngine::new(params(10, 10), ConstantEvaluator(0.5));
        engine.initialize(primitives(3)).unwrap();
        engine.evolve(10).unwrap();

        let tuned = engine.params();
        assert!((tuned.mutation.structural_rate - 0.5).abs() < 1e-6);
        assert!((tuned.mutation.parametric_rate - 0.33).abs() < 1e-6);
        assert!((tuned.crossover_rate - 0.63).abs() < 1e-6);
        // Flat trend widens the strength slightly.
        assert!((engine.mutation_strength() - 0.33).abs() < 1e-6);
    }

    #[test]
    fn test_diversity_pass_refills_population() {
        let mut p = params(12, 6);
        p.diversity_threshold = 0.0;
        p.schedule.diversity_interval = 1;
        let mut engine = EvolutionEngine::new(p, SizeEvaluator);
        engine.initialize(primitives(3)).unwrap();

        for _ in 0..6 {
            engine.step().unwrap();
            assert_eq!(engine.population().len(), 12);
        }
    }

    #[test]
    fn test_evaluation_failures_do_not_abort() {
        let mut engine = EvolutionEngine::new(params(12, 5), FlakyEvaluator { fail_all: false });
        engine.initialize(primitives(3)).unwrap();

        let best = engine.evolve(5).unwrap();
        assert!(best.is_viable());
        assert_eq!(engine.population().len(), 12);
        assert!(engine.pareto_front().iter().all(Genome::is_viable));
    }

    #[test]
    fn test_all_failures_reported() {
        let mut engine = EvolutionEngine::new(params(6, 3), FlakyEvaluator { fail_all: true });
        engine.initialize(primitives(3)).unwrap();

        assert!(matches!(engine.evolve(3), Err(EvolutionError::NoViableGenome)));
        assert_eq!(engine.generation(), 3);
        assert_eq!(engine.population().len(), 6);
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let run = || {
            let mut engine = EvolutionEngine::new(params(10, 5), SizeEvaluator);
            engine.initialize(primitives(3)).unwrap();
            engine.evolve(5).unwrap()
        };
        let a = run();
        let b = run();
        assert_eq!(a.id, b.id);
        assert_eq!(a.fitness, b.fitness);
    }

    #[test]
    fn test_accessors_return_copies() {
        let mut engine = EvolutionEngine::new(params(8, 5), SizeEvaluator);
        engine.initialize(primitives(3)).unwrap();

        let mut snapshot = engine.population();
        snapshot.clear();
        assert_eq!(engine.population().len(), 8);

        let mut history = engine.stats_history();
        history.clear();
        assert_eq!(engine.stats_history().len(), 1);
    }

    #[test]
    fn test_infinite_fitness_treated_as_failure() {
        let mut p = params(20, 5);
        p.selection = SelectionMethod::Roulette;
        p.random_seed = Some(1);
        let mut engine = EvolutionEngine::new(p, UnboundedEvaluator);
        engine.initialize(primitives(5)).unwrap();

        let no_positive_infinity = |engine: &EvolutionEngine<UnboundedEvaluator>| {
            engine.population().iter().all(|g| g.fitness != f32::INFINITY)
        };
        assert!(no_positive_infinity(&engine));

        for _ in 0..5 {
            let stats = engine.step().unwrap();
            assert!(stats.best_fitness.is_finite());
            assert!(no_positive_infinity(&engine));
        }
        assert_eq!(engine.population().len(), 20);
        assert!(engine.best_genome().is_some_and(|g| g.fitness.is_finite()));
    }

    #[test]
    fn test_unseeded_engine_runs() {
        let mut p = params(8, 3);
        p.random_seed = None;
        let mut engine = EvolutionEngine::new(p, SizeEvaluator);
        engine.initialize(primitives(3)).unwrap();

        let best = engine.evolve(3).unwrap();
        assert!(best.is_viable());
        assert_eq!(engine.generation(), 3);
    }
}

//! Benchmarks for the evolution loop.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use grammar_evolution::{
    evolution::{EvolutionEngine, GenomeRng, StructuralEvaluator, population_diversity, random_genome},
    schema::{EvolutionParams, GenomeOrigin, GrammarPrimitive, IdSequence, PopulationParams},
};

fn primitives() -> Vec<GrammarPrimitive> {
    vec![
        GrammarPrimitive::new("subject", "noun", 1.0),
        GrammarPrimitive::new("action", "verb", 1.5),
        GrammarPrimitive::new("modifier", "adjective", 0.5),
        GrammarPrimitive::new("relation", "preposition", 0.8),
        GrammarPrimitive::new("clause", "conjunction", 2.0),
    ]
}

fn bench_generation_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("generation_step");

    for size in [20, 50, 100, 200] {
        let params = EvolutionParams {
            population: PopulationParams {
                size,
                ..Default::default()
            },
            random_seed: Some(7),
            ..Default::default()
        };

        let mut engine = EvolutionEngine::new(params, StructuralEvaluator::default());
        engine.initialize(primitives()).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                black_box(engine.step().unwrap());
            });
        });
    }

    group.finish();
}

fn bench_population_diversity(c: &mut Criterion) {
    let mut group = c.benchmark_group("population_diversity");

    for size in [20, 50, 100] {
        let params = EvolutionParams::default();
        let mut rng = GenomeRng::new(11);
        let mut ids = IdSequence::new();
        let prims = primitives();
        let genomes: Vec<_> = (0..size)
            .map(|_| {
                random_genome(
                    &mut rng,
                    ids.next_id(0, GenomeOrigin::Random),
                    &prims,
                    &params.constraints,
                )
            })
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(size), &genomes, |b, genomes| {
            b.iter(|| black_box(population_diversity(black_box(genomes))));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_generation_step, bench_population_diversity);
criterion_main!(benches);

//! Grammar evolution CLI - Run an evolution from JSON parameters.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use grammar_evolution::{
    evolution::{EvolutionEngine, StructuralEvaluator},
    schema::{EvolutionParams, GrammarPrimitive},
};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <params.json> [generations]", args[0]);
        eprintln!();
        eprintln!("Evolve grammar genomes from JSON parameters.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  params.json  Path to evolution parameters file");
        eprintln!("  generations  Maximum generations (default: from params)");
        eprintln!();
        eprintln!("Primitives are read from <params>.primitives.json when present.");
        eprintln!("Example files are generated with --example flag.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let params_path = PathBuf::from(&args[1]);
    let params = EvolutionParams::load(&params_path).unwrap_or_else(|e| {
        eprintln!("Error loading params: {}", e);
        std::process::exit(1);
    });
    let generations: usize = args
        .get(2)
        .and_then(|s| s.parse().ok())
        .unwrap_or(params.termination.max_generations);

    let primitives = load_primitives(&params_path.with_extension("primitives.json"));

    println!("Grammar Evolution");
    println!("=================");
    println!("Population: {}", params.population.size);
    println!("Selection: {}", params.selection);
    println!("Primitives: {}", primitives.len());
    println!("Generations: {}", generations);
    println!();

    let mut engine = EvolutionEngine::new(params, StructuralEvaluator::default());
    if let Err(e) = engine.initialize(primitives) {
        eprintln!("Error initializing evolution: {}", e);
        std::process::exit(1);
    }

    println!("Running evolution...");
    let start = Instant::now();

    let result = engine.evolve_with_callback(generations, |stats| {
        // Print progress every 10%
        if stats.generation % (generations / 10).max(1) == 0 {
            let insights: Vec<&str> = stats.insights.iter().map(|i| i.label()).collect();
            println!(
                "  Generation {}/{}: best={:.4}, avg={:.4}, diversity={:.3} {:?}",
                stats.generation,
                generations,
                stats.best_fitness,
                stats.average_fitness,
                stats.diversity,
                insights
            );
        }
    });

    let elapsed = start.elapsed();
    let best = result.unwrap_or_else(|e| {
        eprintln!("Evolution failed: {}", e);
        std::process::exit(1);
    });

    println!();
    if let Some(reason) = engine.last_stop_reason() {
        println!("Stopped: {} after {} generations", reason, engine.generation());
    }
    println!("Best genome: {}", best.id);
    println!("  Fitness: {:.6}", best.fitness);
    println!(
        "  Structure: {} nodes, {} edges, {} patterns",
        best.node_count(),
        best.edge_count(),
        best.pattern_count()
    );
    for (name, value) in &best.metrics {
        println!("  {}: {:.4}", name, value);
    }
    println!("Pareto front: {} genomes", engine.pareto_front().len());
    println!("Time: {:.2}s", elapsed.as_secs_f32());
}

fn load_primitives(path: &Path) -> Vec<GrammarPrimitive> {
    if !path.exists() {
        return default_primitives();
    }

    let json = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading primitives file: {}", e);
        std::process::exit(1);
    });
    serde_json::from_str(&json).unwrap_or_else(|e| {
        eprintln!("Error parsing primitives: {}", e);
        std::process::exit(1);
    })
}

fn default_primitives() -> Vec<GrammarPrimitive> {
    vec![
        GrammarPrimitive::new("subject", "noun", 1.0),
        GrammarPrimitive::new("action", "verb", 1.5),
        GrammarPrimitive::new("modifier", "adjective", 0.5),
        GrammarPrimitive::new("relation", "preposition", 0.8),
        GrammarPrimitive::new("clause", "conjunction", 2.0),
    ]
}

fn print_example_config() {
    let params = EvolutionParams::default();

    println!("Example parameters (params.json):");
    match serde_json::to_string_pretty(&params) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing params: {}", e),
    }
    println!();
    println!("Example primitives (params.primitives.json):");
    match serde_json::to_string_pretty(&default_primitives()) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing primitives: {}", e),
    }
}

//! Legged evolution CLI - Run an evolution from JSON configuration.

use std::fs;
use std::path::PathBuf;

use legged_evolution::{EvolutionConfig, EvolutionEngine};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <config.json> [generations]", args[0]);
        eprintln!();
        eprintln!("Evolve legged creatures from JSON configuration.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  config.json  Path to evolution configuration file");
        eprintln!("  generations  Override population.max_generations");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let config_path = PathBuf::from(&args[1]);

    let config_str = fs::read_to_string(&config_path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    let mut config: EvolutionConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    });

    if let Some(generations) = args.get(2).and_then(|s| s.parse().ok()) {
        config.population.max_generations = generations;
    }

    println!("Legged Evolution");
    println!("================");
    println!(
        "Population: {} (body points {}..={})",
        config.population.size, config.population.body_points_range.0,
        config.population.body_points_range.1
    );
    println!("Generations: {}", config.population.max_generations);
    println!("Workers: {}", config.workers.count);
    println!(
        "Simulation: {}s at dt={:.4}",
        config.simulation.duration, config.simulation.dt
    );
    println!();

    let mut engine = EvolutionEngine::new(config).unwrap_or_else(|e| {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    });

    let result = engine.run_with_callback(|progress| {
        if progress.history.is_empty() {
            return;
        }
        println!(
            "  Generation {}/{}: best={:.3}, avg={:.3}, overall best={:.3}",
            progress.generation,
            progress.total_generations,
            progress.generation_best,
            progress.avg_fitness,
            progress.best_fitness
        );
    });

    let result = result.unwrap_or_else(|e| {
        eprintln!("Evolution failed: {}", e);
        std::process::exit(1);
    });

    println!();
    println!("Stopped: {:?}", result.stats.stop_reason);
    println!("Generations: {}", result.stats.generations);
    println!("Evaluations: {}", result.stats.total_evaluations);
    println!("Best fitness: {:.3}", result.stats.best_fitness);
    println!("Final average: {:.3}", result.stats.final_avg_fitness);
    println!("Time: {:.2}s", result.stats.elapsed_seconds);
}

fn print_example_config() {
    let config = EvolutionConfig::default();
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Error serializing config: {}", e),
    }
}

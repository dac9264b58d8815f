//! Run-state types reported by the evolutionary loop.

use serde::{Deserialize, Serialize};

use super::genotype::Individual;
use super::population::Population;

/// Progress update emitted once per generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionProgress {
    /// Generation just evaluated.
    pub generation: usize,
    /// Total generations planned.
    pub total_generations: usize,
    /// Best fitness seen so far.
    pub best_fitness: f32,
    /// Average fitness of the evaluated generation.
    pub avg_fitness: f32,
    /// Best fitness of the evaluated generation.
    pub generation_best: f32,
    /// Generations since last improvement.
    pub stagnation_count: usize,
    /// Best individual so far.
    pub best_individual: Option<Individual>,
    /// Statistics history for plotting.
    pub history: EvolutionHistory,
    pub phase: EvolutionPhase,
}

/// Per-generation fitness statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvolutionHistory {
    /// Best fitness per generation.
    pub best_fitness: Vec<f32>,
    /// Average fitness per generation.
    pub avg_fitness: Vec<f32>,
    /// Standard deviation per generation.
    pub fitness_std: Vec<f32>,
}

impl EvolutionHistory {
    pub fn len(&self) -> usize {
        self.best_fitness.len()
    }

    pub fn is_empty(&self) -> bool {
        self.best_fitness.is_empty()
    }

    pub fn push(&mut self, report: &GenerationReport) {
        self.best_fitness.push(report.best_fitness);
        self.avg_fitness.push(report.avg_fitness);
        self.fitness_std.push(report.fitness_std);
    }
}

/// Stage of the generation cycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum EvolutionPhase {
    /// Seeding or loading the first generation.
    #[default]
    Initializing,
    /// Running the simulation.
    Simulating,
    /// Tournament selection.
    Selecting,
    /// Mutating the selected individuals.
    Mutating,
    Complete,
    Stopped,
}

/// One line of the generation report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationReport {
    pub generation_count: usize,
    pub best_fitness: f32,
    pub avg_fitness: f32,
    pub fitness_std: f32,
    /// Index of the parcour used, counting switches from 0.
    pub parcour_index: usize,
}

impl GenerationReport {
    /// Summarize an evaluated population. Unevaluated individuals are
    /// ignored; an empty summary reports zeros.
    pub fn from_population(population: &Population, parcour_index: usize) -> Self {
        Self {
            generation_count: population.generation_count,
            best_fitness: population
                .best()
                .and_then(|i| i.fitness)
                .unwrap_or(0.0),
            avg_fitness: population.average_fitness().unwrap_or(0.0),
            fitness_std: population.fitness_std().unwrap_or(0.0),
            parcour_index,
        }
    }
}

/// Final result of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionResult {
    /// Best individual ever evaluated.
    pub best: Option<Individual>,
    /// Last evaluated population.
    pub population: Population,
    pub stats: EvolutionStats,
    pub history: EvolutionHistory,
}

/// Statistics from a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionStats {
    /// Generations evaluated.
    pub generations: usize,
    /// Individuals simulated.
    pub total_evaluations: u64,
    pub best_fitness: f32,
    /// Average fitness of the last evaluated generation.
    pub final_avg_fitness: f32,
    pub elapsed_seconds: f64,
    pub stop_reason: StopReason,
}

/// Reason a run stopped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    MaxGenerations,
    TargetReached,
    Stagnation,
    Cancelled,
}

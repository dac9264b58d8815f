//! The generation cycle: simulate, record, select, mutate.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::compute::genotype::GenomeRng;
use crate::compute::parcour::generate_parcour;
use crate::schema::{
    ConfigError, EvolutionConfig, EvolutionHistory, EvolutionPhase, EvolutionProgress,
    EvolutionResult, EvolutionStats, GenerationReport, GenotypeError, Individual, Parcour,
    Population, StopReason,
};

use super::persistence::{PersistenceError, ReportWriter, load_population, save_population};
use super::population::generate_initial_population;
use super::selection::tournament_select;
use super::worker::{
    DispatchError, Dispatcher, LocalExecutor, WorkerPool, WorldFactory, kinematic_factory,
};

/// Errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum EvolutionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Genotype(#[from] GenotypeError),
}

/// Evolution engine that runs the generation cycle.
pub struct EvolutionEngine {
    config: EvolutionConfig,
    rng: GenomeRng,
    dispatcher: Box<dyn Dispatcher>,
    /// Next population to simulate.
    population: Population,
    /// Most recently simulated population.
    evaluated: Option<Population>,
    parcour: Parcour,
    parcour_index: usize,
    parcour_changed: bool,
    history: EvolutionHistory,
    best: Option<Individual>,
    best_fitness: f32,
    stagnation_count: usize,
    generations_run: usize,
    total_evaluations: u64,
    phase: EvolutionPhase,
    report: Option<ReportWriter>,
    cancelled: Arc<AtomicBool>,
}

impl EvolutionEngine {
    /// Create an engine simulating in [`KinematicWorld`](crate::compute::physics::KinematicWorld)s.
    pub fn new(config: EvolutionConfig) -> Result<Self, EvolutionError> {
        Self::with_world_factory(config, kinematic_factory())
    }

    /// Create an engine whose workers build worlds with `factory`.
    ///
    /// One worker runs on the calling thread; more spawn a [`WorkerPool`].
    pub fn with_world_factory(
        config: EvolutionConfig,
        factory: WorldFactory,
    ) -> Result<Self, EvolutionError> {
        config.validate()?;
        let dispatcher: Box<dyn Dispatcher> = if config.workers.count > 1 {
            Box::new(WorkerPool::spawn(
                config.workers.count,
                factory,
                config.simulation.clone(),
                &config.mutation,
                config.workers.timeout_secs.map(Duration::from_secs_f64),
            ))
        } else {
            Box::new(LocalExecutor::new(
                factory,
                config.simulation.clone(),
                &config.mutation,
            ))
        };
        Self::with_dispatcher(config, dispatcher)
    }

    /// Create an engine around an existing dispatcher.
    pub fn with_dispatcher(
        config: EvolutionConfig,
        dispatcher: Box<dyn Dispatcher>,
    ) -> Result<Self, EvolutionError> {
        config.validate()?;
        let seed = config.random_seed.unwrap_or_else(rand::random);

        Ok(Self {
            rng: GenomeRng::new(seed),
            config,
            dispatcher,
            population: Population::new(Vec::new(), 1),
            evaluated: None,
            parcour: Parcour::flat(),
            parcour_index: 0,
            parcour_changed: true,
            history: EvolutionHistory::default(),
            best: None,
            best_fitness: f32::NEG_INFINITY,
            stagnation_count: 0,
            generations_run: 0,
            total_evaluations: 0,
            phase: EvolutionPhase::Initializing,
            report: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Get cancellation handle.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Population waiting to be simulated.
    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn parcour(&self) -> &Parcour {
        &self.parcour
    }

    pub fn history(&self) -> &EvolutionHistory {
        &self.history
    }

    /// Load the population file if it exists, otherwise seed a new
    /// population, and generate the first parcour.
    pub fn initialize(&mut self) -> Result<(), EvolutionError> {
        let size = self.config.population.size;
        self.population = match &self.config.persistence.population_file {
            Some(path) if Path::new(path).exists() => {
                let population =
                    load_population(path, size, &self.config.population, &mut self.rng)?;
                info!(
                    "Loaded {} individuals at generation {} from {path}",
                    population.len(),
                    population.generation_count
                );
                population
            }
            _ => generate_initial_population(&self.config.population, &mut self.rng)?,
        };

        if let Some(path) = &self.config.persistence.report_file {
            self.report = Some(ReportWriter::open(path)?);
        }

        self.parcour = generate_parcour(&self.config.parcour, &mut self.rng);
        self.parcour_index = 0;
        self.parcour_changed = true;
        self.evaluated = None;
        self.generations_run = 0;
        self.phase = EvolutionPhase::Initializing;
        Ok(())
    }

    /// Run one generation and return its report.
    pub fn step_generation(&mut self) -> Result<GenerationReport, EvolutionError> {
        if self.generations_run > 0
            && self.generations_run % self.config.parcour.switch_interval == 0
        {
            self.parcour = generate_parcour(&self.config.parcour, &mut self.rng);
            self.parcour_index += 1;
            self.parcour_changed = true;
            debug!("Switched to parcour {}", self.parcour_index);
        }

        self.phase = EvolutionPhase::Simulating;
        let evaluated =
            self.dispatcher
                .simulate(&self.population, &self.parcour, self.parcour_changed)?;
        self.parcour_changed = false;
        self.total_evaluations += evaluated.len() as u64;

        let report = GenerationReport::from_population(&evaluated, self.parcour_index);
        self.record(&evaluated, &report)?;
        info!(
            "Generation {}: best {:.3}, avg {:.3}, std {:.3}",
            report.generation_count, report.best_fitness, report.avg_fitness, report.fitness_std
        );

        self.phase = EvolutionPhase::Selecting;
        let selected = tournament_select(
            &evaluated,
            self.config.population.tournament_size,
            &mut self.rng,
        );

        self.phase = EvolutionPhase::Mutating;
        let seed = self.rng.next_seed();
        let mut next = self.dispatcher.mutate(&selected, seed)?;
        next.generation_count = evaluated.generation_count + 1;

        self.population = next;
        self.evaluated = Some(evaluated);
        self.generations_run += 1;
        Ok(report)
    }

    /// Update statistics and write the run files.
    fn record(
        &mut self,
        evaluated: &Population,
        report: &GenerationReport,
    ) -> Result<(), EvolutionError> {
        self.history.push(report);

        match evaluated.best() {
            Some(best) if best.rank_fitness() > self.best_fitness => {
                self.best_fitness = best.rank_fitness();
                self.best = Some(best.clone());
                self.stagnation_count = 0;
            }
            _ => self.stagnation_count += 1,
        }

        if let Some(writer) = &mut self.report {
            writer.append(report)?;
        }
        if let Some(path) = &self.config.persistence.population_file {
            save_population(path, evaluated)?;
        }
        Ok(())
    }

    /// Get current progress.
    pub fn progress(&self) -> EvolutionProgress {
        let latest = self.evaluated.as_ref();
        let generation_best = latest
            .and_then(|p| p.best())
            .map(Individual::rank_fitness)
            .unwrap_or(f32::NEG_INFINITY);

        let phase = if self.cancelled.load(Ordering::Relaxed) {
            EvolutionPhase::Stopped
        } else {
            self.phase
        };

        EvolutionProgress {
            generation: latest.map_or(self.population.generation_count, |p| p.generation_count),
            total_generations: self.config.population.max_generations,
            best_fitness: self.best_fitness,
            avg_fitness: latest.and_then(Population::average_fitness).unwrap_or(0.0),
            generation_best,
            stagnation_count: self.stagnation_count,
            best_individual: self.best.clone(),
            history: self.history.clone(),
            phase,
        }
    }

    /// Check if evolution should stop.
    pub fn should_stop(&self) -> Option<StopReason> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Some(StopReason::Cancelled);
        }

        if self.generations_run >= self.config.population.max_generations {
            return Some(StopReason::MaxGenerations);
        }

        if let Some(target) = self.config.population.target_fitness
            && self.best_fitness >= target
        {
            return Some(StopReason::TargetReached);
        }

        if let Some(limit) = self.config.population.stagnation_limit
            && self.stagnation_count >= limit
        {
            return Some(StopReason::Stagnation);
        }

        None
    }

    /// Run evolution with progress callback.
    pub fn run_with_callback<F>(&mut self, callback: F) -> Result<EvolutionResult, EvolutionError>
    where
        F: Fn(&EvolutionProgress),
    {
        let start_time = Instant::now();

        self.initialize()?;
        info!(
            "Evolving {} individuals for up to {} generations on {} worker(s)",
            self.population.len(),
            self.config.population.max_generations,
            self.config.workers.count
        );
        callback(&self.progress());

        let stop_reason = loop {
            if let Some(reason) = self.should_stop() {
                break reason;
            }
            if let Err(e) = self.step_generation() {
                self.phase = EvolutionPhase::Stopped;
                return Err(e);
            }
            callback(&self.progress());
        };

        self.phase = if stop_reason == StopReason::Cancelled {
            EvolutionPhase::Stopped
        } else {
            EvolutionPhase::Complete
        };
        info!(
            "Stopped after {} generations ({stop_reason:?}), best fitness {:.3}",
            self.generations_run, self.best_fitness
        );

        let population = self
            .evaluated
            .clone()
            .unwrap_or_else(|| self.population.clone());

        Ok(EvolutionResult {
            best: self.best.clone(),
            stats: EvolutionStats {
                generations: self.generations_run,
                total_evaluations: self.total_evaluations,
                best_fitness: self.best_fitness,
                final_avg_fitness: population.average_fitness().unwrap_or(0.0),
                elapsed_seconds: start_time.elapsed().as_secs_f64(),
                stop_reason,
            },
            population,
            history: self.history.clone(),
        })
    }

    /// Run evolution (blocking).
    pub fn run(&mut self) -> Result<EvolutionResult, EvolutionError> {
        self.run_with_callback(|_| {})
    }
}

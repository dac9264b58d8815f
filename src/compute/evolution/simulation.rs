//! Per-generation simulation: tick loop, pruning and fitness recording.

use log::debug;

use crate::compute::engine::CyclicStateMachine;
use crate::compute::phenotype::Phenotype;
use crate::compute::physics::PhysicsWorld;
use crate::schema::{Individual, Point, Population, SimulationConfig};

/// Spawn point of every torso.
const ORIGIN: Point = Point::new(0.0, 2.0);

struct Entry {
    individual: Individual,
    machine: CyclicStateMachine,
    phenotype: Option<Phenotype>,
    /// Torso x at the last checkpoint.
    checkpoint_x: f32,
}

impl Entry {
    /// Record fitness and tear the phenotype down.
    fn retire(&mut self, world: &mut dyn PhysicsWorld) {
        if let Some(phenotype) = self.phenotype.take() {
            if self.individual.fitness.is_none() {
                self.individual.fitness = Some(phenotype.fitness(world));
            }
            phenotype.destroy(world);
        }
    }
}

/// One generation's individuals sharing a world.
///
/// The run ends when every individual has been retired, when simulated
/// time reaches the configured duration, or when cancelled. An individual
/// that moves less than `min_movement` within an evaluation window is
/// retired early.
pub struct Simulation {
    world: Box<dyn PhysicsWorld>,
    entries: Vec<Entry>,
    config: SimulationConfig,
    generation_count: usize,
    time: f32,
    next_checkpoint: f32,
    run_over: bool,
}

impl Simulation {
    /// Instantiate every individual and run its engine's setup.
    pub fn new(
        population: &Population,
        mut world: Box<dyn PhysicsWorld>,
        config: SimulationConfig,
    ) -> Self {
        let entries = population
            .individuals
            .iter()
            .map(|individual| {
                let mut individual = individual.clone();
                individual.fitness = None;
                let machine = CyclicStateMachine::from_engine(&individual.engine);
                let phenotype = Phenotype::instantiate(&individual, world.as_mut(), ORIGIN);
                machine.initial_step(&phenotype, world.as_mut(), 0.0);
                Entry {
                    individual,
                    machine,
                    checkpoint_x: phenotype.start_x,
                    phenotype: Some(phenotype),
                }
            })
            .collect();

        Self {
            world,
            entries,
            next_checkpoint: config.evaluation_window,
            config,
            generation_count: population.generation_count,
            time: 0.0,
            run_over: population.is_empty(),
        }
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn is_over(&self) -> bool {
        self.run_over
    }

    /// Individuals still being simulated.
    pub fn active_count(&self) -> usize {
        self.entries.iter().filter(|e| e.phenotype.is_some()).count()
    }

    /// Stop at the next tick.
    pub fn cancel(&mut self) {
        self.run_over = true;
    }

    /// Advance one tick. Returns `false` once the run is over.
    pub fn tick(&mut self) -> bool {
        if self.run_over {
            return false;
        }

        let world = self.world.as_mut();
        for entry in &mut self.entries {
            if let Some(phenotype) = entry.phenotype.as_mut() {
                entry.machine.step(phenotype, world, self.time);
            }
        }
        world.step(self.config.dt);
        self.time += self.config.dt;

        if self.time >= self.next_checkpoint {
            self.checkpoint();
            self.next_checkpoint += self.config.evaluation_window;
        }

        if self.time >= self.config.duration {
            debug!(
                "Generation {} timed out at t={:.2} with {} active",
                self.generation_count,
                self.time,
                self.active_count()
            );
            self.retire_all();
        }

        if self.active_count() == 0 {
            self.run_over = true;
        }
        !self.run_over
    }

    /// Retire individuals that did not make progress since the last check.
    fn checkpoint(&mut self) {
        let world = self.world.as_mut();
        let min_movement = self.config.min_movement;
        for (i, entry) in self.entries.iter_mut().enumerate() {
            let Some(x) = entry
                .phenotype
                .as_ref()
                .and_then(|p| p.position(&*world))
                .map(|p| p.x)
            else {
                continue;
            };
            let progress = x - entry.checkpoint_x;
            if progress < min_movement {
                debug!(
                    "Pruning individual {i} at t={:.2}: moved {progress:.3}",
                    self.time
                );
                entry.retire(world);
            } else {
                entry.checkpoint_x = x;
            }
        }
    }

    fn retire_all(&mut self) {
        let world = self.world.as_mut();
        for entry in &mut self.entries {
            entry.retire(world);
        }
        self.run_over = true;
    }

    /// Tick until the run is over and return the evaluated population.
    pub fn run(mut self) -> Population {
        while self.tick() {}
        self.into_population()
    }

    /// Evaluated population; individuals still active are retired now.
    pub fn into_population(mut self) -> Population {
        self.retire_all();
        let individuals = self.entries.into_iter().map(|e| e.individual).collect();
        Population::new(individuals, self.generation_count)
    }
}

/// Simulate `population` to completion in `world`.
pub fn simulate(
    population: &Population,
    world: Box<dyn PhysicsWorld>,
    config: &SimulationConfig,
) -> Population {
    Simulation::new(population, world, config.clone()).run()
}

//! Configuration types for an evolution run.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Population and generation settings.
    #[serde(default)]
    pub population: PopulationConfig,
    /// Per-individual simulation settings.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Mutation rule parameters.
    #[serde(default)]
    pub mutation: MutationConfig,
    /// Parallel worker settings.
    #[serde(default)]
    pub workers: WorkerConfig,
    /// Terrain generation settings.
    #[serde(default)]
    pub parcour: ParcourConfig,
    /// Population and report files.
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

/// Population and generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Number of individuals, fixed across generations.
    #[serde(default = "default_population_size")]
    pub size: usize,
    /// Inclusive range of body polygon vertex counts for the first generation.
    #[serde(default = "default_body_points_range")]
    pub body_points_range: (usize, usize),
    /// Individuals drawn per tournament round.
    #[serde(default = "default_tournament_size")]
    pub tournament_size: usize,
    /// Maximum number of generations.
    #[serde(default = "default_max_generations")]
    pub max_generations: usize,
    /// Target body mass distributed over the mass-bearing parts.
    #[serde(default = "default_individual_mass")]
    pub individual_mass: f32,
    /// Stop early once this fitness is reached.
    #[serde(default)]
    pub target_fitness: Option<f32>,
    /// Stop if the best fitness does not improve for N generations.
    #[serde(default)]
    pub stagnation_limit: Option<usize>,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            size: default_population_size(),
            body_points_range: default_body_points_range(),
            tournament_size: default_tournament_size(),
            max_generations: default_max_generations(),
            individual_mass: default_individual_mass(),
            target_fitness: None,
            stagnation_limit: None,
        }
    }
}

impl PopulationConfig {
    /// Number of distinct body-point-count buckets.
    pub fn bucket_count(&self) -> usize {
        let (min, max) = self.body_points_range;
        max.saturating_sub(min) + 1
    }
}

fn default_population_size() -> usize {
    20
}
fn default_body_points_range() -> (usize, usize) {
    (4, 8)
}
fn default_tournament_size() -> usize {
    3
}
fn default_max_generations() -> usize {
    50
}
fn default_individual_mass() -> f32 {
    20.0
}

/// Simulation settings, in simulated seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Run length; remaining individuals are evaluated at this time.
    #[serde(default = "default_duration")]
    pub duration: f32,
    /// Time step per tick.
    #[serde(default = "default_dt")]
    pub dt: f32,
    /// Interval between movement checks.
    #[serde(default = "default_evaluation_window")]
    pub evaluation_window: f32,
    /// Minimum forward progress per window before an individual is pruned.
    #[serde(default = "default_min_movement")]
    pub min_movement: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            duration: default_duration(),
            dt: default_dt(),
            evaluation_window: default_evaluation_window(),
            min_movement: default_min_movement(),
        }
    }
}

fn default_duration() -> f32 {
    20.0
}
fn default_dt() -> f32 {
    1.0 / 60.0
}
fn default_evaluation_window() -> f32 {
    3.0
}
fn default_min_movement() -> f32 {
    0.05
}

/// Parameters for all mutation rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MutationConfig {
    #[serde(default)]
    pub body: BodyRuleConfig,
    #[serde(default)]
    pub leg: LegRuleConfig,
    #[serde(default)]
    pub engine: EngineRuleConfig,
}

/// Body polygon and hip placement rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BodyRuleConfig {
    /// Per-vertex replacement probability.
    #[serde(default = "default_body_point_probability")]
    pub body_point: f32,
    /// Per-hip regeneration probability.
    #[serde(default = "default_hip_joint_probability")]
    pub hip_joint: f32,
}

impl Default for BodyRuleConfig {
    fn default() -> Self {
        Self {
            body_point: default_body_point_probability(),
            hip_joint: default_hip_joint_probability(),
        }
    }
}

fn default_body_point_probability() -> f32 {
    0.1
}
fn default_hip_joint_probability() -> f32 {
    0.1
}

/// Bounded random walk parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepParam {
    pub probability: f32,
    pub step: f32,
    /// Exclusive upper limit.
    #[serde(default)]
    pub max: Option<f32>,
}

impl StepParam {
    pub const fn new(probability: f32, step: f32, max: Option<f32>) -> Self {
        Self {
            probability,
            step,
            max,
        }
    }
}

/// Leg geometry rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegRuleConfig {
    #[serde(default = "default_height_param")]
    pub height: StepParam,
    #[serde(default = "default_height_factor_param")]
    pub height_factor: StepParam,
    #[serde(default = "default_width_param")]
    pub width: StepParam,
}

impl Default for LegRuleConfig {
    fn default() -> Self {
        Self {
            height: default_height_param(),
            height_factor: default_height_factor_param(),
            width: default_width_param(),
        }
    }
}

fn default_height_param() -> StepParam {
    StepParam::new(0.1, 0.05, None)
}
fn default_height_factor_param() -> StepParam {
    StepParam::new(0.1, 0.05, Some(1.0))
}
fn default_width_param() -> StepParam {
    StepParam::new(0.1, 0.01, None)
}

/// Engine descriptor rule. List-level probabilities are scaled by
/// `1 / list length`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineRuleConfig {
    #[serde(default = "default_add_probability")]
    pub add: f32,
    #[serde(default = "default_remove_probability")]
    pub remove: f32,
    #[serde(default = "default_mutate_probability")]
    pub mutate: f32,
    #[serde(default = "default_lens_probability")]
    pub lens_index: f32,
    #[serde(default = "default_lens_probability")]
    pub lens_side: f32,
    #[serde(default = "default_lens_probability")]
    pub lens_type: f32,
    #[serde(default = "default_param_probability")]
    pub param: f32,
    #[serde(default = "default_combinator_probability")]
    pub combinator: f32,
}

impl Default for EngineRuleConfig {
    fn default() -> Self {
        Self {
            add: default_add_probability(),
            remove: default_remove_probability(),
            mutate: default_mutate_probability(),
            lens_index: default_lens_probability(),
            lens_side: default_lens_probability(),
            lens_type: default_lens_probability(),
            param: default_param_probability(),
            combinator: default_combinator_probability(),
        }
    }
}

fn default_add_probability() -> f32 {
    0.1
}
fn default_remove_probability() -> f32 {
    0.1
}
fn default_mutate_probability() -> f32 {
    0.5
}
fn default_lens_probability() -> f32 {
    0.05
}
fn default_param_probability() -> f32 {
    0.3
}
fn default_combinator_probability() -> f32 {
    0.05
}

/// Parallel worker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of workers; 1 runs everything on the calling thread.
    #[serde(default = "default_worker_count")]
    pub count: usize,
    /// Give up on a generation if a worker stays silent this long.
    /// `None` waits indefinitely.
    #[serde(default)]
    pub timeout_secs: Option<f64>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: default_worker_count(),
            timeout_secs: None,
        }
    }
}

fn default_worker_count() -> usize {
    1
}

/// Terrain generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParcourConfig {
    /// Largest height change between neighbouring samples.
    #[serde(default = "default_max_slope")]
    pub max_slope: f32,
    /// Height ceiling.
    #[serde(default = "default_highest_y")]
    pub highest_y: f32,
    /// Number of samples.
    #[serde(default = "default_parcour_length")]
    pub length: usize,
    /// Generations between terrain switches.
    #[serde(default = "default_switch_interval")]
    pub switch_interval: usize,
}

impl Default for ParcourConfig {
    fn default() -> Self {
        Self {
            max_slope: default_max_slope(),
            highest_y: default_highest_y(),
            length: default_parcour_length(),
            switch_interval: default_switch_interval(),
        }
    }
}

fn default_max_slope() -> f32 {
    0.2
}
fn default_highest_y() -> f32 {
    2.0
}
fn default_parcour_length() -> usize {
    200
}
fn default_switch_interval() -> usize {
    10
}

/// Files written and read by a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Population snapshot loaded at start (if present) and saved each generation.
    #[serde(default)]
    pub population_file: Option<String>,
    /// JSON-lines generation report.
    #[serde(default)]
    pub report_file: Option<String>,
}

impl EvolutionConfig {
    /// Validate configuration. Every error here is fatal at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let pop = &self.population;
        if pop.size == 0 {
            return Err(ConfigError::EmptyPopulation);
        }

        let (min, max) = pop.body_points_range;
        if min < 3 || min > max {
            return Err(ConfigError::InvalidBodyPointRange { min, max });
        }
        if pop.size % pop.bucket_count() != 0 {
            return Err(ConfigError::BucketMismatch {
                size: pop.size,
                buckets: pop.bucket_count(),
            });
        }

        if self.workers.count == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if pop.size % self.workers.count != 0 {
            return Err(ConfigError::WorkerMismatch {
                size: pop.size,
                workers: self.workers.count,
            });
        }

        if pop.tournament_size == 0 {
            return Err(ConfigError::InvalidTournamentSize);
        }
        if pop.individual_mass <= 0.0 {
            return Err(ConfigError::InvalidMass);
        }

        let sim = &self.simulation;
        if sim.dt <= 0.0 {
            return Err(ConfigError::InvalidTimeStep);
        }
        if sim.duration <= 0.0 || sim.evaluation_window <= 0.0 {
            return Err(ConfigError::InvalidDuration);
        }

        let check_probability = |value: f32, name: &str| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(ConfigError::InvalidProbability {
                    name: name.to_string(),
                    value,
                })
            }
        };

        let mutation = &self.mutation;
        check_probability(mutation.body.body_point, "body.body_point")?;
        check_probability(mutation.body.hip_joint, "body.hip_joint")?;
        for (param, name) in [
            (&mutation.leg.height, "leg.height"),
            (&mutation.leg.height_factor, "leg.height_factor"),
            (&mutation.leg.width, "leg.width"),
        ] {
            check_probability(param.probability, name)?;
            if param.step <= 0.0 {
                return Err(ConfigError::InvalidStep(name.to_string()));
            }
        }
        let engine = &mutation.engine;
        check_probability(engine.add, "engine.add")?;
        check_probability(engine.remove, "engine.remove")?;
        check_probability(engine.mutate, "engine.mutate")?;
        check_probability(engine.lens_index, "engine.lens_index")?;
        check_probability(engine.lens_side, "engine.lens_side")?;
        check_probability(engine.lens_type, "engine.lens_type")?;
        check_probability(engine.param, "engine.param")?;
        check_probability(engine.combinator, "engine.combinator")?;

        if self.parcour.switch_interval == 0 {
            return Err(ConfigError::InvalidSwitchInterval);
        }

        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Population size must be non-zero")]
    EmptyPopulation,
    #[error("Invalid body point range ({min}, {max}): need 3 <= min <= max")]
    InvalidBodyPointRange { min: usize, max: usize },
    #[error("Population size {size} is not divisible by {buckets} body point buckets")]
    BucketMismatch { size: usize, buckets: usize },
    #[error("Worker count must be non-zero")]
    NoWorkers,
    #[error("Population size {size} is not divisible by {workers} workers")]
    WorkerMismatch { size: usize, workers: usize },
    #[error("Tournament size must be non-zero")]
    InvalidTournamentSize,
    #[error("Individual mass must be positive")]
    InvalidMass,
    #[error("Time step must be positive")]
    InvalidTimeStep,
    #[error("Duration and evaluation window must be positive")]
    InvalidDuration,
    #[error("Probability {name} = {value} is outside [0, 1]")]
    InvalidProbability { name: String, value: f32 },
    #[error("Mutation step for {0} must be positive")]
    InvalidStep(String),
    #[error("Parcour switch interval must be non-zero")]
    InvalidSwitchInterval,
}

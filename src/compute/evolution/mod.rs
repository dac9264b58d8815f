//! Evolutionary loop for legged creatures.
//!
//! # Overview
//!
//! - **Initial population** (`population`): individuals spread evenly over
//!   the configured body-point range
//! - **Simulation** (`simulation`): per-tick run of one generation, pruning
//!   individuals that stop moving and recording fitness
//! - **Selection** (`selection`): tournament selection
//! - **Workers** (`worker`): partitioned simulation and mutation over
//!   message channels, or on the calling thread
//! - **Persistence** (`persistence`): population snapshots and generation reports
//! - **Engine** (`search`): the generation cycle with stop conditions
//!
//! # Example
//!
//! ```rust,no_run
//! use legged_evolution::compute::evolution::EvolutionEngine;
//! use legged_evolution::schema::EvolutionConfig;
//!
//! let mut engine = EvolutionEngine::new(EvolutionConfig::default())?;
//! let result = engine.run_with_callback(|progress| {
//!     println!("Generation {}: best fitness = {:.3}",
//!         progress.generation, progress.best_fitness);
//! })?;
//! println!("Stopped: {:?}", result.stats.stop_reason);
//! # Ok::<(), legged_evolution::compute::evolution::EvolutionError>(())
//! ```

mod persistence;
mod population;
mod search;
mod selection;
mod simulation;
mod worker;

pub use persistence::{
    PersistenceError, ReportWriter, load_population, read_reports, save_population,
};
pub use population::generate_initial_population;
pub use search::{EvolutionEngine, EvolutionError};
pub use selection::{TournamentRound, tournament_round, tournament_select};
pub use simulation::{Simulation, simulate};
pub use worker::{
    DispatchError, Dispatcher, LocalExecutor, WorkerPool, WorkerRequest, WorkerResponse,
    WorldFactory, kinematic_factory,
};

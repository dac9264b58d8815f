//! Legged evolution - A genetic algorithm for simulated legged creatures.
//!
//! Individuals are six-legged creatures described by a genotype: a body
//! polygon, three leg pairs and an engine. The engine is a list of movement
//! descriptors (lock an angle, set a motor speed, wait until a joint reaches
//! a limit, ...) that a cyclic state machine plays against the creature's
//! joints. Each generation is simulated on a generated terrain, scored by
//! forward displacement, tournament-selected and mutated.
//!
//! # Architecture
//!
//! The crate is split into two main modules:
//!
//! - `schema`: Serializable genotype, population and configuration types
//! - `compute`: Seeding, gait execution, mutation and the evolutionary loop
//!
//! # Example
//!
//! ```rust,no_run
//! use legged_evolution::{
//!     compute::physics::KinematicWorld,
//!     compute::evolution::simulate,
//!     compute::genotype::{GenomeRng, IndividualOptions, Seedable},
//!     schema::{Individual, Parcour, Population, SimulationConfig},
//! };
//!
//! let mut rng = GenomeRng::new(42);
//! let individuals = (0..4)
//!     .map(|_| Individual::seed(&IndividualOptions::default(), &mut rng))
//!     .collect();
//! let population = Population::new(individuals, 1);
//!
//! let world = Box::new(KinematicWorld::new(Parcour::flat()));
//! let evaluated = simulate(&population, world, &SimulationConfig::default());
//!
//! for individual in &evaluated.individuals {
//!     println!("fitness = {:?}", individual.fitness);
//! }
//! ```

pub mod compute;
pub mod schema;

// Re-export commonly used types
pub use compute::evolution::{EvolutionEngine, EvolutionError};
pub use schema::{EvolutionConfig, Individual, Population};

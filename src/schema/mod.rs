//! Schema module - Serializable genotype, population and configuration types.

mod config;
mod evolution;
mod genotype;
mod movement;
mod parcour;
mod population;

pub use config::*;
pub use evolution::*;
pub use genotype::*;
pub use movement::*;
pub use parcour::*;
pub use population::*;

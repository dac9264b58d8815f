//! Genotype operations: seeding, mass distribution and record building.

pub mod geometry;
mod mass;
mod parts;
mod rng;
mod seed;

pub use mass::*;
pub use parts::*;
pub use rng::*;
pub use seed::*;

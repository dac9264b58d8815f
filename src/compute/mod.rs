//! Compute module - Genotype operations, gait execution and evolution.

pub mod engine;
pub mod evolution;
pub mod genotype;
pub mod movement;
pub mod mutation;
pub mod parcour;
pub mod phenotype;
pub mod physics;

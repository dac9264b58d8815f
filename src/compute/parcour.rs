//! Terrain generation.

use crate::schema::{Parcour, ParcourConfig, ParcourKind};

use super::genotype::GenomeRng;

/// Flat run-up before the terrain starts to vary.
const FLAT_START: usize = 10;

/// Generate a mountain height field by bounded random walk.
///
/// Neighbouring samples differ by at most `max_slope`; heights stay in
/// `[0, highest_y]`.
pub fn generate_parcour(config: &ParcourConfig, rng: &mut GenomeRng) -> Parcour {
    let mut value = Vec::with_capacity(config.length);
    let mut height = 0.0f32;
    for i in 0..config.length {
        if i >= FLAT_START {
            let delta = rng.uniform((-config.max_slope, config.max_slope));
            height = (height + delta).clamp(0.0, config.highest_y.max(0.0));
        }
        value.push(height);
    }
    Parcour {
        kind: ParcourKind::Mountain,
        value,
    }
}

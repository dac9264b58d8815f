//! Initial population generation.

use crate::compute::genotype::{BodyOptions, GenomeRng, IndividualOptions, Seedable};
use crate::schema::{ConfigError, Individual, Population, PopulationConfig};

/// Seed the first generation.
///
/// Individuals are spread evenly over the configured body-point range:
/// with `b` buckets, the first `size / b` individuals get the smallest
/// vertex count, the next `size / b` the one after, and so on.
pub fn generate_initial_population(
    config: &PopulationConfig,
    rng: &mut GenomeRng,
) -> Result<Population, ConfigError> {
    let (min, max) = config.body_points_range;
    if min > max {
        return Err(ConfigError::InvalidBodyPointRange { min, max });
    }
    let buckets = config.bucket_count();
    if config.size == 0 {
        return Err(ConfigError::EmptyPopulation);
    }
    if config.size % buckets != 0 {
        return Err(ConfigError::BucketMismatch {
            size: config.size,
            buckets,
        });
    }

    let per_bucket = config.size / buckets;
    let individuals = (0..config.size)
        .map(|i| {
            let options = IndividualOptions {
                mass: Some(config.individual_mass),
                body: BodyOptions {
                    body_points_count: Some(min + i / per_bucket),
                    ..Default::default()
                },
                ..Default::default()
            };
            Individual::seed(&options, rng)
        })
        .collect();

    Ok(Population::new(individuals, 1))
}

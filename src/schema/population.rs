//! Population records.

use serde::{Deserialize, Serialize};

use super::genotype::Individual;

/// A generation's individuals.
///
/// Serialized as `{ "generationCount": n, "individuals": [...] }`, which is
/// both the persisted snapshot format and the worker payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Population {
    pub generation_count: usize,
    pub individuals: Vec<Individual>,
}

impl Population {
    pub fn new(individuals: Vec<Individual>, generation_count: usize) -> Self {
        Self {
            generation_count,
            individuals,
        }
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    /// Individual with the highest recorded fitness.
    pub fn best(&self) -> Option<&Individual> {
        self.individuals
            .iter()
            .filter(|i| i.fitness.is_some())
            .max_by(|a, b| a.rank_fitness().total_cmp(&b.rank_fitness()))
    }

    /// Mean of recorded fitness values.
    pub fn average_fitness(&self) -> Option<f32> {
        let values: Vec<f32> = self.individuals.iter().filter_map(|i| i.fitness).collect();
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f32>() / values.len() as f32)
        }
    }

    /// Standard deviation of recorded fitness values.
    pub fn fitness_std(&self) -> Option<f32> {
        let avg = self.average_fitness()?;
        let values: Vec<f32> = self.individuals.iter().filter_map(|i| i.fitness).collect();
        let variance =
            values.iter().map(|f| (f - avg).powi(2)).sum::<f32>() / values.len() as f32;
        Some(variance.sqrt())
    }

    /// Sort by descending fitness; stable for equal values.
    pub fn sort_by_fitness(&mut self) {
        self.individuals
            .sort_by(|a, b| b.rank_fitness().total_cmp(&a.rank_fitness()));
    }

    /// Split into `parts` contiguous, equal-sized partitions.
    ///
    /// Callers validate divisibility up front; a remainder lands in the
    /// last partition.
    pub fn partition(&self, parts: usize) -> Vec<Population> {
        let parts = parts.max(1);
        let size = self.individuals.len() / parts;
        (0..parts)
            .map(|i| {
                let start = i * size;
                let end = if i + 1 == parts {
                    self.individuals.len()
                } else {
                    start + size
                };
                Population::new(
                    self.individuals[start..end].to_vec(),
                    self.generation_count,
                )
            })
            .collect()
    }

    /// Concatenate partitions in order.
    pub fn merge(parts: Vec<Population>, generation_count: usize) -> Population {
        let individuals = parts.into_iter().flat_map(|p| p.individuals).collect();
        Population::new(individuals, generation_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::genotype::{GenomeRng, IndividualOptions, Seedable};

    fn population(fitness: &[Option<f32>]) -> Population {
        let mut rng = GenomeRng::new(1);
        let individuals = fitness
            .iter()
            .map(|f| {
                let mut ind = Individual::seed(&IndividualOptions::default(), &mut rng);
                ind.fitness = *f;
                ind
            })
            .collect();
        Population::new(individuals, 1)
    }

    #[test]
    fn test_statistics() {
        let pop = population(&[Some(1.0), Some(3.0), None]);
        assert_eq!(pop.best().unwrap().fitness, Some(3.0));
        assert!((pop.average_fitness().unwrap() - 2.0).abs() < 1e-6);
        assert!((pop.fitness_std().unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_sort_by_fitness() {
        let mut pop = population(&[Some(1.0), None, Some(5.0), Some(2.0)]);
        pop.sort_by_fitness();
        let order: Vec<_> = pop.individuals.iter().map(|i| i.fitness).collect();
        assert_eq!(order, vec![Some(5.0), Some(2.0), Some(1.0), None]);
    }

    #[test]
    fn test_partition_and_merge() {
        let pop = population(&[Some(0.0), Some(1.0), Some(2.0), Some(3.0)]);
        let parts = pop.partition(2);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].individuals[1].fitness, Some(1.0));
        assert_eq!(parts[1].individuals[0].fitness, Some(2.0));

        let merged = Population::merge(parts, pop.generation_count);
        assert_eq!(merged, pop);
    }
}

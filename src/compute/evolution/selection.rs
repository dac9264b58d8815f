//! Tournament selection.

use crate::compute::genotype::GenomeRng;
use crate::schema::Population;

/// Outcome of one tournament round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TournamentRound {
    /// Index of the winner.
    pub winner: usize,
    /// Indices drawn, in draw order.
    pub contenders: Vec<usize>,
}

/// Draw `k` indices with replacement and pick the fittest.
///
/// A later contender only wins with strictly greater fitness, so ties go
/// to the first drawn. Unevaluated individuals rank last. Returns `None`
/// for an empty population.
pub fn tournament_round(
    population: &Population,
    k: usize,
    rng: &mut GenomeRng,
) -> Option<TournamentRound> {
    if population.is_empty() {
        return None;
    }
    let contenders: Vec<usize> = (0..k.max(1))
        .map(|_| rng.index(population.len()))
        .collect();
    let mut winner = contenders[0];
    for &index in &contenders[1..] {
        if population.individuals[index].rank_fitness()
            > population.individuals[winner].rank_fitness()
        {
            winner = index;
        }
    }
    Some(TournamentRound { winner, contenders })
}

/// Run one tournament per individual and collect the winners.
///
/// The generation count is left unchanged.
pub fn tournament_select(population: &Population, k: usize, rng: &mut GenomeRng) -> Population {
    let individuals = (0..population.len())
        .filter_map(|_| tournament_round(population, k, rng))
        .map(|round| population.individuals[round.winner].clone())
        .collect();
    Population::new(individuals, population.generation_count)
}

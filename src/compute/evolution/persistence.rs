//! Population snapshots and generation reports on disk.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::warn;
use serde::Deserialize;
use serde_json::Value;

use crate::compute::genotype::{
    BodyOptions, GenomeRng, IndividualOptions, Seedable, build, record,
};
use crate::schema::{GenerationReport, GenotypeError, Individual, Population, PopulationConfig};

/// Errors reading or writing run files.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Malformed population file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid individual {index}: {source}")]
    Genotype {
        index: usize,
        #[source]
        source: GenotypeError,
    },
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> PersistenceError + '_ {
    move |source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Snapshot with individuals kept as plain records until checked.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSnapshot {
    generation_count: usize,
    individuals: Vec<Value>,
}

/// Write `population` as `{ generationCount, individuals }`.
pub fn save_population(path: impl AsRef<Path>, population: &Population) -> Result<(), PersistenceError> {
    let path = path.as_ref();
    let individuals = population
        .individuals
        .iter()
        .enumerate()
        .map(|(index, individual)| {
            record(individual).map_err(|source| PersistenceError::Genotype { index, source })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let snapshot = serde_json::json!({
        "generationCount": population.generation_count,
        "individuals": individuals,
    });
    let json = serde_json::to_string_pretty(&snapshot)?;
    fs::write(path, json).map_err(io_error(path))
}

/// Load a snapshot, sorted by descending fitness and resized to `size`.
///
/// Extra individuals are dropped from the bottom; missing ones are seeded
/// fresh with body-point counts drawn from the configured range.
pub fn load_population(
    path: impl AsRef<Path>,
    size: usize,
    config: &PopulationConfig,
    rng: &mut GenomeRng,
) -> Result<Population, PersistenceError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(io_error(path))?;
    let raw: RawSnapshot = serde_json::from_str(&text)?;

    let individuals = raw
        .individuals
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            build(value).map_err(|source| PersistenceError::Genotype { index, source })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut population = Population::new(individuals, raw.generation_count);
    population.sort_by_fitness();
    population.individuals.truncate(size);

    let missing = size - population.len();
    if missing > 0 {
        warn!(
            "Population file {} holds {} individuals, seeding {missing} more",
            path.display(),
            population.len()
        );
        population
            .individuals
            .extend((0..missing).map(|_| seed_individual(config, rng)));
    }
    Ok(population)
}

fn seed_individual(config: &PopulationConfig, rng: &mut GenomeRng) -> Individual {
    let options = IndividualOptions {
        mass: Some(config.individual_mass),
        body: BodyOptions {
            body_points_count: Some(rng.uniform_usize(config.body_points_range)),
            ..Default::default()
        },
        ..Default::default()
    };
    Individual::seed(&options, rng)
}

/// Appends one JSON line per generation.
pub struct ReportWriter {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl ReportWriter {
    /// Open `path` for appending, creating it if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_error(&path))?;
        Ok(Self {
            writer: BufWriter::new(file),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, report: &GenerationReport) -> Result<(), PersistenceError> {
        let line = serde_json::to_string(report)?;
        writeln!(self.writer, "{line}")
            .and_then(|()| self.writer.flush())
            .map_err(io_error(&self.path))
    }
}

/// Read every report line of a file.
pub fn read_reports(path: impl AsRef<Path>) -> Result<Vec<GenerationReport>, PersistenceError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(io_error(path))?;
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(PersistenceError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn population(fitness: &[Option<f32>], generation_count: usize) -> Population {
        let mut rng = GenomeRng::new(12);
        let individuals = fitness
            .iter()
            .map(|&f| {
                let mut individual = Individual::seed(&IndividualOptions::default(), &mut rng);
                individual.fitness = f;
                individual
            })
            .collect();
        Population::new(individuals, generation_count)
    }

    #[test]
    fn test_save_load_sorted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("population.json");
        let saved = population(&[Some(0.5), Some(2.0), Some(1.0)], 7);
        save_population(&path, &saved).unwrap();

        let mut rng = GenomeRng::new(0);
        let loaded = load_population(&path, 3, &PopulationConfig::default(), &mut rng).unwrap();
        assert_eq!(loaded.generation_count, 7);
        let order: Vec<_> = loaded.individuals.iter().map(|i| i.fitness).collect();
        assert_eq!(order, vec![Some(2.0), Some(1.0), Some(0.5)]);
        assert_eq!(loaded.individuals[0], saved.individuals[1]);
    }

    #[test]
    fn test_load_truncates_and_pads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("population.json");
        save_population(&path, &population(&[Some(1.0), Some(3.0), None], 2)).unwrap();

        let config = PopulationConfig::default();
        let mut rng = GenomeRng::new(4);
        let truncated = load_population(&path, 2, &config, &mut rng).unwrap();
        assert_eq!(truncated.len(), 2);
        assert_eq!(truncated.individuals[1].fitness, Some(1.0));

        let padded = load_population(&path, 5, &config, &mut rng).unwrap();
        assert_eq!(padded.len(), 5);
        assert!(padded.individuals[3..].iter().all(|i| i.fitness.is_none()));
        for individual in &padded.individuals[3..] {
            let count = individual.body.body_points_count;
            assert!((4..=8).contains(&count));
            assert!((individual.total_mass() - config.individual_mass).abs() < 1e-3);
        }
    }

    #[test]
    fn test_malformed_file_is_fatal() {
        let dir = tempdir().unwrap();
        let config = PopulationConfig::default();
        let mut rng = GenomeRng::new(0);

        let path = dir.path().join("broken.json");
        fs::write(&path, "{ \"generationCount\": 1, ").unwrap();
        assert!(matches!(
            load_population(&path, 1, &config, &mut rng),
            Err(PersistenceError::Json(_))
        ));

        let path = dir.path().join("shape.json");
        fs::write(
            &path,
            r#"{ "generationCount": 1, "individuals": [{ "body": {} }] }"#,
        )
        .unwrap();
        assert!(matches!(
            load_population(&path, 1, &config, &mut rng),
            Err(PersistenceError::Genotype { index: 0, .. })
        ));

        let missing = dir.path().join("missing.json");
        assert!(matches!(
            load_population(&missing, 1, &config, &mut rng),
            Err(PersistenceError::Io { .. })
        ));
    }

    #[test]
    fn test_report_lines_append() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.jsonl");
        let first = GenerationReport::from_population(&population(&[Some(1.0)], 1), 0);
        let second = GenerationReport::from_population(&population(&[Some(2.0)], 2), 0);

        ReportWriter::open(&path).unwrap().append(&first).unwrap();
        let mut writer = ReportWriter::open(&path).unwrap();
        writer.append(&second).unwrap();
        assert_eq!(writer.path(), path.as_path());

        assert_eq!(read_reports(&path).unwrap(), vec![first, second]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_roundtrip_keeps_count_and_order(
            fitness in prop::collection::vec(-5.0f32..5.0, 1..8),
            generation_count in 1usize..100,
        ) {
            let dir = tempdir().unwrap();
            let path = dir.path().join("population.json");
            let fitness: Vec<Option<f32>> = fitness.into_iter().map(Some).collect();
            save_population(&path, &population(&fitness, generation_count)).unwrap();

            let mut rng = GenomeRng::new(0);
            let loaded = load_population(&path, fitness.len(), &PopulationConfig::default(), &mut rng).unwrap();
            prop_assert_eq!(loaded.generation_count, generation_count);
            prop_assert_eq!(loaded.len(), fitness.len());
            for pair in loaded.individuals.windows(2) {
                prop_assert!(pair[0].rank_fitness() >= pair[1].rank_fitness());
            }
        }
    }
}

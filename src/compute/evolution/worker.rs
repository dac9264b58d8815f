//! Work distribution across simulation workers.
//!
//! A population is split into contiguous partitions, one per worker. Each
//! worker receives its partition as a serialized payload, simulates (or
//! mutates) it and replies with the serialized result. The coordinator
//! merges partitions in worker order once every worker has reported.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error};
use serde::{Deserialize, Serialize};

use crate::compute::mutation::Mutator;
use crate::compute::physics::{KinematicWorld, PhysicsWorld};
use crate::schema::{MutationConfig, Parcour, Population, SimulationConfig};

use super::simulation::simulate;

/// Builds a fresh world for one generation on the given terrain.
pub type WorldFactory = Arc<dyn Fn(&Parcour) -> Box<dyn PhysicsWorld> + Send + Sync>;

/// Factory for headless [`KinematicWorld`]s.
pub fn kinematic_factory() -> WorldFactory {
    Arc::new(|parcour: &Parcour| -> Box<dyn PhysicsWorld> {
        Box::new(KinematicWorld::new(parcour.clone()))
    })
}

/// Coordinator → worker messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkerRequest {
    /// Simulate a partition. `parcour` is only present when it changed.
    #[serde(rename_all = "camelCase")]
    Receive {
        population: String,
        generation_count: usize,
        parcour: Option<Parcour>,
    },
    /// Mutate a partition.
    #[serde(rename_all = "camelCase")]
    MutationReceive {
        population: String,
        generation_count: usize,
        seed: u64,
    },
    Shutdown,
}

/// Worker → coordinator messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkerResponse {
    #[serde(rename_all = "camelCase")]
    Finished { population: String, worker_id: usize },
    #[serde(rename_all = "camelCase")]
    MutationFinished { population: String, worker_id: usize },
    #[serde(rename_all = "camelCase")]
    Failed { worker_id: usize, error: String },
}

/// Distribution failures.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Worker channel disconnected")]
    Disconnected,
    #[error("No worker response within {0:?}")]
    Timeout(Duration),
    #[error("Payload codec error: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("Worker {worker_id} failed: {error}")]
    WorkerFailed { worker_id: usize, error: String },
    #[error("Unexpected response from worker {0}")]
    UnexpectedResponse(usize),
    #[error("Worker pool is unusable after a failed generation")]
    Poisoned,
}

/// Runs simulation and mutation for the evolutionary loop.
pub trait Dispatcher {
    /// Evaluate every individual on `parcour`.
    fn simulate(
        &mut self,
        population: &Population,
        parcour: &Parcour,
        parcour_changed: bool,
    ) -> Result<Population, DispatchError>;

    /// Mutate every individual, deterministically for a given `seed`.
    fn mutate(&mut self, population: &Population, seed: u64) -> Result<Population, DispatchError>;
}

/// Runs everything on the calling thread.
pub struct LocalExecutor {
    factory: WorldFactory,
    simulation: SimulationConfig,
    mutator: Mutator,
}

impl LocalExecutor {
    pub fn new(factory: WorldFactory, simulation: SimulationConfig, mutation: &MutationConfig) -> Self {
        Self {
            factory,
            simulation,
            mutator: Mutator::from_config(mutation),
        }
    }
}

impl Dispatcher for LocalExecutor {
    fn simulate(
        &mut self,
        population: &Population,
        parcour: &Parcour,
        _parcour_changed: bool,
    ) -> Result<Population, DispatchError> {
        Ok(simulate(population, (self.factory)(parcour), &self.simulation))
    }

    fn mutate(&mut self, population: &Population, seed: u64) -> Result<Population, DispatchError> {
        Ok(self.mutator.mutate_population(population, seed))
    }
}

/// State owned by one worker thread.
struct Worker {
    id: usize,
    parcour: Parcour,
    factory: WorldFactory,
    simulation: SimulationConfig,
    mutator: Mutator,
}

impl Worker {
    /// Handle one request; `None` means shut down.
    fn handle(&mut self, request: WorkerRequest) -> Option<WorkerResponse> {
        let result = match request {
            WorkerRequest::Shutdown => return None,
            WorkerRequest::Receive {
                population,
                generation_count,
                parcour,
            } => {
                if let Some(parcour) = parcour {
                    self.parcour = parcour;
                }
                decode(&population, generation_count).and_then(|part| {
                    let world = (self.factory)(&self.parcour);
                    let evaluated = simulate(&part, world, &self.simulation);
                    Ok(WorkerResponse::Finished {
                        population: serde_json::to_string(&evaluated)?,
                        worker_id: self.id,
                    })
                })
            }
            WorkerRequest::MutationReceive {
                population,
                generation_count,
                seed,
            } => decode(&population, generation_count).and_then(|part| {
                let mutated = self.mutator.mutate_population(&part, seed);
                Ok(WorkerResponse::MutationFinished {
                    population: serde_json::to_string(&mutated)?,
                    worker_id: self.id,
                })
            }),
        };

        Some(result.unwrap_or_else(|e| WorkerResponse::Failed {
            worker_id: self.id,
            error: e.to_string(),
        }))
    }

    fn run(mut self, requests: Receiver<WorkerRequest>, responses: Sender<WorkerResponse>) {
        debug!("Worker {} started", self.id);
        while let Ok(request) = requests.recv() {
            let Some(response) = self.handle(request) else {
                break;
            };
            if responses.send(response).is_err() {
                break;
            }
        }
        debug!("Worker {} stopped", self.id);
    }
}

fn decode(payload: &str, generation_count: usize) -> Result<Population, serde_json::Error> {
    let mut population: Population = serde_json::from_str(payload)?;
    population.generation_count = generation_count;
    Ok(population)
}

/// Worker threads joined by message channels.
pub struct WorkerPool {
    senders: Vec<Sender<WorkerRequest>>,
    responses: Receiver<WorkerResponse>,
    handles: Vec<JoinHandle<()>>,
    timeout: Option<Duration>,
    /// Responses received over the pool's lifetime.
    finished_count: usize,
    /// Set once a generation fails; replies may still be in flight.
    poisoned: bool,
}

impl WorkerPool {
    /// Spawn `count` workers.
    pub fn spawn(
        count: usize,
        factory: WorldFactory,
        simulation: SimulationConfig,
        mutation: &MutationConfig,
        timeout: Option<Duration>,
    ) -> Self {
        let (response_tx, responses) = mpsc::channel();
        let mut senders = Vec::with_capacity(count);
        let mut handles = Vec::with_capacity(count);

        for id in 0..count.max(1) {
            let (request_tx, requests) = mpsc::channel();
            let worker = Worker {
                id,
                parcour: Parcour::flat(),
                factory: Arc::clone(&factory),
                simulation: simulation.clone(),
                mutator: Mutator::from_config(mutation),
            };
            let response_tx = response_tx.clone();
            handles.push(thread::spawn(move || worker.run(requests, response_tx)));
            senders.push(request_tx);
        }

        Self {
            senders,
            responses,
            handles,
            timeout,
            finished_count: 0,
            poisoned: false,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.senders.len()
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    fn receive(&self) -> Result<WorkerResponse, DispatchError> {
        match self.timeout {
            Some(timeout) => self.responses.recv_timeout(timeout).map_err(|e| match e {
                RecvTimeoutError::Timeout => DispatchError::Timeout(timeout),
                RecvTimeoutError::Disconnected => DispatchError::Disconnected,
            }),
            None => self.responses.recv().map_err(|_| DispatchError::Disconnected),
        }
    }

    /// Send one partition to each worker and merge the replies.
    fn scatter<F>(
        &mut self,
        population: &Population,
        mutation: bool,
        request: F,
    ) -> Result<Population, DispatchError>
    where
        F: Fn(usize, String) -> WorkerRequest,
    {
        if self.poisoned {
            return Err(DispatchError::Poisoned);
        }
        let workers = self.worker_count();
        for (id, part) in population.partition(workers).iter().enumerate() {
            let payload = serde_json::to_string(part)?;
            self.senders[id]
                .send(request(id, payload))
                .map_err(|_| DispatchError::Disconnected)?;
        }
        debug!(
            "Dispatched {} individuals to {} workers",
            population.len(),
            workers
        );

        let result = self.gather(workers, population.generation_count, mutation);
        if let Err(e) = &result {
            error!("Generation {} failed: {e}", population.generation_count);
            self.poisoned = true;
        }
        result
    }

    fn gather(
        &mut self,
        workers: usize,
        generation_count: usize,
        mutation: bool,
    ) -> Result<Population, DispatchError> {
        let mut parts: Vec<Option<Population>> = vec![None; workers];
        loop {
            let (payload, worker_id) = match self.receive()? {
                WorkerResponse::Finished {
                    population,
                    worker_id,
                } if !mutation => (population, worker_id),
                WorkerResponse::MutationFinished {
                    population,
                    worker_id,
                } if mutation => (population, worker_id),
                WorkerResponse::Failed { worker_id, error } => {
                    return Err(DispatchError::WorkerFailed { worker_id, error });
                }
                WorkerResponse::Finished { worker_id, .. }
                | WorkerResponse::MutationFinished { worker_id, .. } => {
                    return Err(DispatchError::UnexpectedResponse(worker_id));
                }
            };
            let slot = parts
                .get_mut(worker_id)
                .ok_or(DispatchError::UnexpectedResponse(worker_id))?;
            *slot = Some(decode(&payload, generation_count)?);

            self.finished_count += 1;
            if self.finished_count % workers == 0 {
                break;
            }
        }
        debug!("Merging {workers} partitions");
        Ok(Population::merge(
            parts.into_iter().flatten().collect(),
            generation_count,
        ))
    }
}

impl Dispatcher for WorkerPool {
    fn simulate(
        &mut self,
        population: &Population,
        parcour: &Parcour,
        parcour_changed: bool,
    ) -> Result<Population, DispatchError> {
        let generation_count = population.generation_count;
        self.scatter(population, false, |_, payload| WorkerRequest::Receive {
            population: payload,
            generation_count,
            parcour: parcour_changed.then(|| parcour.clone()),
        })
    }

    fn mutate(&mut self, population: &Population, seed: u64) -> Result<Population, DispatchError> {
        let generation_count = population.generation_count;
        self.scatter(population, true, |id, payload| WorkerRequest::MutationReceive {
            population: payload,
            generation_count,
            seed: seed.wrapping_add(id as u64),
        })
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        for sender in &self.senders {
            let _ = sender.send(WorkerRequest::Shutdown);
        }
        // Workers of a failed pool may be stuck in a generation; detach them.
        if self.poisoned {
            self.handles.clear();
            return;
        }
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::genotype::{GenomeRng, IndividualOptions, Seedable};
    use crate::schema::Individual;

    fn population(size: usize) -> Population {
        let mut rng = GenomeRng::new(77);
        let individuals = (0..size)
            .map(|_| Individual::seed(&IndividualOptions::default(), &mut rng))
            .collect();
        Population::new(individuals, 3)
    }

    fn simulation() -> SimulationConfig {
        SimulationConfig {
            duration: 2.0,
            ..Default::default()
        }
    }

    fn worker() -> Worker {
        Worker {
            id: 5,
            parcour: Parcour::flat(),
            factory: kinematic_factory(),
            simulation: simulation(),
            mutator: Mutator::from_config(&MutationConfig::default()),
        }
    }

    #[test]
    fn test_message_shape() {
        let request = WorkerRequest::Receive {
            population: "{}".to_string(),
            generation_count: 2,
            parcour: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["type"], "receive");
        assert_eq!(json["generationCount"], 2);

        let response = WorkerResponse::MutationFinished {
            population: "{}".to_string(),
            worker_id: 1,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["type"], "mutationFinished");
        assert_eq!(json["workerId"], 1);
    }

    #[test]
    fn test_worker_reports_bad_payload() {
        let mut worker = worker();
        let response = worker.handle(WorkerRequest::Receive {
            population: "not json".to_string(),
            generation_count: 1,
            parcour: None,
        });
        assert!(matches!(
            response,
            Some(WorkerResponse::Failed { worker_id: 5, .. })
        ));
        assert_eq!(worker.handle(WorkerRequest::Shutdown), None);
    }

    #[test]
    fn test_worker_keeps_parcour() {
        let mut worker = worker();
        let parcour = Parcour {
            value: vec![0.0, 0.5, 1.0],
            ..Default::default()
        };
        let payload = serde_json::to_string(&population(1)).unwrap();
        worker.handle(WorkerRequest::Receive {
            population: payload.clone(),
            generation_count: 3,
            parcour: Some(parcour.clone()),
        });
        worker.handle(WorkerRequest::Receive {
            population: payload,
            generation_count: 3,
            parcour: None,
        });
        assert_eq!(worker.parcour, parcour);
    }

    #[test]
    fn test_pool_matches_local() {
        let population = population(4);
        let parcour = Parcour::flat();

        let mut local = LocalExecutor::new(
            kinematic_factory(),
            simulation(),
            &MutationConfig::default(),
        );
        let expected = local.simulate(&population, &parcour, true).unwrap();

        let mut pool = WorkerPool::spawn(
            2,
            kinematic_factory(),
            simulation(),
            &MutationConfig::default(),
            None,
        );
        let evaluated = pool.simulate(&population, &parcour, true).unwrap();
        assert_eq!(evaluated, expected);

        // Second generation reuses the shipped parcour.
        let again = pool.simulate(&population, &parcour, false).unwrap();
        assert_eq!(again, expected);
    }

    #[test]
    fn test_pool_mutation() {
        let population = population(6);
        let mut pool = WorkerPool::spawn(
            3,
            kinematic_factory(),
            simulation(),
            &MutationConfig::default(),
            None,
        );
        let mutated = pool.mutate(&population, 9).unwrap();
        assert_eq!(mutated.len(), 6);
        assert_eq!(mutated.generation_count, 3);
        assert!(mutated.individuals.iter().all(|i| i.fitness.is_none()));
        assert_eq!(pool.mutate(&population, 9).unwrap(), mutated);
    }

    #[test]
    fn test_pool_timeout() {
        let slow: WorldFactory = Arc::new(|parcour: &Parcour| -> Box<dyn PhysicsWorld> {
            thread::sleep(Duration::from_millis(300));
            Box::new(KinematicWorld::new(parcour.clone()))
        });
        let mut pool = WorkerPool::spawn(
            1,
            slow,
            simulation(),
            &MutationConfig::default(),
            Some(Duration::from_millis(10)),
        );
        let result = pool.simulate(&population(1), &Parcour::flat(), true);
        assert!(matches!(result, Err(DispatchError::Timeout(_))));
    }

    #[test]
    fn test_pool_refuses_work_after_timeout() {
        let slow: WorldFactory = Arc::new(|parcour: &Parcour| -> Box<dyn PhysicsWorld> {
            thread::sleep(Duration::from_secs(3));
            Box::new(KinematicWorld::new(parcour.clone()))
        });
        let mut pool = WorkerPool::spawn(
            2,
            slow,
            simulation(),
            &MutationConfig::default(),
            Some(Duration::from_millis(20)),
        );
        let first = pool.simulate(&population(4), &Parcour::flat(), true);
        assert!(matches!(first, Err(DispatchError::Timeout(_))));
        assert!(pool.is_poisoned());

        let second = pool.simulate(&population(4), &Parcour::flat(), false);
        assert!(matches!(second, Err(DispatchError::Poisoned)));
        let mutated = pool.mutate(&population(4), 1);
        assert!(matches!(mutated, Err(DispatchError::Poisoned)));

        let start = std::time::Instant::now();
        drop(pool);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_healthy_pool_stays_usable() {
        let mut pool = WorkerPool::spawn(
            2,
            kinematic_factory(),
            simulation(),
            &MutationConfig::default(),
            Some(Duration::from_secs(30)),
        );
        for _ in 0..2 {
            let evaluated = pool.simulate(&population(4), &Parcour::flat(), false).unwrap();
            assert_eq!(evaluated.len(), 4);
        }
        assert!(!pool.is_poisoned());
    }
}

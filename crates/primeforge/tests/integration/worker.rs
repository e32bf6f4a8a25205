/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use num_bigint::BigUint;
use parking_lot::Mutex;
use primeforge::{
    CertificationEngine, CertificationError, JobIntake, PrimeSource, RequestStatus,
    StatusAggregator, TaskOutcome, TaskQueue, Worker, WorkerConfig, DAL,
};
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;

use crate::fixtures::{memory_queue, TestStore};

/// Hands out scripted values first, then falls back to real generation.
struct ScriptedSource {
    script: Mutex<VecDeque<BigUint>>,
    engine: CertificationEngine,
}

impl ScriptedSource {
    fn new(values: &[u64]) -> Self {
        Self {
            script: Mutex::new(values.iter().map(|v| BigUint::from(*v)).collect()),
            engine: CertificationEngine::default(),
        }
    }
}

impl PrimeSource for ScriptedSource {
    fn generate(&self, digits: u32) -> Result<BigUint, CertificationError> {
        match self.script.lock().pop_front() {
            Some(value) => Ok(value),
            None => self.engine.generate_prime(digits),
        }
    }
}

/// Always fails, as if the generator broke down.
struct FailingSource;

impl PrimeSource for FailingSource {
    fn generate(&self, _digits: u32) -> Result<BigUint, CertificationError> {
        Err(CertificationError::InvalidRounds)
    }
}

/// Requests shutdown while the first prime is still being generated.
struct CancellingSource {
    cancel: CancellationToken,
}

impl PrimeSource for CancellingSource {
    fn generate(&self, _digits: u32) -> Result<BigUint, CertificationError> {
        self.cancel.cancel();
        std::thread::sleep(Duration::from_millis(50));
        Ok(BigUint::from(100000000003u64))
    }
}

fn worker_config(prefetch_count: usize) -> WorkerConfig {
    WorkerConfig::builder()
        .worker_id("test-worker")
        .prefetch_count(prefetch_count)
        .error_backoff(Duration::from_millis(20))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_worker_fulfils_request_end_to_end() {
    let store = TestStore::new().await;
    let queue = store.database_queue().await;
    let intake = JobIntake::new(store.dal.clone(), queue.clone());
    let request = intake.new_request(3, 12).await.unwrap();

    let worker = Worker::with_engine(store.dal.clone(), queue.clone(), worker_config(3));
    let outcomes = worker.run_once().await.unwrap();
    assert_eq!(outcomes, vec![TaskOutcome::Acked; 3]);
    assert_eq!(queue.pending_count().await.unwrap(), 0);

    let result = StatusAggregator::new(store.dal.clone())
        .get_result(&request.id.to_string())
        .await
        .unwrap();
    assert_eq!(result.status.status, RequestStatus::Completed);
    assert_eq!(result.status.progress_percentage, 100.0);
    assert_eq!(result.prime_numbers.len(), 3);

    let engine = CertificationEngine::default();
    let distinct: HashSet<&String> = result.prime_numbers.iter().collect();
    assert_eq!(distinct.len(), 3);
    for prime in &result.prime_numbers {
        assert_eq!(prime.len(), 12);
        let value: BigUint = prime.parse().unwrap();
        assert!(engine.is_probable_prime(&value));
    }
}

#[tokio::test]
#[traced_test]
async fn test_duplicate_prime_is_regenerated() {
    let store = TestStore::new().await;
    let request = store.create_request(2, 12).await;
    store.persist(request.id, 1, "100000000003").await;

    let queue = memory_queue();
    queue
        .publish(&primeforge::GenerationTask::fan_out(request.id, 12, 2)[1..])
        .await
        .unwrap();

    let source = Arc::new(ScriptedSource::new(&[100000000003, 100000000019]));
    let worker = Worker::new(store.dal.clone(), queue.clone(), source, worker_config(1));

    assert_eq!(worker.run_once().await.unwrap(), vec![TaskOutcome::Acked]);
    assert!(logs_contain("Duplicate prime 100000000003, regenerating (attempt 1/10)"));
    assert!(logs_contain("Saved prime 100000000019"));

    let primes: Vec<String> = store
        .dal
        .prime_record()
        .list_for_request(request.id)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.prime_value)
        .collect();
    assert_eq!(primes, vec!["100000000003", "100000000019"]);
    assert!(queue.is_empty());
}

#[tokio::test]
async fn test_task_is_dropped_after_persist_attempts_are_exhausted() {
    // Every one-digit prime the engine can produce is already stored
    let store = TestStore::new().await;
    let request = store.create_request(4, 1).await;
    store.persist(request.id, 1, "3").await;
    store.persist(request.id, 2, "5").await;
    store.persist(request.id, 3, "7").await;

    let queue = memory_queue();
    queue
        .publish(&primeforge::GenerationTask::fan_out(request.id, 1, 4)[3..])
        .await
        .unwrap();

    let worker = Worker::with_engine(store.dal.clone(), queue.clone(), worker_config(1));
    assert_eq!(
        worker.run_once().await.unwrap(),
        vec![TaskOutcome::RejectedFinal]
    );

    // Dropped for good and never fulfilled
    assert!(queue.is_empty());
    assert_eq!(store.prime_row_count().await, 3);
    let status = StatusAggregator::new(store.dal.clone())
        .get_status(&request.id.to_string())
        .await
        .unwrap();
    assert_eq!(status.status, RequestStatus::Pending);
    assert_eq!(status.progress_percentage, 75.0);
}

#[tokio::test]
async fn test_redelivered_fulfilled_task_is_acked_without_storing() {
    let store = TestStore::new().await;
    let request = store.create_request(1, 12).await;
    store.persist(request.id, 1, "100000000003").await;

    let queue = memory_queue();
    queue
        .publish(&primeforge::GenerationTask::fan_out(request.id, 12, 1))
        .await
        .unwrap();

    let worker = Worker::with_engine(store.dal.clone(), queue.clone(), worker_config(1));
    assert_eq!(worker.run_once().await.unwrap(), vec![TaskOutcome::Acked]);
    assert_eq!(store.prime_row_count().await, 1);
    assert!(queue.is_empty());
}

#[tokio::test]
async fn test_malformed_payload_is_requeued() {
    let store = TestStore::new().await;
    let queue = memory_queue();
    queue.push_raw("{\"request_id\": 7}");

    let worker = Worker::with_engine(store.dal.clone(), queue.clone(), worker_config(1));
    assert_eq!(
        worker.run_once().await.unwrap(),
        vec![TaskOutcome::RejectedRetryable]
    );
    assert_eq!(queue.ready_count(), 1);
    assert_eq!(queue.in_flight_count(), 0);
    assert_eq!(store.prime_row_count().await, 0);
}

#[tokio::test]
async fn test_generation_failure_is_requeued() {
    let store = TestStore::new().await;
    let request = store.create_request(1, 12).await;

    let queue = memory_queue();
    queue
        .publish(&primeforge::GenerationTask::fan_out(request.id, 12, 1))
        .await
        .unwrap();

    let worker = Worker::new(
        store.dal.clone(),
        queue.clone(),
        Arc::new(FailingSource),
        worker_config(1),
    );
    assert_eq!(
        worker.run_once().await.unwrap(),
        vec![TaskOutcome::RejectedRetryable]
    );
    assert_eq!(queue.ready_count(), 1);
    assert_eq!(queue.in_flight_count(), 0);
    assert_eq!(store.prime_row_count().await, 0);
}

#[tokio::test]
async fn test_shutdown_hands_back_unstarted_deliveries() {
    let store = TestStore::new().await;
    let request = store.create_request(3, 12).await;

    let queue = memory_queue();
    queue
        .publish(&primeforge::GenerationTask::fan_out(request.id, 12, 3))
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    let source = Arc::new(CancellingSource {
        cancel: cancel.clone(),
    });
    let worker = Worker::new(store.dal.clone(), queue.clone(), source, worker_config(3));

    let summary = tokio::time::timeout(Duration::from_secs(5), worker.run(cancel))
        .await
        .expect("Worker did not stop after cancellation");

    // The delivery in hand finished; the other two went back to the queue
    assert_eq!(summary.acked, 1);
    assert_eq!(summary.total(), 1);
    assert_eq!(queue.ready_count(), 2);
    assert_eq!(queue.in_flight_count(), 0);
    assert_eq!(store.prime_row_count().await, 1);
}

#[tokio::test]
async fn test_run_once_on_empty_queue_does_nothing() {
    let store = TestStore::new().await;
    let queue = memory_queue();
    let worker = Worker::with_engine(store.dal.clone(), queue, worker_config(1));
    assert!(worker.run_once().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_run_processes_until_cancelled() {
    let store = TestStore::new().await;
    let queue = store.database_queue().await;
    let intake = JobIntake::new(store.dal.clone(), queue.clone());
    let request = intake.new_request(2, 12).await.unwrap();

    let worker = Arc::new(Worker::with_engine(
        DAL::new(store.database.clone()),
        queue.clone(),
        worker_config(1),
    ));
    let cancel = CancellationToken::new();
    let handle = {
        let worker = worker.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { worker.run(cancel).await })
    };

    let aggregator = StatusAggregator::new(store.dal.clone());
    let request_id = request.id.to_string();
    tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            let status = aggregator.get_status(&request_id).await.unwrap();
            if status.status == RequestStatus::Completed {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("Request was not completed in time");

    cancel.cancel();
    let summary = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("Worker did not stop after cancellation")
        .unwrap();
    assert_eq!(summary.acked, 2);
    assert_eq!(summary.total(), 2);
}

#[tokio::test]
async fn test_idle_worker_stops_on_cancellation() {
    let store = TestStore::new().await;
    let queue = memory_queue();
    let worker = Worker::with_engine(store.dal.clone(), queue, worker_config(1));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let summary = tokio::time::timeout(Duration::from_secs(5), worker.run(cancel))
        .await
        .expect("Worker did not stop after cancellation");
    assert_eq!(summary.total(), 0);
}

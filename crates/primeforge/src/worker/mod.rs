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

//! # Worker Loop
//!
//! A worker takes generation tasks off the queue one at a time, produces a
//! certified prime for each and stores it.
//!
//! ## Per-delivery state machine
//!
//! ```text
//! Received ─► Generating ─► Persisting ─┬─► Acked
//!    │                         │  ▲     ├─► RejectedFinal      (every attempt collided)
//!    │                         └──┘     └─► RejectedRetryable  (store or generation failure)
//!    │                       collision,
//!    │                       regenerate
//!    └─► RejectedRetryable (payload does not decode)
//! ```
//!
//! - A new prime is stored and the delivery is acked.
//! - If the prime is already stored for the request, another one is
//!   generated, up to `max_persist_attempts` times. After that the delivery
//!   is rejected without requeue and its index is never fulfilled.
//! - If the task's index was already fulfilled by an earlier delivery (a
//!   redelivery after a lost ack), nothing is stored and the delivery is acked.
//! - Any store or generation failure rejects the delivery with requeue.
//! - A payload that does not decode is also rejected with requeue, so a
//!   permanently malformed message is redelivered indefinitely. There is no
//!   dead-letter routing.
//!
//! Uniqueness is decided by the store at insert time; see
//! [`PrimeRecordDAL::persist`](crate::dal::PrimeRecordDAL::persist).
//!
//! ## Shutdown
//!
//! [`Worker::run`] checks its [`CancellationToken`] between deliveries and
//! while waiting for messages. A delivery that has started processing always
//! runs to an ack or reject. Prefetched deliveries that have not started are
//! handed back with requeue.

mod config;

pub use config::{WorkerConfig, WorkerConfigBuilder};

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dal::DAL;
use crate::engine::{CertificationEngine, PrimeSource};
use crate::error::{QueueError, WorkerError};
use crate::models::generation_task::GenerationTask;
use crate::models::prime_record::{NewPrimeRecord, PersistOutcome};
use crate::queue::{Delivery, TaskQueue};

/// Terminal state of one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutcome {
    /// Settled successfully and removed from the queue.
    Acked,
    /// Dropped for good.
    RejectedFinal,
    /// Handed back to the queue for redelivery.
    RejectedRetryable,
}

impl TaskOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskOutcome::Acked => "acked",
            TaskOutcome::RejectedFinal => "rejected_final",
            TaskOutcome::RejectedRetryable => "rejected_retryable",
        }
    }
}

/// Counts of delivery outcomes over the lifetime of a [`Worker::run`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerSummary {
    pub acked: u64,
    pub rejected_final: u64,
    pub rejected_retryable: u64,
}

impl WorkerSummary {
    pub fn record(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Acked => self.acked += 1,
            TaskOutcome::RejectedFinal => self.rejected_final += 1,
            TaskOutcome::RejectedRetryable => self.rejected_retryable += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.acked + self.rejected_final + self.rejected_retryable
    }
}

/// What happened while trying to store a prime for one task.
enum PersistResult {
    Stored,
    AlreadyFulfilled,
    Exhausted,
}

pub struct Worker {
    dal: DAL,
    queue: Arc<dyn TaskQueue>,
    source: Arc<dyn PrimeSource>,
    config: WorkerConfig,
}

impl Worker {
    pub fn new(
        dal: DAL,
        queue: Arc<dyn TaskQueue>,
        source: Arc<dyn PrimeSource>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            dal,
            queue,
            source,
            config,
        }
    }

    /// A worker using the default [`CertificationEngine`].
    pub fn with_engine(dal: DAL, queue: Arc<dyn TaskQueue>, config: WorkerConfig) -> Self {
        Self::new(dal, queue, Arc::new(CertificationEngine::default()), config)
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Processes deliveries until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) -> WorkerSummary {
        let worker_id = self.config.worker_id();
        let mut summary = WorkerSummary::default();
        info!(worker_id, "Worker started, waiting for tasks");

        while !cancel.is_cancelled() {
            let deliveries = match self
                .queue
                .receive(worker_id, self.config.prefetch_count())
                .await
            {
                Ok(deliveries) => deliveries,
                Err(e) => {
                    error!(worker_id, "Failed to receive tasks: {}", e);
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.config.error_backoff()) => continue,
                    }
                }
            };

            if deliveries.is_empty() {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = self.queue.wait_for_messages() => {}
                }
                continue;
            }

            let mut pending = deliveries.into_iter();
            while let Some(delivery) = pending.next() {
                summary.record(self.process_delivery(&delivery).await);
                if cancel.is_cancelled() {
                    for unstarted in pending.by_ref() {
                        self.hand_back(&unstarted).await;
                    }
                }
            }
        }

        info!(
            worker_id,
            acked = summary.acked,
            rejected_final = summary.rejected_final,
            rejected_retryable = summary.rejected_retryable,
            "Worker stopped"
        );
        summary
    }

    /// Receives one batch of up to `prefetch_count` deliveries and processes
    /// all of them. Returns an empty list when nothing was available.
    pub async fn run_once(&self) -> Result<Vec<TaskOutcome>, QueueError> {
        let deliveries = self
            .queue
            .receive(self.config.worker_id(), self.config.prefetch_count())
            .await?;
        let mut outcomes = Vec::with_capacity(deliveries.len());
        for delivery in &deliveries {
            outcomes.push(self.process_delivery(delivery).await);
        }
        Ok(outcomes)
    }

    /// Drives one delivery to a terminal state.
    pub async fn process_delivery(&self, delivery: &Delivery) -> TaskOutcome {
        let worker_id = self.config.worker_id();

        let task = match GenerationTask::decode(&delivery.payload) {
            Ok(task) => task,
            Err(e) => {
                error!(
                    worker_id,
                    delivery_id = delivery.id,
                    "Invalid task payload: {}",
                    e
                );
                return self.settle(delivery, TaskOutcome::RejectedRetryable).await;
            }
        };

        info!(
            worker_id,
            request_id = %task.request_id,
            index = task.index,
            total = task.total,
            redelivered = delivery.is_redelivery(),
            "Processing task {}/{}",
            task.index,
            task.total
        );

        let outcome = match self.generate_and_persist(&task).await {
            Ok(PersistResult::Stored) | Ok(PersistResult::AlreadyFulfilled) => TaskOutcome::Acked,
            Ok(PersistResult::Exhausted) => {
                error!(
                    worker_id,
                    request_id = %task.request_id,
                    index = task.index,
                    "Failed to store a unique prime after {} attempts; dropping task",
                    self.config.max_persist_attempts()
                );
                TaskOutcome::RejectedFinal
            }
            Err(e) => {
                error!(
                    worker_id,
                    request_id = %task.request_id,
                    index = task.index,
                    "Error processing task: {}",
                    e
                );
                TaskOutcome::RejectedRetryable
            }
        };

        self.settle(delivery, outcome).await
    }

    async fn generate_and_persist(
        &self,
        task: &GenerationTask,
    ) -> Result<PersistResult, WorkerError> {
        let worker_id = self.config.worker_id();
        let digits = u32::try_from(task.digits)
            .map_err(|_| WorkerError::Generation(format!("invalid digit count {}", task.digits)))?;
        let max_attempts = self.config.max_persist_attempts();

        for attempt in 1..=max_attempts {
            let prime = self.generate(digits).await?.to_string();

            let outcome = self
                .dal
                .prime_record()
                .persist(NewPrimeRecord {
                    request_id: task.request_id,
                    prime_value: prime.clone(),
                    task_index: task.index,
                })
                .await?;

            match outcome {
                PersistOutcome::Inserted => {
                    metrics::counter!("primeforge_primes_persisted_total").increment(1);
                    info!(
                        worker_id,
                        request_id = %task.request_id,
                        index = task.index,
                        total = task.total,
                        "Saved prime {}",
                        prime
                    );
                    return Ok(PersistResult::Stored);
                }
                PersistOutcome::AlreadyFulfilled => {
                    info!(
                        worker_id,
                        request_id = %task.request_id,
                        index = task.index,
                        "Task already fulfilled by an earlier delivery"
                    );
                    return Ok(PersistResult::AlreadyFulfilled);
                }
                PersistOutcome::DuplicateValue => {
                    metrics::counter!("primeforge_persist_collisions_total").increment(1);
                    warn!(
                        worker_id,
                        request_id = %task.request_id,
                        index = task.index,
                        "Duplicate prime {}, regenerating (attempt {}/{})",
                        prime,
                        attempt,
                        max_attempts
                    );
                }
            }
        }

        Ok(PersistResult::Exhausted)
    }

    async fn generate(&self, digits: u32) -> Result<num_bigint::BigUint, WorkerError> {
        let source = self.source.clone();
        let started = Instant::now();
        let prime = tokio::task::spawn_blocking(move || source.generate(digits))
            .await
            .map_err(|e| WorkerError::Generation(e.to_string()))??;
        metrics::histogram!("primeforge_generation_seconds").record(started.elapsed().as_secs_f64());
        Ok(prime)
    }

    /// Acks or rejects according to `outcome`. A settlement failure is
    /// logged; the queue will redeliver once the lease runs out.
    async fn settle(&self, delivery: &Delivery, outcome: TaskOutcome) -> TaskOutcome {
        let result = match outcome {
            TaskOutcome::Acked => self.queue.ack(delivery).await,
            TaskOutcome::RejectedFinal => self.queue.reject(delivery, false).await,
            TaskOutcome::RejectedRetryable => self.queue.reject(delivery, true).await,
        };
        if let Err(e) = result {
            warn!(
                worker_id = self.config.worker_id(),
                delivery_id = delivery.id,
                outcome = outcome.as_str(),
                "Failed to settle delivery: {}",
                e
            );
        }
        metrics::counter!("primeforge_task_outcomes_total", "outcome" => outcome.as_str())
            .increment(1);
        outcome
    }

    async fn hand_back(&self, delivery: &Delivery) {
        debug!(
            worker_id = self.config.worker_id(),
            delivery_id = delivery.id,
            "Returning unstarted delivery on shutdown"
        );
        if let Err(e) = self.queue.reject(delivery, true).await {
            warn!(
                worker_id = self.config.worker_id(),
                delivery_id = delivery.id,
                "Failed to return delivery: {}",
                e
            );
        }
    }
}

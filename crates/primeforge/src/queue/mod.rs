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

//! # Task queue transport
//!
//! Generation tasks travel from the intake to the workers over a [`TaskQueue`].
//! Delivery is at-least-once with manual acknowledgment:
//!
//! 1. [`TaskQueue::receive`] hands out up to `max` messages. Each one is
//!    leased to the caller and hidden from other consumers.
//! 2. The consumer settles every delivery with [`TaskQueue::ack`] (done,
//!    remove it) or [`TaskQueue::reject`] (remove it, or put it back when
//!    `requeue` is set).
//! 3. A delivery that is never settled becomes visible again once its lease
//!    runs out, so a crashed consumer does not lose work.
//!
//! Two transports are provided:
//!
//! - [`DatabaseQueue`]: durable, shared by every process using the same store.
//! - [`InMemoryQueue`]: process-local, for single-process runs and tests.

mod database;
mod memory;

pub use database::DatabaseQueue;
pub use memory::InMemoryQueue;

use async_trait::async_trait;

use crate::error::QueueError;
use crate::models::generation_task::GenerationTask;

/// A message handed to a consumer, pending acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Transport-assigned message id.
    pub id: i64,
    /// Raw payload; decode with [`GenerationTask::decode`].
    pub payload: String,
    /// 1 on first delivery, higher when redelivered.
    pub delivery_count: i32,
    /// Proof of the current lease. Settling requires it to still be valid.
    pub lease_token: String,
}

impl Delivery {
    pub fn is_redelivery(&self) -> bool {
        self.delivery_count > 1
    }
}

#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Publishes tasks durably. Returns the number of messages written.
    async fn publish(&self, tasks: &[GenerationTask]) -> Result<usize, QueueError>;

    /// Leases up to `max` visible messages to `consumer` without waiting.
    async fn receive(&self, consumer: &str, max: usize) -> Result<Vec<Delivery>, QueueError>;

    /// Returns when new messages may be available, after the poll interval at
    /// the latest, or immediately once the queue is shut down.
    async fn wait_for_messages(&self);

    /// Removes a processed message.
    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError>;

    /// Rejects a message. With `requeue` it will be delivered again,
    /// otherwise it is dropped for good.
    async fn reject(&self, delivery: &Delivery, requeue: bool) -> Result<(), QueueError>;

    /// Wakes any consumer blocked in [`TaskQueue::wait_for_messages`] and
    /// makes further waits return immediately.
    fn shutdown(&self);
}

/// Encodes tasks into wire payloads.
pub(crate) fn encode_all(tasks: &[GenerationTask]) -> Result<Vec<String>, QueueError> {
    tasks.iter().map(GenerationTask::encode).collect()
}

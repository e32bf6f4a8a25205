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

//! Durable queue over the `task_queue` table.

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{encode_all, Delivery, TaskQueue};
use crate::config::QueueConfig;
use crate::dal::task_queue::ClaimParams;
use crate::dal::DAL;
use crate::database::{Database, UniversalTimestamp};
use crate::dispatcher::{create_work_distributor, WorkDistributor};
use crate::error::QueueError;
use crate::models::generation_task::GenerationTask;
use crate::models::queue_entry::QueueEntry;

/// Queue transport backed by the relational store.
///
/// Messages survive process and store restarts. Any number of processes may
/// publish to and consume from the same queue name concurrently.
pub struct DatabaseQueue {
    dal: DAL,
    config: QueueConfig,
    distributor: Box<dyn WorkDistributor>,
}

impl DatabaseQueue {
    /// Creates the queue and its work distributor.
    ///
    /// On PostgreSQL this opens a dedicated `LISTEN` connection.
    pub async fn new(database: Database, config: QueueConfig) -> Result<Self, QueueError> {
        let distributor = create_work_distributor(&database, config.poll_interval()).await?;
        Ok(Self::with_distributor(database, config, distributor))
    }

    pub fn with_distributor(
        database: Database,
        config: QueueConfig,
        distributor: Box<dyn WorkDistributor>,
    ) -> Self {
        Self {
            dal: DAL::new(database),
            config,
            distributor,
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Number of unsettled messages on this queue, leased or not.
    pub async fn pending_count(&self) -> Result<i64, QueueError> {
        Ok(self
            .dal
            .task_queue()
            .count_pending(self.config.queue_name())
            .await?)
    }

    fn lease_expired(delivery: &Delivery) -> QueueError {
        QueueError::LeaseExpired {
            delivery_id: delivery.id.to_string(),
        }
    }
}

impl From<QueueEntry> for Delivery {
    fn from(entry: QueueEntry) -> Self {
        Delivery {
            id: entry.id,
            payload: entry.payload,
            delivery_count: entry.delivery_count,
            lease_token: entry.lease_token.unwrap_or_default(),
        }
    }
}

#[async_trait]
impl TaskQueue for DatabaseQueue {
    async fn publish(&self, tasks: &[GenerationTask]) -> Result<usize, QueueError> {
        let payloads = encode_all(tasks)?;
        let published = self
            .dal
            .task_queue()
            .publish(self.config.queue_name(), payloads)
            .await?;
        self.distributor.wake();
        debug!(
            "Published {} message(s) to '{}'",
            published,
            self.config.queue_name()
        );
        Ok(published)
    }

    async fn receive(&self, consumer: &str, max: usize) -> Result<Vec<Delivery>, QueueError> {
        let entries = self
            .dal
            .task_queue()
            .claim(ClaimParams {
                queue_name: self.config.queue_name().to_string(),
                max_messages: max.max(1) as i64,
                consumer: consumer.to_string(),
                lease_timeout: self.config.lease_timeout(),
            })
            .await?;
        Ok(entries.into_iter().map(Delivery::from).collect())
    }

    async fn wait_for_messages(&self) {
        let seen = self.distributor.epoch();
        match self
            .dal
            .task_queue()
            .has_visible(self.config.queue_name())
            .await
        {
            Ok(true) => return,
            Ok(false) => {}
            Err(e) => debug!("Visibility check failed, waiting anyway: {}", e),
        }
        self.distributor.wait_for_work(seen).await;
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        if self
            .dal
            .task_queue()
            .ack(delivery.id, &delivery.lease_token)
            .await?
        {
            Ok(())
        } else {
            warn!("Ack for message {} arrived after its lease expired", delivery.id);
            Err(Self::lease_expired(delivery))
        }
    }

    async fn reject(&self, delivery: &Delivery, requeue: bool) -> Result<(), QueueError> {
        let settled = if requeue {
            let visible_at = UniversalTimestamp::now().plus(self.config.requeue_delay());
            self.dal
                .task_queue()
                .release(delivery.id, &delivery.lease_token, visible_at)
                .await?
        } else {
            self.dal
                .task_queue()
                .discard(delivery.id, &delivery.lease_token)
                .await?
        };

        if settled {
            Ok(())
        } else {
            warn!(
                "Reject for message {} arrived after its lease expired",
                delivery.id
            );
            Err(Self::lease_expired(delivery))
        }
    }

    fn shutdown(&self) {
        self.distributor.shutdown();
    }
}

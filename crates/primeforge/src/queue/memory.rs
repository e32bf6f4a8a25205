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

//! Process-local queue transport.
//!
//! Settlement semantics match [`DatabaseQueue`](super::DatabaseQueue) except
//! that leases never expire: an unsettled delivery stays in flight until it
//! is acked or rejected, and a requeued message is visible again at once.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::{encode_all, Delivery, TaskQueue};
use crate::database::UniversalUuid;
use crate::error::QueueError;
use crate::models::generation_task::GenerationTask;

#[derive(Debug, Clone)]
struct Message {
    id: i64,
    payload: String,
    delivery_count: i32,
}

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    ready: VecDeque<Message>,
    in_flight: HashMap<i64, (Message, String)>,
}

pub struct InMemoryQueue {
    state: Mutex<State>,
    notify: Notify,
    closed: AtomicBool,
    poll_interval: Duration,
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::with_poll_interval(Duration::from_secs(1))
    }

    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self {
            state: Mutex::new(State::default()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            poll_interval,
        }
    }

    /// Enqueues a raw payload, bypassing task encoding.
    pub fn push_raw(&self, payload: impl Into<String>) -> i64 {
        let id = {
            let mut state = self.state.lock();
            state.next_id += 1;
            let id = state.next_id;
            state.ready.push_back(Message {
                id,
                payload: payload.into(),
                delivery_count: 0,
            });
            id
        };
        self.notify.notify_waiters();
        id
    }

    /// Messages waiting to be delivered.
    pub fn ready_count(&self) -> usize {
        self.state.lock().ready.len()
    }

    /// Messages delivered but not yet settled.
    pub fn in_flight_count(&self) -> usize {
        self.state.lock().in_flight.len()
    }

    /// Unsettled messages, delivered or not.
    pub fn len(&self) -> usize {
        let state = self.state.lock();
        state.ready.len() + state.in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn take_in_flight(&self, delivery: &Delivery) -> Result<Message, QueueError> {
        let mut state = self.state.lock();
        let leased = state
            .in_flight
            .get(&delivery.id)
            .is_some_and(|(_, token)| *token == delivery.lease_token);
        let removed = if leased {
            state.in_flight.remove(&delivery.id)
        } else {
            None
        };
        removed
            .map(|(message, _)| message)
            .ok_or_else(|| QueueError::LeaseExpired {
                delivery_id: delivery.id.to_string(),
            })
    }
}

#[async_trait]
impl TaskQueue for InMemoryQueue {
    async fn publish(&self, tasks: &[GenerationTask]) -> Result<usize, QueueError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Closed);
        }
        let payloads = encode_all(tasks)?;
        let count = payloads.len();
        for payload in payloads {
            self.push_raw(payload);
        }
        Ok(count)
    }

    async fn receive(&self, _consumer: &str, max: usize) -> Result<Vec<Delivery>, QueueError> {
        let mut state = self.state.lock();
        let mut deliveries = Vec::new();
        while deliveries.len() < max.max(1) {
            let Some(mut message) = state.ready.pop_front() else {
                break;
            };
            message.delivery_count += 1;
            let token = UniversalUuid::new_v4().to_string();
            deliveries.push(Delivery {
                id: message.id,
                payload: message.payload.clone(),
                delivery_count: message.delivery_count,
                lease_token: token.clone(),
            });
            state.in_flight.insert(message.id, (message, token));
        }
        Ok(deliveries)
    }

    async fn wait_for_messages(&self) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        let notified = self.notify.notified();
        if self.ready_count() > 0 {
            return;
        }
        tokio::select! {
            _ = notified => {}
            _ = tokio::time::sleep(self.poll_interval) => {}
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        self.take_in_flight(delivery).map(|_| ())
    }

    async fn reject(&self, delivery: &Delivery, requeue: bool) -> Result<(), QueueError> {
        let message = self.take_in_flight(delivery)?;
        if requeue {
            self.state.lock().ready.push_back(message);
            self.notify.notify_waiters();
        }
        Ok(())
    }

    fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }
}

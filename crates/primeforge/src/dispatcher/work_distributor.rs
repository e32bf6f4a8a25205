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

//! Consumer wake-ups for the database-backed task queue.
//!
//! Claiming is always done by polling the `task_queue` table; a
//! [`WorkDistributor`] only decides how long a consumer sleeps between
//! claims. On PostgreSQL an insert trigger raises `NOTIFY
//! generation_task_ready` and [`PostgresDistributor`] cuts the sleep short
//! when it arrives. Everywhere else [`PollingDistributor`] sleeps for the
//! poll interval. Publishers in the same process call
//! [`WorkDistributor::wake`] directly.
//!
//! Every wake-up bumps an epoch. A consumer reads [`WorkDistributor::epoch`]
//! before checking for work and passes it to
//! [`WorkDistributor::wait_for_work`], which returns at once if a wake-up
//! arrived in between.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_postgres::AsyncMessage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::database::{BackendType, Database};
use crate::error::QueueError;

/// Channel raised by the `task_queue` insert trigger.
pub const TASK_READY_CHANNEL: &str = "generation_task_ready";

#[async_trait]
pub trait WorkDistributor: Send + Sync {
    /// Number of wake-ups so far.
    fn epoch(&self) -> u64;

    /// Sleeps until work may be available. Returns at once if the epoch has
    /// moved past `seen`, and after at most one poll interval otherwise, so
    /// callers must cope with finding nothing to claim.
    async fn wait_for_work(&self, seen: u64);

    /// Wakes every current waiter.
    fn wake(&self);

    /// Wakes every waiter; later waits return at once.
    fn shutdown(&self);
}

/// Wake-up state shared by both distributors.
#[derive(Default)]
struct WakeSignal {
    notify: Notify,
    epoch: AtomicU64,
    cancel: CancellationToken,
}

impl WakeSignal {
    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn wake(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    fn shutdown(&self) {
        self.cancel.cancel();
        self.wake();
    }

    /// The poll interval, cut short by a wake-up after `seen` or by shutdown.
    async fn sleep(&self, seen: u64, interval: Duration) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.cancel.is_cancelled() || self.epoch() != seen {
            return;
        }
        tokio::select! {
            _ = notified => debug!("Consumer woken"),
            _ = self.cancel.cancelled() => {}
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

/// Wakes consumers on `NOTIFY generation_task_ready`, polling as a fallback.
///
/// Holds its own connection outside the pool for the lifetime of the
/// distributor. If that connection fails, the distributor keeps working as a
/// plain poller.
pub struct PostgresDistributor {
    signal: Arc<WakeSignal>,
    poll_fallback: Duration,
    listener: Option<JoinHandle<()>>,
    _client: tokio_postgres::Client,
}

impl PostgresDistributor {
    pub async fn new(database_url: &str, poll_fallback: Duration) -> Result<Self, QueueError> {
        let (client, mut connection) =
            tokio_postgres::connect(database_url, tokio_postgres::NoTls)
                .await
                .map_err(|e| QueueError::Connection(e.to_string()))?;

        let signal = Arc::new(WakeSignal::default());

        // The connection only makes progress while polled, so it must be
        // driven before LISTEN is sent.
        let listener = {
            let signal = signal.clone();
            tokio::spawn(async move {
                let mut messages = futures::stream::poll_fn(move |cx| connection.poll_message(cx));
                loop {
                    let message = tokio::select! {
                        _ = signal.cancel.cancelled() => break,
                        message = messages.next() => message,
                    };
                    match message {
                        Some(Ok(AsyncMessage::Notification(note))) => {
                            debug!(channel = note.channel(), "Task notification received");
                            signal.wake();
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!("Notification connection failed, polling only: {}", e);
                            break;
                        }
                        None => {
                            warn!("Notification connection closed, polling only");
                            break;
                        }
                    }
                }
            })
        };

        if let Err(e) = client
            .batch_execute(&format!("LISTEN {}", TASK_READY_CHANNEL))
            .await
        {
            signal.cancel.cancel();
            listener.abort();
            return Err(QueueError::Connection(e.to_string()));
        }
        info!("Listening for task notifications on '{}'", TASK_READY_CHANNEL);

        Ok(Self {
            signal,
            poll_fallback,
            listener: Some(listener),
            _client: client,
        })
    }
}

#[async_trait]
impl WorkDistributor for PostgresDistributor {
    fn epoch(&self) -> u64 {
        self.signal.epoch()
    }

    async fn wait_for_work(&self, seen: u64) {
        self.signal.sleep(seen, self.poll_fallback).await;
    }

    fn wake(&self) {
        self.signal.wake();
    }

    fn shutdown(&self) {
        self.signal.shutdown();
    }
}

impl Drop for PostgresDistributor {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

/// Wakes consumers once per poll interval, or earlier on a local publish.
pub struct PollingDistributor {
    signal: WakeSignal,
    poll_interval: Duration,
}

impl PollingDistributor {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            signal: WakeSignal::default(),
            poll_interval,
        }
    }
}

#[async_trait]
impl WorkDistributor for PollingDistributor {
    fn epoch(&self) -> u64 {
        self.signal.epoch()
    }

    async fn wait_for_work(&self, seen: u64) {
        self.signal.sleep(seen, self.poll_interval).await;
    }

    fn wake(&self) {
        self.signal.wake();
    }

    fn shutdown(&self) {
        self.signal.shutdown();
    }
}

/// Picks the distributor for the store's backend.
pub async fn create_work_distributor(
    database: &Database,
    poll_interval: Duration,
) -> Result<Box<dyn WorkDistributor>, QueueError> {
    Ok(match database.backend() {
        BackendType::Postgres => Box::new(
            PostgresDistributor::new(database.connection_url(), poll_interval).await?,
        ),
        BackendType::Sqlite => Box::new(PollingDistributor::new(poll_interval)),
    })
}

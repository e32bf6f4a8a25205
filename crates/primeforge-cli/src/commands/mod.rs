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

//! Subcommand implementations and the connection setup they share.

pub mod migrate;
pub mod request;
pub mod worker;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use primeforge::{
    with_startup_retry, Database, DatabaseQueue, QueueConfig, StartupPolicy, TaskQueue,
};
use tracing::info;

use crate::{QueueArgs, StartupArgs};

/// Resolved global options.
#[derive(Debug, Clone)]
pub struct Environment {
    pub database_url: String,
    pub db_pool_size: u32,
    pub queue: QueueArgs,
    pub startup: StartupArgs,
}

impl Environment {
    pub fn startup_policy(&self) -> StartupPolicy {
        StartupPolicy::new(
            self.startup.startup_retries,
            Duration::from_secs(self.startup.startup_retry_delay_secs),
        )
    }

    /// URL of the store that holds the task queue.
    pub fn queue_url(&self) -> &str {
        self.queue
            .queue_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(&self.database_url)
    }

    pub fn queue_config(&self) -> Result<QueueConfig> {
        QueueConfig::builder()
            .queue_name(self.queue.queue_name.clone())
            .poll_interval(Duration::from_millis(self.queue.poll_interval_ms))
            .lease_timeout(Duration::from_secs(self.queue.lease_timeout_secs))
            .build()
            .context("Invalid queue configuration")
    }
}

/// Opens a pool on `url` and brings its schema up to date, retrying while
/// the store is unreachable.
pub async fn open_store(url: &str, pool_size: u32, policy: StartupPolicy) -> Result<Database> {
    let database = Database::new(url, pool_size).context("Invalid database URL")?;
    with_startup_retry("store", policy, || database.run_migrations())
        .await
        .context("Failed to reach the store")?;
    info!("Store ready ({})", database.backend().as_str());
    Ok(database)
}

/// Opens the request store and the task queue.
///
/// When the queue lives in the request store the pool is shared.
pub async fn open(env: &Environment) -> Result<(Database, Arc<dyn TaskQueue>)> {
    let policy = env.startup_policy();
    let config = env.queue_config()?;
    let database = open_store(&env.database_url, env.db_pool_size, policy).await?;

    let queue_database = if env.queue_url() == env.database_url {
        database.clone()
    } else {
        open_store(env.queue_url(), env.db_pool_size, policy).await?
    };

    let queue = with_startup_retry("queue", policy, || {
        DatabaseQueue::new(queue_database.clone(), config.clone())
    })
    .await
    .context("Failed to reach the queue")?;
    info!("Queue '{}' ready", config.queue_name());

    Ok((database, Arc::new(queue)))
}

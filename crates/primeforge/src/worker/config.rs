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

//! Configuration for a [`Worker`](super::Worker).

use std::time::Duration;

use crate::error::ConfigError;

/// Worker settings.
///
/// ```rust,ignore
/// let config = WorkerConfig::builder()
///     .worker_id("worker-7")
///     .prefetch_count(2)
///     .build()?;
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct WorkerConfig {
    worker_id: String,
    prefetch_count: usize,
    max_persist_attempts: u32,
    error_backoff: Duration,
}

impl WorkerConfig {
    pub fn builder() -> WorkerConfigBuilder {
        WorkerConfigBuilder::default()
    }

    /// Label attached to every log line and queue lease of this worker.
    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Maximum number of unsettled deliveries held at once.
    pub fn prefetch_count(&self) -> usize {
        self.prefetch_count
    }

    /// How many distinct primes are tried for one task before it is dropped
    /// because every one of them was already stored for the request.
    pub fn max_persist_attempts(&self) -> u32 {
        self.max_persist_attempts
    }

    /// Pause after a failed receive before trying again.
    pub fn error_backoff(&self) -> Duration {
        self.error_backoff
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfigBuilder::default().config
    }
}

pub struct WorkerConfigBuilder {
    config: WorkerConfig,
}

impl Default for WorkerConfigBuilder {
    fn default() -> Self {
        Self {
            config: WorkerConfig {
                worker_id: "worker-1".to_string(),
                prefetch_count: 1,
                max_persist_attempts: 10,
                error_backoff: Duration::from_secs(1),
            },
        }
    }
}

impl WorkerConfigBuilder {
    pub fn worker_id(mut self, value: impl Into<String>) -> Self {
        self.config.worker_id = value.into();
        self
    }

    pub fn prefetch_count(mut self, value: usize) -> Self {
        self.config.prefetch_count = value;
        self
    }

    pub fn max_persist_attempts(mut self, value: u32) -> Self {
        self.config.max_persist_attempts = value;
        self
    }

    pub fn error_backoff(mut self, value: Duration) -> Self {
        self.config.error_backoff = value;
        self
    }

    pub fn build(self) -> Result<WorkerConfig, ConfigError> {
        if self.config.worker_id.trim().is_empty() {
            return Err(ConfigError::Empty { field: "worker_id" });
        }
        if self.config.prefetch_count == 0 {
            return Err(ConfigError::BelowMinimum {
                field: "prefetch_count",
                minimum: 1,
                actual: 0,
            });
        }
        if self.config.max_persist_attempts == 0 {
            return Err(ConfigError::BelowMinimum {
                field: "max_persist_attempts",
                minimum: 1,
                actual: 0,
            });
        }
        Ok(self.config)
    }
}

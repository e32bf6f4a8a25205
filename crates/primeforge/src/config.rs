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

//! Queue transport configuration.

use std::time::Duration;

use crate::error::ConfigError;

/// Settings for a [`TaskQueue`](crate::queue::TaskQueue) transport.
///
/// ```rust,ignore
/// let config = QueueConfig::builder()
///     .queue_name("prime_requests")
///     .poll_interval(Duration::from_millis(250))
///     .build()?;
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct QueueConfig {
    queue_name: String,
    poll_interval: Duration,
    lease_timeout: Duration,
    requeue_delay: Duration,
}

impl QueueConfig {
    pub fn builder() -> QueueConfigBuilder {
        QueueConfigBuilder::default()
    }

    /// Name of the logical queue tasks are published to and consumed from.
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Upper bound on how long a consumer waits before polling again.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// How long a claimed message stays invisible to other consumers.
    /// A consumer that has not acknowledged by then loses the message.
    pub fn lease_timeout(&self) -> Duration {
        self.lease_timeout
    }

    /// Delay before a message rejected with requeue is delivered again.
    pub fn requeue_delay(&self) -> Duration {
        self.requeue_delay
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfigBuilder::default().config
    }
}

pub struct QueueConfigBuilder {
    config: QueueConfig,
}

impl Default for QueueConfigBuilder {
    fn default() -> Self {
        Self {
            config: QueueConfig {
                queue_name: "prime_requests".to_string(),
                poll_interval: Duration::from_secs(1),
                lease_timeout: Duration::from_secs(300),
                requeue_delay: Duration::from_secs(1),
            },
        }
    }
}

impl QueueConfigBuilder {
    pub fn queue_name(mut self, value: impl Into<String>) -> Self {
        self.config.queue_name = value.into();
        self
    }

    pub fn poll_interval(mut self, value: Duration) -> Self {
        self.config.poll_interval = value;
        self
    }

    pub fn lease_timeout(mut self, value: Duration) -> Self {
        self.config.lease_timeout = value;
        self
    }

    pub fn requeue_delay(mut self, value: Duration) -> Self {
        self.config.requeue_delay = value;
        self
    }

    pub fn build(self) -> Result<QueueConfig, ConfigError> {
        if self.config.queue_name.trim().is_empty() {
            return Err(ConfigError::Empty {
                field: "queue_name",
            });
        }
        if self.config.lease_timeout < Duration::from_secs(1) {
            return Err(ConfigError::BelowMinimum {
                field: "lease_timeout_secs",
                minimum: 1,
                actual: self.config.lease_timeout.as_secs(),
            });
        }
        Ok(self.config)
    }
}

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

//! Bounded retry for connecting to dependencies at process start.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::StartupError;

/// Fixed-delay retry policy for startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartupPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for StartupPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            delay: Duration::from_secs(5),
        }
    }
}

impl StartupPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }
}

/// Runs `op` until it succeeds or `policy.attempts` attempts have failed,
/// sleeping `policy.delay` between attempts.
pub async fn with_startup_retry<T, E, F, Fut>(
    label: &str,
    policy: StartupPolicy,
    mut op: F,
) -> Result<T, StartupError>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    info!("{} available after {} attempts", label, attempt);
                }
                return Ok(value);
            }
            Err(e) if attempt < attempts => {
                warn!(
                    "{} unavailable (attempt {}/{}): {}. Retrying in {:?}",
                    label, attempt, attempts, e, policy.delay
                );
                tokio::time::sleep(policy.delay).await;
            }
            Err(e) => {
                return Err(StartupError {
                    label: label.to_string(),
                    attempts,
                    last_error: e.to_string(),
                });
            }
        }
    }
}

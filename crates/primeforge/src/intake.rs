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

//! # Job Intake
//!
//! Turns a client request into a stored [`GenerationRequest`] plus one queued
//! [`GenerationTask`] per requested prime.
//!
//! Input is validated before anything is written. The request row is written
//! first, then the tasks in batches of [`PUBLISH_BATCH_SIZE`]. If publishing
//! fails, or the process dies part way, the request keeps fewer queued tasks
//! than its quantity and will stay `pending`. That gap is reported as an error to the
//! caller and logged, but not repaired.

use std::sync::Arc;

use tracing::{error, info};

use crate::dal::DAL;
use crate::error::RequestError;
use crate::models::generation_request::{GenerationRequest, NewGenerationRequest};
use crate::models::generation_task::GenerationTask;
use crate::queue::TaskQueue;

/// Smallest digit count a client may request.
pub const MIN_DIGIT_COUNT: i32 = 12;

/// Tasks built and published per queue call.
pub const PUBLISH_BATCH_SIZE: usize = 1000;

/// Validates and fans out new generation requests.
#[derive(Clone)]
pub struct JobIntake {
    dal: DAL,
    queue: Arc<dyn TaskQueue>,
}

impl JobIntake {
    pub fn new(dal: DAL, queue: Arc<dyn TaskQueue>) -> Self {
        Self { dal, queue }
    }

    /// Creates a request for `quantity` primes of `digits` decimal digits
    /// and enqueues its tasks, indices `1..=quantity`.
    ///
    /// # Errors
    /// - [`RequestError::InvalidQuantity`] unless `quantity` is a positive `i32`
    /// - [`RequestError::InvalidDigitCount`] unless `digits` is an `i32` of at
    ///   least [`MIN_DIGIT_COUNT`]
    /// - [`RequestError::Store`] / [`RequestError::Queue`] on infrastructure failure
    pub async fn new_request(
        &self,
        quantity: i64,
        digits: i64,
    ) -> Result<GenerationRequest, RequestError> {
        let new_request = validate(quantity, digits)?;

        let request = self.dal.generation_request().create(new_request).await?;
        metrics::counter!("primeforge_requests_created_total").increment(1);

        let mut published = 0;
        for batch in GenerationTask::batches(
            request.id,
            request.digits,
            request.quantity,
            PUBLISH_BATCH_SIZE,
        ) {
            match self.queue.publish(&batch).await {
                Ok(count) => published += count,
                Err(e) => {
                    error!(
                        request_id = %request.id,
                        published,
                        quantity = request.quantity,
                        "Request stored but its tasks could not be queued: {}", e
                    );
                    metrics::counter!("primeforge_tasks_enqueued_total")
                        .increment(published as u64);
                    return Err(e.into());
                }
            }
        }
        metrics::counter!("primeforge_tasks_enqueued_total").increment(published as u64);

        info!(
            request_id = %request.id,
            quantity = request.quantity,
            digits = request.digits,
            "Queued {} generation task(s)",
            published
        );
        Ok(request)
    }
}

fn validate(quantity: i64, digits: i64) -> Result<NewGenerationRequest, RequestError> {
    let quantity = i32::try_from(quantity)
        .ok()
        .filter(|q| *q > 0)
        .ok_or(RequestError::InvalidQuantity(quantity))?;
    let digits = i32::try_from(digits)
        .ok()
        .filter(|d| *d >= MIN_DIGIT_COUNT)
        .ok_or(RequestError::InvalidDigitCount {
            minimum: MIN_DIGIT_COUNT,
            actual: digits,
        })?;
    Ok(NewGenerationRequest { quantity, digits })
}

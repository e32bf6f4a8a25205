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

//! # Status Aggregator
//!
//! Reports progress for a request from the live count of persisted primes.
//!
//! The reported status is always derived from that count: a request is
//! `completed` once `generated_count >= quantity`. When the derivation says
//! `completed` but the stored row still says `pending`, the row is promoted
//! in the same call, so the stored status never lags behind what clients
//! have already been told.

use serde::Serialize;
use tracing::{debug, info};

use crate::dal::DAL;
use crate::database::UniversalUuid;
use crate::error::RequestError;
use crate::models::generation_request::{GenerationRequest, RequestStatus};

/// Progress snapshot of a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestStatusReport {
    pub request_id: UniversalUuid,
    pub quantity: i32,
    pub digits: i32,
    pub generated_count: i64,
    pub status: RequestStatus,
    /// `100 * generated_count / quantity`, rounded to two decimals.
    pub progress_percentage: f64,
}

/// Progress snapshot plus the persisted primes, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestResultReport {
    #[serde(flatten)]
    pub status: RequestStatusReport,
    pub prime_numbers: Vec<String>,
}

/// `100 * generated_count / quantity` rounded to two decimal places.
pub fn progress_percentage(generated_count: i64, quantity: i32) -> f64 {
    if quantity <= 0 {
        return 0.0;
    }
    let raw = 100.0 * generated_count as f64 / f64::from(quantity);
    (raw * 100.0).round() / 100.0
}

#[derive(Clone)]
pub struct StatusAggregator {
    dal: DAL,
}

impl StatusAggregator {
    pub fn new(dal: DAL) -> Self {
        Self { dal }
    }

    /// Progress of the request with the given textual id.
    ///
    /// # Errors
    /// [`RequestError::InvalidRequestId`] if `request_id` is not a UUID,
    /// [`RequestError::NotFound`] if no such request exists.
    pub async fn get_status(&self, request_id: &str) -> Result<RequestStatusReport, RequestError> {
        let id = parse_request_id(request_id)?;
        let progress = self
            .dal
            .generation_request()
            .get_with_count(id)
            .await?
            .ok_or_else(|| RequestError::NotFound(request_id.to_string()))?;

        self.report(&progress.request, progress.generated_count)
            .await
    }

    /// Progress plus every persisted prime, ordered by persistence time.
    ///
    /// `generated_count` is the length of the returned list.
    pub async fn get_result(&self, request_id: &str) -> Result<RequestResultReport, RequestError> {
        let id = parse_request_id(request_id)?;
        let request = self
            .dal
            .generation_request()
            .get(id)
            .await?
            .ok_or_else(|| RequestError::NotFound(request_id.to_string()))?;

        let primes = self.dal.prime_record().list_for_request(id).await?;
        let status = self.report(&request, primes.len() as i64).await?;

        Ok(RequestResultReport {
            status,
            prime_numbers: primes.into_iter().map(|p| p.prime_value).collect(),
        })
    }

    async fn report(
        &self,
        request: &GenerationRequest,
        generated_count: i64,
    ) -> Result<RequestStatusReport, RequestError> {
        let status = RequestStatus::derive(request.quantity, generated_count);

        let needs_promotion =
            status == RequestStatus::Completed && request.status != RequestStatus::Completed;
        let promoted = needs_promotion
            && self
                .dal
                .generation_request()
                .mark_completed(request.id)
                .await?;
        if promoted {
            info!(
                request_id = %request.id,
                generated_count,
                quantity = request.quantity,
                "Request completed"
            );
        }

        debug!(
            request_id = %request.id,
            generated_count,
            quantity = request.quantity,
            status = status.as_str(),
            "Status computed"
        );

        Ok(RequestStatusReport {
            request_id: request.id,
            quantity: request.quantity,
            digits: request.digits,
            generated_count,
            status,
            progress_percentage: progress_percentage(generated_count, request.quantity),
        })
    }
}

fn parse_request_id(request_id: &str) -> Result<UniversalUuid, RequestError> {
    request_id
        .trim()
        .parse()
        .map_err(|_| RequestError::InvalidRequestId(request_id.to_string()))
}

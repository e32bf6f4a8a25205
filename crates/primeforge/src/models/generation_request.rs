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

//! Generation requests and their lifecycle status.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};

/// Lifecycle status of a generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Completed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Completed => "completed",
        }
    }

    /// Status implied by the number of persisted primes.
    pub fn derive(quantity: i32, generated_count: i64) -> Self {
        if generated_count >= i64::from(quantity) {
            RequestStatus::Completed
        } else {
            RequestStatus::Pending
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "completed" => Ok(RequestStatus::Completed),
            other => Err(format!("unknown request status '{}'", other)),
        }
    }
}

/// A stored client request for `quantity` primes of `digits` decimal digits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub id: UniversalUuid,
    pub quantity: i32,
    pub digits: i32,
    pub status: RequestStatus,
    pub created_at: UniversalTimestamp,
    pub updated_at: UniversalTimestamp,
}

/// Input for creating a request. Values are validated by the intake layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewGenerationRequest {
    pub quantity: i32,
    pub digits: i32,
}

/// A request together with the live count of primes persisted for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestProgress {
    pub request: GenerationRequest,
    pub generated_count: i64,
}

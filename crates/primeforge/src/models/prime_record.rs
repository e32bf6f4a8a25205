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

//! Persisted primes.

use serde::{Deserialize, Serialize};

use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};

/// A certified prime stored for a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimeRecord {
    pub id: i64,
    pub request_id: UniversalUuid,
    /// Decimal representation, no leading zeros.
    pub prime_value: String,
    /// The task index (1-based) this prime fulfils.
    pub task_index: i32,
    pub created_at: UniversalTimestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPrimeRecord {
    pub request_id: UniversalUuid,
    pub prime_value: String,
    pub task_index: i32,
}

/// Result of a persist attempt.
///
/// Neither conflict variant is an error: the insert is a no-op and the
/// caller decides what to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// A new row was written.
    Inserted,
    /// The value already exists for this request; generate another one.
    DuplicateValue,
    /// The task index was fulfilled by an earlier delivery of the same task.
    AlreadyFulfilled,
}

impl PersistOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, PersistOutcome::Inserted)
    }
}

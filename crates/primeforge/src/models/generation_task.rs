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

//! The unit of work carried on the queue.
//!
//! A task is encoded as a JSON object:
//!
//! ```json
//! {"request_id": "0b6f0b8e-8f5e-4c43-9d7e-3f0a2f1c9a11", "digits": 12, "index": 3, "total": 5}
//! ```

use serde::{Deserialize, Serialize};

use crate::database::universal_types::UniversalUuid;
use crate::error::QueueError;

/// One prime to generate for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationTask {
    pub request_id: UniversalUuid,
    pub digits: i32,
    /// 1-based position of this task within the request.
    pub index: i32,
    /// Number of tasks the request was split into.
    pub total: i32,
}

impl GenerationTask {
    /// Builds the `total` tasks for a request, indices `1..=total`.
    pub fn fan_out(request_id: UniversalUuid, digits: i32, total: i32) -> Vec<Self> {
        Self::batches(request_id, digits, total, usize::MAX)
            .next()
            .unwrap_or_default()
    }

    /// Builds the tasks for a request lazily, at most `batch_size` at a time.
    ///
    /// The batches cover `1..=total` in order. Only one batch is held in
    /// memory, so `total` may be as large as `i32::MAX`.
    pub fn batches(
        request_id: UniversalUuid,
        digits: i32,
        total: i32,
        batch_size: usize,
    ) -> impl Iterator<Item = Vec<Self>> {
        let step = i32::try_from(batch_size.max(1)).unwrap_or(i32::MAX);
        std::iter::successors((total >= 1).then_some(1), move |start: &i32| {
            start.checked_add(step).filter(|next| *next <= total)
        })
        .map(move |start| {
            let end = start.saturating_add(step - 1).min(total);
            (start..=end)
                .map(|index| GenerationTask {
                    request_id,
                    digits,
                    index,
                    total,
                })
                .collect()
        })
    }

    pub fn encode(&self) -> Result<String, QueueError> {
        serde_json::to_string(self).map_err(|e| QueueError::MalformedPayload(e.to_string()))
    }

    /// Parses and validates a payload taken off the queue.
    pub fn decode(payload: &str) -> Result<Self, QueueError> {
        let task: GenerationTask = serde_json::from_str(payload)
            .map_err(|e| QueueError::MalformedPayload(e.to_string()))?;
        task.validate()?;
        Ok(task)
    }

    fn validate(&self) -> Result<(), QueueError> {
        if self.digits < 1 {
            return Err(QueueError::MalformedPayload(format!(
                "digits must be at least 1, got {}",
                self.digits
            )));
        }
        if self.index < 1 || self.index > self.total {
            return Err(QueueError::MalformedPayload(format!(
                "index {} outside 1..={}",
                self.index, self.total
            )));
        }
        Ok(())
    }
}

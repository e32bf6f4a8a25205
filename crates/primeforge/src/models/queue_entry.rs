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

//! Queue rows as seen by the queue transport.

use crate::database::universal_types::UniversalTimestamp;

/// A message row in the durable task queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub id: i64,
    pub queue_name: String,
    pub payload: String,
    /// How many times the message has been handed to a consumer, including
    /// the current delivery.
    pub delivery_count: i32,
    pub visible_at: UniversalTimestamp,
    pub lease_token: Option<String>,
    pub leased_by: Option<String>,
    pub created_at: UniversalTimestamp,
}

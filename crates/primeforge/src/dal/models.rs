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

//! Row structs shared by both backends.
//!
//! Every column maps to a type both PostgreSQL and SQLite understand:
//! identifiers are text, timestamps are naive UTC.

use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::database::schema::{prime_numbers, requests, task_queue};
use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::error::StoreError;
use crate::models::generation_request::GenerationRequest;
use crate::models::prime_record::PrimeRecord;
use crate::models::queue_entry::QueueEntry;

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = requests)]
pub struct RequestRow {
    pub id: String,
    pub quantity: i32,
    pub digits: i32,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = requests)]
pub struct NewRequestRow {
    pub id: String,
    pub quantity: i32,
    pub digits: i32,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = prime_numbers)]
pub struct PrimeNumberRow {
    pub id: i64,
    pub request_id: String,
    pub prime_value: String,
    pub task_index: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = prime_numbers)]
pub struct NewPrimeNumberRow {
    pub request_id: String,
    pub prime_value: String,
    pub task_index: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, QueryableByName, Selectable)]
#[diesel(table_name = task_queue)]
pub struct TaskQueueRow {
    pub id: i64,
    pub queue_name: String,
    pub payload: String,
    pub delivery_count: i32,
    pub visible_at: NaiveDateTime,
    pub lease_token: Option<String>,
    pub leased_by: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = task_queue)]
pub struct NewTaskQueueRow {
    pub queue_name: String,
    pub payload: String,
    pub delivery_count: i32,
    pub visible_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

impl TryFrom<RequestRow> for GenerationRequest {
    type Error = StoreError;

    fn try_from(row: RequestRow) -> Result<Self, Self::Error> {
        Ok(GenerationRequest {
            id: UniversalUuid::from_stored(&row.id)?,
            quantity: row.quantity,
            digits: row.digits,
            status: row.status.parse().map_err(StoreError::InvalidRecord)?,
            created_at: UniversalTimestamp::from_naive(row.created_at),
            updated_at: UniversalTimestamp::from_naive(row.updated_at),
        })
    }
}

impl TryFrom<PrimeNumberRow> for PrimeRecord {
    type Error = StoreError;

    fn try_from(row: PrimeNumberRow) -> Result<Self, Self::Error> {
        Ok(PrimeRecord {
            id: row.id,
            request_id: UniversalUuid::from_stored(&row.request_id)?,
            prime_value: row.prime_value,
            task_index: row.task_index,
            created_at: UniversalTimestamp::from_naive(row.created_at),
        })
    }
}

impl From<TaskQueueRow> for QueueEntry {
    fn from(row: TaskQueueRow) -> Self {
        QueueEntry {
            id: row.id,
            queue_name: row.queue_name,
            payload: row.payload,
            delivery_count: row.delivery_count,
            visible_at: UniversalTimestamp::from_naive(row.visible_at),
            lease_token: row.lease_token,
            leased_by: row.leased_by,
            created_at: UniversalTimestamp::from_naive(row.created_at),
        }
    }
}

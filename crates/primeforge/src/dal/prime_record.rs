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

//! Prime record DAL.
//!
//! Uniqueness of `(request_id, prime_value)` and `(request_id, task_index)` is
//! enforced by the store at insert time. [`PrimeRecordDAL::persist`] issues a
//! single `INSERT ... ON CONFLICT DO NOTHING`; the row count alone decides
//! whether the value was new. Only after a conflict is the index looked up,
//! to tell the caller which constraint fired.

use diesel::prelude::*;

use super::models::{NewPrimeNumberRow, PrimeNumberRow};
use super::DAL;
use crate::database::schema::prime_numbers;
use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::error::StoreError;
use crate::models::prime_record::{NewPrimeRecord, PersistOutcome, PrimeRecord};

#[derive(Clone)]
pub struct PrimeRecordDAL<'a> {
    dal: &'a DAL,
}

impl<'a> PrimeRecordDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Inserts a prime unless it conflicts with an existing row.
    pub async fn persist(&self, record: NewPrimeRecord) -> Result<PersistOutcome, StoreError> {
        let row = NewPrimeNumberRow {
            request_id: record.request_id.to_string(),
            prime_value: record.prime_value,
            task_index: record.task_index,
            created_at: UniversalTimestamp::now().to_naive(),
        };

        crate::dispatch_backend!(
            self.dal.backend(),
            self.persist_postgres(row).await,
            self.persist_sqlite(row).await
        )
    }

    async fn persist_postgres(&self, row: NewPrimeNumberRow) -> Result<PersistOutcome, StoreError> {
        let conn = self.dal.database.get_postgres_connection().await?;
        let outcome = conn
            .interact(move |conn| -> QueryResult<PersistOutcome> {
                let inserted = diesel::insert_into(prime_numbers::table)
                    .values(&row)
                    .on_conflict_do_nothing()
                    .execute(conn)?;
                if inserted > 0 {
                    return Ok(PersistOutcome::Inserted);
                }

                let index_taken = prime_numbers::table
                    .filter(prime_numbers::request_id.eq(&row.request_id))
                    .filter(prime_numbers::task_index.eq(row.task_index))
                    .count()
                    .get_result::<i64>(conn)?;
                Ok(if index_taken > 0 {
                    PersistOutcome::AlreadyFulfilled
                } else {
                    PersistOutcome::DuplicateValue
                })
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;
        Ok(outcome)
    }

    async fn persist_sqlite(&self, row: NewPrimeNumberRow) -> Result<PersistOutcome, StoreError> {
        let conn = self.dal.database.get_sqlite_connection().await?;
        let outcome = conn
            .interact(move |conn| -> QueryResult<PersistOutcome> {
                let inserted = diesel::insert_into(prime_numbers::table)
                    .values(&row)
                    .on_conflict_do_nothing()
                    .execute(conn)?;
                if inserted > 0 {
                    return Ok(PersistOutcome::Inserted);
                }

                let index_taken = prime_numbers::table
                    .filter(prime_numbers::request_id.eq(&row.request_id))
                    .filter(prime_numbers::task_index.eq(row.task_index))
                    .count()
                    .get_result::<i64>(conn)?;
                Ok(if index_taken > 0 {
                    PersistOutcome::AlreadyFulfilled
                } else {
                    PersistOutcome::DuplicateValue
                })
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;
        Ok(outcome)
    }

    /// Number of primes stored for a request.
    pub async fn count_for_request(&self, request_id: UniversalUuid) -> Result<i64, StoreError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.count_for_request_postgres(request_id).await,
            self.count_for_request_sqlite(request_id).await
        )
    }

    async fn count_for_request_postgres(
        &self,
        request_id: UniversalUuid,
    ) -> Result<i64, StoreError> {
        let conn = self.dal.database.get_postgres_connection().await?;
        let key = request_id.to_string();
        let count = conn
            .interact(move |conn| {
                prime_numbers::table
                    .filter(prime_numbers::request_id.eq(key))
                    .count()
                    .get_result::<i64>(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;
        Ok(count)
    }

    async fn count_for_request_sqlite(&self, request_id: UniversalUuid) -> Result<i64, StoreError> {
        let conn = self.dal.database.get_sqlite_connection().await?;
        let key = request_id.to_string();
        let count = conn
            .interact(move |conn| {
                prime_numbers::table
                    .filter(prime_numbers::request_id.eq(key))
                    .count()
                    .get_result::<i64>(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;
        Ok(count)
    }

    /// All primes stored for a request, oldest first.
    ///
    /// Rows created within the same timestamp tick fall back to insertion
    /// order via the surrogate id.
    pub async fn list_for_request(
        &self,
        request_id: UniversalUuid,
    ) -> Result<Vec<PrimeRecord>, StoreError> {
        let rows = crate::dispatch_backend!(
            self.dal.backend(),
            self.list_for_request_postgres(request_id).await,
            self.list_for_request_sqlite(request_id).await
        )?;
        rows.into_iter().map(PrimeRecord::try_from).collect()
    }

    async fn list_for_request_postgres(
        &self,
        request_id: UniversalUuid,
    ) -> Result<Vec<PrimeNumberRow>, StoreError> {
        let conn = self.dal.database.get_postgres_connection().await?;
        let key = request_id.to_string();
        let rows = conn
            .interact(move |conn| {
                prime_numbers::table
                    .filter(prime_numbers::request_id.eq(key))
                    .order((prime_numbers::created_at.asc(), prime_numbers::id.asc()))
                    .select(PrimeNumberRow::as_select())
                    .load(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;
        Ok(rows)
    }

    async fn list_for_request_sqlite(
        &self,
        request_id: UniversalUuid,
    ) -> Result<Vec<PrimeNumberRow>, StoreError> {
        let conn = self.dal.database.get_sqlite_connection().await?;
        let key = request_id.to_string();
        let rows = conn
            .interact(move |conn| {
                prime_numbers::table
                    .filter(prime_numbers::request_id.eq(key))
                    .order((prime_numbers::created_at.asc(), prime_numbers::id.asc()))
                    .select(PrimeNumberRow::as_select())
                    .load(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;
        Ok(rows)
    }
}

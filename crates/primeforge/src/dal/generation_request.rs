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

//! Generation request DAL with runtime backend selection.

use diesel::prelude::*;

use super::models::{NewRequestRow, RequestRow};
use super::DAL;
use crate::database::schema::{prime_numbers, requests};
use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::error::StoreError;
use crate::models::generation_request::{
    GenerationRequest, NewGenerationRequest, RequestProgress, RequestStatus,
};

/// Data access for the `requests` table.
#[derive(Clone)]
pub struct GenerationRequestDAL<'a> {
    dal: &'a DAL,
}

impl<'a> GenerationRequestDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Stores a new request with status `pending` and a fresh identifier.
    pub async fn create(
        &self,
        new_request: NewGenerationRequest,
    ) -> Result<GenerationRequest, StoreError> {
        let now = UniversalTimestamp::now();
        let request = GenerationRequest {
            id: UniversalUuid::new_v4(),
            quantity: new_request.quantity,
            digits: new_request.digits,
            status: RequestStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        let row = NewRequestRow {
            id: request.id.to_string(),
            quantity: request.quantity,
            digits: request.digits,
            status: request.status.as_str().to_string(),
            created_at: now.to_naive(),
            updated_at: now.to_naive(),
        };

        crate::dispatch_backend!(
            self.dal.backend(),
            self.create_postgres(row).await,
            self.create_sqlite(row).await
        )?;

        Ok(request)
    }

    async fn create_postgres(&self, row: NewRequestRow) -> Result<(), StoreError> {
        let conn = self.dal.database.get_postgres_connection().await?;
        conn.interact(move |conn| {
            diesel::insert_into(requests::table)
                .values(&row)
                .execute(conn)
        })
        .await
        .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;
        Ok(())
    }

    async fn create_sqlite(&self, row: NewRequestRow) -> Result<(), StoreError> {
        let conn = self.dal.database.get_sqlite_connection().await?;
        conn.interact(move |conn| {
            diesel::insert_into(requests::table)
                .values(&row)
                .execute(conn)
        })
        .await
        .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;
        Ok(())
    }

    /// Looks up a request by id.
    pub async fn get(&self, id: UniversalUuid) -> Result<Option<GenerationRequest>, StoreError> {
        let row = crate::dispatch_backend!(
            self.dal.backend(),
            self.get_postgres(id).await,
            self.get_sqlite(id).await
        )?;
        row.map(GenerationRequest::try_from).transpose()
    }

    async fn get_postgres(&self, id: UniversalUuid) -> Result<Option<RequestRow>, StoreError> {
        let conn = self.dal.database.get_postgres_connection().await?;
        let key = id.to_string();
        let row = conn
            .interact(move |conn| {
                requests::table
                    .find(key)
                    .select(RequestRow::as_select())
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;
        Ok(row)
    }

    async fn get_sqlite(&self, id: UniversalUuid) -> Result<Option<RequestRow>, StoreError> {
        let conn = self.dal.database.get_sqlite_connection().await?;
        let key = id.to_string();
        let row = conn
            .interact(move |conn| {
                requests::table
                    .find(key)
                    .select(RequestRow::as_select())
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;
        Ok(row)
    }

    /// Loads a request together with the live number of primes stored for it.
    ///
    /// Both reads run on the same pooled connection.
    pub async fn get_with_count(
        &self,
        id: UniversalUuid,
    ) -> Result<Option<RequestProgress>, StoreError> {
        let loaded = crate::dispatch_backend!(
            self.dal.backend(),
            self.get_with_count_postgres(id).await,
            self.get_with_count_sqlite(id).await
        )?;

        match loaded {
            Some((row, generated_count)) => Ok(Some(RequestProgress {
                request: GenerationRequest::try_from(row)?,
                generated_count,
            })),
            None => Ok(None),
        }
    }

    async fn get_with_count_postgres(
        &self,
        id: UniversalUuid,
    ) -> Result<Option<(RequestRow, i64)>, StoreError> {
        let conn = self.dal.database.get_postgres_connection().await?;
        let key = id.to_string();
        let loaded = conn
            .interact(move |conn| -> QueryResult<Option<(RequestRow, i64)>> {
                let row = requests::table
                    .find(&key)
                    .select(RequestRow::as_select())
                    .first(conn)
                    .optional()?;
                match row {
                    Some(row) => {
                        let count = prime_numbers::table
                            .filter(prime_numbers::request_id.eq(&key))
                            .count()
                            .get_result::<i64>(conn)?;
                        Ok(Some((row, count)))
                    }
                    None => Ok(None),
                }
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;
        Ok(loaded)
    }

    async fn get_with_count_sqlite(
        &self,
        id: UniversalUuid,
    ) -> Result<Option<(RequestRow, i64)>, StoreError> {
        let conn = self.dal.database.get_sqlite_connection().await?;
        let key = id.to_string();
        let loaded = conn
            .interact(move |conn| -> QueryResult<Option<(RequestRow, i64)>> {
                let row = requests::table
                    .find(&key)
                    .select(RequestRow::as_select())
                    .first(conn)
                    .optional()?;
                match row {
                    Some(row) => {
                        let count = prime_numbers::table
                            .filter(prime_numbers::request_id.eq(&key))
                            .count()
                            .get_result::<i64>(conn)?;
                        Ok(Some((row, count)))
                    }
                    None => Ok(None),
                }
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;
        Ok(loaded)
    }

    /// Promotes a request to `completed`.
    ///
    /// Only a `pending` row is updated, so concurrent callers race harmlessly.
    /// Returns `true` if this call performed the promotion.
    pub async fn mark_completed(&self, id: UniversalUuid) -> Result<bool, StoreError> {
        let updated = crate::dispatch_backend!(
            self.dal.backend(),
            self.mark_completed_postgres(id).await,
            self.mark_completed_sqlite(id).await
        )?;
        Ok(updated > 0)
    }

    async fn mark_completed_postgres(&self, id: UniversalUuid) -> Result<usize, StoreError> {
        let conn = self.dal.database.get_postgres_connection().await?;
        let key = id.to_string();
        let now = UniversalTimestamp::now().to_naive();
        let updated = conn
            .interact(move |conn| {
                diesel::update(
                    requests::table
                        .filter(requests::id.eq(key))
                        .filter(requests::status.ne(RequestStatus::Completed.as_str())),
                )
                .set((
                    requests::status.eq(RequestStatus::Completed.as_str()),
                    requests::updated_at.eq(now),
                ))
                .execute(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;
        Ok(updated)
    }

    async fn mark_completed_sqlite(&self, id: UniversalUuid) -> Result<usize, StoreError> {
        let conn = self.dal.database.get_sqlite_connection().await?;
        let key = id.to_string();
        let now = UniversalTimestamp::now().to_naive();
        let updated = conn
            .interact(move |conn| {
                diesel::update(
                    requests::table
                        .filter(requests::id.eq(key))
                        .filter(requests::status.ne(RequestStatus::Completed.as_str())),
                )
                .set((
                    requests::status.eq(RequestStatus::Completed.as_str()),
                    requests::updated_at.eq(now),
                ))
                .execute(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;
        Ok(updated)
    }
}

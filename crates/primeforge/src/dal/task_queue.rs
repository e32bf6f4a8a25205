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

//! Task queue DAL: the storage half of the durable queue.
//!
//! A message row stays in `task_queue` until it is acknowledged. Claiming a
//! row leases it: `visible_at` moves to the end of the lease and a fresh
//! `lease_token` is stamped on it. If the consumer dies, the lease simply runs
//! out and the row becomes claimable again, which gives at-least-once
//! delivery. Acknowledge, release and discard all require the current lease
//! token, so a consumer whose lease already expired cannot touch a row that
//! has since been handed to someone else.
//!
//! Claiming uses `FOR UPDATE SKIP LOCKED` on PostgreSQL so concurrent
//! consumers never block on or double-claim the same row. SQLite runs the
//! select and update in one `IMMEDIATE` transaction, which takes the write
//! lock up front.

use std::time::Duration;

use diesel::prelude::*;
use tracing::debug;

use super::models::{NewTaskQueueRow, TaskQueueRow};
use super::DAL;
use crate::database::schema::task_queue;
use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::error::StoreError;
use crate::models::queue_entry::QueueEntry;

/// Rows per multi-row `INSERT` on PostgreSQL. Each row binds five
/// parameters and a statement may bind at most 65,535.
pub const MAX_ROWS_PER_INSERT: usize = 1000;

/// Parameters for a claim.
#[derive(Debug, Clone)]
pub struct ClaimParams {
    pub queue_name: String,
    pub max_messages: i64,
    pub consumer: String,
    pub lease_timeout: Duration,
}

#[derive(Clone)]
pub struct TaskQueueDAL<'a> {
    dal: &'a DAL,
}

impl<'a> TaskQueueDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Appends messages to a queue in one transaction. They are visible
    /// immediately. Any number of payloads may be passed; PostgreSQL inserts
    /// them [`MAX_ROWS_PER_INSERT`] rows per statement.
    pub async fn publish(&self, queue_name: &str, payloads: Vec<String>) -> Result<usize, StoreError> {
        if payloads.is_empty() {
            return Ok(0);
        }
        let now = UniversalTimestamp::now().to_naive();
        let rows: Vec<NewTaskQueueRow> = payloads
            .into_iter()
            .map(|payload| NewTaskQueueRow {
                queue_name: queue_name.to_string(),
                payload,
                delivery_count: 0,
                visible_at: now,
                created_at: now,
            })
            .collect();

        crate::dispatch_backend!(
            self.dal.backend(),
            self.publish_postgres(rows).await,
            self.publish_sqlite(rows).await
        )
    }

    async fn publish_postgres(&self, rows: Vec<NewTaskQueueRow>) -> Result<usize, StoreError> {
        let conn = self.dal.database.get_postgres_connection().await?;
        let inserted = conn
            .interact(move |conn| {
                conn.transaction(|conn| {
                    let mut inserted = 0;
                    for chunk in rows.chunks(MAX_ROWS_PER_INSERT) {
                        inserted += diesel::insert_into(task_queue::table)
                            .values(chunk)
                            .execute(conn)?;
                    }
                    Ok::<_, diesel::result::Error>(inserted)
                })
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;
        Ok(inserted)
    }

    async fn publish_sqlite(&self, rows: Vec<NewTaskQueueRow>) -> Result<usize, StoreError> {
        let conn = self.dal.database.get_sqlite_connection().await?;
        let inserted = conn
            .interact(move |conn| {
                conn.immediate_transaction(|conn| {
                    let mut inserted = 0;
                    for row in &rows {
                        inserted += diesel::insert_into(task_queue::table)
                            .values(row)
                            .execute(conn)?;
                    }
                    Ok::<_, diesel::result::Error>(inserted)
                })
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;
        Ok(inserted)
    }

    /// Leases up to `max_messages` visible messages, oldest first.
    ///
    /// Every returned entry carries the same fresh lease token and an
    /// incremented delivery count.
    pub async fn claim(&self, params: ClaimParams) -> Result<Vec<QueueEntry>, StoreError> {
        let now = UniversalTimestamp::now();
        let lease_until = now.plus(params.lease_timeout);
        let token = UniversalUuid::new_v4().to_string();

        let rows = crate::dispatch_backend!(
            self.dal.backend(),
            self.claim_postgres(&params, now, lease_until, token).await,
            self.claim_sqlite(&params, now, lease_until, token).await
        )?;

        if !rows.is_empty() {
            debug!(
                "Leased {} message(s) from '{}' for {}",
                rows.len(),
                params.queue_name,
                params.consumer
            );
        }
        Ok(rows.into_iter().map(QueueEntry::from).collect())
    }

    async fn claim_postgres(
        &self,
        params: &ClaimParams,
        now: UniversalTimestamp,
        lease_until: UniversalTimestamp,
        token: String,
    ) -> Result<Vec<TaskQueueRow>, StoreError> {
        use diesel::sql_types::{BigInt, Text, Timestamp};

        let conn = self.dal.database.get_postgres_connection().await?;
        let queue_name = params.queue_name.clone();
        let consumer = params.consumer.clone();
        let max_messages = params.max_messages;
        let now = now.to_naive();
        let lease_until = lease_until.to_naive();

        let mut rows: Vec<TaskQueueRow> = conn
            .interact(move |conn| {
                diesel::sql_query(
                    r#"
                    UPDATE task_queue
                    SET visible_at = $1,
                        lease_token = $2,
                        leased_by = $3,
                        delivery_count = delivery_count + 1
                    WHERE id IN (
                        SELECT id FROM task_queue
                        WHERE queue_name = $4 AND visible_at <= $5
                        ORDER BY id
                        LIMIT $6
                        FOR UPDATE SKIP LOCKED
                    )
                    RETURNING id, queue_name, payload, delivery_count, visible_at,
                              lease_token, leased_by, created_at
                    "#,
                )
                .bind::<Timestamp, _>(lease_until)
                .bind::<Text, _>(token)
                .bind::<Text, _>(consumer)
                .bind::<Text, _>(queue_name)
                .bind::<Timestamp, _>(now)
                .bind::<BigInt, _>(max_messages)
                .load::<TaskQueueRow>(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        // RETURNING does not preserve the subquery order
        rows.sort_by_key(|row| row.id);
        Ok(rows)
    }

    async fn claim_sqlite(
        &self,
        params: &ClaimParams,
        now: UniversalTimestamp,
        lease_until: UniversalTimestamp,
        token: String,
    ) -> Result<Vec<TaskQueueRow>, StoreError> {
        let conn = self.dal.database.get_sqlite_connection().await?;
        let queue_name = params.queue_name.clone();
        let consumer = params.consumer.clone();
        let max_messages = params.max_messages;
        let now = now.to_naive();
        let lease_until = lease_until.to_naive();

        let rows = conn
            .interact(move |conn| {
                conn.immediate_transaction(|conn| -> QueryResult<Vec<TaskQueueRow>> {
                    let ids: Vec<i64> = task_queue::table
                        .filter(task_queue::queue_name.eq(&queue_name))
                        .filter(task_queue::visible_at.le(now))
                        .order(task_queue::id.asc())
                        .limit(max_messages)
                        .select(task_queue::id)
                        .load(conn)?;
                    if ids.is_empty() {
                        return Ok(Vec::new());
                    }

                    diesel::update(task_queue::table.filter(task_queue::id.eq_any(&ids)))
                        .set((
                            task_queue::visible_at.eq(lease_until),
                            task_queue::lease_token.eq(Some(token)),
                            task_queue::leased_by.eq(Some(consumer)),
                            task_queue::delivery_count.eq(task_queue::delivery_count + 1),
                        ))
                        .execute(conn)?;

                    task_queue::table
                        .filter(task_queue::id.eq_any(&ids))
                        .order(task_queue::id.asc())
                        .select(TaskQueueRow::as_select())
                        .load::<TaskQueueRow>(conn)
                })
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;
        Ok(rows)
    }

    /// Deletes an acknowledged message. Returns `false` if the lease no
    /// longer matches.
    pub async fn ack(&self, id: i64, lease_token: &str) -> Result<bool, StoreError> {
        self.delete_leased(id, lease_token).await
    }

    /// Deletes a message that will never be processed. Returns `false` if
    /// the lease no longer matches.
    pub async fn discard(&self, id: i64, lease_token: &str) -> Result<bool, StoreError> {
        self.delete_leased(id, lease_token).await
    }

    async fn delete_leased(&self, id: i64, lease_token: &str) -> Result<bool, StoreError> {
        let token = lease_token.to_string();
        let deleted = crate::dispatch_backend!(
            self.dal.backend(),
            self.delete_leased_postgres(id, token).await,
            self.delete_leased_sqlite(id, token).await
        )?;
        Ok(deleted > 0)
    }

    async fn delete_leased_postgres(&self, id: i64, token: String) -> Result<usize, StoreError> {
        let conn = self.dal.database.get_postgres_connection().await?;
        let deleted = conn
            .interact(move |conn| {
                diesel::delete(
                    task_queue::table
                        .filter(task_queue::id.eq(id))
                        .filter(task_queue::lease_token.eq(token)),
                )
                .execute(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;
        Ok(deleted)
    }

    async fn delete_leased_sqlite(&self, id: i64, token: String) -> Result<usize, StoreError> {
        let conn = self.dal.database.get_sqlite_connection().await?;
        let deleted = conn
            .interact(move |conn| {
                diesel::delete(
                    task_queue::table
                        .filter(task_queue::id.eq(id))
                        .filter(task_queue::lease_token.eq(token)),
                )
                .execute(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;
        Ok(deleted)
    }

    /// Drops the lease so the message becomes claimable again at `visible_at`.
    /// Returns `false` if the lease no longer matches.
    pub async fn release(
        &self,
        id: i64,
        lease_token: &str,
        visible_at: UniversalTimestamp,
    ) -> Result<bool, StoreError> {
        let token = lease_token.to_string();
        let visible_at = visible_at.to_naive();
        let released = crate::dispatch_backend!(
            self.dal.backend(),
            self.release_postgres(id, token, visible_at).await,
            self.release_sqlite(id, token, visible_at).await
        )?;
        Ok(released > 0)
    }

    async fn release_postgres(
        &self,
        id: i64,
        token: String,
        visible_at: chrono::NaiveDateTime,
    ) -> Result<usize, StoreError> {
        let conn = self.dal.database.get_postgres_connection().await?;
        let released = conn
            .interact(move |conn| {
                diesel::update(
                    task_queue::table
                        .filter(task_queue::id.eq(id))
                        .filter(task_queue::lease_token.eq(token)),
                )
                .set((
                    task_queue::visible_at.eq(visible_at),
                    task_queue::lease_token.eq(None::<String>),
                    task_queue::leased_by.eq(None::<String>),
                ))
                .execute(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;
        Ok(released)
    }

    async fn release_sqlite(
        &self,
        id: i64,
        token: String,
        visible_at: chrono::NaiveDateTime,
    ) -> Result<usize, StoreError> {
        let conn = self.dal.database.get_sqlite_connection().await?;
        let released = conn
            .interact(move |conn| {
                diesel::update(
                    task_queue::table
                        .filter(task_queue::id.eq(id))
                        .filter(task_queue::lease_token.eq(token)),
                )
                .set((
                    task_queue::visible_at.eq(visible_at),
                    task_queue::lease_token.eq(None::<String>),
                    task_queue::leased_by.eq(None::<String>),
                ))
                .execute(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;
        Ok(released)
    }

    /// Messages on a queue that have not been acknowledged or discarded,
    /// leased or not.
    /// Whether the queue holds a message that could be claimed right now.
    pub async fn has_visible(&self, queue_name: &str) -> Result<bool, StoreError> {
        let name = queue_name.to_string();
        let now = UniversalTimestamp::now().to_naive();
        crate::dispatch_backend!(
            self.dal.backend(),
            self.has_visible_postgres(name, now).await,
            self.has_visible_sqlite(name, now).await
        )
    }

    async fn has_visible_postgres(
        &self,
        queue_name: String,
        now: chrono::NaiveDateTime,
    ) -> Result<bool, StoreError> {
        let conn = self.dal.database.get_postgres_connection().await?;
        let visible = conn
            .interact(move |conn| {
                diesel::select(diesel::dsl::exists(
                    task_queue::table
                        .filter(task_queue::queue_name.eq(queue_name))
                        .filter(task_queue::visible_at.le(now)),
                ))
                .get_result::<bool>(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;
        Ok(visible)
    }

    async fn has_visible_sqlite(
        &self,
        queue_name: String,
        now: chrono::NaiveDateTime,
    ) -> Result<bool, StoreError> {
        let conn = self.dal.database.get_sqlite_connection().await?;
        let visible = conn
            .interact(move |conn| {
                diesel::select(diesel::dsl::exists(
                    task_queue::table
                        .filter(task_queue::queue_name.eq(queue_name))
                        .filter(task_queue::visible_at.le(now)),
                ))
                .get_result::<bool>(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;
        Ok(visible)
    }

    pub async fn count_pending(&self, queue_name: &str) -> Result<i64, StoreError> {
        let name = queue_name.to_string();
        crate::dispatch_backend!(
            self.dal.backend(),
            self.count_pending_postgres(name).await,
            self.count_pending_sqlite(name).await
        )
    }

    async fn count_pending_postgres(&self, queue_name: String) -> Result<i64, StoreError> {
        let conn = self.dal.database.get_postgres_connection().await?;
        let count = conn
            .interact(move |conn| {
                task_queue::table
                    .filter(task_queue::queue_name.eq(queue_name))
                    .count()
                    .get_result::<i64>(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;
        Ok(count)
    }

    async fn count_pending_sqlite(&self, queue_name: String) -> Result<i64, StoreError> {
        let conn = self.dal.database.get_sqlite_connection().await?;
        let count = conn
            .interact(move |conn| {
                task_queue::table
                    .filter(task_queue::queue_name.eq(queue_name))
                    .count()
                    .get_result::<i64>(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;
        Ok(count)
    }
}

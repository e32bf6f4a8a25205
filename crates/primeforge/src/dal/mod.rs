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

//! Data Access Layer with runtime backend selection.
//!
//! [`DAL`] hands out one accessor per entity. Each accessor method checks
//! out a pooled connection for the duration of a single `interact` call and
//! dispatches to a PostgreSQL or SQLite implementation based on the backend
//! detected from the connection URL.
//!
//! ```rust,ignore
//! let dal = DAL::new(database);
//! let request = dal.generation_request().create(new_request).await?;
//! let outcome = dal.prime_record().persist(record).await?;
//! ```

use crate::database::{BackendType, Database};

pub mod generation_request;
pub mod models;
pub mod prime_record;
pub mod task_queue;

pub use generation_request::GenerationRequestDAL;
pub use prime_record::PrimeRecordDAL;
pub use task_queue::TaskQueueDAL;

/// Dispatches to the PostgreSQL or SQLite arm for the given backend.
///
/// ```rust,ignore
/// crate::dispatch_backend!(
///     self.dal.backend(),
///     self.count_postgres(id).await,
///     self.count_sqlite(id).await
/// )
/// ```
#[macro_export]
macro_rules! dispatch_backend {
    ($backend:expr, $pg:expr, $sqlite:expr) => {
        match $backend {
            $crate::database::BackendType::Postgres => $pg,
            $crate::database::BackendType::Sqlite => $sqlite,
        }
    };
}

/// Entry point for all store operations.
///
/// Cloning is cheap; clones share the same connection pool.
#[derive(Clone, Debug)]
pub struct DAL {
    /// The database instance with connection pool
    pub database: Database,
}

impl DAL {
    pub fn new(database: Database) -> Self {
        DAL { database }
    }

    pub fn backend(&self) -> BackendType {
        self.database.backend()
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn generation_request(&self) -> GenerationRequestDAL<'_> {
        GenerationRequestDAL::new(self)
    }

    pub fn prime_record(&self) -> PrimeRecordDAL<'_> {
        PrimeRecordDAL::new(self)
    }

    pub fn task_queue(&self) -> TaskQueueDAL<'_> {
        TaskQueueDAL::new(self)
    }
}

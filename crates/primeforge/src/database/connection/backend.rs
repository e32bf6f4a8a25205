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

//! Backend detection and the pool type covering both backends.

use std::fmt;

use deadpool_diesel::postgres::Pool as PgPool;
use deadpool_diesel::sqlite::Pool as SqlitePool;

use crate::error::StoreError;

const POSTGRES_SCHEMES: [&str; 2] = ["postgres://", "postgresql://"];

// `sqlite://` URLs, `file:` URIs and absolute or relative paths
const SQLITE_PREFIXES: [&str; 5] = ["sqlite://", "file:", "/", "./", "../"];
const SQLITE_EXTENSIONS: [&str; 3] = [".db", ".sqlite", ".sqlite3"];

/// Store backend, chosen at runtime from the connection URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    Postgres,
    Sqlite,
}

impl BackendType {
    /// Detects the backend from a connection URL.
    ///
    /// # Errors
    /// [`StoreError::UnsupportedBackend`] when the URL is neither a
    /// PostgreSQL URL nor one of the accepted SQLite forms.
    pub fn from_url(url: &str) -> Result<Self, StoreError> {
        if POSTGRES_SCHEMES.iter().any(|scheme| url.starts_with(scheme)) {
            Ok(BackendType::Postgres)
        } else if url == ":memory:"
            || SQLITE_PREFIXES.iter().any(|prefix| url.starts_with(prefix))
            || SQLITE_EXTENSIONS.iter().any(|ext| url.ends_with(ext))
        {
            Ok(BackendType::Sqlite)
        } else {
            Err(StoreError::UnsupportedBackend(url.to_string()))
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendType::Postgres => "postgres",
            BackendType::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A connection pool for whichever backend is in use.
#[derive(Clone)]
pub enum AnyPool {
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

impl AnyPool {
    pub fn backend(&self) -> BackendType {
        match self {
            AnyPool::Postgres(_) => BackendType::Postgres,
            AnyPool::Sqlite(_) => BackendType::Sqlite,
        }
    }

    /// Upper bound on connections checked out at once.
    pub fn max_size(&self) -> usize {
        match self {
            AnyPool::Postgres(pool) => pool.status().max_size,
            AnyPool::Sqlite(pool) => pool.status().max_size,
        }
    }
}

impl fmt::Debug for AnyPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyPool")
            .field("backend", &self.backend())
            .field("max_size", &self.max_size())
            .finish()
    }
}

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

//! Error types for every layer of the crate.
//!
//! Store and queue errors stay inside the worker, which converts them into
//! retryable rejections. Only validation failures, not-found lookups and
//! startup failures are meant to reach a caller.

use thiserror::Error;

/// Errors raised by the relational store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Connection pool error: {0}")]
    ConnectionPool(String),

    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Invalid stored record: {0}")]
    InvalidRecord(String),

    #[error("Unsupported database URL '{0}': expected postgres://, postgresql://, sqlite://, a file: URI or a file path")]
    UnsupportedBackend(String),

    #[error("Invalid connection URL: {0}")]
    InvalidUrl(String),
}

/// Errors raised by a task queue transport.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue store error: {0}")]
    Store(#[from] StoreError),

    #[error("Malformed task payload: {0}")]
    MalformedPayload(String),

    #[error("Lease expired for delivery {delivery_id}; the message may have been redelivered")]
    LeaseExpired { delivery_id: String },

    #[error("Queue connection error: {0}")]
    Connection(String),

    #[error("Queue is closed")]
    Closed,
}

/// Errors raised by the certification engine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CertificationError {
    #[error("Digit count must be at least 1, got {0}")]
    InvalidDigitCount(u32),

    #[error("Round count must be at least 1")]
    InvalidRounds,
}

/// Errors returned at the request boundary (intake, status and result queries).
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Quantity must be a positive integer, got {0}")]
    InvalidQuantity(i64),

    #[error("Digit count must be at least {minimum}, got {actual}")]
    InvalidDigitCount { minimum: i32, actual: i64 },

    #[error("Invalid request id '{0}'")]
    InvalidRequestId(String),

    #[error("Request not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Errors raised while processing a single delivery.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Certification(#[from] CertificationError),

    #[error("Prime generation task failed: {0}")]
    Generation(String),
}

/// A dependency could not be reached within the startup retry budget.
#[derive(Debug, Error)]
#[error("{label} unavailable after {attempts} attempts: {last_error}")]
pub struct StartupError {
    pub label: String,
    pub attempts: u32,
    pub last_error: String,
}

/// Errors raised while validating configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be at least {minimum}, got {actual}")]
    BelowMinimum {
        field: &'static str,
        minimum: u64,
        actual: u64,
    },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },
}

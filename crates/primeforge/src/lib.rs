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

//! # Primeforge
//!
//! Primeforge fulfils requests for batches of prime numbers with an exact
//! decimal digit length. A request is split into one task per prime, the
//! tasks are distributed to any number of workers over a durable queue, and
//! progress is derived from what the workers have persisted.
//!
//! ## Components
//!
//! - [`engine`]: random candidate generation and Miller–Rabin certification.
//! - [`intake`]: validates a request, stores it, and fans it out into tasks.
//! - [`worker`]: the receive → generate → persist → acknowledge loop.
//! - [`status`]: progress and completion reporting for a request.
//! - [`queue`]: the durable task transport (database-backed or in-memory).
//! - [`database`] and [`dal`]: connection pooling, migrations and data access
//!   for PostgreSQL and SQLite, selected at runtime from the connection URL.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use primeforge::{Database, DAL, DatabaseQueue, JobIntake, QueueConfig};
//!
//! let database = Database::new("sqlite://primes.db", 10)?;
//! database.run_migrations().await?;
//!
//! let queue = Arc::new(DatabaseQueue::new(database.clone(), QueueConfig::default()).await?);
//! let intake = JobIntake::new(DAL::new(database), queue);
//! let request = intake.new_request(5, 12).await?;
//! println!("{}", request.id);
//! ```

use std::sync::Once;

use tracing::Level;
use tracing_subscriber::EnvFilter;

pub mod bootstrap;
pub mod config;
pub mod dal;
pub mod database;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod intake;
pub mod models;
pub mod queue;
pub mod status;
pub mod worker;

pub use bootstrap::{with_startup_retry, StartupPolicy};
pub use config::QueueConfig;
pub use dal::DAL;
pub use database::{BackendType, Database, UniversalTimestamp, UniversalUuid};
pub use engine::{CertificationEngine, PrimeSource, DEFAULT_ROUNDS};
pub use error::{
    CertificationError, ConfigError, QueueError, RequestError, StartupError, StoreError,
    WorkerError,
};
pub use intake::{JobIntake, MIN_DIGIT_COUNT, PUBLISH_BATCH_SIZE};
pub use models::generation_request::{GenerationRequest, RequestStatus};
pub use models::generation_task::GenerationTask;
pub use models::prime_record::{PersistOutcome, PrimeRecord};
pub use queue::{DatabaseQueue, Delivery, InMemoryQueue, TaskQueue};
pub use status::{RequestResultReport, RequestStatusReport, StatusAggregator};
pub use worker::{TaskOutcome, Worker, WorkerConfig, WorkerSummary};

static LOGGING: Once = Once::new();

/// Installs a global `tracing` subscriber.
///
/// An explicit `level` is used as is. Without one, `RUST_LOG` applies when
/// set and `INFO` otherwise. Only the first call installs a subscriber.
pub fn init_logging(level: Option<Level>) {
    LOGGING.call_once(|| {
        let filter = match level {
            Some(level) => EnvFilter::new(level.as_str().to_lowercase()),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();
    });
}

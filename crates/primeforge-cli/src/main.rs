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

//! Primeforge CLI - submit prime generation requests, query them, and run workers.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::Level;

mod commands;

/// Primeforge - distributed generation of certified primes
#[derive(Parser, Debug)]
#[command(name = "primeforge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (can also be set via DATABASE_URL environment variable)
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Maximum connections in the PostgreSQL pool (SQLite always uses one)
    #[arg(long, env = "DB_POOL_SIZE", default_value_t = 10, global = true)]
    db_pool_size: u32,

    #[command(flatten)]
    queue: QueueArgs,

    #[command(flatten)]
    startup: StartupArgs,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Queue transport settings.
#[derive(Args, Debug, Clone)]
pub struct QueueArgs {
    /// Store holding the task queue; defaults to the database URL
    #[arg(long, env = "QUEUE_URL", global = true)]
    pub queue_url: Option<String>,

    /// Logical queue name
    #[arg(long, env = "QUEUE_NAME", default_value = "prime_requests", global = true)]
    pub queue_name: String,

    /// Longest a consumer waits before polling for new tasks
    #[arg(long, env = "POLL_INTERVAL_MS", default_value_t = 1000, global = true)]
    pub poll_interval_ms: u64,

    /// Seconds a claimed task stays hidden before it is redelivered
    #[arg(long, env = "LEASE_TIMEOUT_SECS", default_value_t = 300, global = true)]
    pub lease_timeout_secs: u64,
}

/// Retry budget for reaching the store and queue at startup.
#[derive(Args, Debug, Clone, Copy)]
pub struct StartupArgs {
    #[arg(long, env = "STARTUP_RETRIES", default_value_t = 10, global = true)]
    pub startup_retries: u32,

    #[arg(long, env = "STARTUP_RETRY_DELAY_SECS", default_value_t = 5, global = true)]
    pub startup_retry_delay_secs: u64,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply database migrations
    Migrate,

    /// Submit a new generation request
    New {
        /// Number of primes to generate
        #[arg(long, allow_negative_numbers = true)]
        quantity: i64,

        /// Decimal digits per prime (at least 12)
        #[arg(long, allow_negative_numbers = true)]
        digits: i64,
    },

    /// Show progress of a request
    Status {
        /// Request id returned by `new`
        request_id: String,
    },

    /// Show progress and the generated primes of a request
    Result {
        /// Request id returned by `new`
        request_id: String,
    },

    /// Run a worker until SIGINT or SIGTERM
    Worker {
        /// Label used in logs and queue leases
        #[arg(long, env = "WORKER_ID", default_value = "worker-1")]
        worker_id: String,

        /// Maximum unsettled tasks held at once
        #[arg(long, env = "PREFETCH_COUNT", default_value_t = 1)]
        prefetch_count: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    primeforge::init_logging(cli.verbose.then_some(Level::DEBUG));

    let database_url = cli
        .database_url
        .clone()
        .context("Database URL is required. Set --database-url or DATABASE_URL environment variable")?;

    let env = commands::Environment {
        database_url,
        db_pool_size: cli.db_pool_size,
        queue: cli.queue.clone(),
        startup: cli.startup,
    };

    match cli.command {
        Commands::Migrate => commands::migrate::run(&env).await?,
        Commands::New { quantity, digits } => {
            commands::request::new_request(&env, quantity, digits).await?
        }
        Commands::Status { request_id } => commands::request::status(&env, &request_id).await?,
        Commands::Result { request_id } => commands::request::result(&env, &request_id).await?,
        Commands::Worker {
            worker_id,
            prefetch_count,
        } => commands::worker::run(&env, worker_id, prefetch_count).await?,
    }

    Ok(())
}

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

//! Implementation of the `new`, `status` and `result` commands.
//!
//! Each prints a single JSON document on stdout.

use anyhow::{Context, Result};
use primeforge::{JobIntake, StatusAggregator, DAL};
use serde::Serialize;

use super::{open, open_store, Environment};

#[derive(Debug, Serialize)]
struct CreatedRequest {
    request_id: String,
}

pub async fn new_request(env: &Environment, quantity: i64, digits: i64) -> Result<()> {
    let (database, queue) = open(env).await?;
    let intake = JobIntake::new(DAL::new(database), queue.clone());

    let request = intake
        .new_request(quantity, digits)
        .await
        .context("Failed to create request")?;
    queue.shutdown();

    print_json(&CreatedRequest {
        request_id: request.id.to_string(),
    })
}

pub async fn status(env: &Environment, request_id: &str) -> Result<()> {
    let aggregator = aggregator(env).await?;
    let report = aggregator
        .get_status(request_id)
        .await
        .with_context(|| format!("Failed to read status of request {}", request_id))?;
    print_json(&report)
}

pub async fn result(env: &Environment, request_id: &str) -> Result<()> {
    let aggregator = aggregator(env).await?;
    let report = aggregator
        .get_result(request_id)
        .await
        .with_context(|| format!("Failed to read result of request {}", request_id))?;
    print_json(&report)
}

async fn aggregator(env: &Environment) -> Result<StatusAggregator> {
    let database = open_store(&env.database_url, env.db_pool_size, env.startup_policy()).await?;
    Ok(StatusAggregator::new(DAL::new(database)))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to render JSON")?;
    println!("{}", rendered);
    Ok(())
}

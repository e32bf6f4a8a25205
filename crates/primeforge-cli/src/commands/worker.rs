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

//! Implementation of the `worker` command.

use anyhow::{Context, Result};
use primeforge::{Worker, WorkerConfig, DAL};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{open, Environment};

pub async fn run(env: &Environment, worker_id: String, prefetch_count: usize) -> Result<()> {
    let config = WorkerConfig::builder()
        .worker_id(worker_id)
        .prefetch_count(prefetch_count)
        .build()
        .context("Invalid worker configuration")?;

    let (database, queue) = open(env).await?;
    let worker = Worker::with_engine(DAL::new(database), queue.clone(), config);

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    let summary = worker.run(cancel).await;
    queue.shutdown();

    info!(
        worker_id = worker.config().worker_id(),
        processed = summary.total(),
        "Worker exited"
    );
    Ok(())
}

/// Cancels `token` on the first SIGINT or SIGTERM.
async fn cancel_on_signal(token: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received SIGINT, shutting down"),
                    _ = terminate.recv() => info!("Received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                warn!("Could not install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                info!("Received SIGINT, shutting down");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received interrupt, shutting down");
    }
    token.cancel();
}

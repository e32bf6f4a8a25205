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

//! Implementation of the `migrate` command.

use anyhow::Result;
use tracing::info;

use super::{open_store, Environment};

pub async fn run(env: &Environment) -> Result<()> {
    let policy = env.startup_policy();
    open_store(&env.database_url, env.db_pool_size, policy).await?;
    if env.queue_url() != env.database_url {
        open_store(env.queue_url(), env.db_pool_size, policy).await?;
    }
    info!("Migrations applied");
    Ok(())
}

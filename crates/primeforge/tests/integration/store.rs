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

use primeforge::{BackendType, PersistOutcome, RequestStatus};

use crate::fixtures::TestStore;

#[tokio::test]
async fn test_migrations_are_idempotent() {
    let store = TestStore::new().await;
    assert_eq!(store.database.backend(), BackendType::Sqlite);
    store
        .database
        .run_migrations()
        .await
        .expect("Second migration run should be a no-op");
    store.database.ping().await.expect("Ping failed");
}

#[tokio::test]
async fn test_persist_enforces_per_request_uniqueness() {
    let store = TestStore::new().await;
    let request = store.create_request(3, 12).await;

    assert_eq!(
        store.persist(request.id, 1, "100000000003").await,
        PersistOutcome::Inserted
    );
    // Same value for a different index of the same request
    assert_eq!(
        store.persist(request.id, 2, "100000000003").await,
        PersistOutcome::DuplicateValue
    );
    // Index 1 already holds a prime
    assert_eq!(
        store.persist(request.id, 1, "100000000019").await,
        PersistOutcome::AlreadyFulfilled
    );
    assert_eq!(
        store.persist(request.id, 2, "100000000019").await,
        PersistOutcome::Inserted
    );

    let count = store
        .dal
        .prime_record()
        .count_for_request(request.id)
        .await
        .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn test_same_prime_may_serve_different_requests() {
    let store = TestStore::new().await;
    let first = store.create_request(1, 12).await;
    let second = store.create_request(1, 12).await;

    assert!(store.persist(first.id, 1, "100000000003").await.is_inserted());
    assert!(store.persist(second.id, 1, "100000000003").await.is_inserted());
    assert_eq!(store.prime_row_count().await, 2);
}

#[tokio::test]
async fn test_get_with_count_and_mark_completed() {
    let store = TestStore::new().await;
    let request = store.create_request(2, 12).await;
    store.persist(request.id, 1, "100000000003").await;

    let progress = store
        .dal
        .generation_request()
        .get_with_count(request.id)
        .await
        .unwrap()
        .expect("Request should exist");
    assert_eq!(progress.generated_count, 1);
    assert_eq!(progress.request.status, RequestStatus::Pending);

    let requests = store.dal.generation_request();
    assert!(requests.mark_completed(request.id).await.unwrap());
    // Already completed rows are left alone
    assert!(!requests.mark_completed(request.id).await.unwrap());

    let stored = requests.get(request.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RequestStatus::Completed);
    assert!(stored.updated_at >= stored.created_at);
}

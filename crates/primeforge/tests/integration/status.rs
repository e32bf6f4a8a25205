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

use primeforge::{RequestError, RequestStatus, StatusAggregator, UniversalUuid};

use crate::fixtures::TestStore;

const PRIMES: [&str; 5] = [
    "100000000003",
    "100000000019",
    "100000000057",
    "100000000063",
    "100000000069",
];

#[tokio::test]
async fn test_partial_progress_is_pending() {
    let store = TestStore::new().await;
    let request = store.create_request(5, 12).await;
    store.persist(request.id, 1, PRIMES[0]).await;
    store.persist(request.id, 2, PRIMES[1]).await;

    let aggregator = StatusAggregator::new(store.dal.clone());
    let report = aggregator
        .get_status(&request.id.to_string())
        .await
        .expect("Failed to get status");

    assert_eq!(report.request_id, request.id);
    assert_eq!(report.quantity, 5);
    assert_eq!(report.digits, 12);
    assert_eq!(report.generated_count, 2);
    assert_eq!(report.status, RequestStatus::Pending);
    assert_eq!(report.progress_percentage, 40.0);
}

#[tokio::test]
async fn test_full_progress_completes_and_promotes_stored_status() {
    let store = TestStore::new().await;
    let request = store.create_request(5, 12).await;
    for (i, prime) in PRIMES.iter().enumerate() {
        store.persist(request.id, i as i32 + 1, prime).await;
    }

    let aggregator = StatusAggregator::new(store.dal.clone());
    let report = aggregator
        .get_status(&request.id.to_string())
        .await
        .unwrap();
    assert_eq!(report.generated_count, 5);
    assert_eq!(report.status, RequestStatus::Completed);
    assert_eq!(report.progress_percentage, 100.0);

    let stored = store
        .dal
        .generation_request()
        .get(request.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, RequestStatus::Completed);

    // Asking again is stable
    let again = aggregator
        .get_status(&request.id.to_string())
        .await
        .unwrap();
    assert_eq!(again, report);
}

#[tokio::test]
async fn test_result_lists_primes_in_persistence_order() {
    let store = TestStore::new().await;
    let request = store.create_request(3, 12).await;
    store.persist(request.id, 3, PRIMES[2]).await;
    store.persist(request.id, 1, PRIMES[0]).await;

    let aggregator = StatusAggregator::new(store.dal.clone());
    let result = aggregator
        .get_result(&request.id.to_string())
        .await
        .unwrap();

    assert_eq!(result.prime_numbers, vec![PRIMES[2], PRIMES[0]]);
    assert_eq!(result.status.generated_count, 2);
    assert_eq!(result.status.status, RequestStatus::Pending);
    assert_eq!(result.status.progress_percentage, 66.67);
}

#[tokio::test]
async fn test_primes_of_other_requests_are_not_counted() {
    let store = TestStore::new().await;
    let first = store.create_request(2, 12).await;
    let second = store.create_request(2, 12).await;
    store.persist(first.id, 1, PRIMES[0]).await;
    store.persist(first.id, 2, PRIMES[1]).await;
    store.persist(second.id, 1, PRIMES[0]).await;

    let aggregator = StatusAggregator::new(store.dal.clone());
    let report = aggregator
        .get_status(&second.id.to_string())
        .await
        .unwrap();
    assert_eq!(report.generated_count, 1);
    assert_eq!(report.status, RequestStatus::Pending);
}

#[tokio::test]
async fn test_unknown_request_is_not_found() {
    let store = TestStore::new().await;
    let aggregator = StatusAggregator::new(store.dal.clone());
    let missing = UniversalUuid::new_v4().to_string();

    assert!(matches!(
        aggregator.get_status(&missing).await,
        Err(RequestError::NotFound(id)) if id == missing
    ));
    assert!(matches!(
        aggregator.get_result(&missing).await,
        Err(RequestError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_malformed_request_id_is_rejected() {
    let store = TestStore::new().await;
    let aggregator = StatusAggregator::new(store.dal.clone());

    assert!(matches!(
        aggregator.get_status("not-a-uuid").await,
        Err(RequestError::InvalidRequestId(_))
    ));
    assert!(matches!(
        aggregator.get_result("42").await,
        Err(RequestError::InvalidRequestId(_))
    ));
}

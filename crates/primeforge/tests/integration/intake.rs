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

use primeforge::{
    GenerationTask, JobIntake, RequestError, RequestStatus, TaskQueue, PUBLISH_BATCH_SIZE,
};

use crate::fixtures::{memory_queue, TestStore};

#[tokio::test]
async fn test_new_request_fans_out_one_task_per_prime() {
    let store = TestStore::new().await;
    let queue = memory_queue();
    let intake = JobIntake::new(store.dal.clone(), queue.clone());

    let request = intake
        .new_request(4, 12)
        .await
        .expect("Failed to create request");

    assert_eq!(request.quantity, 4);
    assert_eq!(request.digits, 12);
    assert_eq!(request.status, RequestStatus::Pending);
    assert_eq!(queue.ready_count(), 4);

    let deliveries = queue.receive("test", 10).await.unwrap();
    let tasks: Vec<GenerationTask> = deliveries
        .iter()
        .map(|d| GenerationTask::decode(&d.payload).unwrap())
        .collect();
    let indices: Vec<i32> = tasks.iter().map(|t| t.index).collect();
    assert_eq!(indices, vec![1, 2, 3, 4]);
    for task in &tasks {
        assert_eq!(task.request_id, request.id);
        assert_eq!(task.digits, 12);
        assert_eq!(task.total, 4);
    }

    let stored = store
        .dal
        .generation_request()
        .get(request.id)
        .await
        .unwrap()
        .expect("Request should be stored");
    assert_eq!(stored.id, request.id);
}

#[tokio::test]
async fn test_invalid_requests_write_nothing() {
    let store = TestStore::new().await;
    let queue = memory_queue();
    let intake = JobIntake::new(store.dal.clone(), queue.clone());

    assert!(matches!(
        intake.new_request(0, 12).await,
        Err(RequestError::InvalidQuantity(0))
    ));
    assert!(matches!(
        intake.new_request(-2, 12).await,
        Err(RequestError::InvalidQuantity(-2))
    ));
    assert!(matches!(
        intake.new_request(3, 11).await,
        Err(RequestError::InvalidDigitCount { actual: 11, .. })
    ));

    assert_eq!(store.request_row_count().await, 0);
    assert!(queue.is_empty());
}

#[tokio::test]
async fn test_publish_failure_is_reported() {
    let store = TestStore::new().await;
    let queue = memory_queue();
    queue.shutdown();
    let intake = JobIntake::new(store.dal.clone(), queue.clone());

    let result = intake.new_request(2, 12).await;
    assert!(matches!(result, Err(RequestError::Queue(_))));
    // The request row was written before publishing was attempted
    assert_eq!(store.request_row_count().await, 1);
}

#[tokio::test]
async fn test_new_request_through_database_queue() {
    let store = TestStore::new().await;
    let queue = store.database_queue().await;
    let intake = JobIntake::new(store.dal.clone(), queue.clone());

    intake.new_request(3, 15).await.unwrap();
    assert_eq!(queue.pending_count().await.unwrap(), 3);
}

#[tokio::test]
async fn test_large_request_is_published_in_batches() {
    let store = TestStore::new().await;
    let queue = store.database_queue().await;
    let intake = JobIntake::new(store.dal.clone(), queue.clone());

    // More rows than fit in one PostgreSQL statement's bind parameters
    let quantity = 20_000;
    assert!(quantity as usize > 65_535 / 5);
    assert!(quantity as usize > PUBLISH_BATCH_SIZE);

    let request = intake.new_request(quantity, 12).await.unwrap();
    assert_eq!(queue.pending_count().await.unwrap(), quantity);

    let first = queue.receive("test", 1).await.unwrap();
    let task = GenerationTask::decode(&first[0].payload).unwrap();
    assert_eq!(task.request_id, request.id);
    assert_eq!(task.index, 1);
    assert_eq!(i64::from(task.total), quantity);
}

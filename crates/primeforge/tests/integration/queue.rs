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

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use primeforge::dal::task_queue::ClaimParams;
use primeforge::{
    DatabaseQueue, Delivery, GenerationTask, QueueConfig, QueueError, TaskQueue, UniversalUuid,
};
use tokio::sync::Barrier;

use crate::fixtures::{queue_config, TestStore};

fn tasks(total: i32) -> Vec<GenerationTask> {
    GenerationTask::fan_out(UniversalUuid::new_v4(), 12, total)
}

#[tokio::test]
async fn test_receive_leases_oldest_first() {
    let store = TestStore::new().await;
    let queue = store.database_queue().await;
    assert_eq!(queue.publish(&tasks(3)).await.unwrap(), 3);

    let batch = queue.receive("worker-1", 2).await.unwrap();
    assert_eq!(batch.len(), 2);
    assert!(batch[0].id < batch[1].id);
    assert_eq!(GenerationTask::decode(&batch[0].payload).unwrap().index, 1);
    assert_eq!(GenerationTask::decode(&batch[1].payload).unwrap().index, 2);
    assert!(batch.iter().all(|d| d.delivery_count == 1 && !d.is_redelivery()));

    // Leased messages are hidden but still pending
    let rest = queue.receive("worker-2", 10).await.unwrap();
    assert_eq!(rest.len(), 1);
    assert!(queue.receive("worker-2", 10).await.unwrap().is_empty());
    assert_eq!(queue.pending_count().await.unwrap(), 3);
}

#[tokio::test]
async fn test_ack_and_discard_remove_messages() {
    let store = TestStore::new().await;
    let queue = store.database_queue().await;
    queue.publish(&tasks(2)).await.unwrap();

    let batch = queue.receive("worker-1", 2).await.unwrap();
    queue.ack(&batch[0]).await.expect("Ack failed");
    queue.reject(&batch[1], false).await.expect("Reject failed");

    assert_eq!(queue.pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_reject_with_requeue_redelivers() {
    let store = TestStore::new().await;
    let queue = store.database_queue().await;
    queue.publish(&tasks(1)).await.unwrap();

    let first = queue.receive("worker-1", 1).await.unwrap().remove(0);
    queue.reject(&first, true).await.expect("Reject failed");

    let second = queue.receive("worker-2", 1).await.unwrap().remove(0);
    assert_eq!(second.id, first.id);
    assert_eq!(second.payload, first.payload);
    assert_eq!(second.delivery_count, 2);
    assert!(second.is_redelivery());
    assert_ne!(second.lease_token, first.lease_token);
}

#[tokio::test]
async fn test_settling_twice_reports_expired_lease() {
    let store = TestStore::new().await;
    let queue = store.database_queue().await;
    queue.publish(&tasks(1)).await.unwrap();

    let delivery = queue.receive("worker-1", 1).await.unwrap().remove(0);
    queue.ack(&delivery).await.unwrap();

    assert!(matches!(
        queue.ack(&delivery).await,
        Err(QueueError::LeaseExpired { .. })
    ));
    assert!(matches!(
        queue.reject(&delivery, true).await,
        Err(QueueError::LeaseExpired { .. })
    ));
}

#[tokio::test]
async fn test_expired_lease_is_redelivered_to_another_consumer() {
    let store = TestStore::new().await;
    let queue = store.database_queue().await;
    queue.publish(&tasks(1)).await.unwrap();

    let short_lease = |consumer: &str| ClaimParams {
        queue_name: queue_config().queue_name().to_string(),
        max_messages: 1,
        consumer: consumer.to_string(),
        lease_timeout: Duration::from_millis(50),
    };

    let first: Delivery = store
        .dal
        .task_queue()
        .claim(short_lease("worker-1"))
        .await
        .unwrap()
        .remove(0)
        .into();
    assert!(store
        .dal
        .task_queue()
        .claim(short_lease("worker-2"))
        .await
        .unwrap()
        .is_empty());

    tokio::time::sleep(Duration::from_millis(120)).await;

    let second: Delivery = store
        .dal
        .task_queue()
        .claim(short_lease("worker-2"))
        .await
        .unwrap()
        .remove(0)
        .into();
    assert_eq!(second.id, first.id);
    assert_eq!(second.delivery_count, 2);

    // The first holder lost its lease
    assert!(matches!(
        queue.ack(&first).await,
        Err(QueueError::LeaseExpired { .. })
    ));
    queue.ack(&second).await.expect("Current holder should ack");
    assert_eq!(queue.pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_concurrent_consumers_never_share_a_message() {
    let store = TestStore::new().await;
    let queue = store.database_queue().await;
    queue.publish(&tasks(20)).await.unwrap();

    let consumers = 4;
    let barrier = Arc::new(Barrier::new(consumers));
    let mut handles = Vec::new();
    for n in 0..consumers {
        let queue = queue.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            let consumer = format!("worker-{}", n);
            barrier.wait().await;
            let mut seen = Vec::new();
            loop {
                let batch = queue.receive(&consumer, 2).await.unwrap();
                if batch.is_empty() {
                    break;
                }
                for delivery in batch {
                    queue.ack(&delivery).await.unwrap();
                    seen.push(delivery.id);
                }
            }
            seen
        }));
    }

    let mut all = Vec::new();
    for handle in handles {
        all.extend(handle.await.unwrap());
    }
    let unique: HashSet<i64> = all.iter().copied().collect();
    assert_eq!(all.len(), 20);
    assert_eq!(unique.len(), 20);
    assert_eq!(queue.pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_queues_are_isolated_by_name() {
    let store = TestStore::new().await;
    let primary = store.database_queue().await;
    primary.publish(&tasks(2)).await.unwrap();

    let other = store
        .dal
        .task_queue()
        .claim(ClaimParams {
            queue_name: "other_queue".to_string(),
            max_messages: 10,
            consumer: "worker-1".to_string(),
            lease_timeout: Duration::from_secs(30),
        })
        .await
        .unwrap();
    assert!(other.is_empty());
    assert_eq!(primary.pending_count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_publish_wakes_waiting_consumer() {
    let store = TestStore::new().await;
    let queue = store.database_queue().await;

    let waiter = queue.clone();
    let handle = tokio::spawn(async move {
        waiter.wait_for_messages().await;
        waiter.receive("worker-1", 1).await.unwrap()
    });

    tokio::time::sleep(Duration::from_millis(10)).await;
    queue.publish(&tasks(1)).await.unwrap();

    let received = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("Consumer was never woken")
        .unwrap();
    // A poll tick may have raced the publish; the message is still claimable
    if received.is_empty() {
        assert_eq!(queue.receive("worker-1", 1).await.unwrap().len(), 1);
    } else {
        assert_eq!(received.len(), 1);
    }
}

#[tokio::test]
async fn test_message_published_before_the_wait_is_not_missed() {
    let store = TestStore::new().await;
    let config = QueueConfig::builder()
        .poll_interval(Duration::from_secs(60))
        .lease_timeout(Duration::from_secs(30))
        .build()
        .unwrap();
    let queue = DatabaseQueue::new(store.database.clone(), config)
        .await
        .unwrap();

    // Nothing to claim, then a publish lands before the consumer waits
    assert!(queue.receive("worker-1", 1).await.unwrap().is_empty());
    queue.publish(&tasks(1)).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), queue.wait_for_messages())
        .await
        .expect("Consumer slept through a published message");
    assert_eq!(queue.receive("worker-1", 1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_leased_messages_are_not_visible() {
    let store = TestStore::new().await;
    let queue = store.database_queue().await;
    queue.publish(&tasks(1)).await.unwrap();
    let leased = queue.receive("worker-1", 1).await.unwrap();
    assert_eq!(leased.len(), 1);

    assert!(!store
        .dal
        .task_queue()
        .has_visible(queue.config().queue_name())
        .await
        .unwrap());
}

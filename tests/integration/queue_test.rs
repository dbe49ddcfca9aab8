//! Integration tests for the Postgres work queue.

use std::collections::HashSet;
use std::sync::Arc;

use taskhub_core::traits::queue::{QueueError, WorkQueue};

use crate::helpers::TestDb;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_next_never_duplicates() {
    let Some(db) = TestDb::connect().await else {
        return;
    };
    db.seed("dup", "base", 40).await;

    let queue = Arc::new(db.queue.clone());
    let mut handles = Vec::new();
    for _ in 0..8 {
        let queue = Arc::clone(&queue);
        handles.push(tokio::spawn(async move {
            let mut ids = Vec::new();
            loop {
                match queue.next().await {
                    Ok(item) => ids.push(item.id),
                    Err(QueueError::Empty) => break,
                    Err(e) => panic!("unexpected queue error: {e}"),
                }
            }
            ids
        }));
    }

    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.await.unwrap() {
            assert!(seen.insert(id.clone()), "{id} was claimed twice");
        }
    }
    assert_eq!(seen.len(), 40);
    assert_eq!(queue.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_push_on_row_held_elsewhere_is_rejected() {
    let Some(db) = TestDb::connect().await else {
        return;
    };
    db.seed("held", "base", 1).await;

    let mut item = db.queue.next().await.unwrap();
    assert_eq!(db.row_state(&item.id).await, Some((0, true)));

    let mut other = db.pool.begin().await.unwrap();
    sqlx::query("SELECT id FROM work_queue WHERE id = $1 FOR UPDATE")
        .bind(&item.id)
        .execute(&mut *other)
        .await
        .unwrap();

    item.attempts = 5;
    item.last_error = Some("boom".to_string());
    let err = db.queue.push(&item).await.unwrap_err();
    assert!(matches!(err, QueueError::NotClaimable(ref id) if *id == item.id));
    assert!(matches!(
        db.queue.pop(&item.id).await,
        Err(QueueError::NotClaimable(_))
    ));
    assert_eq!(db.row_state(&item.id).await, Some((0, true)));

    other.rollback().await.unwrap();
    db.queue.push(&item).await.unwrap();
    assert_eq!(db.row_state(&item.id).await, Some((5, false)));
}

#[tokio::test]
async fn test_push_moves_item_to_tail() {
    let Some(db) = TestDb::connect().await else {
        return;
    };
    db.seed("tail", "base", 2).await;

    let mut first = db.queue.next().await.unwrap();
    assert_eq!(first.id, "tail-0");
    first.attempts += 1;
    db.queue.push(&first).await.unwrap();

    assert_eq!(db.queue.next().await.unwrap().id, "tail-1");
    let again = db.queue.next().await.unwrap();
    assert_eq!(again.id, "tail-0");
    assert_eq!(again.attempts, 1);
    assert!(db.queue.next().await.unwrap_err().is_empty());
}

#[tokio::test]
async fn test_pop_and_count() {
    let Some(db) = TestDb::connect().await else {
        return;
    };
    db.seed("pop", "base", 3).await;
    assert_eq!(db.queue.count().await.unwrap(), 3);

    let item = db.queue.next().await.unwrap();
    assert_eq!(db.queue.count().await.unwrap(), 2);

    db.queue.pop(&item.id).await.unwrap();
    assert_eq!(db.row_state(&item.id).await, None);
    assert!(matches!(
        db.queue.pop(&item.id).await,
        Err(QueueError::NotClaimable(_))
    ));
}

//! In-memory work queue.
//!
//! Mirrors the row-lock behaviour of the Postgres queue: a row can be
//! *held* (as if another transaction had it `FOR UPDATE`), in which case
//! `next` skips it and `push`/`pop` fail with [`QueueError::NotClaimable`].
//! Every operation runs under one mutex, so each is all-or-nothing.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use taskhub_core::error::AppError;
use taskhub_core::result::AppResult;
use taskhub_core::traits::producer::WorkProducer;
use taskhub_core::traits::queue::{QueueError, WorkQueue};
use taskhub_core::types::{NewWorkItem, WorkItem};

#[derive(Debug, Default)]
struct State {
    rows: HashMap<String, Row>,
    held: HashSet<String>,
    seq: u64,
}

#[derive(Debug)]
struct Row {
    item: WorkItem,
    /// Tie-breaker for items touched within the same clock tick.
    seq: u64,
}

impl State {
    fn touch(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }
}

/// Work queue kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryWorkQueue {
    state: Mutex<State>,
    failing_operations: AtomicU32,
}

impl MemoryWorkQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `item` as-is, replacing any row with the same id.
    pub async fn insert(&self, item: WorkItem) {
        let mut state = self.state.lock().await;
        let seq = state.touch();
        state.rows.insert(item.id.clone(), Row { item, seq });
    }

    /// Snapshot of the row `id`.
    pub async fn get(&self, id: &str) -> Option<WorkItem> {
        self.state.lock().await.rows.get(id).map(|r| r.item.clone())
    }

    /// Total number of rows, locked or not.
    pub async fn len(&self) -> usize {
        self.state.lock().await.rows.len()
    }

    /// Whether the queue holds no rows at all.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Hold row `id` as if another transaction claimed it.
    pub async fn hold(&self, id: &str) {
        self.state.lock().await.held.insert(id.to_string());
    }

    /// Release a row previously held with [`MemoryWorkQueue::hold`].
    pub async fn release(&self, id: &str) {
        self.state.lock().await.held.remove(id);
    }

    /// Make the next `n` queue operations fail with a store error.
    pub fn fail_next_operations(&self, n: u32) {
        self.failing_operations.store(n, Ordering::SeqCst);
    }

    fn check_store(&self) -> Result<(), QueueError> {
        let failing = self
            .failing_operations
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(QueueError::Store(AppError::database("store unavailable")));
        }
        Ok(())
    }

    fn claim<'a>(state: &'a mut State, id: &str) -> Result<&'a mut Row, QueueError> {
        if state.held.contains(id) {
            return Err(QueueError::NotClaimable(id.to_string()));
        }
        state
            .rows
            .get_mut(id)
            .ok_or_else(|| QueueError::NotClaimable(id.to_string()))
    }
}

#[async_trait]
impl WorkQueue for MemoryWorkQueue {
    async fn next(&self) -> Result<WorkItem, QueueError> {
        self.check_store()?;
        let mut state = self.state.lock().await;
        let State { rows, held, .. } = &mut *state;

        let row = rows
            .values_mut()
            .filter(|r| !r.item.locked && !held.contains(&r.item.id))
            .min_by_key(|r| (r.item.updated_at, r.seq))
            .ok_or(QueueError::Empty)?;

        row.item.locked = true;
        Ok(row.item.clone())
    }

    async fn push(&self, item: &WorkItem) -> Result<(), QueueError> {
        self.check_store()?;
        let mut state = self.state.lock().await;
        let seq = state.touch();
        let row = Self::claim(&mut state, &item.id)?;

        row.item.locked = false;
        row.item.attempts = item.attempts;
        row.item.last_error = item.last_error.clone();
        row.item.updated_at = Utc::now();
        row.seq = seq;
        Ok(())
    }

    async fn pop(&self, id: &str) -> Result<(), QueueError> {
        self.check_store()?;
        let mut state = self.state.lock().await;
        Self::claim(&mut state, id)?;
        state.rows.remove(id);
        Ok(())
    }

    async fn count(&self) -> Result<usize, QueueError> {
        self.check_store()?;
        let state = self.state.lock().await;
        Ok(state.rows.values().filter(|r| !r.item.locked).count())
    }
}

#[async_trait]
impl WorkProducer for MemoryWorkQueue {
    async fn enqueue(&self, item: NewWorkItem) -> AppResult<String> {
        if item.job_type.trim().is_empty() {
            return Err(AppError::validation("Job type must not be empty"));
        }
        let id = item.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let mut state = self.state.lock().await;
        if state.rows.contains_key(&id) {
            return Err(AppError::conflict(format!("Work item '{id}' already exists")));
        }
        let seq = state.touch();
        let row = Row {
            item: WorkItem::new(id.clone(), item.job_type, item.payload),
            seq,
        };
        state.rows.insert(id.clone(), row);
        Ok(id)
    }
}

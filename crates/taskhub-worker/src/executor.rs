//! Task executor: claims one work item, runs its job and applies the
//! retry policy.
//!
//! Every claimed item ends in exactly one store mutation: `pop` on success
//! or once the retry budget is exhausted, `push` otherwise. Jobs run in
//! their own tokio task so a panic is contained and turned into a failure.
//! That failure is reported on the item's single outcome line, together
//! with the stack captured where the job panicked.

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace, warn};

use taskhub_core::traits::job::{JobContext, JobError};
use taskhub_core::traits::producer::WorkProducer;
use taskhub_core::traits::queue::{QueueError, WorkQueue};
use taskhub_core::types::WorkItem;

use crate::hooks::Hooks;
use crate::recover::{JobPanic, catch_job_panic, install_panic_hook};
use crate::registry::JobRegistry;

/// Failed attempts tolerated before an item is deleted instead of requeued.
pub const RETRY_LIMIT: i32 = 3;

/// Why an execution attempt failed.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// No job is registered for the item's type.
    #[error("unsupported job type '{0}'")]
    UnsupportedType(String),

    /// The job returned an error.
    #[error("job failed: {0}")]
    Failed(#[from] JobError),

    /// The job panicked.
    #[error("job panicked: {}", .0.message)]
    Panicked(JobPanic),

    /// The job task was aborted before completing.
    #[error("job aborted: {0}")]
    Aborted(String),
}

impl ExecutionError {
    /// Stack captured at the panic site, for panicked jobs.
    pub fn backtrace(&self) -> Option<&str> {
        match self {
            Self::Panicked(panic) => Some(panic.backtrace.as_str()),
            _ => None,
        }
    }
}

/// Runs queued work items one at a time.
#[derive(Debug)]
pub struct TaskExecutor {
    queue: Arc<dyn WorkQueue>,
    registry: Arc<JobRegistry>,
    hooks: Hooks,
    producer: Option<Arc<dyn WorkProducer>>,
}

impl TaskExecutor {
    /// Create an executor over `queue` resolving jobs through `registry`.
    pub fn new(queue: Arc<dyn WorkQueue>, registry: Arc<JobRegistry>, hooks: Hooks) -> Self {
        install_panic_hook();
        Self {
            queue,
            registry,
            hooks,
            producer: None,
        }
    }

    /// Hand `producer` to every job so it can enqueue follow-up work.
    pub fn with_producer(mut self, producer: Arc<dyn WorkProducer>) -> Self {
        self.producer = Some(producer);
        self
    }

    /// Process at most one work item and return the remaining queue depth.
    ///
    /// Returns 0 when nothing was claimed or the depth cannot be read.
    pub async fn perform(&self, cancel: &CancellationToken) -> usize {
        let mut item = match self.queue.next().await {
            Ok(item) => item,
            Err(QueueError::Empty) => {
                trace!("Queue is empty");
                return 0;
            }
            Err(e) => {
                error!(error = %e, "Failed to dequeue work item");
                return 0;
            }
        };

        item.attempts += 1;
        let started = Instant::now();
        let outcome = self.execute(&item, cancel).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(()) => match self.queue.pop(&item.id).await {
                Ok(()) => info!(
                    item_id = %item.id,
                    job_type = %item.job_type,
                    attempts = item.attempts,
                    elapsed_ms,
                    "Work item completed"
                ),
                Err(e) => error!(
                    item_id = %item.id,
                    error = %e,
                    "Failed to delete completed work item"
                ),
            },
            Err(err) => {
                item.last_error = Some(err.to_string());
                self.settle_failure(&item, &err, elapsed_ms).await;
            }
        }

        match self.queue.count().await {
            Ok(depth) => depth,
            Err(e) => {
                error!(error = %e, "Failed to count queued work items");
                0
            }
        }
    }

    /// Requeue or delete a failed item depending on its attempt count.
    async fn settle_failure(&self, item: &WorkItem, err: &ExecutionError, elapsed_ms: u64) {
        if item.attempts > RETRY_LIMIT {
            match self.queue.pop(&item.id).await {
                Ok(()) => warn!(
                    item_id = %item.id,
                    job_type = %item.job_type,
                    attempts = item.attempts,
                    elapsed_ms,
                    error = %err,
                    backtrace = err.backtrace(),
                    "Work item deleted by retry limit"
                ),
                Err(e) => error!(
                    item_id = %item.id,
                    error = %e,
                    job_error = %err,
                    backtrace = err.backtrace(),
                    "Failed to delete exhausted work item"
                ),
            }
            return;
        }

        match self.queue.push(item).await {
            Ok(()) => warn!(
                item_id = %item.id,
                job_type = %item.job_type,
                attempts = item.attempts,
                elapsed_ms,
                error = %err,
                backtrace = err.backtrace(),
                "Work item failed, requeued"
            ),
            Err(e) => error!(
                item_id = %item.id,
                error = %e,
                job_error = %err,
                backtrace = err.backtrace(),
                "Failed to requeue work item"
            ),
        }
    }

    /// Resolve and run the job for `item` with panic isolation.
    async fn execute(&self, item: &WorkItem, cancel: &CancellationToken) -> Result<(), ExecutionError> {
        let job = self
            .registry
            .find(item)
            .ok_or_else(|| ExecutionError::UnsupportedType(item.job_type.clone()))?;

        (self.hooks.on_job_perform)(item);

        // Cancelled once the attempt is over, whatever the outcome.
        let token = cancel.child_token();
        let _guard = token.clone().drop_guard();
        let ctx = JobContext::new(item, token).with_producer(self.producer.clone());

        let handle = tokio::spawn(async move { catch_job_panic(job.perform(ctx)).await });
        match handle.await {
            Ok(Ok(result)) => result.map_err(ExecutionError::from),
            Ok(Err(panic)) => {
                (self.hooks.on_recover)(&panic.message);
                Err(ExecutionError::Panicked(panic))
            }
            Err(e) => Err(ExecutionError::Aborted(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tracing::Level;
    use tracing_subscriber::fmt::MakeWriter;
    use taskhub_core::traits::job::Job;
    use taskhub_core::traits::producer::WorkProducer;
    use taskhub_core::types::NewWorkItem;

    use super::*;
    use crate::jobs::BaseJob;
    use crate::queue::MemoryWorkQueue;

    struct FailingJob;

    #[async_trait]
    impl Job for FailingJob {
        async fn perform(&self, _ctx: JobContext) -> Result<(), JobError> {
            Err(JobError::failed("always fails"))
        }
    }

    struct PanickingJob;

    #[inline(never)]
    fn explode_inside_job() {
        panic!("job exploded");
    }

    #[async_trait]
    impl Job for PanickingJob {
        async fn perform(&self, _ctx: JobContext) -> Result<(), JobError> {
            explode_inside_job();
            Ok(())
        }
    }

    /// Fails after another transaction has taken the row.
    struct ContendedJob {
        queue: Arc<MemoryWorkQueue>,
        succeed: bool,
    }

    #[async_trait]
    impl Job for ContendedJob {
        async fn perform(&self, ctx: JobContext) -> Result<(), JobError> {
            self.queue.hold(ctx.item_id()).await;
            if self.succeed {
                Ok(())
            } else {
                Err(JobError::failed("lost the row"))
            }
        }
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn lines(&self) -> Vec<String> {
            String::from_utf8_lossy(&self.0.lock().unwrap())
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn registry() -> Arc<JobRegistry> {
        let mut registry = JobRegistry::new();
        registry.register("base", |_| Box::new(BaseJob));
        registry.register("fail", |_| Box::new(FailingJob));
        registry.register("panic", |_| Box::new(PanickingJob));
        Arc::new(registry)
    }

    async fn setup(job_type: &str, hooks: Hooks) -> (Arc<MemoryWorkQueue>, TaskExecutor) {
        let queue = Arc::new(MemoryWorkQueue::new());
        queue
            .enqueue(NewWorkItem::new(job_type, Vec::new()).with_id("item"))
            .await
            .unwrap();
        let executor = TaskExecutor::new(queue.clone(), registry(), hooks);
        (queue, executor)
    }

    #[tokio::test]
    async fn test_success_deletes_item() {
        let (queue, executor) = setup("base", Hooks::default()).await;
        queue
            .enqueue(NewWorkItem::new("base", Vec::new()).with_id("other"))
            .await
            .unwrap();

        let depth = executor.perform(&CancellationToken::new()).await;
        assert_eq!(depth, 1);
        assert!(queue.get("item").await.is_none());
    }

    #[tokio::test]
    async fn test_empty_queue_returns_zero() {
        let queue = Arc::new(MemoryWorkQueue::new());
        let executor = TaskExecutor::new(queue, registry(), Hooks::default());
        assert_eq!(executor.perform(&CancellationToken::new()).await, 0);
    }

    #[tokio::test]
    async fn test_store_failure_returns_zero_without_mutation() {
        let (queue, executor) = setup("base", Hooks::default()).await;
        queue.fail_next_operations(1);

        assert_eq!(executor.perform(&CancellationToken::new()).await, 0);
        let item = queue.get("item").await.unwrap();
        assert!(!item.locked);
        assert_eq!(item.attempts, 0);
    }

    #[tokio::test]
    async fn test_failures_requeue_until_retry_limit() {
        let (queue, executor) = setup("fail", Hooks::default()).await;
        let cancel = CancellationToken::new();

        for attempt in 1..=RETRY_LIMIT {
            assert_eq!(executor.perform(&cancel).await, 1);
            let item = queue.get("item").await.unwrap();
            assert_eq!(item.attempts, attempt);
            assert!(!item.locked);
            assert!(item.last_error.as_deref().unwrap().contains("always fails"));
        }

        assert_eq!(executor.perform(&cancel).await, 0);
        assert!(queue.get("item").await.is_none());
    }

    #[tokio::test]
    async fn test_unsupported_type_counts_as_failure() {
        let (queue, executor) = setup("unknown", Hooks::default()).await;
        executor.perform(&CancellationToken::new()).await;

        let item = queue.get("item").await.unwrap();
        assert_eq!(item.attempts, 1);
        assert!(item.last_error.as_deref().unwrap().contains("unsupported job type"));
    }

    #[tokio::test]
    async fn test_panic_is_recovered_as_failure() {
        let recovered = Arc::new(AtomicUsize::new(0));
        let counter = recovered.clone();
        let hooks = Hooks {
            on_recover: Arc::new(move |msg: &str| {
                assert!(msg.contains("job exploded"));
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            ..Hooks::default()
        };
        let (queue, executor) = setup("panic", hooks).await;

        executor.perform(&CancellationToken::new()).await;

        assert_eq!(recovered.load(Ordering::SeqCst), 1);
        let item = queue.get("item").await.unwrap();
        assert_eq!(item.attempts, 1);
        assert!(item.last_error.as_deref().unwrap().contains("panicked"));

        // The executor keeps working after a panic.
        queue
            .enqueue(NewWorkItem::new("base", Vec::new()).with_id("next"))
            .await
            .unwrap();
        executor.perform(&CancellationToken::new()).await;
        executor.perform(&CancellationToken::new()).await;
        assert!(queue.get("next").await.is_none());
    }

    #[tokio::test]
    async fn test_panic_is_one_outcome_line_with_panic_site_trace() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_max_level(Level::WARN)
            .with_ansi(false)
            .finish();
        let _default = tracing::subscriber::set_default(subscriber);

        let (queue, executor) = setup("panic", Hooks::default()).await;
        executor.perform(&CancellationToken::new()).await;

        let lines = logs.lines();
        assert_eq!(lines.len(), 1, "expected one outcome line, got {lines:#?}");
        assert!(lines[0].contains("Work item failed, requeued"));
        assert!(lines[0].contains("job exploded"));
        assert!(
            lines[0].contains("explode_inside_job"),
            "trace does not name the panicking function: {}",
            lines[0]
        );
        assert_eq!(queue.get("item").await.unwrap().attempts, 1);
    }

    async fn contended(succeed: bool, attempts: i32) -> Arc<MemoryWorkQueue> {
        let queue = Arc::new(MemoryWorkQueue::new());
        let mut item = WorkItem::new("item", "contended", Vec::new());
        item.attempts = attempts;
        queue.insert(item).await;

        let mut registry = JobRegistry::new();
        let job_queue = queue.clone();
        registry.register("contended", move |_| {
            Box::new(ContendedJob {
                queue: job_queue.clone(),
                succeed,
            })
        });
        let executor = TaskExecutor::new(queue.clone(), Arc::new(registry), Hooks::default());
        executor.perform(&CancellationToken::new()).await;
        queue
    }

    #[tokio::test]
    async fn test_unclaimable_requeue_leaves_row_unchanged() {
        let queue = contended(false, 0).await;

        let row = queue.get("item").await.expect("failed push must not delete the row");
        assert_eq!(row.attempts, 0);
        assert!(row.last_error.is_none());
        assert!(row.locked);
    }

    #[tokio::test]
    async fn test_unclaimable_delete_keeps_exhausted_row() {
        let queue = contended(false, RETRY_LIMIT).await;

        let row = queue.get("item").await.expect("row held elsewhere must survive");
        assert_eq!(row.attempts, RETRY_LIMIT);
        assert!(row.last_error.is_none());
    }

    #[tokio::test]
    async fn test_unclaimable_completion_keeps_row() {
        let queue = contended(true, 0).await;
        assert!(queue.get("item").await.is_some());
    }
}

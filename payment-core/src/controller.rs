//! Single-writer task controller
//!
//! Every ledger mutation runs as a task on one worker, under one lock:
//! - Callers only enqueue; they never touch the store directly
//! - A bounded queue gives hard backpressure
//! - A failed task is logged and the next task still runs
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │            Callers (any thread / tokio task)         │
//! │        add() / try_add() / submit() closures         │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ mpsc::channel (bounded, FIFO)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │                Worker (one per run)                  │
//! │  ┌────────────────────────────────────────────────┐  │
//! │  │ pop task → lock → run → unlock → log outcome   │  │
//! │  │ queue empty after work → signal done, stop     │  │
//! │  │ queue empty before work → sleep, re-poll       │  │
//! │  └────────────────────────────────────────────────┘  │
//! │                       │                              │
//! │                       ▼                              │
//! │        Exclusive resource (e.g. SharedLedger)        │
//! └──────────────────────────────────────────────────────┘
//! ```

use crate::{config::ControllerConfig, metrics::Metrics, Error, Result};
use parking_lot::Mutex;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::sync::{mpsc, oneshot, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Lock/unlock contract the controller needs from the shared resource.
///
/// The lock is held exactly for the duration of `f`.
pub trait Exclusive: Clone + Send + Sync + 'static {
    /// Guarded value handed to tasks
    type Target: Send + 'static;

    /// Run `f` while holding the exclusive lock
    fn with_exclusive<T>(&self, f: impl FnOnce(&mut Self::Target) -> T) -> T;
}

impl<S: Send + 'static> Exclusive for Arc<Mutex<S>> {
    type Target = S;

    fn with_exclusive<T>(&self, f: impl FnOnce(&mut S) -> T) -> T {
        let mut guard = self.lock();
        f(&mut guard)
    }
}

/// Unit of work run under the lock
pub type Operation<S> = Box<dyn FnOnce(&mut S) -> Result<()> + Send + 'static>;

struct Task<S> {
    id: Uuid,
    operation: Operation<S>,
    reply: Option<oneshot::Sender<Result<()>>>,
}

/// Outcome counts of one run cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Tasks executed
    pub processed: usize,
    /// Tasks that returned `Ok`
    pub succeeded: usize,
    /// Tasks that failed or panicked
    pub failed: usize,
}

/// Bounded FIFO of tasks drained by a single worker
pub struct TaskController<R: Exclusive> {
    resource: R,
    sender: mpsc::Sender<Task<R::Target>>,
    mailbox: Arc<tokio::sync::Mutex<mpsc::Receiver<Task<R::Target>>>>,
    depth: Arc<AtomicUsize>,
    capacity: usize,
    poll_interval: Duration,
    metrics: Metrics,
}

impl<R: Exclusive> TaskController<R> {
    /// Create a controller over `resource`
    pub fn new(resource: R, config: &ControllerConfig) -> Self {
        let capacity = config.queue_capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);

        Self {
            resource,
            sender,
            mailbox: Arc::new(tokio::sync::Mutex::new(receiver)),
            depth: Arc::new(AtomicUsize::new(0)),
            capacity,
            poll_interval: config.poll_interval(),
            metrics: Metrics::default(),
        }
    }

    /// Replace the metrics collector
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Enqueue a task, waiting while the queue is full
    pub async fn add<F>(&self, operation: F) -> Result<()>
    where
        F: FnOnce(&mut R::Target) -> Result<()> + Send + 'static,
    {
        self.enqueue(self.task(operation, None)).await
    }

    /// Enqueue a task, failing with [`Error::QueueFull`] instead of waiting
    pub fn try_add<F>(&self, operation: F) -> Result<()>
    where
        F: FnOnce(&mut R::Target) -> Result<()> + Send + 'static,
    {
        let permit = self.sender.try_reserve().map_err(|e| match e {
            TrySendError::Full(()) => Error::QueueFull(self.capacity),
            TrySendError::Closed(()) => Error::Concurrency("Task queue closed".to_string()),
        })?;

        self.count_queued();
        permit.send(self.task(operation, None));
        Ok(())
    }

    /// Enqueue a task and get a receiver for its own result
    pub async fn submit<F>(&self, operation: F) -> Result<oneshot::Receiver<Result<()>>>
    where
        F: FnOnce(&mut R::Target) -> Result<()> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.enqueue(self.task(operation, Some(tx))).await?;
        Ok(rx)
    }

    /// Start one worker that drains the queue.
    ///
    /// `done` receives the [`RunSummary`] once the queue is empty after at
    /// least one task ran. Fails with [`Error::Concurrency`] while a
    /// previous worker is still draining. Must be called inside a tokio
    /// runtime.
    pub fn run(&self, done: oneshot::Sender<RunSummary>) -> Result<JoinHandle<RunSummary>> {
        let mailbox = self
            .mailbox
            .clone()
            .try_lock_owned()
            .map_err(|_| Error::Concurrency("A worker is already running".to_string()))?;

        let worker = Worker {
            resource: self.resource.clone(),
            mailbox,
            depth: self.depth.clone(),
            poll_interval: self.poll_interval,
            metrics: self.metrics.clone(),
        };

        info!(pending = self.pending(), "Starting worker");
        Ok(tokio::spawn(worker.run(done)))
    }

    /// Tasks waiting in the queue
    pub fn pending(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    /// Queue capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Shared resource the tasks run against
    pub fn resource(&self) -> &R {
        &self.resource
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    fn task<F>(&self, operation: F, reply: Option<oneshot::Sender<Result<()>>>) -> Task<R::Target>
    where
        F: FnOnce(&mut R::Target) -> Result<()> + Send + 'static,
    {
        Task {
            id: Uuid::now_v7(),
            operation: Box::new(operation),
            reply,
        }
    }

    async fn enqueue(&self, task: Task<R::Target>) -> Result<()> {
        let id = task.id;
        let permit = self
            .sender
            .reserve()
            .await
            .map_err(|_| Error::Concurrency("Task queue closed".to_string()))?;

        // counted before the send so the worker never sees it uncounted
        self.count_queued();
        permit.send(task);

        debug!(task_id = %id, pending = self.pending(), "Task queued");
        Ok(())
    }

    fn count_queued(&self) {
        let depth = self.depth.fetch_add(1, Ordering::SeqCst) + 1;
        self.metrics.set_queue_depth(depth);
    }
}

impl<R: Exclusive> fmt::Debug for TaskController<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskController")
            .field("capacity", &self.capacity)
            .field("pending", &self.pending())
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

struct Worker<R: Exclusive> {
    resource: R,
    mailbox: OwnedMutexGuard<mpsc::Receiver<Task<R::Target>>>,
    depth: Arc<AtomicUsize>,
    poll_interval: Duration,
    metrics: Metrics,
}

impl<R: Exclusive> Worker<R> {
    async fn run(mut self, done: oneshot::Sender<RunSummary>) -> RunSummary {
        let summary = self.drain().await;

        // release the mailbox before signaling so the next run can start
        drop(self);

        if summary.processed > 0 && done.send(summary).is_err() {
            warn!("Completion receiver dropped before the run finished");
        }

        info!(
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Worker finished"
        );
        summary
    }

    async fn drain(&mut self) -> RunSummary {
        let mut summary = RunSummary::default();

        loop {
            match self.mailbox.try_recv() {
                Ok(task) => self.execute(task, &mut summary),
                Err(TryRecvError::Empty) if summary.processed > 0 => break,
                Err(TryRecvError::Empty) => {
                    debug!("Queue empty, polling again");
                    sleep(self.poll_interval).await;
                }
                Err(TryRecvError::Disconnected) => {
                    warn!("Task queue closed, stopping worker");
                    break;
                }
            }
        }

        summary
    }

    fn execute(&self, task: Task<R::Target>, summary: &mut RunSummary) {
        let Task { id, operation, reply } = task;
        let depth = self.depth.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);

        let started = Instant::now();
        let result = catch_unwind(AssertUnwindSafe(|| {
            self.resource.with_exclusive(|target| operation(target))
        }))
        .unwrap_or_else(|_| Err(Error::Concurrency(format!("Task {id} panicked"))));
        let elapsed = started.elapsed();

        summary.processed += 1;
        match &result {
            Ok(()) => {
                summary.succeeded += 1;
                info!(task_id = %id, elapsed_us = elapsed.as_micros() as u64, "Task is done");
            }
            Err(e) => {
                summary.failed += 1;
                error!(task_id = %id, kind = e.kind(), error = %e, "Task failed, continuing");
            }
        }

        self.metrics.record_task(result.is_ok(), elapsed.as_secs_f64());
        self.metrics.set_queue_depth(depth);

        if let Some(reply) = reply {
            let _ = reply.send(result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(capacity: usize) -> ControllerConfig {
        ControllerConfig {
            queue_capacity: capacity,
            poll_interval_ms: 5,
        }
    }

    fn shared_log() -> Arc<Mutex<Vec<u32>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn push(value: u32) -> impl FnOnce(&mut Vec<u32>) -> Result<()> + Send + 'static {
        move |log| {
            log.push(value);
            Ok(())
        }
    }

    fn counts(summary: RunSummary) -> (usize, usize, usize) {
        (summary.processed, summary.succeeded, summary.failed)
    }

    #[tokio::test]
    async fn test_runs_tasks_in_fifo_order() {
        let controller = TaskController::new(shared_log(), &config(100));

        for i in 0..10 {
            controller.add(push(i)).await.unwrap();
        }
        assert_eq!(controller.pending(), 10);

        let (tx, rx) = oneshot::channel();
        controller.run(tx).unwrap();
        let summary = rx.await.unwrap();

        assert_eq!(counts(summary), (10, 10, 0));
        assert_eq!(*controller.resource().lock(), (0..10).collect::<Vec<_>>());
        assert_eq!(controller.pending(), 0);
    }

    #[tokio::test]
    async fn test_failed_task_does_not_abort_queue() {
        let controller = TaskController::new(shared_log(), &config(100));

        controller.add(push(1)).await.unwrap();
        controller
            .add(|_: &mut Vec<u32>| Err(Error::Validation("boom".to_string())))
            .await
            .unwrap();
        controller.add(push(3)).await.unwrap();

        let (tx, rx) = oneshot::channel();
        controller.run(tx).unwrap();
        let summary = rx.await.unwrap();

        assert_eq!(counts(summary), (3, 2, 1));
        assert_eq!(*controller.resource().lock(), vec![1, 3]);
        assert_eq!(controller.metrics().tasks_failed.get(), 1);
        assert_eq!(controller.metrics().tasks_succeeded.get(), 2);
    }

    #[tokio::test]
    async fn test_signals_done_when_last_task_fails() {
        let controller = TaskController::new(shared_log(), &config(100));
        controller
            .add(|_: &mut Vec<u32>| Err(Error::NotFound("x".to_string())))
            .await
            .unwrap();

        let (tx, rx) = oneshot::channel();
        controller.run(tx).unwrap();

        assert_eq!(rx.await.unwrap().failed, 1);
    }

    #[tokio::test]
    async fn test_panicking_task_is_counted_as_failure() {
        let controller = TaskController::new(shared_log(), &config(100));
        controller
            .add(|_: &mut Vec<u32>| -> Result<()> { panic!("task blew up") })
            .await
            .unwrap();
        controller.add(push(7)).await.unwrap();

        let (tx, rx) = oneshot::channel();
        controller.run(tx).unwrap();
        let summary = rx.await.unwrap();

        assert_eq!(counts(summary), (2, 1, 1));
        assert_eq!(*controller.resource().lock(), vec![7]);
    }

    #[tokio::test]
    async fn test_submit_returns_task_result() {
        let controller = TaskController::new(shared_log(), &config(100));
        let ok = controller.submit(|_: &mut Vec<u32>| Ok(())).await.unwrap();
        let failed = controller
            .submit(|_: &mut Vec<u32>| Err(Error::Validation("amount <= 0".to_string())))
            .await
            .unwrap();

        let (tx, _rx) = oneshot::channel();
        controller.run(tx).unwrap();

        assert_eq!(ok.await.unwrap(), Ok(()));
        assert_eq!(
            failed.await.unwrap(),
            Err(Error::Validation("amount <= 0".to_string()))
        );
    }

    #[tokio::test]
    async fn test_bounded_queue_backpressure() {
        let controller = TaskController::new(shared_log(), &config(2));

        controller.try_add(|_: &mut Vec<u32>| Ok(())).unwrap();
        controller.try_add(|_: &mut Vec<u32>| Ok(())).unwrap();

        assert_eq!(
            controller.try_add(|_: &mut Vec<u32>| Ok(())),
            Err(Error::QueueFull(2))
        );

        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            controller.add(|_: &mut Vec<u32>| Ok(())),
        )
        .await;
        assert!(blocked.is_err(), "add should wait while the queue is full");
        assert_eq!(controller.pending(), 2);
    }

    #[tokio::test]
    async fn test_worker_waits_for_first_task() {
        let controller = TaskController::new(shared_log(), &config(100));

        let (tx, rx) = oneshot::channel();
        let handle = controller.run(tx).unwrap();

        sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());

        controller.add(push(42)).await.unwrap();

        assert_eq!(rx.await.unwrap().processed, 1);
        assert_eq!(handle.await.unwrap().processed, 1);
        assert_eq!(*controller.resource().lock(), vec![42]);
    }

    #[tokio::test]
    async fn test_single_worker_per_cycle() {
        let controller = TaskController::new(shared_log(), &config(100));

        let (tx, rx) = oneshot::channel();
        let handle = controller.run(tx).unwrap();

        let (second_tx, _second_rx) = oneshot::channel();
        assert!(matches!(controller.run(second_tx), Err(Error::Concurrency(_))));

        controller.add(|_: &mut Vec<u32>| Ok(())).await.unwrap();
        rx.await.unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_controller_reusable_after_drain() {
        let controller = TaskController::new(shared_log(), &config(100));

        controller.add(push(1)).await.unwrap();
        let (tx, rx) = oneshot::channel();
        let first = controller.run(tx).unwrap();
        assert_eq!(rx.await.unwrap().processed, 1);
        first.await.unwrap();

        controller.add(push(2)).await.unwrap();
        let (tx, rx) = oneshot::channel();
        controller.run(tx).unwrap();
        assert_eq!(rx.await.unwrap().processed, 1);

        assert_eq!(*controller.resource().lock(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_concurrent_producers_never_interleave() {
        let counter = Arc::new(Mutex::new((0u64, 0u64)));
        let controller = Arc::new(TaskController::new(counter.clone(), &config(100)));

        let mut producers = Vec::new();
        for _ in 0..4 {
            let controller = controller.clone();
            producers.push(tokio::spawn(async move {
                for _ in 0..25 {
                    controller
                        .add(|pair: &mut (u64, u64)| {
                            // both halves move together or not at all
                            pair.0 += 1;
                            std::thread::yield_now();
                            pair.1 += 1;
                            Ok(())
                        })
                        .await
                        .unwrap();
                }
            }));
        }
        for producer in producers {
            producer.await.unwrap();
        }

        let (tx, rx) = oneshot::channel();
        controller.run(tx).unwrap();
        assert_eq!(rx.await.unwrap().processed, 100);
        assert_eq!(*counter.lock(), (100, 100));
    }
}

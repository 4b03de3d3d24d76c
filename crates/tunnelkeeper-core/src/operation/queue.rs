// ── Serial operation queue ──
//
// A queue owns one worker task that pulls jobs from an unbounded channel
// and runs them to completion one at a time. Dependencies must be enqueued
// before their dependents when they share a queue.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::handle::{Dependency, OperationHandle, Outcome};
use super::{Completion, Condition, Operation, OperationContext, OperationOptions};
use crate::error::CoreError;

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

/// FIFO executor running one operation at a time.
///
/// Cheaply cloneable; the worker exits once every clone is dropped and the
/// backlog has drained.
#[derive(Clone)]
pub struct OperationQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    name: &'static str,
    tx: mpsc::UnboundedSender<Job>,
    live: Mutex<HashMap<u64, CancellationToken>>,
    next_id: AtomicU64,
}

impl OperationQueue {
    /// Create a queue and spawn its worker. Must be called from within a
    /// Tokio runtime.
    pub fn new(name: &'static str) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(worker(name, rx));

        Self {
            inner: Arc::new(QueueInner {
                name,
                tx,
                live: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Enqueue `operation` with default options.
    pub fn add<O: Operation>(&self, operation: O) -> OperationHandle<O::Output> {
        self.add_with(operation, OperationOptions::default())
    }

    /// Enqueue `operation`, returning a handle to its completion.
    pub fn add_with<O: Operation>(
        &self,
        operation: O,
        options: OperationOptions,
    ) -> OperationHandle<O::Output> {
        let name = operation.name();
        let token = options
            .parent
            .as_ref()
            .map_or_else(CancellationToken::new, CancellationToken::child_token);
        let (outcome_tx, outcome_rx) = watch::channel(None);
        let (completion_tx, completion_rx) = watch::channel(None);

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.live().insert(id, token.clone());

        let queue = Arc::downgrade(&self.inner);
        let job_token = token.clone();
        let job = async move {
            let completion = execute(
                name,
                operation,
                &options.dependencies,
                &options.conditions,
                job_token,
            )
            .await;
            let outcome = completion.outcome();

            // Typed result first: dependents read it once the outcome lands.
            completion_tx.send_replace(Some(completion));
            outcome_tx.send_replace(Some(outcome));

            if let Some(queue) = queue.upgrade() {
                queue.live().remove(&id);
            }
        };

        if self.inner.tx.send(Box::pin(job)).is_err() {
            warn!(queue = self.inner.name, operation = name, "queue worker is gone");
        }

        OperationHandle::new(name, token, outcome_rx, completion_rx)
    }

    /// Cancel every operation that has not finished yet.
    pub fn cancel_all(&self) {
        for token in self.inner.live().values() {
            token.cancel();
        }
    }

    /// Number of enqueued or running operations.
    pub fn pending(&self) -> usize {
        self.inner.live().len()
    }
}

impl QueueInner {
    fn live(&self) -> std::sync::MutexGuard<'_, HashMap<u64, CancellationToken>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn worker(name: &'static str, mut rx: mpsc::UnboundedReceiver<Job>) {
    while let Some(job) = rx.recv().await {
        if let Err(e) = tokio::spawn(job).await {
            error!(queue = name, error = %e, "operation task panicked");
        }
    }
    debug!(queue = name, "operation queue closed");
}

async fn execute<O: Operation>(
    name: &'static str,
    operation: O,
    dependencies: &[Dependency],
    conditions: &[Condition],
    token: CancellationToken,
) -> Completion<O::Output> {
    let outcomes = tokio::select! {
        biased;
        () = token.cancelled() => {
            debug!(operation = name, "cancelled before start");
            return Completion::Cancelled;
        }
        outcomes = wait_all(dependencies) => outcomes,
    };

    if let Some(condition) = conditions.iter().find(|c| !c.permits(&outcomes)) {
        debug!(operation = name, ?condition, "condition not met, cancelling");
        return Completion::Cancelled;
    }

    debug!(operation = name, "operation started");
    let ctx = OperationContext {
        token: token.clone(),
    };
    let result = tokio::select! {
        biased;
        () = token.cancelled() => Err(CoreError::Cancelled),
        result = operation.run(ctx) => result,
    };

    let completion = Completion::from(result);
    match &completion {
        Completion::Success(_) => debug!(operation = name, "operation finished"),
        Completion::Failure(e) => warn!(operation = name, error = %e, "operation failed"),
        Completion::Cancelled => debug!(operation = name, "operation cancelled"),
    }
    completion
}

async fn wait_all(dependencies: &[Dependency]) -> Vec<Outcome> {
    let mut outcomes = Vec::with_capacity(dependencies.len());
    for dependency in dependencies {
        outcomes.push(dependency.wait().await);
    }
    outcomes
}

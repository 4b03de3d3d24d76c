// ── Operation framework ──
//
// An operation is a bounded unit of async work with a three-way result.
// Queues run operations one at a time in enqueue order; an operation may
// declare dependencies on other operations and conditions on how those
// dependencies finished. Cancellation is token based: cancelling a handle
// drops the running body at its next suspension point and the operation
// completes as `Cancelled`.

mod handle;
mod queue;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub use handle::{Dependency, OperationHandle, Outcome};
pub use queue::OperationQueue;

use crate::error::CoreError;

/// Result of a finished operation.
#[derive(Debug, Clone)]
pub enum Completion<T> {
    Success(T),
    Failure(CoreError),
    Cancelled,
}

impl<T> Completion<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn outcome(&self) -> Outcome {
        match self {
            Self::Success(_) => Outcome::Succeeded,
            Self::Failure(_) => Outcome::Failed,
            Self::Cancelled => Outcome::Cancelled,
        }
    }

    pub fn error(&self) -> Option<&CoreError> {
        match self {
            Self::Failure(e) => Some(e),
            Self::Success(_) | Self::Cancelled => None,
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Success(v) => Some(v),
            Self::Failure(_) | Self::Cancelled => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Completion<U> {
        match self {
            Self::Success(v) => Completion::Success(f(v)),
            Self::Failure(e) => Completion::Failure(e),
            Self::Cancelled => Completion::Cancelled,
        }
    }

    /// Collapse into a `Result`; `Cancelled` becomes `CoreError::Cancelled`.
    pub fn into_result(self) -> Result<T, CoreError> {
        match self {
            Self::Success(v) => Ok(v),
            Self::Failure(e) => Err(e),
            Self::Cancelled => Err(CoreError::Cancelled),
        }
    }
}

impl<T> From<Result<T, CoreError>> for Completion<T> {
    fn from(result: Result<T, CoreError>) -> Self {
        match result {
            Ok(v) => Self::Success(v),
            Err(CoreError::Cancelled) => Self::Cancelled,
            Err(e) => Self::Failure(e),
        }
    }
}

/// A unit of work runnable on an [`OperationQueue`].
#[async_trait]
pub trait Operation: Send + 'static {
    type Output: Clone + Send + Sync + 'static;

    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn run(self, ctx: OperationContext) -> Result<Self::Output, CoreError>;
}

/// Per-run context handed to [`Operation::run`].
#[derive(Debug, Clone)]
pub struct OperationContext {
    token: CancellationToken,
}

impl OperationContext {
    /// The operation's own cancellation token. Pass it as the parent of
    /// any child operation so cancellation propagates.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Gate evaluated once all dependencies have finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// Cancel the operation if any dependency failed, or (unless
    /// `ignore_cancellations`) was cancelled.
    NoFailedDependencies { ignore_cancellations: bool },
}

impl Condition {
    fn permits(self, outcomes: &[Outcome]) -> bool {
        match self {
            Self::NoFailedDependencies {
                ignore_cancellations,
            } => outcomes.iter().all(|outcome| match outcome {
                Outcome::Succeeded => true,
                Outcome::Failed => false,
                Outcome::Cancelled => ignore_cancellations,
            }),
        }
    }
}

/// Scheduling options for [`OperationQueue::add_with`].
#[derive(Debug, Clone, Default)]
pub struct OperationOptions {
    dependencies: Vec<Dependency>,
    conditions: Vec<Condition>,
    parent: Option<CancellationToken>,
}

impl OperationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Do not start until `dependency` has finished.
    pub fn depends_on(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn depends_on_all(mut self, dependencies: impl IntoIterator<Item = Dependency>) -> Self {
        self.dependencies.extend(dependencies);
        self
    }

    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Cancel this operation whenever `parent` is cancelled.
    pub fn child_of(mut self, parent: &CancellationToken) -> Self {
        self.parent = Some(parent.clone());
        self
    }
}

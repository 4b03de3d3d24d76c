use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::Completion;
use crate::error::CoreError;

/// How an operation finished, without its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed,
    Cancelled,
}

/// Type-erased view of an operation, used as a dependency edge.
#[derive(Debug, Clone)]
pub struct Dependency {
    name: &'static str,
    outcome: watch::Receiver<Option<Outcome>>,
}

impl Dependency {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Wait for the operation to finish. An operation that vanished
    /// without finishing counts as cancelled.
    pub async fn wait(&self) -> Outcome {
        let mut rx = self.outcome.clone();
        rx.wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|outcome| *outcome)
            .unwrap_or(Outcome::Cancelled)
    }
}

/// Handle to an enqueued operation.
///
/// Cloneable; every clone observes the same single completion.
#[derive(Debug)]
pub struct OperationHandle<T> {
    name: &'static str,
    token: CancellationToken,
    outcome: watch::Receiver<Option<Outcome>>,
    completion: watch::Receiver<Option<Completion<T>>>,
}

impl<T> Clone for OperationHandle<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            token: self.token.clone(),
            outcome: self.outcome.clone(),
            completion: self.completion.clone(),
        }
    }
}

impl<T: Clone> OperationHandle<T> {
    pub(super) fn new(
        name: &'static str,
        token: CancellationToken,
        outcome: watch::Receiver<Option<Outcome>>,
        completion: watch::Receiver<Option<Completion<T>>>,
    ) -> Self {
        Self {
            name,
            token,
            outcome,
            completion,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Request cancellation. The operation still completes, as `Cancelled`
    /// unless it had already finished.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn dependency(&self) -> Dependency {
        Dependency {
            name: self.name,
            outcome: self.outcome.clone(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.completion.borrow().is_some()
    }

    /// The completion, if the operation has finished.
    pub fn try_completion(&self) -> Option<Completion<T>> {
        self.completion.borrow().clone()
    }

    /// Wait for the operation to finish.
    pub async fn completion(&self) -> Completion<T> {
        let mut rx = self.completion.clone();
        rx.wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|completion| completion.clone())
            .unwrap_or(Completion::Cancelled)
    }

    pub async fn result(&self) -> Result<T, CoreError> {
        self.completion().await.into_result()
    }
}

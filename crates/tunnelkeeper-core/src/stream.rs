// ── Tunnel status stream ──
//
// Subscription type for consuming tunnel status changes from the
// interactor.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::TunnelStatus;

/// A subscription to the tunnel status.
///
/// Provides the snapshot taken at creation and change notification via
/// [`changed`](Self::changed) or by converting into a `Stream`.
pub struct TunnelStatusStream {
    current: TunnelStatus,
    receiver: watch::Receiver<TunnelStatus>,
}

impl TunnelStatusStream {
    pub(crate) fn new(receiver: watch::Receiver<TunnelStatus>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    pub fn current(&self) -> &TunnelStatus {
        &self.current
    }

    pub fn latest(&self) -> TunnelStatus {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change. `None` once the manager is gone.
    pub async fn changed(&mut self) -> Option<TunnelStatus> {
        self.receiver.changed().await.ok()?;
        let status = self.receiver.borrow_and_update().clone();
        self.current = status.clone();
        Some(status)
    }

    /// Yields the current status first, then every change.
    pub fn into_stream(self) -> TunnelStatusWatchStream {
        TunnelStatusWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
pub struct TunnelStatusWatchStream {
    inner: WatchStream<TunnelStatus>,
}

impl Stream for TunnelStatusWatchStream {
    type Item = TunnelStatus;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

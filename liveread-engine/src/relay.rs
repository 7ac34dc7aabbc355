//! Bounded FIFO between a state machine task and its caller

use liveread_core::{LiveReadError, Result};
use tokio::sync::mpsc;

/// Fixed-capacity queue. A full queue suspends the sender, an empty one
/// suspends the receiver, and dropping every sender ends the stream.
pub struct BoundedRelay;

impl BoundedRelay {
    /// Create a relay holding at most `capacity` items.
    pub fn new<T>(capacity: usize) -> Result<(RelaySender<T>, RelayReceiver<T>)> {
        if capacity == 0 {
            return Err(LiveReadError::InvalidConfig(
                "relay capacity must be at least 1".to_string(),
            ));
        }
        let (tx, rx) = mpsc::channel(capacity);
        Ok((RelaySender { inner: tx }, RelayReceiver { inner: rx }))
    }
}

/// Producer side of a [`BoundedRelay`]
#[derive(Debug)]
pub struct RelaySender<T> {
    inner: mpsc::Sender<T>,
}

impl<T> Clone for RelaySender<T> {
    fn clone(&self) -> Self {
        RelaySender { inner: self.inner.clone() }
    }
}

impl<T> RelaySender<T> {
    /// Enqueue `item`, waiting while the relay is full.
    pub async fn send(&self, item: T) -> Result<()> {
        self.inner.send(item).await.map_err(|_| LiveReadError::RelayClosed)
    }

    /// Slots currently free
    pub fn available(&self) -> usize {
        self.inner.capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

/// Consumer side of a [`BoundedRelay`]
#[derive(Debug)]
pub struct RelayReceiver<T> {
    inner: mpsc::Receiver<T>,
}

impl<T> RelayReceiver<T> {
    /// Next item, or `None` once every sender is gone and the queue is drained.
    pub async fn recv(&mut self) -> Option<T> {
        self.inner.recv().await
    }

    pub fn poll_recv(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<T>> {
        self.inner.poll_recv(cx)
    }

    /// Stop accepting new items; already queued ones can still be received.
    pub fn close(&mut self) {
        self.inner.close()
    }
}

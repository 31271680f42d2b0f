use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Producer side of a stream's handoff queue.
///
/// The queue is unbounded unless a capacity was requested, in which case
/// senders wait for room. Ordering is FIFO either way.
pub(crate) enum HandoffSender<T> {
    Unbounded(mpsc::UnboundedSender<T>),
    Bounded(mpsc::Sender<T>),
}

pub(crate) enum HandoffReceiver<T> {
    Unbounded(mpsc::UnboundedReceiver<T>),
    Bounded(mpsc::Receiver<T>),
}

pub(crate) fn handoff_channel<T>(capacity: Option<usize>) -> (HandoffSender<T>, HandoffReceiver<T>) {
    match capacity {
        Some(capacity) => {
            let (tx, rx) = mpsc::channel(capacity.max(1));
            (HandoffSender::Bounded(tx), HandoffReceiver::Bounded(rx))
        }
        None => {
            let (tx, rx) = mpsc::unbounded_channel();
            (HandoffSender::Unbounded(tx), HandoffReceiver::Unbounded(rx))
        }
    }
}

impl<T> Clone for HandoffSender<T> {
    fn clone(&self) -> Self {
        match self {
            HandoffSender::Unbounded(tx) => HandoffSender::Unbounded(tx.clone()),
            HandoffSender::Bounded(tx) => HandoffSender::Bounded(tx.clone()),
        }
    }
}

impl<T> HandoffSender<T> {
    /// Enqueues from a blocking thread. Returns `false` once the receiver is gone.
    ///
    /// Must not be called from an async context when bounded.
    pub(crate) fn send_blocking(&self, item: T) -> bool {
        match self {
            HandoffSender::Unbounded(tx) => tx.send(item).is_ok(),
            HandoffSender::Bounded(tx) => tx.blocking_send(item).is_ok(),
        }
    }

    pub(crate) async fn send(&self, item: T) -> bool {
        match self {
            HandoffSender::Unbounded(tx) => tx.send(item).is_ok(),
            HandoffSender::Bounded(tx) => tx.send(item).await.is_ok(),
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        match self {
            HandoffSender::Unbounded(tx) => tx.is_closed(),
            HandoffSender::Bounded(tx) => tx.is_closed(),
        }
    }
}

impl<T> HandoffReceiver<T> {
    pub(crate) fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<T>> {
        match self {
            HandoffReceiver::Unbounded(rx) => rx.poll_recv(cx),
            HandoffReceiver::Bounded(rx) => rx.poll_recv(cx),
        }
    }

    /// Refuses further sends, including ones already waiting for room.
    /// Items queued before the call can still be received.
    pub(crate) fn close(&mut self) {
        match self {
            HandoffReceiver::Unbounded(rx) => rx.close(),
            HandoffReceiver::Bounded(rx) => rx.close(),
        }
    }
}

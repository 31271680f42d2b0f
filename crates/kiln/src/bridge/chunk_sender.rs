use super::event::StreamEvent;
use super::queue::HandoffSender;
use super::worker::AbortHandle;

/// Handed to a blocking producer; forwards each chunk to the stream's consumer.
///
/// The producer typically wraps [`send`](Self::send) in the per-chunk callback
/// it gives the engine. Its return value is the callback's advisory
/// continue flag.
pub struct ChunkSender<C, R> {
    tx: HandoffSender<StreamEvent<C, R>>,
    abort: AbortHandle,
    sent: usize,
}

impl<C, R> ChunkSender<C, R> {
    pub(crate) fn new(tx: HandoffSender<StreamEvent<C, R>>, abort: AbortHandle) -> Self {
        Self { tx, abort, sent: 0 }
    }

    /// Enqueues one partial result.
    ///
    /// # Returns
    ///
    /// `true` when the producer should keep going, `false` once the consumer
    /// has gone away or cancellation was requested. A `false` is a request,
    /// not an order: a producer that ignores it still runs to completion and
    /// the stream still terminates exactly once.
    pub fn send(&mut self, chunk: C) -> bool {
        let delivered = self.tx.send_blocking(StreamEvent::Partial(chunk));
        if delivered {
            self.sent += 1;
        }
        delivered && !self.abort.is_aborted()
    }

    /// Whether the consumer dropped the stream or asked it to stop.
    pub fn is_cancelled(&self) -> bool {
        self.abort.is_aborted() || self.tx.is_closed()
    }

    /// Chunks delivered so far.
    pub fn sent(&self) -> usize {
        self.sent
    }
}

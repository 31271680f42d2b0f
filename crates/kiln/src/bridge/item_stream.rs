use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use futures::Stream;
use futures::stream::FusedStream;
use tokio::time::Sleep;
use tracing::warn;
use crate::error::KilnError;
use super::event::{StreamEvent, Termination};
use super::queue::HandoffReceiver;
use super::worker::{AbortHandle, ProducerHandle};

/// # BridgeStream
///
/// The consumer side of a bridged blocking call.
///
/// `BridgeStream` yields every chunk the producer sent, in the order it sent
/// them, followed by exactly one [`StreamEvent::End`]. After the end event the
/// stream is exhausted and keeps returning `None`.
///
/// ## Idle timeout
///
/// When the bridge was started with an idle timeout, each wait for the next
/// item is bounded by it. If it elapses the stream requests cancellation of
/// the producer and ends with [`KilnError::StreamIdle`]. The queue is closed
/// at the same time, so later sends fail at once instead of waiting on a
/// full queue while the producer holds the gate. The timer restarts whenever
/// an item arrives.
///
/// ## Dropping
///
/// Dropping the stream before the end event sets the producer's advisory
/// cancellation flag. The producer is not interrupted and its gate guard, if
/// it holds one, is released only when it returns.
pub struct BridgeStream<C, R> {
    receiver: HandoffReceiver<StreamEvent<C, R>>,
    producer: ProducerHandle,
    idle_timeout: Option<Duration>,
    idle: Option<Pin<Box<Sleep>>>,
    finished: bool,
}

impl<C, R> BridgeStream<C, R> {
    pub(crate) fn new(
        receiver: HandoffReceiver<StreamEvent<C, R>>,
        producer: ProducerHandle,
        idle_timeout: Option<Duration>,
    ) -> Self {
        Self {
            receiver,
            producer,
            idle_timeout,
            idle: None,
            finished: false,
        }
    }

    /// A handle that requests early stop from anywhere, e.g. an abort endpoint.
    pub fn abort_handle(&self) -> AbortHandle {
        self.producer.abort_handle()
    }

    /// Requests early stop. Chunks already queued are still delivered.
    pub fn cancel(&self) {
        self.producer.cancel();
    }
}

impl<C, R> Unpin for BridgeStream<C, R> {}

impl<C, R> Stream for BridgeStream<C, R> {
    type Item = StreamEvent<C, R>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        match this.receiver.poll_recv(cx) {
            Poll::Ready(Some(event)) => {
                this.idle = None;
                if event.is_end() {
                    this.finished = true;
                }
                Poll::Ready(Some(event))
            }
            Poll::Ready(None) => {
                // the watcher always enqueues a termination before dropping its sender,
                // so this only happens if the runtime tore it down
                this.finished = true;
                Poll::Ready(Some(StreamEvent::End(Termination::Failed(
                    KilnError::ProducerFailed("stream closed without termination".to_string()),
                ))))
            }
            Poll::Pending => {
                let Some(timeout) = this.idle_timeout else {
                    return Poll::Pending;
                };
                let sleep = this
                    .idle
                    .get_or_insert_with(|| Box::pin(tokio::time::sleep(timeout)));
                match sleep.as_mut().poll(cx) {
                    Poll::Ready(()) => {
                        warn!(timeout_ms = timeout.as_millis() as u64, "stream idle timeout, cancelling producer");
                        this.idle = None;
                        this.finished = true;
                        this.producer.cancel();
                        // nobody reads past the termination; unblock a producer waiting for room
                        this.receiver.close();
                        Poll::Ready(Some(StreamEvent::End(Termination::Failed(
                            KilnError::StreamIdle(timeout),
                        ))))
                    }
                    Poll::Pending => Poll::Pending,
                }
            }
        }
    }
}

impl<C, R> FusedStream for BridgeStream<C, R> {
    fn is_terminated(&self) -> bool {
        self.finished
    }
}

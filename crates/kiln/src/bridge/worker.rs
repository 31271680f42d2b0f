//! Spawning and supervising the blocking producer behind a stream.

use std::any::Any;
use std::sync::{Arc, atomic::{AtomicBool, Ordering}};
use tokio::task::{JoinError, JoinHandle};
use tracing::debug;
use crate::error::{KilnError, Result};
use super::chunk_sender::ChunkSender;
use super::event::{StreamEvent, Termination};
use super::queue::HandoffSender;

/// Advisory cancellation flag shared between a stream and its producer.
///
/// Setting it never interrupts the producer. The producer observes it through
/// [`ChunkSender::send`] returning `false` or [`ChunkSender::is_cancelled`].
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    aborted: Arc<AtomicBool>,
}

impl AbortHandle {
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

/// A handle for the producer and completion watcher of one stream.
///
/// The producer runs on tokio's blocking pool. The completion watcher is a
/// lightweight task that awaits the producer and enqueues the stream's single
/// [`Termination`] once the producer has returned, failed or panicked.
///
/// Dropping the handle requests cancellation and detaches both tasks; the
/// producer keeps running until it returns on its own.
pub(crate) struct ProducerHandle {
    abort: AbortHandle,

    /// Handle to the completion watcher, becomes `None` after shutdown
    watcher: Option<JoinHandle<()>>,
}

impl ProducerHandle {
    /// Spawns `producer` on the blocking pool and a watcher that reports its outcome.
    ///
    /// # Parameters
    ///
    /// * `tx` - The stream's handoff queue. The producer's chunks and the
    ///   final termination travel through it in that order.
    /// * `producer` - The blocking call. It receives a [`ChunkSender`] to
    ///   forward partial results and returns the stream's summary.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub(crate) fn spawn<C, R, F>(tx: HandoffSender<StreamEvent<C, R>>, producer: F) -> Self
    where
        C: Send + 'static,
        R: Send + 'static,
        F: FnOnce(ChunkSender<C, R>) -> Result<R> + Send + 'static,
    {
        let abort = AbortHandle::default();
        let sender = ChunkSender::new(tx.clone(), abort.clone());
        let producer_task = tokio::task::spawn_blocking(move || producer(sender));

        let watcher = tokio::spawn(async move {
            let termination = match producer_task.await {
                Ok(result) => Termination::from(result),
                Err(err) => Termination::Failed(KilnError::ProducerFailed(describe_join_error(err))),
            };
            if !tx.send(StreamEvent::End(termination)).await {
                debug!("stream consumer gone before termination");
            }
        });

        Self {
            abort,
            watcher: Some(watcher),
        }
    }

    pub(crate) fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub(crate) fn cancel(&self) {
        self.abort.abort();
    }

    /// Whether the watcher has delivered (or given up delivering) the termination.
    #[cfg(test)]
    pub(crate) fn is_finished(&self) -> bool {
        self.watcher.as_ref().is_none_or(|watcher| watcher.is_finished())
    }

    /// Requests cancellation and detaches the watcher without aborting it,
    /// so an in-flight producer still gets reported and its resources released.
    pub(crate) fn shutdown(&mut self) {
        self.abort.abort();
        self.watcher.take();
    }
}

impl Drop for ProducerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn describe_join_error(err: JoinError) -> String {
    if err.is_panic() {
        match panic_message(err.into_panic()) {
            Some(message) => format!("producer panicked: {message}"),
            None => "producer panicked".to_string(),
        }
    } else {
        "producer task was cancelled".to_string()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> Option<String> {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return Some(message.to_string());
    }
    payload.downcast_ref::<String>().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::poll_fn;
    use std::time::Duration;
    use tokio::time;
    use crate::bridge::queue::handoff_channel;

    #[tokio::test]
    async fn test_watcher_reports_completion_after_chunks() {
        let (tx, mut rx) = handoff_channel::<StreamEvent<u8, &'static str>>(None);
        let handle = ProducerHandle::spawn(tx, |mut sender| {
            sender.send(1);
            sender.send(2);
            Ok("done")
        });

        let mut events = vec![];
        while let Some(event) = poll_fn(|cx| rx.poll_recv(cx)).await {
            events.push(event);
        }

        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], StreamEvent::Partial(1)));
        assert!(matches!(events[1], StreamEvent::Partial(2)));
        assert!(matches!(events[2], StreamEvent::End(Termination::Completed("done"))));
        time::sleep(Duration::from_millis(10)).await;
        assert!(handle.is_finished());
    }

    #[tokio::test]
    async fn test_panic_is_reported_as_failure() {
        let (tx, mut rx) = handoff_channel::<StreamEvent<u8, ()>>(None);
        let _handle = ProducerHandle::spawn(tx, |_sender| -> Result<()> {
            panic!("engine exploded");
        });

        let event = poll_fn(|cx| rx.poll_recv(cx)).await.expect("termination is delivered");
        match event {
            StreamEvent::End(Termination::Failed(KilnError::ProducerFailed(message))) => {
                assert!(message.contains("engine exploded"), "message was {message}");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_shutdown_sets_abort_flag() {
        let (tx, _rx) = handoff_channel::<StreamEvent<u8, ()>>(None);
        let mut handle = ProducerHandle::spawn(tx, |_sender| Ok(()));
        let abort = handle.abort_handle();
        assert!(!abort.is_aborted());

        handle.shutdown();

        assert!(abort.is_aborted());
        assert!(handle.watcher.is_none());
    }

    #[tokio::test]
    async fn test_drop_triggers_shutdown() {
        let (tx, _rx) = handoff_channel::<StreamEvent<u8, ()>>(None);
        let abort = {
            let handle = ProducerHandle::spawn(tx, |_sender| Ok(()));
            handle.abort_handle()
        };
        assert!(abort.is_aborted());
    }
}

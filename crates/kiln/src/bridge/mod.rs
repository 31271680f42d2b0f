//! # Streaming Bridge
//!
//! Turns a blocking, callback-driven engine call into an asynchronous stream.
//!
//! ## Overview
//!
//! Engines expose inference as one blocking function that invokes a per-chunk
//! callback zero or more times and then returns a summary or fails. Consumers
//! live on the async executor and must never run that call themselves.
//! [`start_stream`] wires the two together:
//!
//! 1. The producer closure runs on tokio's blocking pool. It gets a
//!    [`ChunkSender`] and forwards each chunk through it.
//! 2. A completion watcher task awaits the producer and enqueues exactly one
//!    [`Termination`]: the producer's summary, its error, or a
//!    [`KilnError::ProducerFailed`] if it panicked.
//! 3. The returned [`BridgeStream`] yields the chunks in FIFO order, then the
//!    termination, then ends.
//!
//! The handoff queue is the only state shared between producer and consumer.
//!
//! # Example
//!
//! ```rust
//! # use std::io;
//! use futures::StreamExt;
//! use kiln::bridge::{start_stream, BridgeOptions, StreamEvent, Termination};
//!
//! # #[tokio::main]
//! # async fn main() -> io::Result<()> {
//! let mut stream = start_stream(&BridgeOptions::default(), |mut sender| {
//!     for word in ["He", "llo"] {
//!         if !sender.send(word.to_string()) {
//!             break;
//!         }
//!     }
//!     Ok(2usize)
//! });
//!
//! while let Some(event) = stream.next().await {
//!     match event {
//!         StreamEvent::Partial(text) => print!("{text}"),
//!         StreamEvent::End(Termination::Completed(n)) => println!(" ({n} chunks)"),
//!         StreamEvent::End(Termination::Failed(e)) => eprintln!("failed: {e}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Cancellation
//!
//! Cancellation is cooperative only. Dropping the stream, calling
//! [`BridgeStream::cancel`], or an idle timeout sets a flag the producer sees
//! as `false` from [`ChunkSender::send`]. An engine that ignores it runs to
//! completion in the background.

mod chunk_sender;
mod event;
mod item_stream;
mod queue;
mod worker;

use std::time::Duration;
use crate::error::{KilnError, Result};

pub use chunk_sender::ChunkSender;
pub use event::{StreamEvent, Termination};
pub use item_stream::BridgeStream;
pub use worker::AbortHandle;

use queue::handoff_channel;
use worker::ProducerHandle;

/// Tuning for a single bridged stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeOptions {
    /// Maximum wait for the next item before the stream gives up.
    pub idle_timeout: Option<Duration>,
    /// Bound on queued chunks; the producer blocks while the queue is full.
    pub queue_capacity: Option<usize>,
}

/// Runs `producer` on the blocking pool and returns a stream of its output.
///
/// # Parameters
///
/// * `options` - Idle timeout and queue bound for this stream.
/// * `producer` - The blocking call. It forwards partial results through the
///   [`ChunkSender`] it is given and returns the stream's summary.
///
/// # Returns
///
/// A [`BridgeStream`] yielding every chunk followed by exactly one termination.
///
/// # Panics
///
/// Panics when called outside a tokio runtime.
pub fn start_stream<C, R, F>(options: &BridgeOptions, producer: F) -> BridgeStream<C, R>
where
    C: Send + 'static,
    R: Send + 'static,
    F: FnOnce(ChunkSender<C, R>) -> Result<R> + Send + 'static,
{
    let (tx, rx) = handoff_channel(options.queue_capacity);
    let handle = ProducerHandle::spawn(tx, producer);
    BridgeStream::new(rx, handle, options.idle_timeout)
}

/// Runs a blocking call off the executor and awaits its result.
///
/// The single-shot counterpart of [`start_stream`]. A panic inside `f`
/// surfaces as [`KilnError::ProducerFailed`].
pub async fn run_blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(err) if err.is_panic() => Err(KilnError::ProducerFailed("blocking call panicked".to_string())),
        Err(_) => Err(KilnError::ProducerFailed("blocking call was cancelled".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use futures::StreamExt;
    use futures::stream::FusedStream;
    use tokio::test;
    use tokio::time;
    use crate::error::EngineError;
    use crate::gate::InferenceGate;

    async fn drain<C, R>(stream: BridgeStream<C, R>) -> (Vec<C>, Vec<Termination<R>>) {
        let events: Vec<_> = stream.collect().await;
        let mut chunks = vec![];
        let mut ends = vec![];
        for event in events {
            match event {
                StreamEvent::Partial(chunk) => {
                    assert!(ends.is_empty(), "chunk delivered after termination");
                    chunks.push(chunk);
                }
                StreamEvent::End(termination) => ends.push(termination),
            }
        }
        (chunks, ends)
    }

    async fn wait_for(flag: &AtomicBool) {
        for _ in 0..200 {
            if flag.load(Ordering::SeqCst) {
                return;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
        panic!("flag never set");
    }

    #[test]
    async fn test_chunks_arrive_in_order_then_one_termination() {
        let stream = start_stream(&BridgeOptions::default(), |mut sender| {
            for i in 0..100 {
                sender.send(i);
            }
            Ok("summary")
        });

        let (chunks, ends) = drain(stream).await;
        assert_eq!(chunks, (0..100).collect::<Vec<_>>());
        assert_eq!(ends.len(), 1, "exactly one termination");
        assert!(matches!(ends[0], Termination::Completed("summary")));
    }

    #[test]
    async fn test_no_chunks_still_terminates() {
        let stream = start_stream::<String, _, _>(&BridgeOptions::default(), |_sender| Ok(0));
        let (chunks, ends) = drain(stream).await;
        assert!(chunks.is_empty());
        assert_eq!(ends.len(), 1);
    }

    #[test]
    async fn test_engine_failure_becomes_failed_termination() {
        let stream = start_stream(&BridgeOptions::default(), |mut sender| -> Result<()> {
            sender.send("He");
            Err(EngineError::new("context overflow").into())
        });

        let (chunks, ends) = drain(stream).await;
        assert_eq!(chunks, vec!["He"]);
        assert_eq!(ends.len(), 1);
        match &ends[0] {
            Termination::Failed(KilnError::Engine(e)) => assert_eq!(e.0, "context overflow"),
            other => panic!("unexpected termination {other:?}"),
        }
    }

    #[test]
    async fn test_panicking_producer_terminates_once() {
        let stream = start_stream(&BridgeOptions::default(), |mut sender| -> Result<()> {
            sender.send(1);
            panic!("boom");
        });

        let (chunks, ends) = drain(stream).await;
        assert_eq!(chunks, vec![1]);
        assert_eq!(ends.len(), 1);
        assert!(matches!(ends[0], Termination::Failed(KilnError::ProducerFailed(_))));
    }

    #[test]
    async fn test_stream_is_fused_after_end() {
        let mut stream = start_stream::<u8, _, _>(&BridgeOptions::default(), |_sender| Ok(()));
        assert!(!stream.is_terminated());
        assert!(stream.next().await.expect("termination").is_end());
        assert!(stream.is_terminated());
        assert!(stream.next().await.is_none());
        assert!(stream.next().await.is_none());
    }

    #[test]
    async fn test_dropped_consumer_signals_producer_without_interrupting_it() {
        let saw_stop = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));

        let mut stream = {
            let saw_stop = saw_stop.clone();
            let finished = finished.clone();
            start_stream(&BridgeOptions::default(), move |mut sender| {
                for i in 0..1000 {
                    if !sender.send(i) {
                        saw_stop.store(true, Ordering::SeqCst);
                        break;
                    }
                    std::thread::sleep(Duration::from_millis(1));
                }
                finished.store(true, Ordering::SeqCst);
                Ok(())
            })
        };

        assert!(matches!(stream.next().await, Some(StreamEvent::Partial(0))));
        drop(stream);

        wait_for(&finished).await;
        assert!(saw_stop.load(Ordering::SeqCst), "producer should have been asked to stop");
    }

    #[test]
    async fn test_producer_ignoring_stop_runs_to_completion() {
        let produced = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicBool::new(false));

        let mut stream = {
            let produced = produced.clone();
            let finished = finished.clone();
            start_stream(&BridgeOptions::default(), move |mut sender| {
                for i in 0..20 {
                    let _ = sender.send(i);
                    produced.fetch_add(1, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(1));
                }
                finished.store(true, Ordering::SeqCst);
                Ok(())
            })
        };

        stream.next().await;
        drop(stream);

        wait_for(&finished).await;
        assert_eq!(produced.load(Ordering::SeqCst), 20);
    }

    #[test]
    async fn test_abort_handle_requests_early_stop() {
        let mut stream = start_stream(&BridgeOptions::default(), |mut sender| {
            let mut sent = 0;
            while !sender.is_cancelled() && sent < 10_000 {
                sender.send(sent);
                sent += 1;
                std::thread::sleep(Duration::from_millis(1));
            }
            Ok(sent)
        });

        let abort = stream.abort_handle();
        assert!(matches!(stream.next().await, Some(StreamEvent::Partial(0))));
        abort.abort();

        let mut end = None;
        while let Some(event) = stream.next().await {
            if let StreamEvent::End(termination) = event {
                end = Some(termination);
            }
        }
        match end {
            Some(Termination::Completed(sent)) => assert!(sent < 10_000),
            other => panic!("unexpected termination {other:?}"),
        }
    }

    #[test]
    async fn test_idle_timeout_ends_stream_and_cancels() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let options = BridgeOptions {
            idle_timeout: Some(Duration::from_millis(20)),
            queue_capacity: None,
        };
        let stream = {
            let cancelled = cancelled.clone();
            start_stream(&options, move |mut sender| {
                sender.send("first");
                std::thread::sleep(Duration::from_millis(300));
                cancelled.store(sender.is_cancelled(), Ordering::SeqCst);
                Ok(())
            })
        };

        let (chunks, ends) = drain(stream).await;
        assert_eq!(chunks, vec!["first"]);
        assert_eq!(ends.len(), 1);
        assert!(matches!(ends[0], Termination::Failed(KilnError::StreamIdle(_))));

        time::sleep(Duration::from_millis(400)).await;
        assert!(cancelled.load(Ordering::SeqCst));
    }

    #[test]
    async fn test_idle_timeout_releases_producer_blocked_on_full_queue() {
        let gate = Arc::new(InferenceGate::new("1"));
        let guard = gate.acquire().await;
        let finished = Arc::new(AtomicBool::new(false));
        let delivered = Arc::new(AtomicUsize::new(0));
        let options = BridgeOptions {
            idle_timeout: Some(Duration::from_millis(20)),
            queue_capacity: Some(1),
        };

        let mut stream = {
            let finished = finished.clone();
            let delivered = delivered.clone();
            start_stream(&options, move |mut sender| {
                std::thread::sleep(Duration::from_millis(60));
                for i in 0..5 {
                    if !sender.send(i) {
                        break;
                    }
                    delivered.fetch_add(1, Ordering::SeqCst);
                }
                drop(guard);
                finished.store(true, Ordering::SeqCst);
                Ok(())
            })
        };

        let first = stream.next().await.expect("termination");
        assert!(matches!(first, StreamEvent::End(Termination::Failed(KilnError::StreamIdle(_)))));

        // the stream stays alive; the producer must still get out of its sends
        wait_for(&finished).await;
        assert!(!gate.is_locked());
        assert_eq!(delivered.load(Ordering::SeqCst), 0);
        assert!(stream.next().await.is_none());
    }

    #[test]
    async fn test_idle_timer_resets_on_each_item() {
        let options = BridgeOptions {
            idle_timeout: Some(Duration::from_millis(150)),
            queue_capacity: None,
        };
        let stream = start_stream(&options, |mut sender| {
            for i in 0..5 {
                std::thread::sleep(Duration::from_millis(40));
                sender.send(i);
            }
            Ok(())
        });

        let (chunks, ends) = drain(stream).await;
        assert_eq!(chunks, vec![0, 1, 2, 3, 4]);
        assert!(ends[0].is_success());
    }

    #[test]
    async fn test_bounded_queue_preserves_order_and_termination() {
        let options = BridgeOptions {
            idle_timeout: None,
            queue_capacity: Some(2),
        };
        let stream = start_stream(&options, |mut sender| {
            for i in 0..50 {
                sender.send(i);
            }
            Ok(sender.sent())
        });

        let (chunks, ends) = drain(stream).await;
        assert_eq!(chunks, (0..50).collect::<Vec<_>>());
        assert_eq!(ends.len(), 1);
        assert!(matches!(ends[0], Termination::Completed(50)));
    }

    #[test]
    async fn test_run_blocking() {
        assert_eq!(run_blocking(|| Ok(41 + 1)).await.unwrap(), 42);

        let err = run_blocking(|| -> Result<()> { panic!("nope") }).await.unwrap_err();
        assert!(matches!(err, KilnError::ProducerFailed(_)));
    }
}

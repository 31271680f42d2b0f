//! # Inference Gate
//!
//! Per-model-instance mutual exclusion.
//!
//! A loaded model instance carries mutable runtime state, so at most one
//! inference may run against it at a time. Every request path, streaming or
//! single-shot, takes an [`InferenceGate`] guard before it touches the engine
//! and holds it until the engine call has returned.
//!
//! ## Waiting
//!
//! Two waiting disciplines are offered:
//!
//! - [`InferenceGate::acquire`] queues on the gate. The calling task is
//!   suspended, never the executor thread.
//! - [`InferenceGate::try_wait_then_acquire`] only *observes* the gate at a
//!   fixed interval until it looks free, then acquires normally. Callers that
//!   must not sit in the gate's wait queue (e.g. a serverless handler that
//!   wants to keep reporting progress) use this one.
//!
//! ## Inference ids
//!
//! Each successful acquisition increments the gate's counter before the
//! guard is handed out. The guard carries the resulting [`InferenceId`],
//! rendered as `{instance_id}-{counter}`, so the id exists even when the
//! protected work later fails.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// How a request waits for the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GateWait {
    /// Queue on the gate until it is released.
    #[default]
    Queue,
    /// Observe the gate at this interval, then acquire.
    Poll(Duration),
}

/// Human-readable, per-instance unique id of one inference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InferenceId {
    instance: Arc<str>,
    sequence: u64,
}

impl InferenceId {
    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl fmt::Display for InferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.instance, self.sequence)
    }
}

pub struct InferenceGate {
    instance_id: Arc<str>,
    lock: Arc<Mutex<()>>,
    /// Mirrors whether a guard is outstanding. Read by pollers so that
    /// observing the gate never touches the mutex.
    held: Arc<AtomicBool>,
    counter: AtomicU64,
}

impl InferenceGate {
    pub fn new(instance_id: impl Into<String>) -> Self {
        let instance_id: String = instance_id.into();
        Self {
            instance_id: Arc::from(instance_id),
            lock: Arc::new(Mutex::new(())),
            held: Arc::new(AtomicBool::new(false)),
            counter: AtomicU64::new(0),
        }
    }

    /// A gate whose instance id is a fresh v4 uuid.
    pub fn with_random_id() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Number of acquisitions so far.
    pub fn inference_count(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }

    /// Whether a guard is currently outstanding. Never acquires.
    pub fn is_locked(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }

    /// Waits in the gate's queue until the gate is free, then takes it.
    ///
    /// # Returns
    ///
    /// A [`GateGuard`] that releases the gate when dropped. The guard is
    /// `Send + 'static` and may be moved into the thread running the engine.
    pub async fn acquire(&self) -> GateGuard {
        let permit = self.lock.clone().lock_owned().await;
        self.issue(permit)
    }

    /// Blocking counterpart of [`acquire`](Self::acquire) for synchronous callers.
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context.
    pub fn acquire_blocking(&self) -> GateGuard {
        let permit = self.lock.clone().blocking_lock_owned();
        self.issue(permit)
    }

    /// Takes the gate only if it is free right now.
    pub fn try_acquire(&self) -> Option<GateGuard> {
        self.lock
            .clone()
            .try_lock_owned()
            .ok()
            .map(|permit| self.issue(permit))
    }

    /// Observes the gate every `poll_interval` until it looks free, then
    /// acquires it with [`acquire`](Self::acquire).
    ///
    /// The polling loop never takes the lock. Another caller may win the
    /// race between the observation and the acquisition, in which case this
    /// call queues behind it like a plain `acquire`.
    pub async fn try_wait_then_acquire(&self, poll_interval: Duration) -> GateGuard {
        let mut waited = 0u32;
        while self.is_locked() {
            if waited == 0 {
                debug!(instance = %self.instance_id, "gate busy, polling");
            }
            waited += 1;
            tokio::time::sleep(poll_interval).await;
        }
        if waited > 0 {
            debug!(instance = %self.instance_id, polls = waited, "gate observed free");
        }
        self.acquire().await
    }

    pub async fn acquire_with(&self, wait: GateWait) -> GateGuard {
        match wait {
            GateWait::Queue => self.acquire().await,
            GateWait::Poll(interval) => self.try_wait_then_acquire(interval).await,
        }
    }

    fn issue(&self, permit: OwnedMutexGuard<()>) -> GateGuard {
        self.held.store(true, Ordering::SeqCst);
        let sequence = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let id = InferenceId {
            instance: self.instance_id.clone(),
            sequence,
        };
        debug!(inference_id = %id, "gate acquired");
        GateGuard {
            id,
            held: self.held.clone(),
            acquired_at: Instant::now(),
            _permit: permit,
        }
    }
}

impl fmt::Debug for InferenceGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceGate")
            .field("instance_id", &self.instance_id)
            .field("locked", &self.is_locked())
            .field("inference_count", &self.inference_count())
            .finish()
    }
}

/// Proof of exclusive access to a model instance.
///
/// Dropping the guard releases the gate, on every exit path.
#[must_use = "the gate is released as soon as the guard is dropped"]
pub struct GateGuard {
    id: InferenceId,
    held: Arc<AtomicBool>,
    acquired_at: Instant,
    _permit: OwnedMutexGuard<()>,
}

impl GateGuard {
    pub fn inference_id(&self) -> &InferenceId {
        &self.id
    }

    /// Time since the gate was acquired, including any session setup before the engine ran.
    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }
}

impl fmt::Debug for GateGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GateGuard").field("id", &self.id).finish()
    }
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        // cleared before the permit field is dropped
        self.held.store(false, Ordering::SeqCst);
        debug!(inference_id = %self.id, held_ms = self.held_for().as_millis() as u64, "gate released");
    }
}

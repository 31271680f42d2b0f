use crate::error::{KilnError, Result};

/// One item of a bridged stream.
///
/// A stream yields zero or more `Partial` items followed by exactly one `End`.
#[derive(Debug)]
pub enum StreamEvent<C, R> {
    Partial(C),
    End(Termination<R>),
}

/// How a stream ended.
#[derive(Debug)]
pub enum Termination<R> {
    /// The producer returned normally with this summary.
    Completed(R),
    /// The producer failed, panicked, or the consumer gave up waiting.
    Failed(KilnError),
}

impl<C, R> StreamEvent<C, R> {
    pub fn is_end(&self) -> bool {
        matches!(self, StreamEvent::End(_))
    }

    pub fn partial(self) -> Option<C> {
        match self {
            StreamEvent::Partial(chunk) => Some(chunk),
            StreamEvent::End(_) => None,
        }
    }
}

impl<R> Termination<R> {
    pub fn is_success(&self) -> bool {
        matches!(self, Termination::Completed(_))
    }

    pub fn into_result(self) -> Result<R> {
        match self {
            Termination::Completed(summary) => Ok(summary),
            Termination::Failed(err) => Err(err),
        }
    }
}

impl<R> From<Result<R>> for Termination<R> {
    fn from(result: Result<R>) -> Self {
        match result {
            Ok(summary) => Termination::Completed(summary),
            Err(err) => Termination::Failed(err),
        }
    }
}

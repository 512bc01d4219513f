//! Error types for the task pool.

use std::any::Any;
use std::fmt;

/// Terminal failure states observable through a result handle.
///
/// A task that completes normally fulfills its channel; everything else
/// collapses into one of these variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The task body panicked while executing.
    ///
    /// Carries the panic message when the payload was a string.
    Panicked(Option<String>),
    /// The result channel was dropped before a value was delivered.
    ///
    /// Reported when the pool was aborted, reset, or destroyed while the
    /// task was still pending, or when a deferred task was never drained.
    Abandoned,
}

impl TaskError {
    /// Build a `Panicked` error from a `catch_unwind` payload.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|msg| (*msg).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned());
        Self::Panicked(message)
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Panicked(Some(msg)) => write!(f, "task panicked: {msg}"),
            Self::Panicked(None) => write!(f, "task panicked"),
            Self::Abandoned => write!(f, "task was dropped before completing"),
        }
    }
}

impl std::error::Error for TaskError {}

/// A specialized Result type carrying a task outcome.
pub type TaskResult<T> = std::result::Result<T, TaskError>;

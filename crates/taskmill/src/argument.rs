//! Value-or-future task arguments.
//!
//! A task argument is either a value that is ready at submission or the
//! pending result of an earlier submission. Tasks with pending arguments are
//! parked in the pool's waiting set and promoted once every argument
//! resolves, without occupying a worker thread in the meantime.

use std::fmt;
use std::time::Duration;

use crate::error::TaskResult;
use crate::future::{TaskFuture, WaitStatus, Waitable};

/// A single task argument: an immediate value or a pending result handle.
///
/// # Example
///
/// ```
/// use taskmill::{Arg, TaskPool};
///
/// let pool = TaskPool::with_threads(2);
/// let seven = pool.submit(|| 7);
/// let doubled = pool.submit_with(|x: i32| x * 2, (Arg::from(seven),));
/// assert_eq!(doubled.get(), Ok(14));
/// ```
pub struct Arg<T>(Repr<T>);

enum Repr<T> {
    Immediate(T),
    Pending(Box<dyn Waitable<Output = T>>),
}

impl<T: Send + 'static> Arg<T> {
    /// Wrap a value that is ready at construction.
    pub fn ready(value: T) -> Self {
        Self(Repr::Immediate(value))
    }

    /// Wrap the pending result of an earlier submission.
    ///
    /// Accepts any [`Waitable`], so user-supplied future types compose the
    /// same way as [`TaskFuture`].
    pub fn pending<W>(source: W) -> Self
    where
        W: Waitable<Output = T>,
    {
        Self(Repr::Pending(Box::new(source)))
    }

    /// Check whether the argument can be extracted without blocking.
    ///
    /// Pure and safe to call arbitrarily often. A pending argument counts as
    /// ready once its producer reached any terminal state, including failure.
    pub fn is_ready(&self) -> bool {
        match &self.0 {
            Repr::Immediate(_) => true,
            Repr::Pending(source) => source.wait_for(Duration::ZERO) == WaitStatus::Ready,
        }
    }

    /// Consume the argument, yielding the value or the producer's failure.
    ///
    /// Must only be called after [`Arg::is_ready`] returned `true`; the pool
    /// upholds this for every argument before a task runs.
    pub fn extract(self) -> TaskResult<T> {
        match self.0 {
            Repr::Immediate(value) => Ok(value),
            Repr::Pending(source) => source.take(),
        }
    }
}

impl<T: Send + 'static> From<TaskFuture<T>> for Arg<T> {
    fn from(future: TaskFuture<T>) -> Self {
        Self::pending(future)
    }
}

impl<T> fmt::Debug for Arg<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Repr::Immediate(_) => f.write_str("Arg::Immediate"),
            Repr::Pending(_) => f.write_str("Arg::Pending"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::future::channel;

    #[test]
    fn test_immediate_is_ready() {
        let arg = Arg::ready(10);
        assert!(arg.is_ready());
        assert_eq!(arg.extract(), Ok(10));
    }

    #[test]
    fn test_pending_tracks_producer() {
        let (promise, future) = channel::<i32>(false);
        let arg = Arg::pending(future);

        assert!(!arg.is_ready());
        promise.fulfill(3);
        assert!(arg.is_ready());
        assert_eq!(arg.extract(), Ok(3));
    }

    #[test]
    fn test_pending_propagates_failure() {
        let (promise, future) = channel::<i32>(false);
        let arg = Arg::from(future);

        drop(promise);
        // A broken producer still counts as ready so the consumer can fail fast.
        assert!(arg.is_ready());
        assert_eq!(arg.extract(), Err(TaskError::Abandoned));
    }
}

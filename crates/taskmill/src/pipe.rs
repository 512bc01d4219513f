//! Pipe composition: `pool | task_a | task_b | … | sink`.
//!
//! A pipe wraps a pool reference together with the future of its latest
//! stage. Each further stage is submitted with the previous future as a lazy
//! argument, so stages chain without blocking a worker between them.
//!
//! Dropping a pipe that still holds its future blocks until that future
//! settles: pipelines enforce structured concurrency by default. Detaching is
//! the only way out of the drop-wait; it hands the underlying future to the
//! caller.
//!
//! # Example
//!
//! ```
//! use taskmill::TaskPool;
//!
//! let pool = TaskPool::with_threads(2);
//!
//! let total = (&pool
//!     | (|| vec![1, 2, 3, 4])
//!     | (|xs: Vec<i32>| xs.into_iter().sum::<i32>()))
//! .get();
//!
//! assert_eq!(total, Ok(10));
//! ```

use std::ops::BitOr;

use crate::argument::Arg;
use crate::error::TaskResult;
use crate::future::TaskFuture;
use crate::pool::TaskPool;
use crate::task::PlainFn;

/// A scoped pipeline stage: a pool reference plus the stage's future.
///
/// Composes further stages with `|`. If still holding its future when
/// dropped, the drop blocks on it; aborting the pool concurrently unblocks
/// the wait through the broken channel.
#[must_use = "a dropped pipe waits on its future; detach it to keep the result"]
pub struct Pipe<'p, T: Send + 'static> {
    pool: &'p TaskPool,
    future: Option<TaskFuture<T>>,
}

impl<'p, T: Send + 'static> Pipe<'p, T> {
    fn new(pool: &'p TaskPool, future: TaskFuture<T>) -> Self {
        Self {
            pool,
            future: Some(future),
        }
    }

    /// Block until the latest stage settles.
    pub fn wait(&self) {
        if let Some(future) = &self.future {
            future.wait();
        }
    }

    /// Block until the latest stage settles and return its outcome.
    pub fn get(mut self) -> TaskResult<T> {
        match self.future.take() {
            Some(future) => future.get(),
            None => Err(crate::error::TaskError::Abandoned),
        }
    }

    /// Extract the underlying future, suppressing the wait-on-drop.
    pub fn detach(mut self) -> TaskFuture<T> {
        self.future.take().expect("pipe future already consumed")
    }
}

impl<T: Send + 'static> Drop for Pipe<'_, T> {
    fn drop(&mut self) {
        if let Some(future) = self.future.take() {
            future.wait();
        }
    }
}

/// Start a pipeline: `&pool | f` submits `f` and wraps its future.
impl<'p, F> BitOr<F> for &'p TaskPool
where
    F: PlainFn<()>,
{
    type Output = Pipe<'p, F::Output>;

    fn bitor(self, task: F) -> Pipe<'p, F::Output> {
        let future = self.submit(task);
        Pipe::new(self, future)
    }
}

/// Chain a stage: `pipe | g` submits `g` with the previous stage's future as
/// a lazy argument. The source pipe is consumed.
impl<'p, T, F> BitOr<F> for Pipe<'p, T>
where
    T: Send + 'static,
    F: PlainFn<(Arg<T>,)>,
{
    type Output = Pipe<'p, F::Output>;

    fn bitor(mut self, task: F) -> Pipe<'p, F::Output> {
        let upstream = self.future.take().expect("pipe future already consumed");
        let future = self.pool.submit_with(task, (Arg::pending(upstream),));
        Pipe::new(self.pool, future)
    }
}

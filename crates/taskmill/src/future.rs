//! One-shot result channels and the future protocol.
//!
//! A submission hands back a [`TaskFuture`], the read side of a one-shot
//! channel whose write side (the crate-private `Promise`) travels with the
//! task record. Exactly one of fulfill or fail settles the channel; dropping
//! the write side unfulfilled settles it as broken, which is how waiters are
//! released when a pool is aborted or destroyed with work still pending.
//!
//! The [`Waitable`] trait captures the protocol so that lazy arguments can
//! accept user-supplied future types alongside [`TaskFuture`].

use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{TaskError, TaskResult};
use crate::logging::targets;

/// Outcome of a timed wait on a future-like value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// The value (or failure) is available.
    Ready,
    /// The deadline elapsed before the value became available.
    Timeout,
    /// The producer has not been scheduled yet (deferred submission, or a
    /// paused pool when waiting on the pool itself).
    Deferred,
}

/// Protocol implemented by values that eventually resolve to a task outcome.
///
/// [`TaskFuture`] implements this; user-supplied future types can too, which
/// lets them participate as lazy arguments via [`Arg::pending`].
///
/// [`Arg::pending`]: crate::Arg::pending
pub trait Waitable: Send + 'static {
    /// The value produced on success.
    type Output;

    /// Block until the outcome is available.
    fn wait(&self);

    /// Wait for the outcome with a timeout.
    fn wait_for(&self, timeout: Duration) -> WaitStatus;

    /// Wait for the outcome until a deadline.
    fn wait_until(&self, deadline: Instant) -> WaitStatus;

    /// Consume the value. Must only be called once the outcome is available.
    fn take(self: Box<Self>) -> TaskResult<Self::Output>;
}

enum State<T> {
    Pending,
    Fulfilled(T),
    Failed(TaskError),
    Broken,
    Taken,
}

struct Channel<T> {
    state: Mutex<State<T>>,
    ready_cv: Condvar,
    /// Set while the producing task sits in the deferred queue.
    deferred: AtomicBool,
}

impl<T> Channel<T> {
    fn settle(&self, outcome: State<T>) {
        let mut state = self.state.lock();
        if matches!(*state, State::Pending) {
            *state = outcome;
            self.ready_cv.notify_all();
        }
    }

    fn take_result(&self) -> TaskResult<T> {
        let mut state = self.state.lock();
        match mem::replace(&mut *state, State::Taken) {
            State::Fulfilled(value) => Ok(value),
            State::Failed(err) => Err(err),
            State::Broken | State::Pending | State::Taken => Err(TaskError::Abandoned),
        }
    }
}

/// Create a connected promise/future pair.
pub(crate) fn channel<T>(deferred: bool) -> (Promise<T>, TaskFuture<T>) {
    let chan = Arc::new(Channel {
        state: Mutex::new(State::Pending),
        ready_cv: Condvar::new(),
        deferred: AtomicBool::new(deferred),
    });
    (
        Promise {
            chan: chan.clone(),
            settled: false,
        },
        TaskFuture { chan },
    )
}

/// Write side of a result channel. Owned by the task record.
pub(crate) struct Promise<T> {
    chan: Arc<Channel<T>>,
    settled: bool,
}

impl<T> Promise<T> {
    /// Deliver the task's value.
    pub(crate) fn fulfill(mut self, value: T) {
        self.settled = true;
        self.chan.settle(State::Fulfilled(value));
    }

    /// Deliver a failure.
    pub(crate) fn fail(mut self, error: TaskError) {
        if Arc::strong_count(&self.chan) == 1 {
            tracing::warn!(
                target: targets::FUTURE,
                %error,
                "task failed but its result handle was already dropped"
            );
        }
        self.settled = true;
        self.chan.settle(State::Failed(error));
    }

    /// Mark the producing task as no longer parked in the deferred queue.
    pub(crate) fn clear_deferred(&self) {
        self.chan.deferred.store(false, Ordering::Release);
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        if !self.settled {
            self.chan.settle(State::Broken);
        }
    }
}

/// A handle to a submitted task's eventual outcome.
///
/// The handle supports blocking waits, timed waits, and polling. Dropping it
/// does not cancel or wait for the task; the pool keeps the task alive until
/// it runs or the runtime is torn down.
///
/// # Example
///
/// ```
/// use taskmill::TaskPool;
///
/// let pool = TaskPool::with_threads(2);
/// let result = pool.submit(|| 6 * 7);
/// assert_eq!(result.get(), Ok(42));
/// ```
#[must_use = "dropping a task future discards the task's result"]
pub struct TaskFuture<T> {
    chan: Arc<Channel<T>>,
}

impl<T> TaskFuture<T> {
    /// Check whether the outcome is available without blocking.
    pub fn is_ready(&self) -> bool {
        !matches!(*self.chan.state.lock(), State::Pending)
    }

    /// Block until the outcome is available.
    ///
    /// For a deferred submission this blocks until the owner drains the
    /// deferred queue and the task settles.
    pub fn wait(&self) {
        let mut state = self.chan.state.lock();
        while matches!(*state, State::Pending) {
            self.chan.ready_cv.wait(&mut state);
        }
    }

    /// Wait for the outcome with a timeout.
    pub fn wait_for(&self, timeout: Duration) -> WaitStatus {
        self.wait_until(Instant::now() + timeout)
    }

    /// Wait for the outcome until a deadline.
    ///
    /// Returns [`WaitStatus::Deferred`] without blocking while the producing
    /// task sits in the deferred queue.
    pub fn wait_until(&self, deadline: Instant) -> WaitStatus {
        let mut state = self.chan.state.lock();
        loop {
            if !matches!(*state, State::Pending) {
                return WaitStatus::Ready;
            }
            if self.chan.deferred.load(Ordering::Acquire) {
                return WaitStatus::Deferred;
            }
            if self.chan.ready_cv.wait_until(&mut state, deadline).timed_out() {
                return if matches!(*state, State::Pending) {
                    WaitStatus::Timeout
                } else {
                    WaitStatus::Ready
                };
            }
        }
    }

    /// Block until the outcome is available and return it.
    pub fn get(self) -> TaskResult<T> {
        self.wait();
        self.chan.take_result()
    }

    /// Take the outcome if it is already available.
    ///
    /// Returns `None` while the task is still pending. The outcome can be
    /// taken at most once; a later `get` reports the channel as abandoned.
    pub fn try_get(&self) -> Option<TaskResult<T>> {
        {
            let state = self.chan.state.lock();
            if matches!(*state, State::Pending) {
                return None;
            }
        }
        Some(self.chan.take_result())
    }
}

impl<T> Drop for TaskFuture<T> {
    fn drop(&mut self) {
        let state = self.chan.state.lock();
        if let State::Failed(error) = &*state {
            tracing::warn!(
                target: targets::FUTURE,
                %error,
                "discarding an unobserved task failure"
            );
        }
    }
}

impl<T: Send + 'static> Waitable for TaskFuture<T> {
    type Output = T;

    fn wait(&self) {
        TaskFuture::wait(self);
    }

    fn wait_for(&self, timeout: Duration) -> WaitStatus {
        TaskFuture::wait_for(self, timeout)
    }

    fn wait_until(&self, deadline: Instant) -> WaitStatus {
        TaskFuture::wait_until(self, deadline)
    }

    fn take(self: Box<Self>) -> TaskResult<T> {
        self.get()
    }
}

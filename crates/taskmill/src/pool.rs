//! The task pool facade.
//!
//! A [`TaskPool`] owns a scheduling runtime (worker threads, ready queue,
//! waiting set) plus a deferred queue that outlives runtime rebuilds. Tasks
//! are submitted as a callable with zero or more wrapped arguments; arguments
//! that are still pending futures park the task in the waiting set instead of
//! occupying a worker.
//!
//! # Example
//!
//! ```
//! use taskmill::{Arg, TaskPool};
//!
//! let pool = TaskPool::with_threads(2);
//!
//! // Plain submission.
//! let produced = pool.submit(|| 7);
//!
//! // Lazy argument: scheduled only once `produced` resolves.
//! let doubled = pool.submit_with(|x: i32| x * 2, (Arg::from(produced),));
//! assert_eq!(doubled.get(), Ok(14));
//! ```
//!
//! # Cancellation example
//!
//! ```
//! use std::time::Duration;
//! use taskmill::{StopToken, TaskPool};
//!
//! let pool = TaskPool::with_threads(1);
//!
//! let looped = pool.submit_cancellable(|token: StopToken| {
//!     let mut iterations = 0u32;
//!     while !token.is_stopped() {
//!         iterations += 1;
//!         std::thread::sleep(Duration::from_millis(1));
//!     }
//!     iterations
//! });
//!
//! std::thread::sleep(Duration::from_millis(20));
//! pool.abort();
//! assert!(looped.get().is_ok());
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::{Mutex, RwLock};

use crate::alloc::{DefaultAlloc, TaskAlloc};
use crate::cancel::StopToken;
use crate::future::{TaskFuture, WaitStatus, channel};
use crate::logging::targets;
use crate::runtime::{Runtime, Shared};
use crate::task::{AllocFn, ArgTuple, PlainFn, TaskContext, TaskRecord, TokenFn};

/// Configuration for creating a [`TaskPool`].
#[derive(Clone)]
pub struct PoolConfig {
    /// Number of worker threads. Zero means the detected hardware
    /// parallelism, falling back to one.
    pub num_threads: usize,
    /// Longest a worker sleeps between two opportunities to re-scan the
    /// waiting set while lazy tasks are parked.
    pub scan_latency: Duration,
    /// Name prefix for worker threads.
    pub thread_name: String,
    /// Allocator handed to allocator-aware tasks. `None` uses the global
    /// allocator.
    pub allocator: Option<Arc<dyn TaskAlloc>>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            num_threads: 0,
            scan_latency: Duration::from_micros(1),
            thread_name: "taskmill-worker".to_string(),
            allocator: None,
        }
    }
}

impl PoolConfig {
    /// Create a configuration with a fixed thread count.
    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads,
            ..Default::default()
        }
    }

    /// Set the waiting-set scan latency.
    pub fn scan_latency(mut self, scan_latency: Duration) -> Self {
        self.scan_latency = scan_latency;
        self
    }

    /// Set the worker thread name prefix.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Set the allocator handed to allocator-aware tasks.
    pub fn allocator(mut self, allocator: Arc<dyn TaskAlloc>) -> Self {
        self.allocator = Some(allocator);
        self
    }
}

impl fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConfig")
            .field("num_threads", &self.num_threads)
            .field("scan_latency", &self.scan_latency)
            .field("thread_name", &self.thread_name)
            .field("custom_allocator", &self.allocator.is_some())
            .finish()
    }
}

/// A fixed-size worker-thread pool executing submitted tasks.
///
/// Beyond plain submission the pool supports lazy (future-typed) arguments,
/// cooperative cancellation through [`StopToken`], deferred submission
/// drained on the caller's thread, and pipe composition (see
/// [`Pipe`](crate::Pipe)).
///
/// The pool is internally synchronized: submission is safe from any thread,
/// worker threads included. A task must never `wait` on the pool that
/// executes it; that deadlocks by construction.
pub struct TaskPool {
    runtime: RwLock<Runtime>,
    /// Serializes `abort` and `reset`.
    lifecycle: Mutex<()>,
    paused: Arc<AtomicBool>,
    deferred_tx: Sender<TaskRecord>,
    deferred_rx: Receiver<TaskRecord>,
    alloc: Arc<dyn TaskAlloc>,
    threads: AtomicUsize,
    scan_latency: Duration,
    thread_name: String,
}

static_assertions::assert_impl_all!(TaskPool: Send, Sync);

impl TaskPool {
    /// Create a pool with default configuration (detected parallelism).
    pub fn new() -> Self {
        Self::with_config(PoolConfig::default())
    }

    /// Create a pool with a fixed thread count.
    pub fn with_threads(num_threads: usize) -> Self {
        Self::with_config(PoolConfig::with_threads(num_threads))
    }

    /// Create a pool with the given configuration.
    pub fn with_config(config: PoolConfig) -> Self {
        let threads = Self::effective_threads(config.num_threads);
        let paused = Arc::new(AtomicBool::new(false));
        let (deferred_tx, deferred_rx) = unbounded();
        let runtime = Runtime::start(
            threads,
            config.scan_latency,
            paused.clone(),
            &config.thread_name,
        );

        Self {
            runtime: RwLock::new(runtime),
            lifecycle: Mutex::new(()),
            paused,
            deferred_tx,
            deferred_rx,
            alloc: config.allocator.unwrap_or_else(|| Arc::new(DefaultAlloc)),
            threads: AtomicUsize::new(threads),
            scan_latency: config.scan_latency,
            thread_name: config.thread_name,
        }
    }

    fn effective_threads(requested: usize) -> usize {
        if requested == 0 {
            thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        } else {
            requested
        }
    }

    fn shared(&self) -> Arc<Shared> {
        self.runtime.read().shared.clone()
    }

    /// Submit a task for execution.
    ///
    /// Returns a handle to the task's eventual result. Failures must not be
    /// discarded silently; dropping a handle whose task failed logs a
    /// warning.
    pub fn submit<F>(&self, task: F) -> TaskFuture<F::Output>
    where
        F: PlainFn<()>,
    {
        self.submit_with(task, ())
    }

    /// Submit a task with wrapped arguments.
    ///
    /// Each argument is an [`Arg`](crate::Arg): an immediate value or the
    /// pending result of an earlier submission. If every argument is already
    /// resolved the task goes straight to the ready queue; otherwise it is
    /// parked in the waiting set and promoted by the readiness scanner
    /// without ever occupying a worker while it waits.
    pub fn submit_with<A, F>(&self, task: F, args: A) -> TaskFuture<F::Output>
    where
        A: ArgTuple,
        F: PlainFn<A>,
    {
        self.submit_record(
            args,
            move |values, _ctx: &TaskContext| task.invoke(values),
            false,
        )
    }

    /// Submit a task that consumes a [`StopToken`] as its trailing parameter.
    ///
    /// The pool supplies the current token at call time; the token observes
    /// [`TaskPool::abort`] and pool destruction.
    pub fn submit_cancellable<F>(&self, task: F) -> TaskFuture<F::Output>
    where
        F: TokenFn<()>,
    {
        self.submit_cancellable_with(task, ())
    }

    /// Submit a stop-token-aware task with wrapped arguments.
    pub fn submit_cancellable_with<A, F>(&self, task: F, args: A) -> TaskFuture<F::Output>
    where
        A: ArgTuple,
        F: TokenFn<A>,
    {
        self.submit_record(
            args,
            move |values, ctx: &TaskContext| task.invoke(values, ctx.token.clone()),
            false,
        )
    }

    /// Submit a task that consumes the pool's allocator as its leading
    /// parameter.
    pub fn submit_alloc<F>(&self, task: F) -> TaskFuture<F::Output>
    where
        F: AllocFn<()>,
    {
        self.submit_alloc_with(task, ())
    }

    /// Submit an allocator-aware task with wrapped arguments.
    pub fn submit_alloc_with<A, F>(&self, task: F, args: A) -> TaskFuture<F::Output>
    where
        A: ArgTuple,
        F: AllocFn<A>,
    {
        self.submit_record(
            args,
            move |values, ctx: &TaskContext| task.invoke(ctx.alloc.clone(), values),
            false,
        )
    }

    /// Park a task in the deferred queue instead of scheduling it.
    ///
    /// Deferred tasks run only when [`TaskPool::drain_deferred`] is called.
    /// Until then their handles report [`WaitStatus::Deferred`] from timed
    /// waits. Deferred tasks survive `abort` and `reset`; if the pool is
    /// destroyed first their handles observe a broken channel.
    pub fn submit_deferred<F>(&self, task: F) -> TaskFuture<F::Output>
    where
        F: PlainFn<()>,
    {
        self.submit_deferred_with(task, ())
    }

    /// Deferred variant of [`TaskPool::submit_with`].
    pub fn submit_deferred_with<A, F>(&self, task: F, args: A) -> TaskFuture<F::Output>
    where
        A: ArgTuple,
        F: PlainFn<A>,
    {
        self.submit_record(
            args,
            move |values, _ctx: &TaskContext| task.invoke(values),
            true,
        )
    }

    fn submit_record<A, F, R>(&self, args: A, body: F, deferred: bool) -> TaskFuture<R>
    where
        A: ArgTuple,
        R: Send + 'static,
        F: FnOnce(A::Values, &TaskContext) -> R + Send + 'static,
    {
        let shared = self.shared();
        let (promise, future) = channel(deferred);
        let ctx = TaskContext {
            token: StopToken::new(shared.cancelled.clone()),
            alloc: self.alloc.clone(),
        };
        let record = TaskRecord::new(args, body, promise, ctx);

        if deferred {
            // The receiver lives in `self`, so the send cannot fail.
            let _ = self.deferred_tx.send(record);
        } else {
            shared.classify(record);
        }
        future
    }

    /// Pop deferred tasks in submission order, running each on the calling
    /// thread if its arguments are resolved and promoting it to the main
    /// runtime otherwise. Returns the number of tasks drained.
    pub fn drain_deferred(&self) -> usize {
        let shared = self.shared();
        let mut drained = 0;
        while let Ok(record) = self.deferred_rx.try_recv() {
            record.clear_deferred();
            if record.is_ready() {
                record.run();
            } else {
                shared.classify(record);
            }
            drained += 1;
        }
        if drained > 0 {
            tracing::debug!(target: targets::POOL, drained, "drained deferred queue");
        }
        drained
    }

    /// Stop starting new executions from the ready queue.
    ///
    /// Already-running tasks continue; submission still enqueues.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    /// Resume execution after [`TaskPool::pause`].
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        self.shared().wake_workers();
    }

    /// Whether the pool is currently paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Block until no tasks remain queued, waiting, or running.
    ///
    /// Returns immediately while the pool is paused, since remaining work
    /// cannot drain. Kicks the workers once so an idle one promptly plays
    /// the scanner role for any parked lazy tasks.
    pub fn wait(&self) {
        self.shared().wait_idle();
    }

    /// Timed variant of [`TaskPool::wait`].
    ///
    /// Returns [`WaitStatus::Deferred`] when the pool is paused.
    pub fn wait_for(&self, timeout: Duration) -> WaitStatus {
        self.wait_until(Instant::now() + timeout)
    }

    /// Deadline variant of [`TaskPool::wait`].
    pub fn wait_until(&self, deadline: Instant) -> WaitStatus {
        self.shared().wait_idle_until(deadline)
    }

    /// Future-like alias of [`TaskPool::wait`], so a pool can terminate a
    /// pipeline the way a future would. Always returns `true`.
    pub fn get(&self) -> bool {
        self.wait();
        true
    }

    /// Cancel outstanding work and rebuild the runtime.
    ///
    /// Sets the cancellation flag, wakes and joins the workers, drops every
    /// record that had not been popped for execution (their handles observe
    /// a broken channel), and rebuilds a fresh runtime with the same thread
    /// count and scan latency. In-flight tasks that poll a stop token exit at
    /// their next poll; tasks that never opted in run to completion before
    /// their worker exits. Idempotent, and pause state is preserved.
    pub fn abort(&self) {
        let _guard = self.lifecycle.lock();
        tracing::debug!(target: targets::POOL, "aborting pool runtime");

        self.runtime.read().begin_shutdown(true);
        let fresh = Runtime::start(
            self.threads.load(Ordering::Acquire),
            self.scan_latency,
            self.paused.clone(),
            &self.thread_name,
        );
        let mut old = {
            let mut runtime = self.runtime.write();
            std::mem::replace(&mut *runtime, fresh)
        };
        // Join outside the facade lock so tasks submitting from workers
        // cannot deadlock against the teardown.
        old.dismantle(true);
    }

    /// Replace the runtime with one of `new_thread_count` workers.
    ///
    /// Pauses, waits for in-flight tasks to finish naturally (stop tokens do
    /// not fire), drops tasks still queued or waiting, then restores the
    /// prior pause state. Zero resolves to the detected parallelism.
    pub fn reset(&self, new_thread_count: usize) {
        let _guard = self.lifecycle.lock();
        let was_paused = self.is_paused();
        self.pause();
        self.shared().wait_running_zero();

        let threads = Self::effective_threads(new_thread_count);
        tracing::debug!(target: targets::POOL, threads, "resetting pool runtime");

        self.runtime.read().begin_shutdown(false);
        let fresh = Runtime::start(
            threads,
            self.scan_latency,
            self.paused.clone(),
            &self.thread_name,
        );
        let mut old = {
            let mut runtime = self.runtime.write();
            std::mem::replace(&mut *runtime, fresh)
        };
        old.dismantle(false);

        self.threads.store(threads, Ordering::Release);
        if !was_paused {
            self.resume();
        }
    }

    /// A token observing the current runtime's cancellation flag.
    ///
    /// Tokens issued before an `abort` keep reporting stopped; the rebuilt
    /// runtime issues fresh ones.
    pub fn stop_token(&self) -> StopToken {
        StopToken::new(self.shared().cancelled.clone())
    }

    /// Number of worker threads in the current runtime.
    pub fn thread_count(&self) -> usize {
        self.threads.load(Ordering::Acquire)
    }

    /// The configured waiting-set scan latency.
    pub fn scan_latency(&self) -> Duration {
        self.scan_latency
    }

    /// Tasks in the ready queue awaiting a worker.
    pub fn tasks_queued(&self) -> usize {
        self.shared().queued()
    }

    /// Tasks parked in the waiting set with unresolved lazy arguments.
    pub fn tasks_waiting(&self) -> usize {
        self.shared().waiting()
    }

    /// Tasks currently executing on workers.
    pub fn tasks_running(&self) -> usize {
        self.shared().running()
    }

    /// Total outstanding tasks (queued + waiting + running).
    pub fn tasks_total(&self) -> usize {
        self.shared().total()
    }

    /// Tasks parked in the deferred queue.
    pub fn tasks_deferred(&self) -> usize {
        self.deferred_rx.len()
    }
}

impl Default for TaskPool {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TaskPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskPool")
            .field("threads", &self.thread_count())
            .field("queued", &self.tasks_queued())
            .field("waiting", &self.tasks_waiting())
            .field("running", &self.tasks_running())
            .field("deferred", &self.tasks_deferred())
            .field("paused", &self.is_paused())
            .finish()
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        // Cancel so running tasks can observe the flag, then join. Records
        // never popped for execution break their channels on drop.
        self.runtime.get_mut().dismantle(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argument::Arg;
    use crate::error::TaskError;
    use std::alloc::Layout;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn test_thread_count_and_reset() {
        let pool = TaskPool::with_threads(4);
        assert_eq!(pool.thread_count(), 4);

        pool.reset(8);
        assert_eq!(pool.thread_count(), 8);

        let probe = pool.submit(|| 1);
        assert_eq!(probe.get(), Ok(1));
    }

    #[test]
    fn test_zero_threads_resolves_to_parallelism() {
        let pool = TaskPool::new();
        assert!(pool.thread_count() >= 1);
    }

    #[test]
    fn test_simple_submission() {
        let pool = TaskPool::with_threads(2);
        let result = pool.submit(|| 42);
        assert_eq!(result.get(), Ok(42));
    }

    #[test]
    fn test_submission_with_immediate_args() {
        let pool = TaskPool::with_threads(2);
        let sum = pool.submit_with(
            |a: i32, b: i32, c: i32| a + b + c,
            (Arg::ready(1), Arg::ready(2), Arg::ready(3)),
        );
        assert_eq!(sum.get(), Ok(6));
    }

    #[test]
    fn test_lazy_argument_parks_then_resolves() {
        let pool = TaskPool::with_threads(2);

        let produced = pool.submit(|| {
            thread::sleep(Duration::from_millis(50));
            7
        });
        let doubled = pool.submit_with(|x: i32| x * 2, (Arg::from(produced),));

        // The consumer must sit in the waiting set while the producer runs.
        let deadline = Instant::now() + Duration::from_secs(1);
        let mut observed_waiting = false;
        while Instant::now() < deadline {
            if pool.tasks_waiting() >= 1 {
                observed_waiting = true;
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
        assert!(observed_waiting);
        assert_eq!(doubled.get(), Ok(14));
    }

    #[test]
    fn test_lazy_chain_through_values() {
        let pool = TaskPool::with_threads(2);
        let first = pool.submit(|| vec![1, 2, 3, 4]);
        let total = pool.submit_with(|xs: Vec<i32>| xs.into_iter().sum::<i32>(), (first.into(),));
        assert_eq!(total.get(), Ok(10));
    }

    #[test]
    fn test_cancellable_task_observes_abort() {
        let pool = TaskPool::with_threads(2);
        let looped = pool.submit_cancellable(|token: StopToken| {
            while !token.is_stopped() {
                thread::sleep(Duration::from_millis(1));
            }
            "stopped"
        });

        thread::sleep(Duration::from_millis(50));
        pool.abort();

        assert_eq!(looped.wait_for(Duration::from_millis(100)), WaitStatus::Ready);
        assert_eq!(looped.get(), Ok("stopped"));

        // The pool is immediately usable again.
        let probe = pool.submit(|| 9);
        assert_eq!(probe.get(), Ok(9));
    }

    #[test]
    fn test_panic_is_captured() {
        let pool = TaskPool::with_threads(2);
        let failed = pool.submit(|| -> i32 { panic!("kaboom") });

        assert_eq!(
            failed.get(),
            Err(TaskError::Panicked(Some("kaboom".to_string())))
        );

        pool.wait();
        assert_eq!(pool.tasks_total(), 0);

        // The pool stays operational after a task failure.
        let probe = pool.submit(|| 3);
        assert_eq!(probe.get(), Ok(3));
    }

    #[test]
    fn test_pause_holds_ready_tasks() {
        let pool = TaskPool::with_threads(2);
        pool.pause();

        let held = pool.submit(|| 5);
        thread::sleep(Duration::from_millis(30));
        assert!(!held.is_ready());
        assert_eq!(pool.tasks_queued(), 1);

        // wait() must not deadlock while paused.
        pool.wait();
        assert_eq!(pool.wait_for(Duration::from_millis(5)), WaitStatus::Deferred);

        pool.resume();
        assert_eq!(held.get(), Ok(5));
    }

    #[test]
    fn test_wait_blocks_until_drained() {
        let pool = TaskPool::with_threads(4);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let counter = counter.clone();
            let _ = pool.submit(move || {
                thread::sleep(Duration::from_millis(10));
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        pool.wait();
        assert_eq!(counter.load(Ordering::SeqCst), 10);
        assert_eq!(pool.tasks_total(), 0);
    }

    #[test]
    fn test_wait_for_times_out_under_load() {
        let pool = TaskPool::with_threads(1);
        let _slow = pool.submit(|| thread::sleep(Duration::from_millis(200)));
        assert_eq!(pool.wait_for(Duration::from_millis(10)), WaitStatus::Timeout);
        pool.wait();
    }

    #[test]
    fn test_abort_is_idempotent_and_preserves_pause() {
        let pool = TaskPool::with_threads(2);
        pool.pause();

        pool.abort();
        pool.abort();

        assert!(pool.is_paused());
        pool.resume();

        let probe = pool.submit(|| 2);
        assert_eq!(probe.get(), Ok(2));
    }

    #[test]
    fn test_abort_drops_unstarted_tasks() {
        let pool = TaskPool::with_threads(1);
        let blocker = pool.submit(|| thread::sleep(Duration::from_millis(100)));

        thread::sleep(Duration::from_millis(10));
        let pending: Vec<_> = (0..5).map(|i| pool.submit(move || i)).collect();

        pool.abort();
        assert!(blocker.is_ready());
        for future in pending {
            assert_eq!(future.get(), Err(TaskError::Abandoned));
        }
    }

    #[test]
    fn test_stop_token_is_fresh_after_abort() {
        let pool = TaskPool::with_threads(1);
        let before = pool.stop_token();
        assert!(!before.is_stopped());

        pool.abort();
        assert!(before.is_stopped());
        assert!(!pool.stop_token().is_stopped());
    }

    #[test]
    fn test_reset_restores_pause_state() {
        let pool = TaskPool::with_threads(2);
        pool.reset(4);
        assert!(!pool.is_paused());

        pool.pause();
        pool.reset(2);
        assert!(pool.is_paused());
        pool.resume();
    }

    #[test]
    fn test_reset_does_not_fire_tokens() {
        let pool = TaskPool::with_threads(2);
        let saw_stop = Arc::new(AtomicBool::new(false));

        let saw = saw_stop.clone();
        let inflight = pool.submit_cancellable(move |token: StopToken| {
            thread::sleep(Duration::from_millis(50));
            saw.store(token.is_stopped(), Ordering::SeqCst);
        });

        thread::sleep(Duration::from_millis(10));
        pool.reset(2);

        assert!(inflight.is_ready());
        assert!(!saw_stop.load(Ordering::SeqCst));
    }

    #[test]
    fn test_deferred_runs_on_draining_thread_in_order() {
        let pool = TaskPool::with_threads(2);
        let log = Arc::new(Mutex::new(Vec::new()));
        let main_thread = thread::current().id();

        let futures: Vec<_> = (0..4)
            .map(|i| {
                let log = log.clone();
                pool.submit_deferred(move || {
                    log.lock().push((i, thread::current().id()));
                    i
                })
            })
            .collect();

        assert_eq!(pool.tasks_deferred(), 4);
        assert_eq!(
            futures[0].wait_for(Duration::ZERO),
            WaitStatus::Deferred
        );

        assert_eq!(pool.drain_deferred(), 4);
        assert_eq!(pool.tasks_deferred(), 0);

        let entries = log.lock();
        assert_eq!(entries.len(), 4);
        for (position, (index, thread_id)) in entries.iter().enumerate() {
            assert_eq!(*index, position as i32);
            assert_eq!(*thread_id, main_thread);
        }
        drop(entries);

        for (i, future) in futures.into_iter().enumerate() {
            assert_eq!(future.get(), Ok(i as i32));
        }
    }

    #[test]
    fn test_deferred_with_unready_arg_is_promoted() {
        let pool = TaskPool::with_threads(2);

        let gate = pool.submit(|| {
            thread::sleep(Duration::from_millis(50));
            5
        });
        let chained = pool.submit_deferred_with(|x: i32| x + 1, (Arg::from(gate),));

        assert_eq!(pool.drain_deferred(), 1);
        // Not ready at drain time, so it went to the main runtime.
        assert_eq!(pool.tasks_deferred(), 0);
        assert_eq!(chained.get(), Ok(6));
    }

    #[test]
    fn test_deferred_breaks_on_pool_drop() {
        let pool = TaskPool::with_threads(1);
        let parked = pool.submit_deferred(|| 1);

        drop(pool);
        assert_eq!(parked.get(), Err(TaskError::Abandoned));
    }

    #[test]
    fn test_submit_from_worker_thread() {
        let pool = Arc::new(TaskPool::with_threads(2));
        let counter = Arc::new(AtomicUsize::new(0));

        let inner_pool = pool.clone();
        let inner_counter = counter.clone();
        let outer = pool.submit(move || {
            let counter = inner_counter.clone();
            let _ = inner_pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        });

        outer.wait();
        pool.wait();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_alloc_task_receives_configured_allocator() {
        struct CountingAlloc {
            allocations: AtomicUsize,
        }

        impl TaskAlloc for CountingAlloc {
            unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
                self.allocations.fetch_add(1, Ordering::SeqCst);
                unsafe { std::alloc::alloc(layout) }
            }

            unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
                unsafe { std::alloc::dealloc(ptr, layout) }
            }
        }

        let counting = Arc::new(CountingAlloc {
            allocations: AtomicUsize::new(0),
        });
        let pool = TaskPool::with_config(
            PoolConfig::with_threads(1).allocator(counting.clone()),
        );

        let touched = pool.submit_alloc(|alloc: Arc<dyn TaskAlloc>| {
            let layout = Layout::array::<u8>(64).unwrap();
            unsafe {
                let ptr = alloc.alloc(layout);
                assert!(!ptr.is_null());
                alloc.dealloc(ptr, layout);
            }
            true
        });

        assert_eq!(touched.get(), Ok(true));
        assert_eq!(counting.allocations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_counters_settle_to_zero() {
        let pool = TaskPool::with_threads(3);
        let total = Arc::new(AtomicI32::new(0));

        let futures: Vec<_> = (0..20)
            .map(|i| {
                let total = total.clone();
                pool.submit(move || {
                    total.fetch_add(i, Ordering::SeqCst);
                })
            })
            .collect();

        for future in futures {
            future.wait();
        }
        pool.wait();

        assert_eq!(total.load(Ordering::SeqCst), (0..20).sum::<i32>());
        assert_eq!(pool.tasks_queued(), 0);
        assert_eq!(pool.tasks_waiting(), 0);
        assert_eq!(pool.tasks_running(), 0);
    }
}

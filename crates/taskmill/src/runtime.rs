//! The scheduling runtime: queues, worker loop, and readiness scanner.
//!
//! A runtime owns a fixed set of worker threads competing on a FIFO ready
//! queue, plus an unordered waiting set holding tasks whose lazy arguments
//! have not all resolved. Any idle worker opportunistically plays the scanner
//! role: it re-checks the waiting set and migrates newly ready records into
//! the ready queue. The facade tears a runtime down and rebuilds it for
//! `abort` and `reset`; worker exit is driven by a crate-private shutdown
//! flag so that a non-abort rebuild never fires user-visible stop tokens.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use slotmap::{SlotMap, new_key_type};

use crate::future::WaitStatus;
use crate::logging::targets;
use crate::task::TaskRecord;

new_key_type! {
    struct WaitingKey;
}

/// Sleep bound for idle workers while the waiting set is empty, and the
/// polling granularity of completion waiters.
const IDLE_WAIT: Duration = Duration::from_millis(1);

/// State shared between the facade, the workers, and completion waiters.
pub(crate) struct Shared {
    ready: Mutex<VecDeque<TaskRecord>>,
    ready_cv: Condvar,
    waiting: Mutex<SlotMap<WaitingKey, TaskRecord>>,
    done_lock: Mutex<()>,
    done_cv: Condvar,
    /// Worker exit signal. Set by every teardown path.
    shutdown: AtomicBool,
    /// User-visible cancellation flag, observed through stop tokens.
    /// Write-once per runtime; only `abort` and pool destruction raise it.
    pub(crate) cancelled: Arc<AtomicBool>,
    /// Owned by the facade so pause state survives runtime rebuilds.
    paused: Arc<AtomicBool>,
    queued: AtomicUsize,
    waiting_count: AtomicUsize,
    running: AtomicUsize,
    scan_latency: Duration,
    thread_count: usize,
}

impl Shared {
    fn new(thread_count: usize, scan_latency: Duration, paused: Arc<AtomicBool>) -> Self {
        Self {
            ready: Mutex::new(VecDeque::new()),
            ready_cv: Condvar::new(),
            waiting: Mutex::new(SlotMap::with_key()),
            done_lock: Mutex::new(()),
            done_cv: Condvar::new(),
            shutdown: AtomicBool::new(false),
            cancelled: Arc::new(AtomicBool::new(false)),
            paused,
            queued: AtomicUsize::new(0),
            waiting_count: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
            scan_latency,
            thread_count,
        }
    }

    pub(crate) fn queued(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }

    pub(crate) fn waiting(&self) -> usize {
        self.waiting_count.load(Ordering::Acquire)
    }

    pub(crate) fn running(&self) -> usize {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn total(&self) -> usize {
        self.queued() + self.waiting() + self.running()
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Enqueue a record whose arguments are all resolved.
    pub(crate) fn enqueue_ready(&self, record: TaskRecord) {
        self.ready.lock().push_back(record);
        self.queued.fetch_add(1, Ordering::AcqRel);
        self.ready_cv.notify_one();
    }

    /// Park a record until the scanner observes its arguments ready.
    fn park_waiting(&self, record: TaskRecord) {
        self.waiting.lock().insert(record);
        self.waiting_count.fetch_add(1, Ordering::AcqRel);
        // Wake one sleeper so a scanner starts polling at scan latency.
        self.ready_cv.notify_one();
    }

    /// Route a record into the ready queue or the waiting set.
    pub(crate) fn classify(&self, record: TaskRecord) {
        if record.is_ready() {
            self.enqueue_ready(record);
        } else {
            self.park_waiting(record);
        }
    }

    /// Wake every worker so sleepers re-check shutdown and the scanner role.
    pub(crate) fn wake_workers(&self) {
        self.ready_cv.notify_all();
    }

    /// Migrate every ready record from the waiting set into the ready queue.
    ///
    /// Yields without touching the set when shutdown fires mid-scan.
    fn promote_ready(&self, waiting: &mut SlotMap<WaitingKey, TaskRecord>) -> usize {
        let mut ready_keys = Vec::new();
        for (key, record) in waiting.iter() {
            if self.is_shutdown() {
                return 0;
            }
            if record.is_ready() {
                ready_keys.push(key);
            }
        }
        if ready_keys.is_empty() {
            return 0;
        }

        let promoted = ready_keys.len();
        {
            let mut ready = self.ready.lock();
            for key in ready_keys {
                if let Some(record) = waiting.remove(key) {
                    ready.push_back(record);
                }
            }
        }
        // Destination counter first so `total` never transiently undercounts.
        self.queued.fetch_add(promoted, Ordering::AcqRel);
        self.waiting_count.fetch_sub(promoted, Ordering::AcqRel);

        tracing::trace!(
            target: targets::RUNTIME,
            promoted,
            "promoted ready tasks from the waiting set"
        );
        for _ in 0..promoted.min(self.thread_count) {
            self.ready_cv.notify_one();
        }
        promoted
    }

    /// Notify completion waiters so they re-check their predicates.
    fn signal_progress(&self) {
        let _guard = self.done_lock.lock();
        self.done_cv.notify_all();
    }

    /// Block until no tasks remain, the pool pauses, or the runtime shuts
    /// down. Kicks the workers once so an idle one takes the scanner role.
    pub(crate) fn wait_idle(&self) {
        self.wake_workers();
        let mut guard = self.done_lock.lock();
        while self.total() != 0 && !self.is_paused() && !self.is_shutdown() {
            self.done_cv.wait_for(&mut guard, IDLE_WAIT);
        }
    }

    /// Deadline-bounded variant of [`Shared::wait_idle`].
    pub(crate) fn wait_idle_until(&self, deadline: Instant) -> WaitStatus {
        self.wake_workers();
        let mut guard = self.done_lock.lock();
        loop {
            if self.total() == 0 || self.is_shutdown() {
                return WaitStatus::Ready;
            }
            if self.is_paused() {
                return WaitStatus::Deferred;
            }
            let now = Instant::now();
            if now >= deadline {
                return WaitStatus::Timeout;
            }
            let step = IDLE_WAIT.min(deadline - now);
            self.done_cv.wait_for(&mut guard, step);
        }
    }

    /// Block until no task is executing. Used by `reset`, which pauses the
    /// pool first so the ready queue cannot refill the workers.
    pub(crate) fn wait_running_zero(&self) {
        let mut guard = self.done_lock.lock();
        while self.running() != 0 {
            self.done_cv.wait_for(&mut guard, IDLE_WAIT);
        }
    }

    fn begin_shutdown(&self, cancel: bool) {
        if cancel {
            self.cancelled.store(true, Ordering::Release);
        }
        self.shutdown.store(true, Ordering::Release);
        self.wake_workers();
        self.signal_progress();
    }

    /// Drop every record still held by the queues. Runs after workers joined.
    fn drain_all(&self) -> usize {
        let mut dropped = 0;
        {
            let mut ready = self.ready.lock();
            dropped += ready.len();
            ready.clear();
        }
        {
            let mut waiting = self.waiting.lock();
            dropped += waiting.len();
            waiting.clear();
        }
        self.queued.store(0, Ordering::Release);
        self.waiting_count.store(0, Ordering::Release);
        dropped
    }
}

fn worker_loop(shared: Arc<Shared>) {
    loop {
        // Opportunistic scan: try-lock so scanning never contends with
        // another scanner or a submitter parking a record.
        if let Some(mut waiting) = shared.waiting.try_lock() {
            if !waiting.is_empty() {
                shared.promote_ready(&mut waiting);
            }
        }

        let mut ready = shared.ready.lock();
        if shared.is_shutdown() {
            break;
        }
        if ready.is_empty() || shared.is_paused() {
            let timeout = if shared.is_paused() || shared.waiting() == 0 {
                IDLE_WAIT
            } else {
                shared.scan_latency
            };
            shared.ready_cv.wait_for(&mut ready, timeout);
            if shared.is_shutdown() {
                break;
            }
        }

        if !shared.is_paused() {
            if let Some(record) = ready.pop_front() {
                shared.running.fetch_add(1, Ordering::AcqRel);
                shared.queued.fetch_sub(1, Ordering::AcqRel);
                drop(ready);

                record.run();

                shared.running.fetch_sub(1, Ordering::AcqRel);
                shared.signal_progress();
                continue;
            }
        }
        drop(ready);

        // Woke without work: let completion waiters re-check their predicate.
        shared.signal_progress();
    }
}

/// A set of worker threads bound to one [`Shared`] state.
pub(crate) struct Runtime {
    pub(crate) shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    finished: bool,
}

impl Runtime {
    /// Spawn `thread_count` workers. A spawn failure here would leave a
    /// half-built runtime, so it is treated as fatal.
    pub(crate) fn start(
        thread_count: usize,
        scan_latency: Duration,
        paused: Arc<AtomicBool>,
        thread_name: &str,
    ) -> Self {
        let shared = Arc::new(Shared::new(thread_count, scan_latency, paused));
        let workers = (0..thread_count)
            .map(|index| {
                let shared = shared.clone();
                let spawned = thread::Builder::new()
                    .name(format!("{thread_name}-{index}"))
                    .spawn(move || worker_loop(shared));
                match spawned {
                    Ok(handle) => handle,
                    Err(err) => {
                        tracing::error!(
                            target: targets::RUNTIME,
                            "failed to spawn worker thread: {err}"
                        );
                        std::process::abort();
                    }
                }
            })
            .collect();

        Self {
            shared,
            workers,
            finished: false,
        }
    }

    /// Flag the runtime for teardown without blocking.
    ///
    /// `cancel` raises the user-visible cancellation flag in addition to the
    /// worker shutdown signal.
    pub(crate) fn begin_shutdown(&self, cancel: bool) {
        self.shared.begin_shutdown(cancel);
    }

    /// Join the workers and drop every record still enqueued. Idempotent.
    pub(crate) fn dismantle(&mut self, cancel: bool) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.shared.begin_shutdown(cancel);
        for handle in std::mem::take(&mut self.workers) {
            let _ = handle.join();
        }
        let dropped = self.shared.drain_all();
        if dropped > 0 {
            tracing::debug!(
                target: targets::RUNTIME,
                dropped,
                "dropped unexecuted tasks during runtime teardown"
            );
        }
        // Unblock any waiter still parked on the old runtime.
        self.shared.signal_progress();
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.dismantle(true);
    }
}

//! Cooperative cancellation.
//!
//! Each pool runtime owns a single cancellation flag. Tasks opt into
//! cancellation by accepting a [`StopToken`] parameter; waiters and the pipe
//! drop path observe the same flag indirectly through broken result channels.
//! The flag is write-once: it is raised by `abort` (and pool destruction) and
//! only a rebuilt runtime starts with a fresh one.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A read-only view of a pool's cancellation flag.
///
/// Tokens are cheap to clone and remain valid after the pool rebuilds its
/// runtime; a token issued before an `abort` keeps reporting stopped.
///
/// # Example
///
/// ```
/// use taskmill::TaskPool;
///
/// let pool = TaskPool::with_threads(1);
/// let token = pool.stop_token();
/// assert!(!token.is_stopped());
/// ```
#[derive(Debug, Clone)]
pub struct StopToken {
    flag: Arc<AtomicBool>,
}

impl StopToken {
    pub(crate) fn new(flag: Arc<AtomicBool>) -> Self {
        Self { flag }
    }

    /// Check whether cancellation has been requested.
    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

static_assertions::assert_impl_all!(StopToken: Send, Sync);

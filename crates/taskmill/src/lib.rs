//! A fixed-size worker-thread task pool with lazy future arguments,
//! cooperative cancellation, and composable pipelines.
//!
//! This crate provides:
//!
//! - **Task submission** returning result handles ([`TaskFuture`]) with
//!   blocking, timed, and polling waits
//! - **Lazy arguments**: a task may take the pending results of earlier
//!   submissions as arguments; it parks in a waiting set (consuming no
//!   worker) until every argument resolves
//! - **Cooperative cancellation** through pool-issued [`StopToken`]s
//! - **Deferred submission** drained on the caller's thread
//! - **Pause/resume, wait, abort, reset** lifecycle control
//! - **Pipe composition**: `pool | f | g` chains stages through lazy
//!   arguments, with wait-on-drop for structured concurrency
//!
//! # Submission example
//!
//! ```
//! use taskmill::TaskPool;
//!
//! let pool = TaskPool::with_threads(2);
//! let answer = pool.submit(|| 6 * 7);
//! assert_eq!(answer.get(), Ok(42));
//! ```
//!
//! # Lazy argument example
//!
//! ```
//! use taskmill::{Arg, TaskPool};
//!
//! let pool = TaskPool::with_threads(2);
//!
//! // `doubled` is scheduled only once `produced` has a value; no worker
//! // thread is blocked while it waits.
//! let produced = pool.submit(|| 7);
//! let doubled = pool.submit_with(|x: i32| x * 2, (Arg::from(produced),));
//! assert_eq!(doubled.get(), Ok(14));
//! ```
//!
//! # Pipeline example
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
//! assert_eq!(total, Ok(10));
//! ```
//!
//! # Cancellation example
//!
//! ```no_run
//! use std::time::Duration;
//! use taskmill::{StopToken, TaskPool};
//!
//! let pool = TaskPool::new();
//!
//! let work = pool.submit_cancellable(|token: StopToken| {
//!     while !token.is_stopped() {
//!         // Make progress, polling the token between steps.
//!         std::thread::sleep(Duration::from_millis(1));
//!     }
//! });
//!
//! pool.abort();
//! work.wait();
//! ```

#![warn(missing_docs)]

mod alloc;
mod argument;
mod cancel;
mod error;
mod future;
pub mod logging;
mod pipe;
mod pool;
mod runtime;
mod task;

pub use alloc::{DefaultAlloc, TaskAlloc};
pub use argument::Arg;
pub use cancel::StopToken;
pub use error::{TaskError, TaskResult};
pub use future::{TaskFuture, WaitStatus, Waitable};
pub use pipe::Pipe;
pub use pool::{PoolConfig, TaskPool};
pub use task::{AllocFn, ArgTuple, PlainFn, TokenFn};

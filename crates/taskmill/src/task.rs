//! Type-erased task records and submission adapters.
//!
//! Submission erases the callable, its wrapped arguments, and the result
//! channel into a [`TaskRecord`] exposing exactly two operations: a pure
//! readiness predicate and a run-once execution step. The adapter traits in
//! this module spread tuple arguments back into plain parameters for the
//! supported submission families (plain, stop-token-aware, allocator-aware).

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::alloc::TaskAlloc;
use crate::argument::Arg;
use crate::cancel::StopToken;
use crate::error::{TaskError, TaskResult};
use crate::future::Promise;

/// Extras the pool supplies to opted-in callables at call time.
pub(crate) struct TaskContext {
    pub(crate) token: StopToken,
    pub(crate) alloc: Arc<dyn TaskAlloc>,
}

/// A tuple of wrapped arguments for one submission.
///
/// Implemented for tuples of [`Arg`] up to eight elements, including the
/// empty tuple.
pub trait ArgTuple: Send + 'static {
    /// The plain values produced by extraction.
    type Values;

    /// Whether every argument can be extracted without blocking.
    fn is_ready(&self) -> bool;

    /// Extract every argument, failing with the first upstream error.
    fn extract(self) -> TaskResult<Self::Values>;
}

/// A callable submitted through the plain `submit` family.
pub trait PlainFn<A: ArgTuple>: Send + 'static {
    /// The callable's return type.
    type Output: Send + 'static;

    /// Call the callable with extracted argument values.
    fn invoke(self, values: A::Values) -> Self::Output;
}

/// A callable that additionally consumes a [`StopToken`] as its trailing
/// parameter, supplied by the pool at call time.
pub trait TokenFn<A: ArgTuple>: Send + 'static {
    /// The callable's return type.
    type Output: Send + 'static;

    /// Call the callable with extracted argument values and the pool token.
    fn invoke(self, values: A::Values, token: StopToken) -> Self::Output;
}

/// A callable that additionally consumes the pool's allocator as its leading
/// parameter, supplied at call time.
pub trait AllocFn<A: ArgTuple>: Send + 'static {
    /// The callable's return type.
    type Output: Send + 'static;

    /// Call the callable with the pool allocator and extracted values.
    fn invoke(self, alloc: Arc<dyn TaskAlloc>, values: A::Values) -> Self::Output;
}

macro_rules! impl_arity {
    ($(($T:ident, $v:ident, $idx:tt)),*) => {
        impl<$($T: Send + 'static,)*> ArgTuple for ($(Arg<$T>,)*) {
            type Values = ($($T,)*);

            fn is_ready(&self) -> bool {
                true $(&& self.$idx.is_ready())*
            }

            fn extract(self) -> TaskResult<Self::Values> {
                Ok(($(self.$idx.extract()?,)*))
            }
        }

        impl<Func, Out, $($T,)*> PlainFn<($(Arg<$T>,)*)> for Func
        where
            Func: FnOnce($($T),*) -> Out + Send + 'static,
            Out: Send + 'static,
            $($T: Send + 'static,)*
        {
            type Output = Out;

            fn invoke(self, values: ($($T,)*)) -> Out {
                let ($($v,)*) = values;
                (self)($($v),*)
            }
        }

        impl<Func, Out, $($T,)*> TokenFn<($(Arg<$T>,)*)> for Func
        where
            Func: FnOnce($($T,)* StopToken) -> Out + Send + 'static,
            Out: Send + 'static,
            $($T: Send + 'static,)*
        {
            type Output = Out;

            fn invoke(self, values: ($($T,)*), token: StopToken) -> Out {
                let ($($v,)*) = values;
                (self)($($v,)* token)
            }
        }

        impl<Func, Out, $($T,)*> AllocFn<($(Arg<$T>,)*)> for Func
        where
            Func: FnOnce(Arc<dyn TaskAlloc>, $($T),*) -> Out + Send + 'static,
            Out: Send + 'static,
            $($T: Send + 'static,)*
        {
            type Output = Out;

            fn invoke(self, alloc: Arc<dyn TaskAlloc>, values: ($($T,)*)) -> Out {
                let ($($v,)*) = values;
                (self)(alloc $(, $v)*)
            }
        }
    };
}

impl_arity!();
impl_arity!((A0, a0, 0));
impl_arity!((A0, a0, 0), (A1, a1, 1));
impl_arity!((A0, a0, 0), (A1, a1, 1), (A2, a2, 2));
impl_arity!((A0, a0, 0), (A1, a1, 1), (A2, a2, 2), (A3, a3, 3));
impl_arity!((A0, a0, 0), (A1, a1, 1), (A2, a2, 2), (A3, a3, 3), (A4, a4, 4));
impl_arity!(
    (A0, a0, 0),
    (A1, a1, 1),
    (A2, a2, 2),
    (A3, a3, 3),
    (A4, a4, 4),
    (A5, a5, 5)
);
impl_arity!(
    (A0, a0, 0),
    (A1, a1, 1),
    (A2, a2, 2),
    (A3, a3, 3),
    (A4, a4, 4),
    (A5, a5, 5),
    (A6, a6, 6)
);
impl_arity!(
    (A0, a0, 0),
    (A1, a1, 1),
    (A2, a2, 2),
    (A3, a3, 3),
    (A4, a4, 4),
    (A5, a5, 5),
    (A6, a6, 6),
    (A7, a7, 7)
);

/// A type-erased unit of work owned by the pool.
///
/// A record is in exactly one place at a time (ready queue, waiting set,
/// deferred queue, or executing); dropping an unexecuted record breaks its
/// result channel so waiters observe the abandonment.
pub(crate) struct TaskRecord(Box<dyn RecordCore>);

impl TaskRecord {
    pub(crate) fn new<A, F, R>(args: A, body: F, promise: Promise<R>, ctx: TaskContext) -> Self
    where
        A: ArgTuple,
        R: Send + 'static,
        F: FnOnce(A::Values, &TaskContext) -> R + Send + 'static,
    {
        Self(Box::new(Record {
            args: Some(args),
            body: Some(body),
            promise: Some(promise),
            ctx,
        }))
    }

    /// Whether every lazy argument has resolved. Pure; never blocks beyond a
    /// zero-duration peek per argument.
    pub(crate) fn is_ready(&self) -> bool {
        self.0.is_ready()
    }

    /// Execute the task, routing any outcome into the result channel.
    pub(crate) fn run(self) {
        self.0.run();
    }

    /// Mark the record's channel as no longer deferred.
    pub(crate) fn clear_deferred(&self) {
        self.0.clear_deferred();
    }
}

trait RecordCore: Send {
    fn is_ready(&self) -> bool;
    fn run(self: Box<Self>);
    fn clear_deferred(&self);
}

struct Record<A, F, R>
where
    A: ArgTuple,
    R: Send + 'static,
    F: FnOnce(A::Values, &TaskContext) -> R + Send + 'static,
{
    args: Option<A>,
    body: Option<F>,
    promise: Option<Promise<R>>,
    ctx: TaskContext,
}

impl<A, F, R> RecordCore for Record<A, F, R>
where
    A: ArgTuple,
    R: Send + 'static,
    F: FnOnce(A::Values, &TaskContext) -> R + Send + 'static,
{
    fn is_ready(&self) -> bool {
        self.args.as_ref().map_or(true, ArgTuple::is_ready)
    }

    fn run(mut self: Box<Self>) {
        let (Some(args), Some(body), Some(promise)) = (
            self.args.take(),
            self.body.take(),
            self.promise.take(),
        ) else {
            return;
        };

        match args.extract() {
            Err(upstream) => promise.fail(upstream),
            Ok(values) => {
                let ctx = &self.ctx;
                match panic::catch_unwind(AssertUnwindSafe(move || body(values, ctx))) {
                    Ok(value) => promise.fulfill(value),
                    Err(payload) => promise.fail(TaskError::from_panic(payload)),
                }
            }
        }
    }

    fn clear_deferred(&self) {
        if let Some(promise) = &self.promise {
            promise.clear_deferred();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::DefaultAlloc;
    use crate::future::channel;
    use std::sync::atomic::AtomicBool;

    fn test_ctx() -> TaskContext {
        TaskContext {
            token: StopToken::new(Arc::new(AtomicBool::new(false))),
            alloc: Arc::new(DefaultAlloc),
        }
    }

    #[test]
    fn test_record_runs_and_fulfills() {
        let (promise, future) = channel::<i32>(false);
        let record = TaskRecord::new(
            (Arg::ready(20), Arg::ready(22)),
            |(a, b): (i32, i32), _ctx: &TaskContext| a + b,
            promise,
            test_ctx(),
        );

        assert!(record.is_ready());
        record.run();
        assert_eq!(future.get(), Ok(42));
    }

    #[test]
    fn test_record_captures_panic() {
        let (promise, future) = channel::<i32>(false);
        let record = TaskRecord::new(
            (),
            |(): (), _ctx: &TaskContext| -> i32 { panic!("deliberate") },
            promise,
            test_ctx(),
        );

        record.run();
        assert_eq!(
            future.get(),
            Err(TaskError::Panicked(Some("deliberate".to_string())))
        );
    }

    #[test]
    fn test_record_not_ready_with_pending_arg() {
        let (upstream_promise, upstream) = channel::<i32>(false);
        let (promise, _future) = channel::<i32>(false);
        let record = TaskRecord::new(
            (Arg::pending(upstream),),
            |(x,): (i32,), _ctx: &TaskContext| x,
            promise,
            test_ctx(),
        );

        assert!(!record.is_ready());
        upstream_promise.fulfill(1);
        assert!(record.is_ready());
    }

    #[test]
    fn test_dropping_record_breaks_channel() {
        let (promise, future) = channel::<i32>(false);
        let record = TaskRecord::new(
            (),
            |(): (), _ctx: &TaskContext| 1,
            promise,
            test_ctx(),
        );

        drop(record);
        assert_eq!(future.get(), Err(TaskError::Abandoned));
    }

    #[test]
    fn test_upstream_failure_propagates() {
        let (upstream_promise, upstream) = channel::<i32>(false);
        let (promise, future) = channel::<i32>(false);
        let record = TaskRecord::new(
            (Arg::pending(upstream),),
            |(x,): (i32,), _ctx: &TaskContext| x * 2,
            promise,
            test_ctx(),
        );

        drop(upstream_promise);
        assert!(record.is_ready());
        record.run();
        assert_eq!(future.get(), Err(TaskError::Abandoned));
    }
}

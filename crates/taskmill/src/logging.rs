//! Logging integration.
//!
//! Taskmill instruments its scheduling decisions with the `tracing` crate.
//! To see logs, install a tracing subscriber in your application:
//!
//! ```ignore
//! use tracing_subscriber;
//!
//! fn main() {
//!     tracing_subscriber::fmt::init();
//!
//!     // Your application code...
//! }
//! ```
//!
//! Events are sparse by design: the pool logs runtime rebuilds, readiness
//! promotions, deferred drains, and discarded failures, not individual task
//! executions.

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Pool facade lifecycle events (abort, reset, deferred drain).
    pub const POOL: &str = "taskmill::pool";
    /// Worker loop and readiness scanner.
    pub const RUNTIME: &str = "taskmill::runtime";
    /// Result-channel events.
    pub const FUTURE: &str = "taskmill::future";
}

//! Execution contexts
//!
//! An execution context is the designated place a unit of work must run on,
//! e.g. the thread that owns user interface state. The message bus and view
//! models marshal work through this contract; they never know how the
//! context is implemented.

use std::fmt::Debug;

/// Dedicated worker-thread context
pub mod dedicated;

pub use dedicated::DedicatedExecutionContext;

/// A unit of work submitted to an execution context
pub type Work = Box<dyn FnOnce() + Send + 'static>;

/// Runs submitted work on a designated context
pub trait ExecutionContext: Send + Sync + Debug {
    /// Schedule `work` to run on the designated context and return immediately
    fn submit(&self, work: Work);

    /// Report if the caller is not already running on the designated context
    #[cfg(debug_assertions)]
    fn assert_current_context(&self) {}
}

/// Runs work synchronously on the calling thread
///
/// Used for design-time view models and tests where no marshaling is needed.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutionContext;

impl InlineExecutionContext {
    /// Create a new inline context
    pub fn new() -> Self {
        Self
    }
}

impl ExecutionContext for InlineExecutionContext {
    fn submit(&self, work: Work) {
        work();
    }
}

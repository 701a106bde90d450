//! Execution context that holds work until the test runs it.

use parking_lot::Mutex;
use plate_core::{ExecutionContext, Work};
use std::collections::VecDeque;
use std::fmt;

/// Queues submitted work; nothing runs until [`QueuedExecutionContext::run_pending`].
#[derive(Default)]
pub struct QueuedExecutionContext {
    queue: Mutex<VecDeque<Work>>,
}

impl QueuedExecutionContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued units of work.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Runs queued work until the queue is empty, including work submitted
    /// while running. Returns how many units ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            // Never hold the lock while running work
            let next = self.queue.lock().pop_front();
            match next {
                Some(work) => {
                    work();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }
}

impl ExecutionContext for QueuedExecutionContext {
    fn submit(&self, work: Work) {
        self.queue.lock().push_back(work);
    }
}

impl fmt::Debug for QueuedExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedExecutionContext")
            .field("pending", &self.pending())
            .finish()
    }
}

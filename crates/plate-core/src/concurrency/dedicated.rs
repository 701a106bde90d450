use std::fmt;
use std::thread::{self, JoinHandle, ThreadId};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use super::{ExecutionContext, Work};

/// Execution context backed by a single named worker thread
///
/// Work runs in submission order. Submitting never blocks. The worker stops
/// once the context is dropped and every queued item has run.
pub struct DedicatedExecutionContext {
    name: String,
    thread_id: ThreadId,
    sender: Option<mpsc::UnboundedSender<Work>>,
    worker: Option<JoinHandle<()>>,
}

impl DedicatedExecutionContext {
    /// Spawn the worker thread for a new context
    pub fn spawn(name: impl Into<String>) -> std::io::Result<Self> {
        let name = name.into();
        let (sender, mut receiver) = mpsc::unbounded_channel::<Work>();

        let worker_name = name.clone();
        let worker = thread::Builder::new().name(name.clone()).spawn(move || {
            debug!("Execution context {} started", worker_name);
            while let Some(work) = receiver.blocking_recv() {
                work();
            }
            debug!("Execution context {} stopped", worker_name);
        })?;

        Ok(Self {
            name,
            thread_id: worker.thread().id(),
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    /// Name of the worker thread
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true when called from the worker thread
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Block until every unit of work submitted before this call has run
    ///
    /// Returns immediately when called from the worker thread itself.
    /// Must not be called from inside an async runtime.
    pub fn flush(&self) {
        if self.is_current() {
            trace!("Flush requested on execution context {} from its own thread", self.name);
            return;
        }

        let (done_tx, done_rx) = oneshot::channel();
        self.submit(Box::new(move || {
            let _ = done_tx.send(());
        }));

        if done_rx.blocking_recv().is_err() {
            warn!("Execution context {} stopped before flush completed", self.name);
        }
    }
}

impl ExecutionContext for DedicatedExecutionContext {
    fn submit(&self, work: Work) {
        match &self.sender {
            Some(sender) => {
                if sender.send(work).is_err() {
                    warn!("Execution context {} is no longer running, work dropped", self.name);
                }
            }
            None => warn!("Execution context {} is shutting down, work dropped", self.name),
        }
    }

    #[cfg(debug_assertions)]
    fn assert_current_context(&self) {
        assert!(
            self.is_current(),
            "expected to run on execution context '{}' but running on thread {:?}",
            self.name,
            thread::current().name()
        );
    }
}

impl fmt::Debug for DedicatedExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DedicatedExecutionContext")
            .field("name", &self.name)
            .field("thread_id", &self.thread_id)
            .finish()
    }
}

impl Drop for DedicatedExecutionContext {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain and exit
        self.sender.take();

        if let Some(worker) = self.worker.take() {
            if self.is_current() {
                return;
            }
            if worker.join().is_err() {
                warn!("Execution context {} worker panicked", self.name);
            }
        }
    }
}

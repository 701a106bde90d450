//! Flow services backed by in-memory collaborators.

use crate::implementations::LoopbackNavigationHost;
use plate_core::{
    ExecutionContext, FlowServices, InMemoryViewModelLocator, ThreadSafeMessageBus, ViewModel,
};
use std::fmt;
use std::sync::Arc;

/// In-memory collaborators for one or more flows under test.
///
/// Tests keep the concrete handles to publish messages, register view models
/// and inspect navigation; flows get the trait objects from [`Self::services`].
#[derive(Clone)]
pub struct TestFlowServices {
    /// Bus the flows subscribe to
    pub bus: Arc<ThreadSafeMessageBus>,
    /// Locator resolving step view models
    pub locator: Arc<InMemoryViewModelLocator>,
    /// Host recording and looping back navigation
    pub host: Arc<LoopbackNavigationHost>,
    /// Context handed to flows for error handlers
    pub context: Option<Arc<dyn ExecutionContext>>,
}

impl TestFlowServices {
    /// Fresh collaborators; error handlers run on the publishing thread.
    pub fn new() -> Self {
        Self {
            bus: Arc::new(ThreadSafeMessageBus::new()),
            locator: Arc::new(InMemoryViewModelLocator::new()),
            host: Arc::new(LoopbackNavigationHost::new()),
            context: None,
        }
    }

    /// Run error handlers on `context`.
    pub fn with_context(mut self, context: Arc<dyn ExecutionContext>) -> Self {
        self.context = Some(context);
        self
    }

    /// Register and return a view model.
    pub fn register<VM: ViewModel>(&self, view_model: VM) -> Arc<VM> {
        let view_model = Arc::new(view_model);
        self.locator.register(view_model.clone());
        view_model
    }

    /// The services handed to a flow engine.
    pub fn services(&self) -> FlowServices {
        FlowServices {
            host: self.host.clone(),
            locator: self.locator.clone(),
            bus: self.bus.clone(),
            context: self.context.clone(),
        }
    }
}

impl Default for TestFlowServices {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TestFlowServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestFlowServices")
            .field("bus", &self.bus)
            .field("view_models", &self.locator.len())
            .field("host", &self.host)
            .field("context", &self.context)
            .finish()
    }
}

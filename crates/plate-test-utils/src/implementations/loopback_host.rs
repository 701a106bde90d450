//! Navigation host that records requests and reports them back to the flows.

use parking_lot::Mutex;
use plate_core::{CoreError, FlowKind, NavigationHost, NavigationRequest, UserInterfaceFlow};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::warn;

/// Records every navigation request and, when the target flow is registered,
/// completes the navigation by calling `on_goto` (forward) or `on_back`
/// (backward) on it, the way a real host reports arrival.
#[derive(Default)]
pub struct LoopbackNavigationHost {
    requests: Mutex<Vec<NavigationRequest>>,
    flows: Mutex<HashMap<FlowKind, Weak<dyn UserInterfaceFlow>>>,
    errors: Mutex<Vec<CoreError>>,
}

impl LoopbackNavigationHost {
    /// Creates a host with no registered flows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loops navigation requests for `flow`'s kind back into it.
    pub fn register<F: UserInterfaceFlow + 'static>(&self, flow: &Arc<F>) {
        let flow: Arc<dyn UserInterfaceFlow> = flow.clone();
        self.flows
            .lock()
            .insert(flow.kind().clone(), Arc::downgrade(&flow));
    }

    /// All requests received so far, oldest first.
    pub fn requests(&self) -> Vec<NavigationRequest> {
        self.requests.lock().clone()
    }

    /// The most recent request.
    pub fn last_request(&self) -> Option<NavigationRequest> {
        self.requests.lock().last().cloned()
    }

    /// Errors returned by flows while completing a navigation.
    pub fn errors(&self) -> Vec<CoreError> {
        self.errors.lock().clone()
    }

    /// Forgets recorded requests and errors.
    pub fn clear(&self) {
        self.requests.lock().clear();
        self.errors.lock().clear();
    }
}

impl NavigationHost for LoopbackNavigationHost {
    fn navigate(&self, request: &NavigationRequest) {
        self.requests.lock().push(request.clone());

        let target = self.flows.lock().get(&request.flow).and_then(Weak::upgrade);
        let Some(flow) = target else {
            return;
        };

        let step = request.step.as_ref().map(|s| s.as_str());
        let params = request.params.as_ref();
        let result = if request.forward {
            flow.on_goto(step, params)
        } else {
            flow.on_back(step, params)
        };

        if let Err(error) = result {
            warn!(flow = %request.flow, %error, "Flow rejected navigation");
            self.errors.lock().push(error);
        }
    }
}

impl fmt::Debug for LoopbackNavigationHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopbackNavigationHost")
            .field("requests", &self.requests.lock().len())
            .field("flows", &self.flows.lock().len())
            .finish()
    }
}

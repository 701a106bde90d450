//! User interface flows
//!
//! A flow is a named, ordered sequence of steps representing one coherent
//! user task. The navigation host drives a flow through its transitions
//! (enter, exit, cancel, return, goto, back) and the flow moves its cursor,
//! runs step hooks against the bound view models and asks the host to
//! navigate when it decides to move on by itself.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::config::FlowOptions;
use crate::error::CoreResult;
use crate::viewmodel::ViewModelKind;

/// The step-routing state machine
pub mod engine;
/// Navigation host contract and requests
pub mod navigation;
/// Step routing policies
pub mod route;
/// Step sequences and the current-step cursor
pub mod sequence;
/// Step definitions
pub mod step;

pub use engine::{FlowEngine, FlowServices};
pub use navigation::{
    BackNavigation, NavigationHost, NavigationOptions, NavigationParams, NavigationRequest,
    COMMUNICATION_PROBLEM_NOTIFICATION, FAILURE_NOTIFICATION, NETWORK_PROBLEM_NOTIFICATION,
    SCRIPT_PARAMETER,
};
pub use route::{FlowStepRoute, StepProvider};
pub use sequence::{CurrentStep, StepSequence, TemporaryStep};
pub use step::{FlowStep, FlowStepBuilder, StepName};

/// Value object: kind of a flow, used by the navigation host to address it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowKind(pub String);

impl FlowKind {
    /// Create a flow kind
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    /// The kind as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FlowKind {
    fn from(kind: &str) -> Self {
        Self(kind.to_string())
    }
}

/// Value object: identity of one flow instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowInstanceId(pub String);

impl FlowInstanceId {
    /// A fresh random id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for FlowInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// State a flow persists through `serialize`/`deserialize`
pub trait FlowState: Serialize + DeserializeOwned + Default + Send + 'static {}

impl<T> FlowState for T where T: Serialize + DeserializeOwned + Default + Send + 'static {}

/// Persisted state of flows without custom fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyState {}

/// A flow as seen by the navigation host and by other flows
pub trait UserInterfaceFlow: Send + Sync {
    /// Kind of the flow
    fn kind(&self) -> &FlowKind;

    /// Identity of this instance
    fn instance_id(&self) -> &FlowInstanceId;

    /// Static options of the flow
    fn options(&self) -> &FlowOptions;

    /// The application's default flow
    fn is_default(&self) -> bool {
        self.options().is_default
    }

    /// The flow may be used as a startup point
    fn is_startup_point(&self) -> bool {
        self.options().is_startup_point
    }

    /// True between a completed enter/return and the next exit/cancel
    fn is_active(&self) -> bool;

    /// Change the active flag, subscribing or unsubscribing error handling on change
    fn set_active(&self, is_active: bool);

    /// The flow this one was entered from
    fn previous_flow(&self) -> Option<Arc<dyn UserInterfaceFlow>>;

    /// Name of the initial step
    fn initial_step(&self) -> CoreResult<StepName>;

    /// Name of the current step; `None` before any step or on a temporary step
    fn current_step(&self) -> Option<StepName>;

    /// View-model kind bound to the step called `step`
    fn view_model_kind_for_step(&self, step: &str) -> CoreResult<ViewModelKind>;

    /// Start the flow from scratch
    fn enter(&self, from: Option<Arc<dyn UserInterfaceFlow>>, params: Option<&NavigationParams>);

    /// Resume the flow when control comes back from a nested flow
    fn return_to(&self, from: Option<Arc<dyn UserInterfaceFlow>>, params: Option<&NavigationParams>);

    /// Leave the flow forward
    fn exit(&self, to: Option<Arc<dyn UserInterfaceFlow>>);

    /// Back out of the flow
    fn cancel(&self, to: Option<Arc<dyn UserInterfaceFlow>>);

    /// Navigate to the logically next step
    fn next(&self) -> CoreResult<()>;

    /// The host navigated forward to `step` (`None` is the initial step)
    fn on_goto(&self, step: Option<&str>, params: Option<&NavigationParams>) -> CoreResult<()>;

    /// The host navigated back to `step` (`None` is the initial step)
    fn on_back(&self, step: Option<&str>, params: Option<&NavigationParams>) -> CoreResult<()>;

    /// Inspect the back route of `step` (`None` is the current step) before going back
    fn before_back(&self, step: Option<&str>) -> CoreResult<BackNavigation>;

    /// Dispatch a command to the current step
    fn execute_command(&self, command: &str, argument: Option<&Value>) -> CoreResult<()>;

    /// Serialize the persisted state
    fn serialize(&self) -> CoreResult<String>;

    /// Restore the persisted state
    fn deserialize(&self, state: &str) -> CoreResult<()>;
}

impl fmt::Debug for dyn UserInterfaceFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserInterfaceFlow")
            .field("kind", self.kind())
            .field("instance_id", self.instance_id())
            .field("is_active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_ids_are_unique() {
        assert_ne!(FlowInstanceId::generate(), FlowInstanceId::generate());
    }

    #[test]
    fn test_empty_state_serializes_to_empty_object() {
        assert_eq!(serde_json::to_string(&EmptyState::default()).unwrap(), "{}");
    }

    #[test]
    fn test_flow_kind_display() {
        assert_eq!(FlowKind::from("checkout").to_string(), "checkout");
    }
}

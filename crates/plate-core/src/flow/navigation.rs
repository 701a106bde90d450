use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::step::StepName;
use super::FlowKind;

/// Parameters passed along with a navigation
pub type NavigationParams = HashMap<String, String>;

/// Parameter naming a script to run on the page after navigation
pub const SCRIPT_PARAMETER: &str = "script";

/// Notification key used when a generic failure is surfaced
pub const FAILURE_NOTIFICATION: &str = "Failure";

/// Notification key used when a communication error is surfaced
pub const COMMUNICATION_PROBLEM_NOTIFICATION: &str = "CommunicationProblem";

/// Notification key used when a network error is surfaced
pub const NETWORK_PROBLEM_NOTIFICATION: &str = "NetworkProblem";

/// A request for the navigation host to physically move somewhere
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationRequest {
    /// Target flow
    pub flow: FlowKind,

    /// Target step; `None` means the flow's initial step
    pub step: Option<StepName>,

    /// Push onto the back stack (`true`) or go back (`false`)
    pub forward: bool,

    /// Notification overlay to show on arrival
    pub notification_key: Option<String>,

    /// Extra parameters
    pub params: Option<NavigationParams>,
}

impl NavigationRequest {
    /// Navigate back to the default step of `flow`
    pub fn back_to_flow(flow: FlowKind) -> Self {
        Self {
            flow,
            step: None,
            forward: false,
            notification_key: None,
            params: None,
        }
    }
}

/// Performs navigation on behalf of flows
///
/// The host may call back into the flow (`on_goto`, `on_back`) before
/// `navigate` returns.
pub trait NavigationHost: Send + Sync {
    /// Physically navigate to the requested flow and step
    fn navigate(&self, request: &NavigationRequest);
}

/// How a flow asks to navigate to one of its own steps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationOptions {
    /// Direction of the navigation
    pub forward: bool,
    /// Notification overlay key
    pub notification_key: Option<String>,
    /// Notification title written to the view model
    pub title: Option<String>,
    /// Notification message written to the view model
    pub message: Option<String>,
    /// Script to run after arrival
    pub script: Option<String>,
}

impl NavigationOptions {
    /// Plain forward navigation
    pub fn forward() -> Self {
        Self {
            forward: true,
            notification_key: None,
            title: None,
            message: None,
            script: None,
        }
    }

    /// Plain backward navigation
    pub fn backward() -> Self {
        Self {
            forward: false,
            ..Self::forward()
        }
    }

    /// Show a notification overlay on arrival
    pub fn with_notification(
        mut self,
        key: impl Into<String>,
        title: Option<String>,
        message: Option<String>,
    ) -> Self {
        self.notification_key = Some(key.into());
        self.title = title;
        self.message = message;
        self
    }

    /// Run `script` on the page after arrival
    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.script = Some(script.into());
        self
    }
}

impl Default for NavigationOptions {
    fn default() -> Self {
        Self::forward()
    }
}

/// What `before_back` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackNavigation {
    /// Navigation was delegated to the previous flow
    PreviousFlow(FlowKind),
    /// Back navigation was redirected to a step of this flow
    Step(StepName),
    /// Nothing to do, the host performs its default back navigation
    Default,
}

use std::fmt;
use std::sync::Arc;

use super::sequence::StepSequence;
use super::step::{FlowStep, StepName};

/// Computes a target step from the flow's step sequence
pub type StepProvider = Arc<dyn Fn(&StepSequence) -> Option<Arc<FlowStep>> + Send + Sync>;

/// Routing policy for leaving a step forward or backward
#[derive(Clone, Default)]
pub enum FlowStepRoute {
    /// Take the structurally adjacent step in the sequence
    #[default]
    Automatic,
    /// Jump to a dynamically computed step
    To(StepProvider),
    /// Abort the enclosing flow and go back to the previous flow
    CancelFlow,
}

impl FlowStepRoute {
    /// Route to the step returned by `provider`
    pub fn to<F>(provider: F) -> Self
    where
        F: Fn(&StepSequence) -> Option<Arc<FlowStep>> + Send + Sync + 'static,
    {
        Self::To(Arc::new(provider))
    }

    /// Route to the step called `name`
    pub fn to_step(name: impl Into<StepName>) -> Self {
        let name = name.into();
        Self::to(move |steps| steps.find(name.as_str()))
    }

    /// True for [`FlowStepRoute::Automatic`]
    pub fn is_automatic(&self) -> bool {
        matches!(self, Self::Automatic)
    }

    /// True for [`FlowStepRoute::CancelFlow`]
    pub fn is_cancel_flow(&self) -> bool {
        matches!(self, Self::CancelFlow)
    }

    /// Evaluate a `To` route; `None` for the other variants
    pub fn target(&self, steps: &StepSequence) -> Option<Arc<FlowStep>> {
        match self {
            Self::To(provider) => provider(steps),
            _ => None,
        }
    }
}

impl fmt::Debug for FlowStepRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Automatic => f.write_str("Automatic"),
            Self::To(_) => f.write_str("To(..)"),
            Self::CancelFlow => f.write_str("CancelFlow"),
        }
    }
}

use std::fmt;
use std::sync::Arc;

use super::route::FlowStepRoute;
use super::step::{FlowStep, StepName};
use crate::viewmodel::ViewModelKind;

/// The ordered steps of one flow
#[derive(Debug, Clone, Default)]
pub struct StepSequence {
    steps: Vec<Arc<FlowStep>>,
}

impl StepSequence {
    /// Create a sequence in declaration order
    pub fn new(steps: Vec<FlowStep>) -> Self {
        Self {
            steps: steps.into_iter().map(Arc::new).collect(),
        }
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True when the flow declares no steps
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Steps in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<FlowStep>> {
        self.steps.iter()
    }

    /// The first step flagged initial, else the first step
    pub fn initial(&self) -> Option<Arc<FlowStep>> {
        self.steps
            .iter()
            .find(|step| step.is_initial())
            .or_else(|| self.steps.first())
            .cloned()
    }

    /// Exact-match lookup by name
    pub fn find(&self, name: &str) -> Option<Arc<FlowStep>> {
        self.steps.iter().find(|step| step.name().as_str() == name).cloned()
    }

    /// First step bound to `kind`
    pub fn find_by_view_model(&self, kind: ViewModelKind) -> Option<Arc<FlowStep>> {
        self.steps.iter().find(|step| step.view_model_kind() == kind).cloned()
    }

    /// The step declared right after `step`
    pub fn next_after(&self, step: &Arc<FlowStep>) -> Option<Arc<FlowStep>> {
        let position = self.position(step)?;
        self.steps.get(position + 1).cloned()
    }

    /// The step declared right before `step`
    pub fn previous_before(&self, step: &Arc<FlowStep>) -> Option<Arc<FlowStep>> {
        let position = self.position(step)?;
        position.checked_sub(1).and_then(|p| self.steps.get(p)).cloned()
    }

    fn position(&self, step: &Arc<FlowStep>) -> Option<usize> {
        self.steps.iter().position(|candidate| Arc::ptr_eq(candidate, step))
    }
}

/// Synthetic step entered when the host navigates somewhere the flow does not declare
///
/// It carries only a back route so that going back returns to the step that
/// was current before the detour. It is never part of a [`StepSequence`].
#[derive(Debug, Clone, Default)]
pub struct TemporaryStep {
    back: FlowStepRoute,
}

impl TemporaryStep {
    /// A temporary step whose back route leads to `leaving`
    ///
    /// Leaving another temporary step keeps that step's back route, so a chain of
    /// detours still leads back to the last declared step.
    pub fn returning_to(leaving: Option<&CurrentStep>) -> Self {
        let back = match leaving {
            Some(CurrentStep::Declared(step)) => {
                let step = step.clone();
                FlowStepRoute::to(move |_| Some(step.clone()))
            }
            Some(CurrentStep::Temporary(temporary)) => temporary.back.clone(),
            None => FlowStepRoute::Automatic,
        };
        Self { back }
    }

    /// Backward routing policy
    pub fn back_route(&self) -> &FlowStepRoute {
        &self.back
    }
}

/// The step a flow is currently positioned on
#[derive(Debug, Clone)]
pub enum CurrentStep {
    /// A step from the flow's sequence
    Declared(Arc<FlowStep>),
    /// A synthetic step outside the sequence
    Temporary(TemporaryStep),
}

impl CurrentStep {
    /// The declared step, if this is one
    pub fn declared(&self) -> Option<&Arc<FlowStep>> {
        match self {
            Self::Declared(step) => Some(step),
            Self::Temporary(_) => None,
        }
    }

    /// Name of the declared step
    pub fn name(&self) -> Option<&StepName> {
        self.declared().map(|step| step.name())
    }

    /// View-model kind of the declared step; temporary steps have none
    pub fn view_model_kind(&self) -> Option<ViewModelKind> {
        self.declared().map(|step| step.view_model_kind())
    }

    /// Only declared steps can be final
    pub fn is_final(&self) -> bool {
        self.declared().map(|step| step.is_final()).unwrap_or(false)
    }

    /// Forward routing policy; temporary steps route automatically
    pub fn next_route(&self) -> FlowStepRoute {
        match self {
            Self::Declared(step) => step.next_route().clone(),
            Self::Temporary(_) => FlowStepRoute::Automatic,
        }
    }

    /// Backward routing policy
    pub fn back_route(&self) -> FlowStepRoute {
        match self {
            Self::Declared(step) => step.back_route().clone(),
            Self::Temporary(temporary) => temporary.back_route().clone(),
        }
    }

    /// True for [`CurrentStep::Temporary`]
    pub fn is_temporary(&self) -> bool {
        matches!(self, Self::Temporary(_))
    }
}

impl fmt::Display for CurrentStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Declared(step) => write!(f, "{}", step.name()),
            Self::Temporary(_) => f.write_str("Temporary Step"),
        }
    }
}

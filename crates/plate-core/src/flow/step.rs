use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::route::FlowStepRoute;
use crate::viewmodel::{ViewModel, ViewModelKind};

/// Value object: logical step name, unique within one flow
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepName(pub String);

impl StepName {
    /// Create a step name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StepName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for StepName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Lifecycle hook, erased to the view-model contract
pub type StepHook = Arc<dyn Fn(&dyn ViewModel) + Send + Sync>;

/// Command hook receiving the view model, the command name and its argument
pub type CommandHook = Arc<dyn Fn(&dyn ViewModel, &str, Option<&Value>) + Send + Sync>;

/// One addressable step of a flow
///
/// Steps are defined once when the flow is built and never change afterwards.
#[derive(Clone)]
pub struct FlowStep {
    name: StepName,
    view_model_kind: ViewModelKind,
    is_initial: bool,
    is_final: bool,
    next: FlowStepRoute,
    back: FlowStepRoute,
    on_enter: Option<StepHook>,
    on_exit: Option<StepHook>,
    on_return: Option<StepHook>,
    on_cancel: Option<StepHook>,
    on_do: Option<CommandHook>,
}

impl FlowStep {
    /// Start defining a step bound to view-model type `VM`
    #[allow(clippy::new_ret_no_self)]
    pub fn new<VM: ViewModel>(name: impl Into<StepName>) -> FlowStepBuilder<VM> {
        FlowStepBuilder {
            step: FlowStep {
                name: name.into(),
                view_model_kind: ViewModelKind::of::<VM>(),
                is_initial: false,
                is_final: false,
                next: FlowStepRoute::Automatic,
                back: FlowStepRoute::Automatic,
                on_enter: None,
                on_exit: None,
                on_return: None,
                on_cancel: None,
                on_do: None,
            },
            _view_model: PhantomData,
        }
    }

    /// Logical name of the step
    pub fn name(&self) -> &StepName {
        &self.name
    }

    /// Kind of view model bound to this step
    pub fn view_model_kind(&self) -> ViewModelKind {
        self.view_model_kind
    }

    /// Flagged as the flow's starting step
    pub fn is_initial(&self) -> bool {
        self.is_initial
    }

    /// Flagged as a dead end for `next`
    pub fn is_final(&self) -> bool {
        self.is_final
    }

    /// Forward routing policy
    pub fn next_route(&self) -> &FlowStepRoute {
        &self.next
    }

    /// Backward routing policy
    pub fn back_route(&self) -> &FlowStepRoute {
        &self.back
    }

    /// Run the enter hook, if any
    pub fn run_on_enter(&self, view_model: &dyn ViewModel) {
        run(&self.on_enter, view_model);
    }

    /// Run the exit hook, if any
    pub fn run_on_exit(&self, view_model: &dyn ViewModel) {
        run(&self.on_exit, view_model);
    }

    /// Run the return hook, if any
    pub fn run_on_return(&self, view_model: &dyn ViewModel) {
        run(&self.on_return, view_model);
    }

    /// Run the cancel hook, if any
    pub fn run_on_cancel(&self, view_model: &dyn ViewModel) {
        run(&self.on_cancel, view_model);
    }

    /// Run the command hook, if any
    pub fn run_on_do(&self, view_model: &dyn ViewModel, command: &str, argument: Option<&Value>) {
        if let Some(hook) = &self.on_do {
            hook(view_model, command, argument);
        }
    }
}

fn run(hook: &Option<StepHook>, view_model: &dyn ViewModel) {
    if let Some(hook) = hook {
        hook(view_model);
    }
}

impl fmt::Debug for FlowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowStep")
            .field("name", &self.name)
            .field("view_model_kind", &self.view_model_kind)
            .field("is_initial", &self.is_initial)
            .field("is_final", &self.is_final)
            .field("next", &self.next)
            .field("back", &self.back)
            .finish()
    }
}

/// Typed builder for [`FlowStep`]
///
/// Hooks are written against the concrete view-model type and erased when
/// they are attached.
pub struct FlowStepBuilder<VM: ViewModel> {
    step: FlowStep,
    _view_model: PhantomData<fn(&VM)>,
}

impl<VM: ViewModel> FlowStepBuilder<VM> {
    /// Mark as the initial step
    pub fn initial(mut self) -> Self {
        self.step.is_initial = true;
        self
    }

    /// Mark as a final step
    pub fn final_step(mut self) -> Self {
        self.step.is_final = true;
        self
    }

    /// Forward routing policy
    pub fn next(mut self, route: FlowStepRoute) -> Self {
        self.step.next = route;
        self
    }

    /// Backward routing policy
    pub fn back(mut self, route: FlowStepRoute) -> Self {
        self.step.back = route;
        self
    }

    /// Called when the step becomes current going forward
    pub fn on_enter<F>(mut self, hook: F) -> Self
    where
        F: Fn(&VM) + Send + Sync + 'static,
    {
        self.step.on_enter = Some(self.erase("on_enter", hook));
        self
    }

    /// Called when the step is left going forward
    pub fn on_exit<F>(mut self, hook: F) -> Self
    where
        F: Fn(&VM) + Send + Sync + 'static,
    {
        self.step.on_exit = Some(self.erase("on_exit", hook));
        self
    }

    /// Called when the step becomes current going back
    pub fn on_return<F>(mut self, hook: F) -> Self
    where
        F: Fn(&VM) + Send + Sync + 'static,
    {
        self.step.on_return = Some(self.erase("on_return", hook));
        self
    }

    /// Called when the step is left going back
    pub fn on_cancel<F>(mut self, hook: F) -> Self
    where
        F: Fn(&VM) + Send + Sync + 'static,
    {
        self.step.on_cancel = Some(self.erase("on_cancel", hook));
        self
    }

    /// Called for every command dispatched while the step is current
    pub fn on_do<F>(mut self, hook: F) -> Self
    where
        F: Fn(&VM, &str, Option<&Value>) + Send + Sync + 'static,
    {
        let step = self.step.name.clone();
        self.step.on_do = Some(Arc::new(
            move |view_model: &dyn ViewModel, command: &str, argument: Option<&Value>| {
                match view_model.as_any().downcast_ref::<VM>() {
                    Some(typed) => hook(typed, command, argument),
                    None => mismatch::<VM>(&step, "on_do", view_model),
                }
            },
        ));
        self
    }

    /// Finish the definition
    pub fn build(self) -> FlowStep {
        self.step
    }

    fn erase<F>(&self, hook_name: &'static str, hook: F) -> StepHook
    where
        F: Fn(&VM) + Send + Sync + 'static,
    {
        let step = self.step.name.clone();
        Arc::new(move |view_model: &dyn ViewModel| {
            match view_model.as_any().downcast_ref::<VM>() {
                Some(typed) => hook(typed),
                None => mismatch::<VM>(&step, hook_name, view_model),
            }
        })
    }
}

impl<VM: ViewModel> From<FlowStepBuilder<VM>> for FlowStep {
    fn from(builder: FlowStepBuilder<VM>) -> Self {
        builder.build()
    }
}

fn mismatch<VM: ViewModel>(step: &StepName, hook: &str, view_model: &dyn ViewModel) {
    warn!(
        %step,
        hook,
        expected = %ViewModelKind::of::<VM>(),
        actual = %view_model.kind(),
        "Step hook skipped, bound view model has an unexpected type"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewmodel::ViewModelBase;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct CartViewModel {
        base: ViewModelBase,
        log: Mutex<Vec<String>>,
    }

    impl ViewModel for CartViewModel {
        fn base(&self) -> &ViewModelBase {
            &self.base
        }
    }

    #[derive(Default)]
    struct OtherViewModel {
        base: ViewModelBase,
    }

    impl ViewModel for OtherViewModel {
        fn base(&self) -> &ViewModelBase {
            &self.base
        }
    }

    fn cart_step() -> FlowStep {
        FlowStep::new::<CartViewModel>("cart")
            .initial()
            .on_enter(|vm: &CartViewModel| vm.log.lock().push("enter".into()))
            .on_exit(|vm: &CartViewModel| vm.log.lock().push("exit".into()))
            .on_return(|vm: &CartViewModel| vm.log.lock().push("return".into()))
            .on_cancel(|vm: &CartViewModel| vm.log.lock().push("cancel".into()))
            .on_do(|vm: &CartViewModel, command: &str, argument: Option<&Value>| {
                let argument = argument.map(|a| a.to_string()).unwrap_or_default();
                vm.log.lock().push(format!("do:{}:{}", command, argument));
            })
            .build()
    }

    #[test]
    fn test_builder_defaults() {
        let step: FlowStep = FlowStep::new::<CartViewModel>("cart").into();

        assert_eq!(step.name().as_str(), "cart");
        assert_eq!(step.view_model_kind(), ViewModelKind::of::<CartViewModel>());
        assert!(!step.is_initial());
        assert!(!step.is_final());
        assert!(step.next_route().is_automatic());
        assert!(step.back_route().is_automatic());
    }

    #[test]
    fn test_hooks_receive_typed_view_model() {
        let step = cart_step();
        let vm = CartViewModel::default();

        step.run_on_enter(&vm);
        step.run_on_exit(&vm);
        step.run_on_return(&vm);
        step.run_on_cancel(&vm);
        step.run_on_do(&vm, "checkout", Some(&serde_json::json!(2)));

        assert_eq!(
            *vm.log.lock(),
            vec!["enter", "exit", "return", "cancel", "do:checkout:2"]
        );
        assert!(step.is_initial());
    }

    #[test]
    fn test_hook_with_mismatched_view_model_is_skipped() {
        let step = cart_step();
        let other = OtherViewModel::default();

        step.run_on_enter(&other);
        step.run_on_do(&other, "checkout", None);
    }

    #[test]
    fn test_missing_hooks_are_noops() {
        let step = FlowStep::new::<CartViewModel>("cart").final_step().build();
        let vm = CartViewModel::default();

        step.run_on_enter(&vm);
        step.run_on_do(&vm, "anything", None);

        assert!(vm.log.lock().is_empty());
        assert!(step.is_final());
    }
}

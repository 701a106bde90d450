use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex};
use serde_json::Value;
use tracing::{debug, trace};

use super::navigation::{
    BackNavigation, NavigationHost, NavigationOptions, NavigationParams, NavigationRequest,
    COMMUNICATION_PROBLEM_NOTIFICATION, FAILURE_NOTIFICATION, NETWORK_PROBLEM_NOTIFICATION,
    SCRIPT_PARAMETER,
};
use super::route::FlowStepRoute;
use super::sequence::{CurrentStep, StepSequence, TemporaryStep};
use super::step::{FlowStep, StepName};
use super::{EmptyState, FlowInstanceId, FlowKind, FlowState, UserInterfaceFlow};
use crate::concurrency::ExecutionContext;
use crate::config::FlowOptions;
use crate::error::{CoreError, CoreResult};
use crate::messaging::{
    CommunicationErrorOccurred, Failure, MessageBus, MessageBusExt, MessageKind,
    NetworkErrorOccurred, SubscriberId,
};
use crate::viewmodel::{ViewModel, ViewModelKind, ViewModelLocator};

/// Collaborators a flow talks to
#[derive(Clone)]
pub struct FlowServices {
    /// Performs the physical navigation
    pub host: Arc<dyn NavigationHost>,
    /// Resolves the view model bound to a step
    pub locator: Arc<dyn ViewModelLocator>,
    /// Delivers ambient error messages
    pub bus: Arc<dyn MessageBus>,
    /// Where error handlers run; `None` runs them on the publishing thread
    pub context: Option<Arc<dyn ExecutionContext>>,
}

impl fmt::Debug for FlowServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowServices")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

struct EngineState {
    current: Option<CurrentStep>,
    is_active: bool,
    previous: Option<Arc<dyn UserInterfaceFlow>>,
    suppress_error_handling: bool,
}

/// The step-routing state machine behind every flow
///
/// The engine is driven from one logical context at a time. Its state sits
/// behind a short-lived lock that is never held while hooks, the navigation
/// host or the message bus run, so any of them may call back into the flow.
pub struct FlowEngine<S: FlowState = EmptyState> {
    kind: FlowKind,
    instance_id: FlowInstanceId,
    steps: StepSequence,
    services: FlowServices,
    options: FlowOptions,
    state: Mutex<EngineState>,
    // Separate from `state` so readers may call back into the flow
    custom: ReentrantMutex<RefCell<S>>,
    this: Weak<Self>,
}

impl<S: FlowState> FlowEngine<S> {
    /// Create a flow with default options
    pub fn new(kind: impl Into<FlowKind>, steps: Vec<FlowStep>, services: FlowServices) -> Arc<Self> {
        Self::with_options(kind, steps, services, FlowOptions::default())
    }

    /// Create a flow with explicit options
    pub fn with_options(
        kind: impl Into<FlowKind>,
        steps: Vec<FlowStep>,
        services: FlowServices,
        options: FlowOptions,
    ) -> Arc<Self> {
        let kind = kind.into();
        let instance_id = FlowInstanceId::generate();
        debug!(flow = %kind, instance = %instance_id, steps = steps.len(), "Creating flow");

        Arc::new_cyclic(|this| Self {
            kind,
            instance_id,
            steps: StepSequence::new(steps),
            state: Mutex::new(EngineState {
                current: None,
                is_active: false,
                previous: None,
                suppress_error_handling: options.suppress_error_handling,
            }),
            custom: ReentrantMutex::new(RefCell::new(S::default())),
            services,
            options,
            this: this.clone(),
        })
    }

    /// The declared steps
    pub fn steps(&self) -> &StepSequence {
        &self.steps
    }

    /// The step the flow is positioned on
    pub fn current(&self) -> Option<CurrentStep> {
        self.state.lock().current.clone()
    }

    /// View model bound to the current step
    pub fn current_view_model(&self) -> Option<Arc<dyn ViewModel>> {
        self.current().and_then(|step| self.view_model_for(&step))
    }

    /// Look up any view model known to the locator by type
    pub fn find_view_model<VM: ViewModel>(&self) -> Option<Arc<VM>> {
        self.services
            .locator
            .resolve(ViewModelKind::of::<VM>())?
            .into_any_arc()
            .downcast::<VM>()
            .ok()
    }

    /// Toggle the busy indicator of the current view model
    pub fn set_busy(&self, is_busy: bool, message: Option<&str>) {
        if let Some(view_model) = self.current_view_model() {
            view_model.set_busy(is_busy, message);
        }
    }

    /// Stop reacting to ambient error messages, starting with the next activation
    pub fn set_suppress_error_handling(&self, suppress: bool) {
        self.state.lock().suppress_error_handling = suppress;
    }

    /// True when ambient error messages are ignored
    pub fn suppresses_error_handling(&self) -> bool {
        self.state.lock().suppress_error_handling
    }

    /// Read the persisted state
    ///
    /// `read` may call back into the flow, including `serialize` and
    /// nested `with_state`.
    pub fn with_state<R>(&self, read: impl FnOnce(&S) -> R) -> R {
        let guard = self.custom.lock();
        let state = guard.borrow();
        read(&state)
    }

    /// Modify the persisted state
    ///
    /// `update` may drive the flow but must not read the persisted state
    /// again (`with_state`, `serialize`); doing so panics.
    pub fn update_state<R>(&self, update: impl FnOnce(&mut S) -> R) -> R {
        let guard = self.custom.lock();
        let mut state = guard.borrow_mut();
        update(&mut state)
    }

    /// Ask the host to move to `step`
    ///
    /// The notification fields go to the view model of the current declared
    /// step, or of `step` when nothing is current or the current step is
    /// temporary. Without a bound view model nothing happens and `false` is
    /// returned.
    pub fn navigate_to_step(&self, step: &FlowStep, options: NavigationOptions) -> bool {
        let view_model = match self.current() {
            Some(current @ CurrentStep::Declared(_)) => self.view_model_for(&current),
            _ => self.services.locator.resolve(step.view_model_kind()),
        };
        let Some(view_model) = view_model else {
            debug!(
                flow = %self.kind,
                step = %step.name(),
                "No view model bound, navigation abandoned"
            );
            return false;
        };

        view_model.set_notification_title(options.title);
        view_model.set_notification_message(options.message);

        let is_initial = self
            .steps
            .initial()
            .map(|initial| initial.name() == step.name())
            .unwrap_or(false);
        let params = options
            .script
            .map(|script| HashMap::from([(SCRIPT_PARAMETER.to_string(), script)]));

        let request = NavigationRequest {
            flow: self.kind.clone(),
            step: (!is_initial).then(|| step.name().clone()),
            forward: options.forward,
            notification_key: options.notification_key,
            params,
        };
        debug!(
            flow = %self.kind,
            step = %step.name(),
            forward = request.forward,
            notification = ?request.notification_key,
            "Navigating to step"
        );
        self.services.host.navigate(&request);
        true
    }

    fn flow_ref(&self) -> Weak<dyn UserInterfaceFlow> {
        self.this.clone()
    }

    fn view_model_for(&self, step: &CurrentStep) -> Option<Arc<dyn ViewModel>> {
        self.services.locator.resolve(step.view_model_kind()?)
    }

    fn initial_flow_step(&self) -> CoreResult<Arc<FlowStep>> {
        self.steps.initial().ok_or(CoreError::InitialStepNotFound)
    }

    fn find_step(&self, name: &str) -> CoreResult<Arc<FlowStep>> {
        self.steps
            .find(name)
            .ok_or_else(|| CoreError::StepNotFound(name.to_string()))
    }

    fn set_current(&self, step: Option<CurrentStep>) {
        self.state.lock().current = step;
    }

    fn activated(&self) {
        if self.suppresses_error_handling() {
            debug!(flow = %self.kind, "Error handling suppressed");
            return;
        }
        let Some(this) = self.this.upgrade() else {
            return;
        };

        self.subscribe_error(&this, Self::on_failure);
        self.subscribe_error(&this, Self::on_communication_error);
        self.subscribe_error(&this, Self::on_network_error);
    }

    fn deactivated(&self) {
        let subscriber = SubscriberId::of_value(self);
        for kind in [
            MessageKind::of::<Failure>(),
            MessageKind::of::<CommunicationErrorOccurred>(),
            MessageKind::of::<NetworkErrorOccurred>(),
        ] {
            self.services.bus.remove_subscription(subscriber, kind);
        }
    }

    fn subscribe_error<M, F>(&self, this: &Arc<Self>, handler: F)
    where
        M: crate::messaging::Message,
        F: Fn(&Self, &M) + Send + Sync + 'static,
    {
        let flow = self.this.clone();
        let handler = move |message: &M| {
            if let Some(flow) = flow.upgrade() {
                handler(&*flow, message);
            }
        };
        match self.services.context.clone() {
            Some(context) => self.services.bus.subscribe_on(this, handler, context),
            None => self.services.bus.subscribe(this, handler),
        }
    }

    fn on_failure(&self, message: &Failure) {
        self.annotate_current_step(FAILURE_NOTIFICATION, None, &message.message);
    }

    fn on_communication_error(&self, message: &CommunicationErrorOccurred) {
        self.annotate_current_step(
            COMMUNICATION_PROBLEM_NOTIFICATION,
            message.title.clone(),
            message.message(),
        );
    }

    fn on_network_error(&self, message: &NetworkErrorOccurred) {
        self.annotate_current_step(
            NETWORK_PROBLEM_NOTIFICATION,
            message.title().map(str::to_string),
            message.message(),
        );
    }

    fn annotate_current_step(&self, key: &str, title: Option<String>, message: &str) {
        match self.current() {
            Some(CurrentStep::Declared(step)) => {
                let options = NavigationOptions::forward().with_notification(
                    key,
                    title,
                    Some(message.to_string()),
                );
                self.navigate_to_step(&step, options);
            }
            _ => debug!(flow = %self.kind, notification = key, "No current step to annotate"),
        }
    }

    fn exit_step(&self, step: &CurrentStep) {
        debug!(flow = %self.kind, instance = %self.instance_id, step = %step, "Exit step");
        let Some(view_model) = self.view_model_for(step) else {
            return;
        };

        view_model.set_active(false);
        view_model.set_flow(None);
        if let Some(declared) = step.declared() {
            declared.run_on_exit(&*view_model);
        }
    }

    fn enter_step(&self, step: CurrentStep) {
        debug!(flow = %self.kind, instance = %self.instance_id, step = %step, "Enter step");
        self.set_current(Some(step.clone()));
        let Some(view_model) = self.view_model_for(&step) else {
            return;
        };

        view_model.set_flow(Some(self.flow_ref()));
        view_model.set_active(self.is_active());
        if let Some(declared) = step.declared() {
            declared.run_on_enter(&*view_model);
        }
        view_model.clear_validation();
    }

    fn cancel_step(&self, step: &CurrentStep) {
        debug!(flow = %self.kind, instance = %self.instance_id, step = %step, "Cancel step");
        let Some(view_model) = self.view_model_for(step) else {
            return;
        };

        view_model.set_active(false);
        if let Some(declared) = step.declared() {
            declared.run_on_cancel(&*view_model);
        }
        view_model.set_flow(None);
    }

    fn return_to_step(&self, step: CurrentStep) {
        debug!(flow = %self.kind, instance = %self.instance_id, step = %step, "Return to step");
        self.set_current(Some(step.clone()));
        let Some(view_model) = self.view_model_for(&step) else {
            return;
        };

        view_model.set_flow(Some(self.flow_ref()));
        view_model.set_active(self.is_active());
        if let Some(declared) = step.declared() {
            declared.run_on_return(&*view_model);
        }
    }
}

impl<S: FlowState> UserInterfaceFlow for FlowEngine<S> {
    fn kind(&self) -> &FlowKind {
        &self.kind
    }

    fn instance_id(&self) -> &FlowInstanceId {
        &self.instance_id
    }

    fn options(&self) -> &FlowOptions {
        &self.options
    }

    fn is_active(&self) -> bool {
        self.state.lock().is_active
    }

    fn set_active(&self, is_active: bool) {
        let changed = {
            let mut state = self.state.lock();
            let changed = state.is_active != is_active;
            state.is_active = is_active;
            changed
        };
        if !changed {
            return;
        }

        if is_active {
            self.activated();
        } else {
            self.deactivated();
        }
    }

    fn previous_flow(&self) -> Option<Arc<dyn UserInterfaceFlow>> {
        self.state.lock().previous.clone()
    }

    fn initial_step(&self) -> CoreResult<StepName> {
        Ok(self.initial_flow_step()?.name().clone())
    }

    fn current_step(&self) -> Option<StepName> {
        self.current().and_then(|step| step.name().cloned())
    }

    fn view_model_kind_for_step(&self, step: &str) -> CoreResult<ViewModelKind> {
        Ok(self.find_step(step)?.view_model_kind())
    }

    fn enter(&self, from: Option<Arc<dyn UserInterfaceFlow>>, params: Option<&NavigationParams>) {
        debug!(
            flow = %self.kind,
            instance = %self.instance_id,
            from = ?from.as_ref().map(|f| f.kind().clone()),
            params = params.map(|p| p.len()).unwrap_or(0),
            "Entering flow"
        );
        {
            let mut state = self.state.lock();
            state.current = None;
            state.previous = from;
        }
        self.set_active(true);
    }

    fn return_to(&self, from: Option<Arc<dyn UserInterfaceFlow>>, params: Option<&NavigationParams>) {
        debug!(
            flow = %self.kind,
            instance = %self.instance_id,
            from = ?from.as_ref().map(|f| f.kind().clone()),
            params = params.map(|p| p.len()).unwrap_or(0),
            "Returning to flow"
        );
        self.set_current(None);
        self.set_active(true);
    }

    fn exit(&self, to: Option<Arc<dyn UserInterfaceFlow>>) {
        debug!(
            flow = %self.kind,
            instance = %self.instance_id,
            to = ?to.as_ref().map(|f| f.kind().clone()),
            "Exiting flow"
        );
        self.set_active(false);
        if let Some(step) = self.current() {
            self.exit_step(&step);
        }
        self.set_current(None);
    }

    fn cancel(&self, to: Option<Arc<dyn UserInterfaceFlow>>) {
        debug!(
            flow = %self.kind,
            instance = %self.instance_id,
            to = ?to.as_ref().map(|f| f.kind().clone()),
            "Cancelling flow"
        );
        self.set_active(false);
        if let Some(step) = self.current() {
            self.cancel_step(&step);
        }
        self.set_current(None);
    }

    fn next(&self) -> CoreResult<()> {
        let target = match self.current() {
            None => Some(self.initial_flow_step()?),
            Some(current) if current.is_final() => {
                trace!(flow = %self.kind, step = %current, "Next from final step ignored");
                return Ok(());
            }
            Some(current) => match current.next_route() {
                FlowStepRoute::Automatic => current
                    .declared()
                    .and_then(|step| self.steps.next_after(step)),
                FlowStepRoute::To(provider) => provider(&self.steps),
                FlowStepRoute::CancelFlow => None,
            },
        };

        let step = target.ok_or(CoreError::NextStepNotFound)?;
        self.navigate_to_step(&step, NavigationOptions::forward());
        Ok(())
    }

    fn on_goto(&self, step: Option<&str>, _params: Option<&NavigationParams>) -> CoreResult<()> {
        let leaving = self.current();
        if let Some(leaving) = &leaving {
            self.exit_step(leaving);
        }
        if !self.is_active() {
            return Ok(());
        }

        let target = match step {
            None => CurrentStep::Declared(self.initial_flow_step()?),
            Some(name) => match self.steps.find(name) {
                Some(found) => CurrentStep::Declared(found),
                None => {
                    debug!(flow = %self.kind, step = name, "Undeclared step, entering a temporary step");
                    CurrentStep::Temporary(TemporaryStep::returning_to(leaving.as_ref()))
                }
            },
        };
        self.enter_step(target);
        Ok(())
    }

    fn on_back(&self, step: Option<&str>, _params: Option<&NavigationParams>) -> CoreResult<()> {
        if let Some(leaving) = self.current() {
            self.cancel_step(&leaving);
        }
        if !self.is_active() {
            return Ok(());
        }

        let target = match step {
            None => self.initial_flow_step()?,
            Some(name) => self.find_step(name)?,
        };
        self.return_to_step(CurrentStep::Declared(target));
        Ok(())
    }

    fn before_back(&self, step: Option<&str>) -> CoreResult<BackNavigation> {
        let back = match step {
            Some(name) => self.find_step(name)?.back_route().clone(),
            None => self.current().ok_or(CoreError::NoCurrentStep)?.back_route(),
        };

        match back {
            FlowStepRoute::CancelFlow => {
                if let Some(previous) = self.previous_flow() {
                    let kind = previous.kind().clone();
                    debug!(flow = %self.kind, previous = %kind, "Back delegated to previous flow");
                    self.services
                        .host
                        .navigate(&NavigationRequest::back_to_flow(kind.clone()));
                    return Ok(BackNavigation::PreviousFlow(kind));
                }
            }
            FlowStepRoute::To(provider) => {
                if let Some(target) = provider(&self.steps) {
                    if self.navigate_to_step(&target, NavigationOptions::backward()) {
                        return Ok(BackNavigation::Step(target.name().clone()));
                    }
                }
            }
            FlowStepRoute::Automatic => {}
        }
        Ok(BackNavigation::Default)
    }

    fn execute_command(&self, command: &str, argument: Option<&Value>) -> CoreResult<()> {
        let current = self.current().ok_or(CoreError::NoCurrentStep)?;
        let Some(view_model) = self.view_model_for(&current) else {
            debug!(flow = %self.kind, command, "No view model bound, command ignored");
            return Ok(());
        };

        view_model.set_flow(Some(self.flow_ref()));
        if let Some(step) = current.declared() {
            trace!(flow = %self.kind, step = %step.name(), command, "Dispatching command");
            step.run_on_do(&*view_model, command, argument);
        }
        Ok(())
    }

    fn serialize(&self) -> CoreResult<String> {
        let guard = self.custom.lock();
        let state = guard.borrow();
        Ok(serde_json::to_string(&*state)?)
    }

    fn deserialize(&self, state: &str) -> CoreResult<()> {
        let custom: S = serde_json::from_str(state)?;
        *self.custom.lock().borrow_mut() = custom;
        Ok(())
    }
}

impl<S: FlowState> fmt::Debug for FlowEngine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("FlowEngine")
            .field("kind", &self.kind)
            .field("instance_id", &self.instance_id)
            .field("steps", &self.steps.len())
            .field("current", &state.current.as_ref().map(|s| s.to_string()))
            .field("is_active", &state.is_active)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::ThreadSafeMessageBus;
    use crate::viewmodel::{InMemoryViewModelLocator, ViewModelBase};
    use mockall::mock;
    use serde::{Deserialize, Serialize};

    mock! {
        Host {}
        impl NavigationHost for Host {
            fn navigate(&self, request: &NavigationRequest);
        }
    }

    #[derive(Default)]
    struct StartViewModel {
        base: ViewModelBase,
        entered: Mutex<u32>,
    }

    impl ViewModel for StartViewModel {
        fn base(&self) -> &ViewModelBase {
            &self.base
        }
    }

    #[derive(Default)]
    struct EndViewModel {
        base: ViewModelBase,
    }

    impl ViewModel for EndViewModel {
        fn base(&self) -> &ViewModelBase {
            &self.base
        }
    }

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    struct Draft {
        amount: u32,
        note: Option<String>,
    }

    struct Fixture {
        bus: Arc<ThreadSafeMessageBus>,
        start: Arc<StartViewModel>,
        end: Arc<EndViewModel>,
        services: FlowServices,
    }

    fn fixture(host: MockHost) -> Fixture {
        let bus = Arc::new(ThreadSafeMessageBus::new());
        let locator = Arc::new(InMemoryViewModelLocator::new());
        let start = Arc::new(StartViewModel::default());
        let end = Arc::new(EndViewModel::default());
        locator.register(start.clone());
        locator.register(end.clone());

        Fixture {
            bus: bus.clone(),
            start,
            end,
            services: FlowServices {
                host: Arc::new(host),
                locator,
                bus,
                context: None,
            },
        }
    }

    fn two_steps() -> Vec<FlowStep> {
        vec![
            FlowStep::new::<StartViewModel>("start")
                .on_enter(|vm: &StartViewModel| *vm.entered.lock() += 1)
                .build(),
            FlowStep::new::<EndViewModel>("end").final_step().build(),
        ]
    }

    #[test]
    fn test_enter_activates_and_subscribes() {
        let f = fixture(MockHost::new());
        let flow: Arc<FlowEngine> = FlowEngine::new("wizard", two_steps(), f.services.clone());

        flow.enter(None, None);

        assert!(flow.is_active());
        assert!(flow.current().is_none());
        assert_eq!(f.bus.subscriber_count(MessageKind::of::<Failure>()), 1);
        assert_eq!(f.bus.subscriber_count(MessageKind::of::<NetworkErrorOccurred>()), 1);

        flow.exit(None);
        assert!(!flow.is_active());
        assert_eq!(f.bus.subscriber_count(MessageKind::of::<Failure>()), 0);
        assert_eq!(f.bus.subscriber_count(MessageKind::of::<CommunicationErrorOccurred>()), 0);
    }

    #[test]
    fn test_suppressed_flow_does_not_subscribe() {
        let f = fixture(MockHost::new());
        let options = FlowOptions {
            suppress_error_handling: true,
            ..FlowOptions::default()
        };
        let flow: Arc<FlowEngine> =
            FlowEngine::with_options("quiet", two_steps(), f.services.clone(), options);

        flow.enter(None, None);

        assert!(flow.suppresses_error_handling());
        assert_eq!(f.bus.subscriber_count(MessageKind::of::<Failure>()), 0);
    }

    #[test]
    fn test_next_from_fresh_flow_navigates_to_initial_without_name() {
        let mut host = MockHost::new();
        host.expect_navigate()
            .withf(|request| {
                request.flow.as_str() == "wizard" && request.step.is_none() && request.forward
            })
            .times(1)
            .return_const(());
        let f = fixture(host);
        let flow: Arc<FlowEngine> = FlowEngine::new("wizard", two_steps(), f.services.clone());

        flow.enter(None, None);
        flow.next().unwrap();
    }

    #[test]
    fn test_next_names_non_initial_step() {
        let mut host = MockHost::new();
        host.expect_navigate()
            .withf(|request| request.step.as_ref().map(|s| s.as_str()) == Some("end"))
            .times(1)
            .return_const(());
        let f = fixture(host);
        let flow: Arc<FlowEngine> = FlowEngine::new("wizard", two_steps(), f.services.clone());

        flow.enter(None, None);
        flow.on_goto(Some("start"), None).unwrap();
        flow.next().unwrap();
    }

    #[test]
    fn test_next_on_empty_flow_fails() {
        let f = fixture(MockHost::new());
        let flow: Arc<FlowEngine> = FlowEngine::new("empty", Vec::new(), f.services.clone());

        flow.enter(None, None);
        assert_eq!(flow.next(), Err(CoreError::InitialStepNotFound));
        assert_eq!(flow.initial_step(), Err(CoreError::InitialStepNotFound));
    }

    #[test]
    fn test_next_from_final_step_is_noop() {
        let f = fixture(MockHost::new());
        let flow: Arc<FlowEngine> = FlowEngine::new("wizard", two_steps(), f.services.clone());

        flow.enter(None, None);
        flow.on_goto(Some("end"), None).unwrap();
        flow.next().unwrap();

        assert_eq!(flow.current_step(), Some(StepName::from("end")));
    }

    #[test]
    fn test_next_with_cancel_route_fails() {
        let f = fixture(MockHost::new());
        let steps = vec![
            FlowStep::new::<StartViewModel>("start")
                .next(FlowStepRoute::CancelFlow)
                .build(),
            FlowStep::new::<EndViewModel>("end").build(),
        ];
        let flow: Arc<FlowEngine> = FlowEngine::new("wizard", steps, f.services.clone());

        flow.enter(None, None);
        flow.on_goto(Some("start"), None).unwrap();
        assert_eq!(flow.next(), Err(CoreError::NextStepNotFound));
    }

    #[test]
    fn test_goto_runs_hooks_and_binds_view_model() {
        let f = fixture(MockHost::new());
        let flow: Arc<FlowEngine> = FlowEngine::new("wizard", two_steps(), f.services.clone());

        flow.enter(None, None);
        f.start.base().add_validation_error("amount", "required");
        flow.on_goto(None, None).unwrap();

        assert_eq!(flow.current_step(), Some(StepName::from("start")));
        assert_eq!(*f.start.entered.lock(), 1);
        assert!(f.start.base().is_active());
        assert!(!f.start.base().has_errors());
        assert!(f.start.base().flow().is_some());

        flow.on_goto(Some("end"), None).unwrap();
        assert!(!f.start.base().is_active());
        assert!(f.start.base().flow().is_none());
        assert!(f.end.base().is_active());
    }

    #[test]
    fn test_goto_while_inactive_only_exits() {
        let f = fixture(MockHost::new());
        let flow: Arc<FlowEngine> = FlowEngine::new("wizard", two_steps(), f.services.clone());

        flow.on_goto(Some("start"), None).unwrap();

        assert!(flow.current().is_none());
        assert_eq!(*f.start.entered.lock(), 0);
    }

    #[test]
    fn test_goto_unknown_step_enters_temporary_step() {
        let f = fixture(MockHost::new());
        let flow: Arc<FlowEngine> = FlowEngine::new("wizard", two_steps(), f.services.clone());

        flow.enter(None, None);
        flow.on_goto(Some("start"), None).unwrap();
        flow.on_goto(Some("help"), None).unwrap();

        assert!(flow.current().unwrap().is_temporary());
        assert!(flow.current_step().is_none());
        assert!(!f.start.base().is_active());
    }

    #[test]
    fn test_back_to_unknown_step_fails() {
        let f = fixture(MockHost::new());
        let flow: Arc<FlowEngine> = FlowEngine::new("wizard", two_steps(), f.services.clone());

        flow.enter(None, None);
        assert_eq!(
            flow.on_back(Some("nowhere"), None),
            Err(CoreError::StepNotFound("nowhere".to_string()))
        );
        assert_eq!(
            flow.before_back(Some("nowhere")),
            Err(CoreError::StepNotFound("nowhere".to_string()))
        );
    }

    #[test]
    fn test_cancel_runs_cancel_path() {
        let f = fixture(MockHost::new());
        let flow: Arc<FlowEngine> = FlowEngine::new("wizard", two_steps(), f.services.clone());

        flow.enter(None, None);
        flow.on_goto(Some("end"), None).unwrap();
        flow.cancel(None);

        assert!(!flow.is_active());
        assert!(flow.current().is_none());
        assert!(!f.end.base().is_active());
        assert!(f.end.base().flow().is_none());
    }

    #[test]
    fn test_before_back_without_route_is_default() {
        let f = fixture(MockHost::new());
        let flow: Arc<FlowEngine> = FlowEngine::new("wizard", two_steps(), f.services.clone());

        assert_eq!(flow.before_back(Some("end")), Ok(BackNavigation::Default));
        assert_eq!(flow.before_back(None), Err(CoreError::NoCurrentStep));
    }

    #[test]
    fn test_before_back_with_cancel_route_and_no_previous_is_default() {
        let f = fixture(MockHost::new());
        let steps = vec![FlowStep::new::<StartViewModel>("start")
            .back(FlowStepRoute::CancelFlow)
            .build()];
        let flow: Arc<FlowEngine> = FlowEngine::new("wizard", steps, f.services.clone());

        flow.enter(None, None);
        assert_eq!(flow.before_back(Some("start")), Ok(BackNavigation::Default));
    }

    #[test]
    fn test_before_back_redirects_to_route_target() {
        let mut host = MockHost::new();
        host.expect_navigate()
            .withf(|request| !request.forward && request.step.is_none())
            .times(1)
            .return_const(());
        let f = fixture(host);
        let steps = vec![
            FlowStep::new::<StartViewModel>("start").build(),
            FlowStep::new::<EndViewModel>("end")
                .back(FlowStepRoute::to_step("start"))
                .build(),
        ];
        let flow: Arc<FlowEngine> = FlowEngine::new("wizard", steps, f.services.clone());

        flow.enter(None, None);
        flow.on_goto(Some("end"), None).unwrap();

        assert_eq!(
            flow.before_back(Some("end")),
            Ok(BackNavigation::Step(StepName::from("start")))
        );
    }

    #[test]
    fn test_execute_command_requires_current_step() {
        let f = fixture(MockHost::new());
        let flow: Arc<FlowEngine> = FlowEngine::new("wizard", two_steps(), f.services.clone());

        assert_eq!(flow.execute_command("save", None), Err(CoreError::NoCurrentStep));
    }

    #[test]
    fn test_execute_command_reaches_on_do() {
        let f = fixture(MockHost::new());
        let commands = Arc::new(Mutex::new(Vec::new()));
        let seen = commands.clone();
        let steps = vec![FlowStep::new::<StartViewModel>("start")
            .on_do(move |_vm: &StartViewModel, command: &str, argument: Option<&Value>| {
                seen.lock().push((command.to_string(), argument.cloned()));
            })
            .build()];
        let flow: Arc<FlowEngine> = FlowEngine::new("wizard", steps, f.services.clone());

        flow.enter(None, None);
        flow.on_goto(None, None).unwrap();
        flow.execute_command("save", Some(&serde_json::json!({"draft": true})))
            .unwrap();

        assert_eq!(
            *commands.lock(),
            vec![("save".to_string(), Some(serde_json::json!({"draft": true})))]
        );
        assert!(f.start.base().flow().is_some());
    }

    #[test]
    fn test_failure_message_annotates_current_step() {
        let mut host = MockHost::new();
        host.expect_navigate()
            .withf(|request| request.notification_key.as_deref() == Some(FAILURE_NOTIFICATION))
            .times(1)
            .return_const(());
        let f = fixture(host);
        let flow: Arc<FlowEngine> = FlowEngine::new("wizard", two_steps(), f.services.clone());

        flow.enter(None, None);
        flow.on_goto(Some("end"), None).unwrap();
        f.bus.publish(Failure::new("disk full"));

        let state = f.end.base().snapshot();
        assert_eq!(state.notification_message.as_deref(), Some("disk full"));
        assert!(state.notification_title.is_none());
    }

    #[test]
    fn test_communication_error_carries_title() {
        let mut host = MockHost::new();
        host.expect_navigate()
            .withf(|request| {
                request.notification_key.as_deref() == Some(COMMUNICATION_PROBLEM_NOTIFICATION)
            })
            .times(1)
            .return_const(());
        let f = fixture(host);
        let flow: Arc<FlowEngine> = FlowEngine::new("wizard", two_steps(), f.services.clone());

        flow.enter(None, None);
        flow.on_goto(Some("end"), None).unwrap();
        f.bus.publish(CommunicationErrorOccurred::new(
            "refused",
            Some("Server".to_string()),
        ));

        assert_eq!(
            f.end.base().snapshot().notification_title.as_deref(),
            Some("Server")
        );
    }

    #[test]
    fn test_errors_without_current_step_are_ignored() {
        let f = fixture(MockHost::new());
        let flow: Arc<FlowEngine> = FlowEngine::new("wizard", two_steps(), f.services.clone());

        flow.enter(None, None);
        f.bus.publish(NetworkErrorOccurred::new("timeout", None));

        assert!(flow.current().is_none());
    }

    #[test]
    fn test_state_roundtrip() {
        let f = fixture(MockHost::new());
        let flow: Arc<FlowEngine<Draft>> = FlowEngine::new("wizard", two_steps(), f.services.clone());

        flow.update_state(|draft| {
            draft.amount = 42;
            draft.note = Some("gift".to_string());
        });
        let blob = flow.serialize().unwrap();

        let restored: Arc<FlowEngine<Draft>> =
            FlowEngine::new("wizard", two_steps(), f.services.clone());
        restored.deserialize(&blob).unwrap();

        assert_eq!(restored.with_state(|d| d.clone()), flow.with_state(|d| d.clone()));
    }

    #[test]
    fn test_state_closures_may_call_back_into_flow() {
        let f = fixture(MockHost::new());
        let flow: Arc<FlowEngine<Draft>> = FlowEngine::new("wizard", two_steps(), f.services.clone());
        flow.enter(None, None);

        let seen = flow.update_state(|draft| {
            draft.amount = 7;
            (flow.is_active(), flow.current_step())
        });
        assert_eq!(seen, (true, None));

        let blob = flow.with_state(|draft| {
            assert_eq!(flow.with_state(|inner| inner.amount), draft.amount);
            flow.serialize()
        });
        assert_eq!(blob.unwrap(), r#"{"amount":7,"note":null}"#);
    }

    #[test]
    fn test_deserialize_rejects_garbage() {
        let f = fixture(MockHost::new());
        let flow: Arc<FlowEngine<Draft>> = FlowEngine::new("wizard", two_steps(), f.services.clone());

        let result = flow.deserialize("not json");
        assert!(matches!(result, Err(CoreError::SerializationError(_))));
    }

    #[test]
    fn test_set_busy_and_lookups() {
        let f = fixture(MockHost::new());
        let flow: Arc<FlowEngine> = FlowEngine::new("wizard", two_steps(), f.services.clone());

        flow.enter(None, None);
        flow.on_goto(None, None).unwrap();
        flow.set_busy(true, Some("Saving"));

        assert!(f.start.base().is_busy());
        assert_eq!(
            flow.view_model_kind_for_step("end"),
            Ok(ViewModelKind::of::<EndViewModel>())
        );
        assert!(flow.find_view_model::<EndViewModel>().is_some());
        assert_eq!(flow.initial_step(), Ok(StepName::from("start")));
    }
}

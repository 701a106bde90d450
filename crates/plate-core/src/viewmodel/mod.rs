//! View-model contract consumed by flows
//!
//! The flow engine only touches the small surface defined by [`ViewModel`]:
//! activation, busy state, notification fields, the back-reference to the
//! owning flow, and clearing validation on step entry. Everything else a
//! concrete view model does is opaque to the core.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::concurrency::ExecutionContext;
use crate::flow::UserInterfaceFlow;

/// Locating view-model instances by kind
pub mod locator;

pub use locator::{InMemoryViewModelLocator, ViewModelLocator};

/// Discriminator of a view-model type, declared by each flow step
#[derive(Clone, Copy)]
pub struct ViewModelKind {
    type_id: TypeId,
    name: &'static str,
}

impl ViewModelKind {
    /// The kind of view-model type `VM`
    pub fn of<VM: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<VM>(),
            name: std::any::type_name::<VM>(),
        }
    }

    /// Fully qualified type name
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ViewModelKind {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ViewModelKind {}

impl Hash for ViewModelKind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for ViewModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ViewModelKind({})", self.name)
    }
}

impl fmt::Display for ViewModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Type-erasure helpers, implemented for every [`ViewModel`]
pub trait ViewModelAny: Any + Send + Sync {
    /// Kind of the concrete view model
    fn kind(&self) -> ViewModelKind;

    /// Upcast for typed step hooks
    fn as_any(&self) -> &dyn Any;

    /// Upcast an owned handle for typed lookups
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: ViewModel> ViewModelAny for T {
    fn kind(&self) -> ViewModelKind {
        ViewModelKind::of::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// A view model that can be bound to a flow step
///
/// Implementors embed a [`ViewModelBase`] and return it from [`ViewModel::base`];
/// every other method has a default delegating to it.
pub trait ViewModel: ViewModelAny {
    /// Shared state backing the default methods
    fn base(&self) -> &ViewModelBase;

    /// Mark the view model as the one currently shown
    fn set_active(&self, is_active: bool) {
        self.base().set_active(is_active);
    }

    /// Toggle the busy indicator with an optional message
    fn set_busy(&self, is_busy: bool, message: Option<&str>) {
        self.base().set_busy(is_busy, message);
    }

    /// Title of the notification overlay
    fn set_notification_title(&self, title: Option<String>) {
        self.base().set_notification_title(title);
    }

    /// Body of the notification overlay
    fn set_notification_message(&self, message: Option<String>) {
        self.base().set_notification_message(message);
    }

    /// Back-reference to the owning flow, cleared with `None`
    fn set_flow(&self, flow: Option<Weak<dyn UserInterfaceFlow>>) {
        self.base().set_flow(flow);
    }

    /// Drop all validation errors
    fn clear_validation(&self) {
        self.base().clear_validation();
    }
}

/// Observable fields of a view model
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewModelState {
    /// Currently shown by the navigation host
    pub is_active: bool,
    /// Busy indicator
    pub is_busy: bool,
    /// Message shown next to the busy indicator
    pub busy_message: Option<String>,
    /// Notification overlay title
    pub notification_title: Option<String>,
    /// Notification overlay message
    pub notification_message: Option<String>,
    /// Validation errors by field name
    pub validation_errors: HashMap<String, Vec<String>>,
}

/// Shared plumbing embedded in concrete view models
///
/// Activation and busy changes are observed by a rendering layer, so when the
/// view model has an execution context they are applied through it.
pub struct ViewModelBase {
    state: Arc<Mutex<ViewModelState>>,
    flow: Mutex<Option<Weak<dyn UserInterfaceFlow>>>,
    context: Option<Arc<dyn ExecutionContext>>,
}

impl ViewModelBase {
    /// A base that applies every change on the calling thread
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ViewModelState::default())),
            flow: Mutex::new(None),
            context: None,
        }
    }

    /// A base that marshals activation and busy changes onto `context`
    pub fn with_context(context: Arc<dyn ExecutionContext>) -> Self {
        Self {
            context: Some(context),
            ..Self::new()
        }
    }

    /// The execution context this view model is bound to
    pub fn context(&self) -> Option<&Arc<dyn ExecutionContext>> {
        self.context.as_ref()
    }

    fn apply<F>(&self, change: F)
    where
        F: FnOnce(&mut ViewModelState) + Send + 'static,
    {
        match &self.context {
            Some(context) => {
                let state = self.state.clone();
                context.submit(Box::new(move || change(&mut state.lock())));
            }
            None => change(&mut self.state.lock()),
        }
    }

    /// See [`ViewModel::set_active`]
    pub fn set_active(&self, is_active: bool) {
        self.apply(move |state| state.is_active = is_active);
    }

    /// See [`ViewModel::set_busy`]
    pub fn set_busy(&self, is_busy: bool, message: Option<&str>) {
        let message = message.map(str::to_string);
        self.apply(move |state| {
            state.is_busy = is_busy;
            state.busy_message = message;
        });
    }

    /// See [`ViewModel::set_notification_title`]
    pub fn set_notification_title(&self, title: Option<String>) {
        self.state.lock().notification_title = title;
    }

    /// See [`ViewModel::set_notification_message`]
    pub fn set_notification_message(&self, message: Option<String>) {
        self.state.lock().notification_message = message;
    }

    /// See [`ViewModel::set_flow`]
    pub fn set_flow(&self, flow: Option<Weak<dyn UserInterfaceFlow>>) {
        *self.flow.lock() = flow;
    }

    /// The owning flow, while it is alive and bound
    pub fn flow(&self) -> Option<Arc<dyn UserInterfaceFlow>> {
        self.flow.lock().as_ref().and_then(Weak::upgrade)
    }

    /// Record a validation error against `field`
    pub fn add_validation_error(&self, field: impl Into<String>, error: impl Into<String>) {
        self.state
            .lock()
            .validation_errors
            .entry(field.into())
            .or_default()
            .push(error.into());
    }

    /// See [`ViewModel::clear_validation`]
    pub fn clear_validation(&self) {
        self.state.lock().validation_errors.clear();
    }

    /// True when any field has a validation error
    pub fn has_errors(&self) -> bool {
        self.state.lock().validation_errors.values().any(|e| !e.is_empty())
    }

    /// Copy of the current observable fields
    pub fn snapshot(&self) -> ViewModelState {
        self.state.lock().clone()
    }

    /// Shorthand for `snapshot().is_active`
    pub fn is_active(&self) -> bool {
        self.state.lock().is_active
    }

    /// Shorthand for `snapshot().is_busy`
    pub fn is_busy(&self) -> bool {
        self.state.lock().is_busy
    }
}

impl Default for ViewModelBase {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ViewModelBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewModelBase")
            .field("state", &*self.state.lock())
            .field("bound_to_flow", &self.flow.lock().is_some())
            .field("context", &self.context)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrency::{InlineExecutionContext, Work};

    #[derive(Default)]
    struct LoginViewModel {
        base: ViewModelBase,
    }

    impl ViewModel for LoginViewModel {
        fn base(&self) -> &ViewModelBase {
            &self.base
        }
    }

    #[derive(Default)]
    struct HeldContext {
        work: Mutex<Vec<Work>>,
    }

    impl fmt::Debug for HeldContext {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("HeldContext")
        }
    }

    impl ExecutionContext for HeldContext {
        fn submit(&self, work: Work) {
            self.work.lock().push(work);
        }
    }

    #[test]
    fn test_kind_identifies_concrete_type() {
        let vm: Arc<dyn ViewModel> = Arc::new(LoginViewModel::default());
        assert_eq!(vm.kind(), ViewModelKind::of::<LoginViewModel>());
        assert!(vm.as_any().downcast_ref::<LoginViewModel>().is_some());
        assert!(vm.into_any_arc().downcast::<LoginViewModel>().is_ok());
    }

    #[test]
    fn test_default_methods_update_base() {
        let vm = LoginViewModel::default();

        vm.set_active(true);
        vm.set_busy(true, Some("Signing in"));
        vm.set_notification_title(Some("Offline".to_string()));
        vm.set_notification_message(Some("timeout".to_string()));

        let state = vm.base().snapshot();
        assert!(state.is_active);
        assert!(state.is_busy);
        assert_eq!(state.busy_message.as_deref(), Some("Signing in"));
        assert_eq!(state.notification_title.as_deref(), Some("Offline"));
        assert_eq!(state.notification_message.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_clear_validation() {
        let vm = LoginViewModel::default();
        vm.base().add_validation_error("user", "required");
        assert!(vm.base().has_errors());

        vm.clear_validation();
        assert!(!vm.base().has_errors());
    }

    #[test]
    fn test_activation_is_marshaled_through_context() {
        let context = Arc::new(HeldContext::default());
        let vm = LoginViewModel {
            base: ViewModelBase::with_context(context.clone()),
        };

        vm.set_active(true);
        vm.set_busy(true, None);
        assert!(!vm.base().is_active());
        assert!(!vm.base().is_busy());

        let pending: Vec<Work> = std::mem::take(&mut *context.work.lock());
        assert_eq!(pending.len(), 2);
        for work in pending {
            work();
        }
        assert!(vm.base().is_active());
        assert!(vm.base().is_busy());
    }

    #[test]
    fn test_inline_context_applies_immediately() {
        let vm = LoginViewModel {
            base: ViewModelBase::with_context(Arc::new(InlineExecutionContext::new())),
        };
        vm.set_active(true);
        assert!(vm.base().is_active());
    }

    #[test]
    fn test_flow_reference_is_weak() {
        let vm = LoginViewModel::default();
        assert!(vm.base().flow().is_none());
        vm.set_flow(None);
        assert!(vm.base().flow().is_none());
    }
}

//! View model that records what flows do to it.

use parking_lot::Mutex;
use plate_core::{UserInterfaceFlow, ViewModel, ViewModelBase};
use std::marker::PhantomData;
use std::sync::Weak;

/// Something a flow did to a [`RecordingViewModel`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewModelEvent {
    /// `set_active` was called
    Active(bool),
    /// `set_busy` was called
    Busy(bool),
    /// The flow back-reference was set (`true`) or cleared (`false`)
    FlowBound(bool),
    /// `clear_validation` was called
    ValidationCleared,
    /// A step hook recorded a label
    Hook(String),
}

/// View model recording every call a flow makes.
///
/// The marker type gives each step its own view-model kind:
/// `RecordingViewModel<Address>` and `RecordingViewModel<Payment>` resolve
/// independently.
pub struct RecordingViewModel<T: 'static = ()> {
    base: ViewModelBase,
    events: Mutex<Vec<ViewModelEvent>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> RecordingViewModel<T> {
    /// Creates a view model with an inline base.
    pub fn new() -> Self {
        Self::with_base(ViewModelBase::new())
    }

    /// Creates a view model around `base`.
    pub fn with_base(base: ViewModelBase) -> Self {
        Self {
            base,
            events: Mutex::new(Vec::new()),
            _marker: PhantomData,
        }
    }

    /// Called from step hooks to leave a trace.
    pub fn record(&self, label: impl Into<String>) {
        self.events.lock().push(ViewModelEvent::Hook(label.into()));
    }

    /// Everything recorded so far, oldest first.
    pub fn events(&self) -> Vec<ViewModelEvent> {
        self.events.lock().clone()
    }

    /// Only the labels recorded by hooks.
    pub fn hooks(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                ViewModelEvent::Hook(label) => Some(label.clone()),
                _ => None,
            })
            .collect()
    }

    /// Forgets recorded events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl<T: 'static> Default for RecordingViewModel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> ViewModel for RecordingViewModel<T> {
    fn base(&self) -> &ViewModelBase {
        &self.base
    }

    fn set_active(&self, is_active: bool) {
        self.events.lock().push(ViewModelEvent::Active(is_active));
        self.base.set_active(is_active);
    }

    fn set_busy(&self, is_busy: bool, message: Option<&str>) {
        self.events.lock().push(ViewModelEvent::Busy(is_busy));
        self.base.set_busy(is_busy, message);
    }

    fn set_flow(&self, flow: Option<Weak<dyn UserInterfaceFlow>>) {
        self.events.lock().push(ViewModelEvent::FlowBound(flow.is_some()));
        self.base.set_flow(flow);
    }

    fn clear_validation(&self) {
        self.events.lock().push(ViewModelEvent::ValidationCleared);
        self.base.clear_validation();
    }
}

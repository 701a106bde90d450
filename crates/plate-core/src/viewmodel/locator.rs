use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::{ViewModel, ViewModelKind};

/// Resolves the view-model instance bound to a kind
pub trait ViewModelLocator: Send + Sync {
    /// The instance registered for `kind`, if any
    fn resolve(&self, kind: ViewModelKind) -> Option<Arc<dyn ViewModel>>;
}

/// Locator holding one shared instance per kind
#[derive(Default)]
pub struct InMemoryViewModelLocator {
    instances: DashMap<ViewModelKind, Arc<dyn ViewModel>>,
}

impl InMemoryViewModelLocator {
    /// Create an empty locator
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `view_model` to its own kind, replacing any previous instance
    pub fn register<VM: ViewModel>(&self, view_model: Arc<VM>) {
        let kind = ViewModelKind::of::<VM>();
        debug!(%kind, "Registering view model");
        self.instances.insert(kind, view_model);
    }

    /// Typed lookup
    pub fn resolve_as<VM: ViewModel>(&self) -> Option<Arc<VM>> {
        let instance = self.resolve(ViewModelKind::of::<VM>())?;
        instance.into_any_arc().downcast::<VM>().ok()
    }

    /// Remove the instance bound to `kind`
    pub fn unregister(&self, kind: ViewModelKind) -> Option<Arc<dyn ViewModel>> {
        self.instances.remove(&kind).map(|(_, instance)| instance)
    }

    /// Number of registered instances
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

impl ViewModelLocator for InMemoryViewModelLocator {
    fn resolve(&self, kind: ViewModelKind) -> Option<Arc<dyn ViewModel>> {
        self.instances.get(&kind).map(|entry| entry.value().clone())
    }
}

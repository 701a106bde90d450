//! Mock implementation of the ViewModelLocator trait.

use mockall::mock;
use plate_core::{ViewModel, ViewModelKind, ViewModelLocator};
use std::sync::Arc;

mock! {
    pub ViewModelLocator {}

    impl ViewModelLocator for ViewModelLocator {
        fn resolve(&self, kind: ViewModelKind) -> Option<Arc<dyn ViewModel>>;
    }
}

/// Creates a mock locator that resolves nothing.
pub fn create_mock_view_model_locator() -> MockViewModelLocator {
    let mut mock = MockViewModelLocator::new();
    mock.expect_resolve().returning(|_| None);
    mock
}

//! Mock implementation of the NavigationHost trait.

use mockall::mock;
use plate_core::{NavigationHost, NavigationRequest};

// Generate the mock implementation
mock! {
    pub NavigationHost {}

    impl NavigationHost for NavigationHost {
        fn navigate(&self, request: &NavigationRequest);
    }
}

/// Creates a mock host accepting any navigation.
pub fn create_mock_navigation_host() -> MockNavigationHost {
    let mut mock = MockNavigationHost::new();
    mock.expect_navigate().returning(|_| ());
    mock
}

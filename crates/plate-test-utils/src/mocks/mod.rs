//! Mock implementations of the Plate collaborator contracts.
//!
//! These let flow tests set precise expectations on the navigation host
//! and the view-model locator.

pub mod navigation_host;
pub mod view_model_locator;

// Re-export all mocks and their creator functions for easy access
pub use navigation_host::*;
pub use view_model_locator::*;

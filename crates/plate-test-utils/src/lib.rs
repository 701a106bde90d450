//! Testing utilities for the Plate application framework.
//!
//! This crate provides mocks of the collaborator contracts, test
//! implementations (fakes) that loop navigation back into flows, and a
//! builder wiring a flow's services for scenario tests.

pub mod builders;
pub mod implementations;
pub mod mocks;

/// Re-export commonly used types for convenience
pub use mockall;

pub use builders::TestFlowServices;
pub use implementations::{
    LoopbackNavigationHost, QueuedExecutionContext, RecordingViewModel, ViewModelEvent,
};
pub use mocks::{MockNavigationHost, MockViewModelLocator};
pub use plate_monitoring::init_test_logging;

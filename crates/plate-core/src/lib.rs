//!
//! Plate Core - message bus and user interface flows for the Plate application framework
//!
//! This crate provides the two runtime pieces applications are built on: a
//! thread-safe publish/subscribe bus that understands message ancestry, and
//! a step-routing state machine ("flow") that drives a sequence of screens
//! and reacts to ambient error messages delivered through the bus.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Execution contexts work is marshaled onto
pub mod concurrency;

/// Flow configuration
pub mod config;

/// Error types
pub mod error;

/// User interface flows
pub mod flow;

/// Publish/subscribe messaging
pub mod messaging;

/// View-model contract and locator
pub mod viewmodel;

// Re-export key types
pub use concurrency::{DedicatedExecutionContext, ExecutionContext, InlineExecutionContext, Work};
pub use config::{FlowCatalogConfig, FlowOptions};
pub use error::{CoreError, CoreResult};
pub use flow::{
    BackNavigation, CurrentStep, EmptyState, FlowEngine, FlowInstanceId, FlowKind, FlowServices,
    FlowState, FlowStep, FlowStepRoute, NavigationHost, NavigationOptions, NavigationParams,
    NavigationRequest, StepName, StepSequence, UserInterfaceFlow,
};
pub use messaging::{
    CommunicationErrorOccurred, Failure, Message, MessageBus, MessageBusExt, MessageKind,
    NetworkErrorOccurred, ThreadSafeMessageBus,
};
pub use viewmodel::{
    InMemoryViewModelLocator, ViewModel, ViewModelBase, ViewModelKind, ViewModelLocator,
};

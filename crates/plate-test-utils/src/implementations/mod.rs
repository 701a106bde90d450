//! Test implementations (fakes) of the collaborator contracts.

pub mod loopback_host;
pub mod queued_context;
pub mod recording_view_model;

pub use loopback_host::LoopbackNavigationHost;
pub use queued_context::QueuedExecutionContext;
pub use recording_view_model::{RecordingViewModel, ViewModelEvent};

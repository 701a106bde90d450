use thiserror::Error;

/// Core error type for the Plate runtime
///
/// The step lookup variants describe a misconfigured flow definition. They are
/// returned to the caller and never recovered inside the flow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The flow has no steps to start from
    #[error("The initial (or any) step in the user interface flow could not be found")]
    InitialStepNotFound,

    /// `next` could not resolve a following step
    #[error("The next step in the user interface flow could not be found")]
    NextStepNotFound,

    /// A step name reported by the navigation host is not part of the flow
    #[error("The step '{0}' in the user interface flow could not be found")]
    StepNotFound(String),

    /// A command was dispatched while no step is current
    #[error("The current flow step is not set so the command cannot be dispatched")]
    NoCurrentStep,

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

/// Result alias used throughout the crate
pub type CoreResult<T> = Result<T, CoreError>;

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for CoreError {
    fn from(err: serde_yaml::Error) -> Self {
        CoreError::ConfigurationError(err.to_string())
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::ConfigurationError(err.to_string())
    }
}

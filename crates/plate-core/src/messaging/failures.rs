//! Ambient error messages
//!
//! Published by any collaborator that hits a runtime problem. Active flows
//! subscribe to all three kinds and surface them as a notification on the
//! step the user is currently looking at.
//!
//! The kinds form the chain `Failure <- CommunicationErrorOccurred <- NetworkErrorOccurred`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Message;

/// A generic failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    /// Human readable description
    pub message: String,

    /// When the failure was observed
    pub occurred_at: DateTime<Utc>,
}

impl Failure {
    /// Create a failure stamped with the current time
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            occurred_at: Utc::now(),
        }
    }
}

impl Message for Failure {}

/// A failure while talking to a remote service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunicationErrorOccurred {
    /// The underlying failure
    pub failure: Failure,

    /// Optional title for the notification
    pub title: Option<String>,
}

impl CommunicationErrorOccurred {
    /// Create a communication error
    pub fn new(message: impl Into<String>, title: Option<String>) -> Self {
        Self {
            failure: Failure::new(message),
            title,
        }
    }

    /// Description of the problem
    pub fn message(&self) -> &str {
        &self.failure.message
    }
}

impl Message for CommunicationErrorOccurred {
    fn parent(&self) -> Option<&dyn Message> {
        Some(&self.failure)
    }
}

/// The network is unreachable or timed out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkErrorOccurred {
    /// The communication error this refines
    pub communication: CommunicationErrorOccurred,
}

impl NetworkErrorOccurred {
    /// Create a network error
    pub fn new(message: impl Into<String>, title: Option<String>) -> Self {
        Self {
            communication: CommunicationErrorOccurred::new(message, title),
        }
    }

    /// Description of the problem
    pub fn message(&self) -> &str {
        self.communication.message()
    }

    /// Optional title for the notification
    pub fn title(&self) -> Option<&str> {
        self.communication.title.as_deref()
    }
}

impl Message for NetworkErrorOccurred {
    fn parent(&self) -> Option<&dyn Message> {
        Some(&self.communication)
    }
}

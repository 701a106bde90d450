//! Publish/subscribe messaging
//!
//! Messages are plain values. A message kind may extend another kind by
//! embedding it, so subscribers of the ancestor kind also receive it.

/// Message bus contract and its thread-safe implementation
pub mod bus;
/// Ambient error messages
pub mod failures;
/// Message kinds and ancestry
pub mod message;

pub use bus::{
    publish_detached, MessageBus, MessageBusExt, MessageHandler, SubscriberId, SubscriberRef,
    ThreadSafeMessageBus,
};
pub use failures::{CommunicationErrorOccurred, Failure, NetworkErrorOccurred};
pub use message::{ancestor_at, lineage, Lineage, Message, MessageBase, MessageKind};

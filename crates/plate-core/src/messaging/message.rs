use std::any::{Any, TypeId};
use std::fmt::{self, Debug};
use std::hash::{Hash, Hasher};

/// Discriminator used by the bus to match publishers to subscribers
#[derive(Clone, Copy)]
pub struct MessageKind {
    type_id: TypeId,
    name: &'static str,
}

impl MessageKind {
    /// The kind of message type `M`
    pub fn of<M: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<M>(),
            name: std::any::type_name::<M>(),
        }
    }

    /// Fully qualified type name, for diagnostics only
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for MessageKind {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for MessageKind {}

impl Hash for MessageKind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl Debug for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageKind({})", self.name)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Object-safe base of every message, implemented for every [`Message`]
pub trait MessageBase: Any + Send + Sync + Debug {
    /// Kind of the concrete message value
    fn kind(&self) -> MessageKind;

    /// Upcast for typed handlers
    fn as_any(&self) -> &dyn Any;
}

impl<T: Message> MessageBase for T {
    fn kind(&self) -> MessageKind {
        MessageKind::of::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A value that can be published on the message bus
///
/// A message that structurally extends another embeds the ancestor value and
/// returns it from [`Message::parent`]. Walking `parent` yields the ancestor
/// chain, which is finite because every ancestor is owned by its child.
pub trait Message: MessageBase {
    /// The directly extended ancestor message, if any
    fn parent(&self) -> Option<&dyn Message> {
        None
    }
}

/// Iterator over a message and its ancestors, closest first
pub struct Lineage<'a> {
    next: Option<&'a dyn Message>,
}

impl<'a> Iterator for Lineage<'a> {
    type Item = &'a dyn Message;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent();
        Some(current)
    }
}

/// Walk `message` and every ancestor it extends
pub fn lineage(message: &dyn Message) -> Lineage<'_> {
    Lineage {
        next: Some(message),
    }
}

/// The ancestor view `depth` levels above `message` (0 is the message itself)
pub fn ancestor_at(message: &dyn Message, depth: usize) -> Option<&dyn Message> {
    lineage(message).nth(depth)
}

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use super::message::{ancestor_at, lineage, Message, MessageKind};
use crate::concurrency::ExecutionContext;

/// Type-erased subscriber callback, invoked with the message viewed as the subscribed kind
pub type MessageHandler = Arc<dyn Fn(&dyn Message) + Send + Sync>;

/// Identity of a subscriber object (its allocation address)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(usize);

impl SubscriberId {
    /// Identity of the value behind `subscriber`
    pub fn of<S: ?Sized>(subscriber: &Arc<S>) -> Self {
        Self::of_value(&**subscriber)
    }

    /// Identity of a value already shared through an `Arc`, from a plain reference to it
    pub fn of_value<S: ?Sized>(subscriber: &S) -> Self {
        Self(subscriber as *const S as *const () as usize)
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Non-owning reference to a subscriber
///
/// Subscribing never keeps a subscriber alive. Once every strong reference is
/// gone the subscription is skipped at delivery time.
#[derive(Clone)]
pub struct SubscriberRef {
    id: SubscriberId,
    target: Weak<dyn Any + Send + Sync>,
}

impl SubscriberRef {
    /// Create a weak reference to `subscriber`
    pub fn new<S: Any + Send + Sync>(subscriber: &Arc<S>) -> Self {
        let target: Arc<dyn Any + Send + Sync> = subscriber.clone();
        Self {
            id: SubscriberId::of(subscriber),
            target: Arc::downgrade(&target),
        }
    }

    /// Identity of the subscriber
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Returns true while the subscriber has not been dropped
    pub fn is_alive(&self) -> bool {
        self.target.strong_count() > 0
    }
}

impl fmt::Debug for SubscriberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberRef")
            .field("id", &self.id)
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Publish/subscribe hub keyed by message kind
///
/// A published message reaches subscribers of its own kind and then of every
/// ancestor kind it extends. A subscriber receives a given publish at most once.
pub trait MessageBus: Send + Sync {
    /// Deliver `message` to all live subscribers of its kind and ancestor kinds
    ///
    /// Subscriptions carrying their own execution context are invoked there.
    /// Otherwise `context` is used when given, and the handler runs on the
    /// publishing thread when neither is set.
    fn publish_message(&self, message: Arc<dyn Message>, context: Option<Arc<dyn ExecutionContext>>);

    /// Register `handler` for messages of `kind`
    fn add_subscription(
        &self,
        subscriber: SubscriberRef,
        kind: MessageKind,
        handler: MessageHandler,
        context: Option<Arc<dyn ExecutionContext>>,
    );

    /// Remove the subscription of `subscriber` to `kind`, if present
    fn remove_subscription(&self, subscriber: SubscriberId, kind: MessageKind);
}

/// Typed convenience layer over [`MessageBus`]
pub trait MessageBusExt: MessageBus {
    /// Publish a message, delivering on the publishing thread
    fn publish<M: Message>(&self, message: M) {
        self.publish_message(Arc::new(message), None);
    }

    /// Publish a message, delivering through `context` for subscribers without their own
    fn publish_on<M: Message>(&self, message: M, context: Arc<dyn ExecutionContext>) {
        self.publish_message(Arc::new(message), Some(context));
    }

    /// Subscribe `subscriber` to messages of kind `M`
    fn subscribe<M, S, F>(&self, subscriber: &Arc<S>, handler: F)
    where
        M: Message,
        S: Any + Send + Sync,
        F: Fn(&M) + Send + Sync + 'static,
    {
        self.add_subscription(
            SubscriberRef::new(subscriber),
            MessageKind::of::<M>(),
            typed_handler(handler),
            None,
        );
    }

    /// Subscribe `subscriber` to messages of kind `M`, always delivering on `context`
    fn subscribe_on<M, S, F>(&self, subscriber: &Arc<S>, handler: F, context: Arc<dyn ExecutionContext>)
    where
        M: Message,
        S: Any + Send + Sync,
        F: Fn(&M) + Send + Sync + 'static,
    {
        self.add_subscription(
            SubscriberRef::new(subscriber),
            MessageKind::of::<M>(),
            typed_handler(handler),
            Some(context),
        );
    }

    /// Remove the subscription of `subscriber` to kind `M`
    fn unsubscribe<M: Message, S: ?Sized>(&self, subscriber: &Arc<S>) {
        self.remove_subscription(SubscriberId::of(subscriber), MessageKind::of::<M>());
    }

    /// Remove the subscriptions of `subscriber` to each of `kinds`
    fn unsubscribe_many<S: ?Sized>(&self, subscriber: &Arc<S>, kinds: &[MessageKind]) {
        let id = SubscriberId::of(subscriber);
        for kind in kinds {
            self.remove_subscription(id, *kind);
        }
    }
}

impl<B: MessageBus + ?Sized> MessageBusExt for B {}

/// Publish from a blocking task on `runtime` and return without waiting for delivery
pub fn publish_detached<M: Message>(
    bus: Arc<dyn MessageBus>,
    message: M,
    runtime: &tokio::runtime::Handle,
) -> tokio::task::JoinHandle<()> {
    runtime.spawn_blocking(move || bus.publish(message))
}

fn typed_handler<M, F>(handler: F) -> MessageHandler
where
    M: Message,
    F: Fn(&M) + Send + Sync + 'static,
{
    Arc::new(move |message: &dyn Message| match message.as_any().downcast_ref::<M>() {
        Some(typed) => handler(typed),
        None => warn!(
            expected = MessageKind::of::<M>().name(),
            actual = message.kind().name(),
            "Message handler received an unexpected message kind"
        ),
    })
}

struct Subscription {
    subscriber: SubscriberRef,
    handler: MessageHandler,
    context: Option<Arc<dyn ExecutionContext>>,
    // Cleared on unsubscribe so in-flight snapshots skip it
    active: AtomicBool,
}

/// Thread-safe [`MessageBus`] guarded by a single registry lock
///
/// The lock covers registry reads and writes only. Handlers always run
/// outside it, so a handler may subscribe, unsubscribe or publish.
#[derive(Default)]
pub struct ThreadSafeMessageBus {
    registry: Mutex<HashMap<MessageKind, Vec<Arc<Subscription>>>>,
}

impl ThreadSafeMessageBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions registered for `kind`
    pub fn subscriber_count(&self, kind: MessageKind) -> usize {
        let registry = self.registry.lock();
        registry
            .get(&kind)
            .map(|bucket| bucket.iter().filter(|s| s.subscriber.is_alive()).count())
            .unwrap_or(0)
    }

    fn deliver_kind(
        &self,
        message: &Arc<dyn Message>,
        depth: usize,
        kind: MessageKind,
        context: Option<&Arc<dyn ExecutionContext>>,
        delivered: &mut HashSet<SubscriberId>,
    ) {
        let snapshot = {
            let registry = self.registry.lock();
            match registry.get(&kind) {
                Some(bucket) => bucket.clone(),
                None => return,
            }
        };

        for subscription in snapshot {
            if !subscription.active.load(Ordering::Acquire) {
                continue;
            }
            let subscriber = subscription.subscriber.id();
            if !subscription.subscriber.is_alive() {
                trace!(%subscriber, %kind, "Skipping collected subscriber");
                continue;
            }
            if !delivered.insert(subscriber) {
                continue;
            }

            trace!(%subscriber, %kind, "Delivering message");
            let handler = subscription.handler.clone();
            let message = message.clone();
            let work = move || {
                if let Some(view) = ancestor_at(&*message, depth) {
                    handler(view);
                }
            };

            match subscription.context.as_ref().or(context) {
                Some(target) => target.submit(Box::new(work)),
                None => work(),
            }
        }
    }
}

impl MessageBus for ThreadSafeMessageBus {
    fn publish_message(&self, message: Arc<dyn Message>, context: Option<Arc<dyn ExecutionContext>>) {
        let kinds: Vec<MessageKind> = lineage(&*message).map(|m| m.kind()).collect();
        trace!(kind = %kinds[0], ancestors = kinds.len() - 1, "Publishing message");

        let mut delivered = HashSet::new();
        for (depth, kind) in kinds.into_iter().enumerate() {
            self.deliver_kind(&message, depth, kind, context.as_ref(), &mut delivered);
        }
    }

    fn add_subscription(
        &self,
        subscriber: SubscriberRef,
        kind: MessageKind,
        handler: MessageHandler,
        context: Option<Arc<dyn ExecutionContext>>,
    ) {
        debug!("MessageBus: {} subscribes to {}", subscriber.id(), kind);

        let mut registry = self.registry.lock();
        let bucket = registry.entry(kind).or_default();
        if let Some(position) = bucket.iter().position(|s| s.subscriber.id() == subscriber.id()) {
            let replaced = bucket.remove(position);
            replaced.active.store(false, Ordering::Release);
        }
        bucket.push(Arc::new(Subscription {
            subscriber,
            handler,
            context,
            active: AtomicBool::new(true),
        }));
    }

    fn remove_subscription(&self, subscriber: SubscriberId, kind: MessageKind) {
        debug!("MessageBus: {} unsubscribes from {}", subscriber, kind);

        let mut registry = self.registry.lock();
        if let Some(bucket) = registry.get_mut(&kind) {
            bucket.retain(|s| {
                let keep = s.subscriber.id() != subscriber;
                if !keep {
                    s.active.store(false, Ordering::Release);
                }
                keep
            });
            if bucket.is_empty() {
                registry.remove(&kind);
            }
        }
    }
}

impl fmt::Debug for ThreadSafeMessageBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.lock();
        f.debug_struct("ThreadSafeMessageBus")
            .field("kinds", &registry.len())
            .finish()
    }
}

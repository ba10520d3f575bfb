//! # Event Channels
//!
//! The single pub-sub primitive everything else composes. A channel is a
//! typed, ordered, multi-subscriber broadcast: any number of emitters may
//! hold clones of it, and each subscription is an independently cancellable
//! token.
//!
//! Delivery is synchronous and in subscription order: `publish` invokes every
//! live handler before returning. Handlers may publish to other channels
//! (the subscriber list is snapshotted before invocation, so re-entrant
//! publishes never deadlock). A handler cancelled while a publish is in
//! flight may still observe that publish; cancellation only guarantees
//! exclusion from deliveries that start afterwards.

use crate::identifiers::SubscriptionId;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Registry<T> {
    subscribers: Mutex<Vec<(SubscriptionId, Handler<T>)>>,
}

impl<T> Registry<T> {
    fn remove(&self, id: SubscriptionId) {
        self.subscribers.lock().retain(|(sid, _)| *sid != id);
    }
}

/// A typed broadcast channel.
///
/// Cloning a channel yields another emitter/subscriber handle onto the same
/// underlying subscriber registry.
pub struct EventChannel<T> {
    registry: Arc<Registry<T>>,
}

impl<T> Clone for EventChannel<T> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
        }
    }
}

impl<T: 'static> Default for EventChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

// Subscription tokens detach through a 'static closure over the registry,
// so the payload type must outlive any borrow it might carry.
impl<T: 'static> EventChannel<T> {
    /// Create a channel with no subscribers.
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry {
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Deliver `value` to every live subscriber, in subscription order.
    pub fn publish(&self, value: &T) {
        // Snapshot under the lock, invoke outside it. Handlers are free to
        // subscribe, cancel, or publish again.
        let snapshot: Vec<Handler<T>> = self
            .registry
            .subscribers
            .lock()
            .iter()
            .map(|(_, h)| h.clone())
            .collect();
        for handler in snapshot {
            handler(value);
        }
    }

    /// Attach a handler. The returned token keeps the subscription alive;
    /// dropping or cancelling it detaches the handler.
    #[must_use = "dropping the token cancels the subscription"]
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        self.registry.subscribers.lock().push((id, Arc::new(handler)));

        let registry = Arc::downgrade(&self.registry);
        Subscription {
            id,
            detach: Some(Box::new(move || {
                if let Some(registry) = Weak::upgrade(&registry) {
                    registry.remove(id);
                }
            })),
        }
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.registry.subscribers.lock().len()
    }
}

/// Cancellable subscription token.
///
/// Cancellation is idempotent; dropping the token cancels implicitly.
pub struct Subscription {
    id: SubscriptionId,
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// This subscription's id.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Detach the handler from its channel.
    pub fn cancel(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }

    /// Whether the handler is still attached.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.detach.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Holds a layer's subscriptions so re-binding never duplicates delivery:
/// [`SubscriptionSet::replace`] cancels everything previously held before
/// adopting the new tokens.
#[derive(Default, Debug)]
pub struct SubscriptionSet {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `subscription` alive for the lifetime of the set.
    pub fn insert(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    /// Cancel everything currently held, then adopt `subscriptions`.
    pub fn replace(&mut self, subscriptions: Vec<Subscription>) {
        self.cancel_all();
        self.subscriptions = subscriptions;
    }

    /// Cancel and drop every held subscription.
    pub fn cancel_all(&mut self) {
        for subscription in &mut self.subscriptions {
            subscription.cancel();
        }
        self.subscriptions.clear();
    }

    /// Number of held subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether the set holds no subscriptions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

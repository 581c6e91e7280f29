use crate::event::EventType;
use crate::subscription::{SubscriberId, Subscription};
use fxhash::{FxHashMap, FxHashSet};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// Immutable snapshot of the subscriptions for one event type, in registration order.
pub type SubscriptionList = Arc<[Arc<Subscription>]>;

#[derive(Debug, Default)]
struct RegistryState {
    by_event_type: FxHashMap<EventType, SubscriptionList>,
    by_subscriber: FxHashMap<SubscriberId, Vec<EventType>>,
}

impl RegistryState {
    fn insert(&mut self, subscription: Subscription) -> Option<Arc<Subscription>> {
        let event_type = subscription.event_type();
        let current = self.by_event_type.get(&event_type).map_or(&[][..], |list| &list[..]);

        if current.iter().any(|existing| **existing == subscription) {
            debug!(
                event = event_type.name(),
                method = subscription.method().method(),
                "Duplicate subscription ignored"
            );
            return None;
        }

        let subscription = Arc::new(subscription);
        let mut next = Vec::with_capacity(current.len() + 1);
        next.extend(current.iter().cloned());
        next.push(Arc::clone(&subscription));
        self.by_event_type.insert(event_type, next.into());

        let bound = self.by_subscriber.entry(subscription.subscriber()).or_default();
        if !bound.contains(&event_type) {
            bound.push(event_type);
        }
        Some(subscription)
    }

    fn remove(&mut self, subscriber: SubscriberId) -> usize {
        let Some(event_types) = self.by_subscriber.remove(&subscriber) else {
            return 0;
        };

        let mut removed = 0;
        for event_type in event_types {
            let Some(list) = self.by_event_type.get(&event_type) else {
                continue;
            };
            let (gone, kept): (Vec<_>, Vec<_>) =
                list.iter().cloned().partition(|s| s.subscriber() == subscriber);
            for subscription in &gone {
                subscription.handle().cancel();
            }
            removed += gone.len();

            if kept.is_empty() {
                self.by_event_type.remove(&event_type);
            } else {
                self.by_event_type.insert(event_type, kept.into());
            }
        }
        removed
    }

    /// Dropped subscribers that still hold a subscription for one of `event_types`.
    fn orphans_among(&self, event_types: &[EventType]) -> FxHashSet<SubscriberId> {
        event_types
            .iter()
            .filter_map(|event_type| self.by_event_type.get(event_type))
            .flat_map(|list| list.iter())
            .filter(|s| s.is_orphaned())
            .map(|s| s.subscriber())
            .collect()
    }
}

/// Bidirectional index of live subscriptions.
///
/// `by_event_type` holds copy-on-write snapshots, so a reader iterating a list is never
/// disturbed by a concurrent mutation. `by_subscriber` lists the event types each
/// subscriber is bound to and drives unregistration. Both maps are only mutated together
/// under the same write lock.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    state: RwLock<RegistryState>,
}

impl SubscriptionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `subscription` to its event type's list.
    ///
    /// Returns `None` if an equal subscription already exists.
    pub fn add(&self, subscription: Subscription) -> Option<Arc<Subscription>> {
        self.state.write().insert(subscription)
    }

    /// Installs all subscriptions of one subscriber under a single write lock and returns the
    /// ones that were accepted.
    ///
    /// Subscribers dropped without unregistering are pruned first, but only from the lists this
    /// call touches; elsewhere they stay until a later registration reaches their event types.
    pub fn add_all(
        &self,
        subscriptions: impl IntoIterator<Item = Subscription>,
    ) -> Vec<Arc<Subscription>> {
        let subscriptions: Vec<Subscription> = subscriptions.into_iter().collect();
        let mut event_types: Vec<EventType> = Vec::with_capacity(subscriptions.len());
        for subscription in &subscriptions {
            if !event_types.contains(&subscription.event_type()) {
                event_types.push(subscription.event_type());
            }
        }

        let mut state = self.state.write();
        for orphan in state.orphans_among(&event_types) {
            let removed = state.remove(orphan);
            debug!(removed, "Pruned subscriptions of a dropped subscriber");
        }
        subscriptions.into_iter().filter_map(|s| state.insert(s)).collect()
    }

    /// Snapshot of the subscriptions for `event_type`.
    #[must_use]
    pub fn subscriptions_for(&self, event_type: EventType) -> Option<SubscriptionList> {
        self.state.read().by_event_type.get(&event_type).cloned()
    }

    /// Removes and cancels every subscription of `subscriber`.
    ///
    /// Returns the number of subscriptions removed; zero when the subscriber was unknown.
    pub fn remove_all(&self, subscriber: SubscriberId) -> usize {
        self.state.write().remove(subscriber)
    }

    #[must_use]
    pub fn contains(&self, subscriber: SubscriberId) -> bool {
        self.state.read().by_subscriber.contains_key(&subscriber)
    }

    #[must_use]
    pub fn has_subscriptions_for(&self, event_type: EventType) -> bool {
        self.state.read().by_event_type.contains_key(&event_type)
    }

    /// Number of distinct subscribers currently registered.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.state.read().by_subscriber.len()
    }

    /// Checks that both indices describe the same set of bindings and hold no empty entries.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let state = self.state.read();

        let forward = state.by_event_type.iter().all(|(event_type, list)| {
            !list.is_empty()
                && list.iter().all(|s| {
                    s.event_type() == *event_type
                        && state
                            .by_subscriber
                            .get(&s.subscriber())
                            .is_some_and(|bound| bound.contains(event_type))
                })
        });

        let backward = state.by_subscriber.iter().all(|(subscriber, bound)| {
            !bound.is_empty()
                && bound.iter().all(|event_type| {
                    state
                        .by_event_type
                        .get(event_type)
                        .is_some_and(|list| list.iter().any(|s| s.subscriber() == *subscriber))
                })
        });

        forward && backward
    }
}

use crate::event::{AnyEvent, Event, EventType};
use fxhash::FxHashMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// Keeps the most recent sticky event of each type.
#[derive(Debug, Default)]
pub struct StickyEventStore {
    events: RwLock<FxHashMap<EventType, AnyEvent>>,
}

impl StickyEventStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `event` under `event_type`, returning the value it replaced.
    pub fn put(&self, event_type: EventType, event: AnyEvent) -> Option<AnyEvent> {
        self.events.write().insert(event_type, event)
    }

    #[must_use]
    pub fn get(&self, event_type: EventType) -> Option<AnyEvent> {
        self.events.read().get(&event_type).cloned()
    }

    #[must_use]
    pub fn get_typed<T: Event>(&self) -> Option<Arc<T>> {
        self.get(EventType::of::<T>()).and_then(|event| event.downcast().ok())
    }

    pub fn remove(&self, event_type: EventType) -> Option<AnyEvent> {
        self.events.write().remove(&event_type)
    }

    pub fn remove_typed<T: Event>(&self) -> Option<Arc<T>> {
        self.remove(EventType::of::<T>()).and_then(|event| event.downcast().ok())
    }

    /// Removes the stored event of type `T` only if it is `event` itself or equal to it.
    pub fn remove_if_equal<T: Event + PartialEq>(&self, event: &T) -> bool {
        let event_type = EventType::of::<T>();
        let mut events = self.events.write();

        let matches = events
            .get(&event_type)
            .and_then(|stored| stored.downcast_ref::<T>())
            .is_some_and(|stored| std::ptr::eq(stored, event) || stored == event);

        if matches {
            events.remove(&event_type);
        }
        matches
    }

    /// Removes the stored event of type `T` only if it is the very instance `event` points to.
    pub fn remove_if_same<T: Event>(&self, event: &Arc<T>) -> bool {
        let event_type = EventType::of::<T>();
        let mut events = self.events.write();

        let same = events
            .get(&event_type)
            .is_some_and(|stored| std::ptr::addr_eq(Arc::as_ptr(stored), Arc::as_ptr(event)));

        if same {
            events.remove(&event_type);
        }
        same
    }

    /// Drops every stored event and returns how many there were.
    pub fn clear(&self) -> usize {
        let mut events = self.events.write();
        let count = events.len();
        events.clear();
        count
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Location(&'static str);

    #[derive(Debug, PartialEq)]
    struct Battery(u8);

    fn put<T: Event>(store: &StickyEventStore, event: T) {
        store.put(EventType::of::<T>(), Arc::new(event));
    }

    #[test]
    fn test_put_replaces_previous_value() {
        let store = StickyEventStore::new();
        put(&store, Location("home"));
        put(&store, Location("office"));
        put(&store, Battery(80));

        assert_eq!(store.len(), 2);
        assert_eq!(*store.get_typed::<Location>().unwrap(), Location("office"));
    }

    #[test]
    fn test_remove_returns_and_clears() {
        let store = StickyEventStore::new();
        put(&store, Battery(42));

        assert_eq!(*store.remove_typed::<Battery>().unwrap(), Battery(42));
        assert!(store.remove_typed::<Battery>().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_if_equal_checks_stored_value() {
        let store = StickyEventStore::new();
        put(&store, Location("home"));

        assert!(!store.remove_if_equal(&Location("office")));
        assert!(!store.remove_if_equal(&Battery(1)));
        assert!(store.remove_if_equal(&Location("home")));
        assert!(store.get_typed::<Location>().is_none());
    }

    #[test]
    fn test_remove_if_same_matches_identity_only() {
        struct Token;

        let store = StickyEventStore::new();
        let stored = Arc::new(Token);
        store.put(EventType::of::<Token>(), Arc::clone(&stored) as AnyEvent);

        assert!(!store.remove_if_same(&Arc::new(Token)));
        assert!(store.remove_if_same(&stored));
        assert!(store.is_empty());
        assert!(!store.remove_if_same(&stored));
    }

    #[test]
    fn test_clear_reports_dropped_count() {
        let store = StickyEventStore::new();
        put(&store, Location("home"));
        put(&store, Battery(5));

        assert_eq!(store.clear(), 2);
        assert!(store.is_empty());
    }
}

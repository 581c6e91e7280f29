use crate::config::BusConfig;
use crate::event::{AnyEvent, EventType};
use crate::handler::HandlerError;
use crate::lanes::{Lanes, Task};
use crate::registry::SubscriptionRegistry;
use crate::sticky::StickyEventStore;
use crate::subscription::Subscription;
use crate::system_events::{NoSubscriberEvent, SubscriberExceptionEvent, is_system_event};
use crate::thread_mode::ThreadMode;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, trace};

/// The delivery pipeline shared by every clone of a bus.
///
/// No lock is held while a handler runs: the registry hands out snapshots and the sticky
/// store hands out cloned `Arc`s.
#[derive(Debug)]
pub(crate) struct Dispatcher {
    pub(crate) registry: SubscriptionRegistry,
    pub(crate) sticky: StickyEventStore,
    pub(crate) lanes: Lanes,
    pub(crate) config: BusConfig,
}

impl Dispatcher {
    pub(crate) fn new(lanes: Lanes, config: BusConfig) -> Self {
        Self {
            registry: SubscriptionRegistry::new(),
            sticky: StickyEventStore::new(),
            lanes,
            config,
        }
    }

    /// Routes `event` to every subscription currently registered for its exact type.
    pub(crate) fn post(self: &Arc<Self>, event_type: EventType, event: AnyEvent) {
        let subscriptions = self
            .registry
            .subscriptions_for(event_type)
            .filter(|list| list.iter().any(|s| s.is_active()));

        let Some(subscriptions) = subscriptions else {
            self.no_subscriber(event_type, event);
            return;
        };

        trace!(event = event_type.name(), subscriptions = subscriptions.len(), "Dispatching event");
        for subscription in subscriptions.iter() {
            self.enqueue(Arc::clone(subscription), Arc::clone(&event));
        }
    }

    /// Delivers stored sticky events to freshly accepted subscriptions.
    pub(crate) fn replay_sticky(self: &Arc<Self>, accepted: &[Arc<Subscription>]) {
        for subscription in accepted.iter().filter(|s| s.method().is_sticky()) {
            let Some(event) = self.sticky.get(subscription.event_type()) else {
                continue;
            };
            trace!(
                event = subscription.event_type().name(),
                method = subscription.method().method(),
                "Replaying sticky event"
            );
            self.enqueue(Arc::clone(subscription), event);
        }
    }

    fn enqueue(self: &Arc<Self>, subscription: Arc<Subscription>, event: AnyEvent) {
        let mode = subscription.thread_mode();
        if mode == ThreadMode::Posting {
            self.invoke(&subscription, &event);
            return;
        }

        let method = *subscription.method();
        let dispatcher = Arc::clone(self);
        let task: Task = Box::new(move || dispatcher.invoke(&subscription, &event));

        if let Err(err) = self.lanes.schedule(mode, task) {
            error!(
                event = method.event_type().name(),
                subscriber = method.subscriber_type_name(),
                method = method.method(),
                ?mode,
                %err,
                "Failed to schedule delivery"
            );
        }
    }

    fn invoke(self: &Arc<Self>, subscription: &Subscription, event: &AnyEvent) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| subscription.invoke(event.as_ref())))
            .unwrap_or_else(|payload| Some(Err(HandlerError::from_panic(&*payload))));

        match outcome {
            None => debug!(
                event = subscription.event_type().name(),
                method = subscription.method().method(),
                "Skipped delivery to an unregistered subscriber"
            ),
            Some(Ok(())) => {},
            Some(Err(err)) => self.handler_failed(subscription, event, err),
        }
    }

    fn handler_failed(
        self: &Arc<Self>,
        subscription: &Subscription,
        event: &AnyEvent,
        err: HandlerError,
    ) {
        let method = subscription.method();
        let event_type = method.event_type();

        if self.config.log_subscriber_exceptions {
            error!(
                event = event_type.name(),
                subscriber = method.subscriber_type_name(),
                method = method.method(),
                mode = ?method.thread_mode(),
                %err,
                "Subscriber failed to handle event"
            );
        }

        if event_type == EventType::of::<SubscriberExceptionEvent>() {
            return;
        }

        if self.config.send_subscriber_exception_event {
            let exception = SubscriberExceptionEvent::new(err, Arc::clone(event), *method);
            self.post(EventType::of::<SubscriberExceptionEvent>(), Arc::new(exception));
        }
    }

    fn no_subscriber(self: &Arc<Self>, event_type: EventType, event: AnyEvent) {
        if self.config.log_no_subscriber_messages {
            debug!(event = event_type.name(), "No subscribers registered for event");
        }

        if self.config.send_no_subscriber_event && !is_system_event(event_type) {
            let notice = NoSubscriberEvent { event_type, event };
            self.post(EventType::of::<NoSubscriberEvent>(), Arc::new(notice));
        }
    }
}

use crate::event::{AnyEvent, EventType};
use crate::handler::HandlerError;
use crate::method::MethodDescriptor;
use std::fmt;

/// Posted by the bus when a handler fails.
///
/// A handler of this event that fails itself is only logged, never re-posted.
pub struct SubscriberExceptionEvent {
    pub error: HandlerError,
    pub causing_event: AnyEvent,
    pub causing_event_type: EventType,
    pub method: MethodDescriptor,
}

impl SubscriberExceptionEvent {
    pub(crate) fn new(
        error: HandlerError,
        causing_event: AnyEvent,
        method: MethodDescriptor,
    ) -> Self {
        Self { error, causing_event_type: method.event_type(), causing_event, method }
    }

    /// Name of the subscriber type whose handler failed.
    #[must_use]
    pub const fn subscriber_type(&self) -> &'static str {
        self.method.subscriber_type_name()
    }
}

impl fmt::Debug for SubscriberExceptionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberExceptionEvent")
            .field("error", &self.error)
            .field("causing_event_type", &self.causing_event_type)
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

/// Posted by the bus when an event found no subscriber.
pub struct NoSubscriberEvent {
    pub event_type: EventType,
    pub event: AnyEvent,
}

impl fmt::Debug for NoSubscriberEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoSubscriberEvent")
            .field("event_type", &self.event_type)
            .finish_non_exhaustive()
    }
}

/// Whether `event_type` is one of the events the bus posts about itself.
pub(crate) fn is_system_event(event_type: EventType) -> bool {
    event_type == EventType::of::<SubscriberExceptionEvent>()
        || event_type == EventType::of::<NoSubscriberEvent>()
}

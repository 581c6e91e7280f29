use crate::event::{Event, EventType};
use crate::handler::{HandlerError, HandlerOutput};
use crate::thread_mode::ThreadMode;
use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A type that owns event handlers.
///
/// This is the discovery capability the bus consumes: it lists the handlers of `Self`
/// in a stable order. Implement it by hand as an explicit registration table, or derive it
/// with [`#[subscriber]`](crate::subscriber).
///
/// ```rust
/// use herald_event_bus::{Subscriber, SubscriberMethod, ThreadMode};
///
/// struct Audit;
/// struct LoggedIn(u64);
///
/// impl Audit {
///     fn on_login(&self, _event: &LoggedIn) {}
/// }
///
/// impl Subscriber for Audit {
///     fn subscriber_methods() -> Vec<SubscriberMethod<Self>> {
///         vec![SubscriberMethod::new("on_login", ThreadMode::Posting, false, Self::on_login)]
///     }
/// }
///
/// assert_eq!(Audit::subscriber_methods().len(), 1);
/// ```
pub trait Subscriber: Send + Sync + 'static {
    fn subscriber_methods() -> Vec<SubscriberMethod<Self>>
    where
        Self: Sized;
}

/// Describes one handler: where it is declared, what it listens to and how it is delivered.
///
/// Equality covers the signature only (declaring type, method name, event type), so the same
/// handler declared twice is recognised as a duplicate regardless of its delivery options.
#[derive(Clone, Copy)]
pub struct MethodDescriptor {
    subscriber_type: TypeId,
    subscriber_type_name: &'static str,
    method: &'static str,
    event_type: EventType,
    thread_mode: ThreadMode,
    sticky: bool,
}

impl MethodDescriptor {
    #[must_use]
    pub const fn subscriber_type(&self) -> TypeId {
        self.subscriber_type
    }

    #[must_use]
    pub const fn subscriber_type_name(&self) -> &'static str {
        self.subscriber_type_name
    }

    #[must_use]
    pub const fn method(&self) -> &'static str {
        self.method
    }

    #[must_use]
    pub const fn event_type(&self) -> EventType {
        self.event_type
    }

    #[must_use]
    pub const fn thread_mode(&self) -> ThreadMode {
        self.thread_mode
    }

    #[must_use]
    pub const fn is_sticky(&self) -> bool {
        self.sticky
    }
}

impl PartialEq for MethodDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.subscriber_type == other.subscriber_type
            && self.method == other.method
            && self.event_type == other.event_type
    }
}

impl Eq for MethodDescriptor {}

impl Hash for MethodDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.subscriber_type.hash(state);
        self.method.hash(state);
        self.event_type.hash(state);
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("subscriber", &self.subscriber_type_name)
            .field("method", &self.method)
            .field("event", &self.event_type)
            .field("thread_mode", &self.thread_mode)
            .field("sticky", &self.sticky)
            .finish()
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}({})", self.subscriber_type_name, self.method, self.event_type)
    }
}

pub(crate) type ErasedHandler<S> =
    Arc<dyn Fn(&S, &(dyn Any + Send + Sync)) -> Result<(), HandlerError> + Send + Sync>;

/// One handler of subscriber type `S`, with its event type erased.
pub struct SubscriberMethod<S> {
    descriptor: MethodDescriptor,
    handler: ErasedHandler<S>,
}

impl<S: Subscriber> SubscriberMethod<S> {
    /// Builds a handler entry for events of type `E`.
    ///
    /// `handler` may return `()` or `Result<(), Err>`; see [`HandlerOutput`].
    pub fn new<E, F, R>(
        method: &'static str,
        thread_mode: ThreadMode,
        sticky: bool,
        handler: F,
    ) -> Self
    where
        E: Event,
        F: Fn(&S, &E) -> R + Send + Sync + 'static,
        R: HandlerOutput + 'static,
    {
        let event_type = EventType::of::<E>();
        let descriptor = MethodDescriptor {
            subscriber_type: TypeId::of::<S>(),
            subscriber_type_name: std::any::type_name::<S>(),
            method,
            event_type,
            thread_mode,
            sticky,
        };

        let handler: ErasedHandler<S> =
            Arc::new(move |subscriber: &S, event: &(dyn Any + Send + Sync)| {
                let Some(event) = event.downcast_ref::<E>() else {
                    return Err(HandlerError::TypeMismatch {
                        message: format!("expected {}", event_type.name()).into(),
                        context: Some(method.into()),
                    });
                };
                handler(subscriber, event).into_handler_result()
            });

        Self { descriptor, handler }
    }
}

impl<S> SubscriberMethod<S> {
    #[must_use]
    pub const fn descriptor(&self) -> &MethodDescriptor {
        &self.descriptor
    }

    #[must_use]
    pub const fn event_type(&self) -> EventType {
        self.descriptor.event_type
    }

    #[must_use]
    pub const fn thread_mode(&self) -> ThreadMode {
        self.descriptor.thread_mode
    }

    #[must_use]
    pub const fn is_sticky(&self) -> bool {
        self.descriptor.sticky
    }

    pub(crate) fn handler(&self) -> ErasedHandler<S> {
        Arc::clone(&self.handler)
    }

    /// Invokes the handler directly, bypassing the bus.
    ///
    /// # Errors
    /// Returns whatever the handler reports, or [`HandlerError::TypeMismatch`] if `event`
    /// is not of the registered event type.
    pub fn invoke(
        &self,
        subscriber: &S,
        event: &(dyn Any + Send + Sync),
    ) -> Result<(), HandlerError> {
        (self.handler)(subscriber, event)
    }
}

impl<S> Clone for SubscriberMethod<S> {
    fn clone(&self) -> Self {
        Self { descriptor: self.descriptor, handler: Arc::clone(&self.handler) }
    }
}

impl<S> fmt::Debug for SubscriberMethod<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberMethod")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

use crate::event::EventType;
use crate::handler::HandlerError;
use crate::method::{MethodDescriptor, Subscriber, SubscriberMethod};
use crate::thread_mode::ThreadMode;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Identity token of a registered subscriber: the address of its `Arc` allocation.
///
/// The registry keys subscribers by this token and keeps only weak references, so it never
/// extends a subscriber's lifetime. The allocation cannot be reused while a weak reference
/// to it exists, so a token stays unique for as long as any subscription carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(usize);

impl SubscriberId {
    #[must_use]
    pub fn of<S>(subscriber: &Arc<S>) -> Self {
        Self(Arc::as_ptr(subscriber).cast::<()>().addr())
    }
}

/// Shared cancellation flag of a subscription.
///
/// Queued deliveries check it right before invoking the handler.
#[derive(Debug, Clone, Default)]
pub struct DeliveryHandle(Arc<AtomicBool>);

impl DeliveryHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

type Erased<'a> = &'a (dyn Any + Send + Sync);
type Invoker = Arc<
    dyn Fn(&(dyn Any + Send + Sync), &(dyn Any + Send + Sync)) -> Result<(), HandlerError>
        + Send
        + Sync,
>;

/// The live binding between one subscriber instance and one of its handlers.
pub struct Subscription {
    subscriber: SubscriberId,
    method: MethodDescriptor,
    target: Weak<dyn Any + Send + Sync>,
    invoker: Invoker,
    handle: DeliveryHandle,
}

impl Subscription {
    pub fn new<S: Subscriber>(subscriber: &Arc<S>, method: &SubscriberMethod<S>) -> Self {
        let handler = method.handler();
        let declared = *method.descriptor();
        let invoker: Invoker =
            Arc::new(move |target: &(dyn Any + Send + Sync), event: &(dyn Any + Send + Sync)| {
                let Some(subscriber) = target.downcast_ref::<S>() else {
                    return Err(HandlerError::TypeMismatch {
                        message: format!("expected {}", declared.subscriber_type_name()).into(),
                        context: Some(declared.method().into()),
                    });
                };
                handler(subscriber, event)
            });

        let target = Arc::downgrade(subscriber);
        let target: Weak<dyn Any + Send + Sync> = target;

        Self {
            subscriber: SubscriberId::of(subscriber),
            method: declared,
            target,
            invoker,
            handle: DeliveryHandle::default(),
        }
    }

    #[must_use]
    pub const fn subscriber(&self) -> SubscriberId {
        self.subscriber
    }

    #[must_use]
    pub const fn method(&self) -> &MethodDescriptor {
        &self.method
    }

    #[must_use]
    pub const fn event_type(&self) -> EventType {
        self.method.event_type()
    }

    #[must_use]
    pub const fn thread_mode(&self) -> ThreadMode {
        self.method.thread_mode()
    }

    #[must_use]
    pub const fn handle(&self) -> &DeliveryHandle {
        &self.handle
    }

    /// Whether the subscriber object has been dropped.
    #[must_use]
    pub fn is_orphaned(&self) -> bool {
        self.target.strong_count() == 0
    }

    /// Whether a delivery started now would reach the handler.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.handle.is_cancelled() && !self.is_orphaned()
    }

    /// Invokes the handler with `event`.
    ///
    /// Returns `None` when the subscription was cancelled or the subscriber is gone.
    pub(crate) fn invoke(&self, event: Erased<'_>) -> Option<Result<(), HandlerError>> {
        if self.handle.is_cancelled() {
            return None;
        }
        let target = self.target.upgrade()?;
        Some((self.invoker)(target.as_ref(), event))
    }
}

impl PartialEq for Subscription {
    fn eq(&self, other: &Self) -> bool {
        self.subscriber == other.subscriber && self.method == other.method
    }
}

impl Eq for Subscription {}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("subscriber", &self.subscriber)
            .field("method", &self.method)
            .field("cancelled", &self.handle.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Ping;

    #[derive(Default)]
    struct Listener {
        seen: AtomicUsize,
    }

    impl Listener {
        fn on_ping(&self, _event: &Ping) {
            self.seen.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl Subscriber for Listener {
        fn subscriber_methods() -> Vec<SubscriberMethod<Self>> {
            vec![SubscriberMethod::new("on_ping", ThreadMode::Posting, false, Self::on_ping)]
        }
    }

    fn subscribe(listener: &Arc<Listener>) -> Subscription {
        Subscription::new(listener, &Listener::subscriber_methods()[0])
    }

    #[test]
    fn test_equality_is_instance_and_descriptor() {
        let first = Arc::new(Listener::default());
        let second = Arc::new(Listener::default());

        assert_eq!(subscribe(&first), subscribe(&first));
        assert_ne!(subscribe(&first), subscribe(&second));
    }

    #[test]
    fn test_subscription_does_not_keep_subscriber_alive() {
        let listener = Arc::new(Listener::default());
        let subscription = subscribe(&listener);

        assert!(subscription.invoke(&Ping).is_some());
        assert_eq!(listener.seen.load(Ordering::SeqCst), 1);

        drop(listener);
        assert!(subscription.is_orphaned());
        assert!(subscription.invoke(&Ping).is_none());
    }

    #[test]
    fn test_cancelled_subscription_skips_delivery() {
        let listener = Arc::new(Listener::default());
        let subscription = subscribe(&listener);

        subscription.handle().cancel();
        assert!(!subscription.is_active());
        assert!(subscription.invoke(&Ping).is_none());
        assert_eq!(listener.seen.load(Ordering::SeqCst), 0);
    }
}

use crate::config::{BusConfig, MainLaneKind};
use crate::dispatch::Dispatcher;
use crate::error::EventBusError;
use crate::event::{AnyEvent, Event, EventType};
use crate::finder::SubscriberMethodFinder;
use crate::lanes::{Lanes, MainThread, Scheduler};
use crate::method::Subscriber;
use crate::subscription::{SubscriberId, Subscription};
use std::sync::{Arc, OnceLock};
use tokio::runtime::Handle;
use tracing::{debug, warn};

static DEFAULT_BUS: OnceLock<EventBus> = OnceLock::new();

/// A thread-safe, in-process publish/subscribe bus.
///
/// Cloning is cheap; clones share the same subscriptions, sticky events and lanes.
#[derive(Debug, Clone)]
pub struct EventBus {
    dispatcher: Arc<Dispatcher>,
    finder: Arc<SubscriberMethodFinder>,
}

impl EventBus {
    #[must_use]
    pub fn builder() -> EventBusBuilder {
        EventBusBuilder::new()
    }

    /// Creates a bus with the default configuration.
    ///
    /// # Errors
    /// Returns [`EventBusError::Io`] if the main lane thread cannot be spawned.
    pub fn new() -> Result<Self, EventBusError> {
        EventBusBuilder::new().build()
    }

    /// Returns the process-wide bus, creating it on first access.
    ///
    /// The configuration is read from `HERALD__*` environment variables; a malformed
    /// environment is logged and replaced by the defaults.
    ///
    /// # Panics
    /// Panics if the bus cannot be created on first access (e.g. the OS refuses to spawn
    /// the main lane thread). This is a fatal startup error.
    pub fn get_default() -> &'static Self {
        DEFAULT_BUS.get_or_init(|| {
            let config = BusConfig::from_env().unwrap_or_else(|err| {
                warn!(%err, "Invalid event bus configuration, falling back to defaults");
                BusConfig::default()
            });
            EventBusBuilder::new()
                .config(config)
                .build()
                .expect("CRITICAL: Failed to create the default event bus")
        })
    }

    /// Registers every handler of `subscriber`.
    ///
    /// All handlers are installed under one lock, so other threads never observe a
    /// half-registered subscriber. Handlers already registered for this instance are ignored.
    /// Sticky handlers immediately receive the stored event of their type, if any.
    ///
    /// The bus keeps only a weak reference to `subscriber`.
    ///
    /// # Errors
    /// * [`EventBusError::NoSubscriberMethods`] if `S` declares no handlers.
    /// * [`EventBusError::UnsupportedThreadMode`] if a handler needs the MAIN lane and the bus
    ///   has none. Nothing of `subscriber` is registered in that case.
    ///
    /// # Examples
    /// ```rust
    /// use herald_event_bus::{EventBus, subscriber};
    /// use std::sync::Arc;
    /// use std::sync::atomic::{AtomicU64, Ordering};
    ///
    /// struct Deposit(u64);
    ///
    /// #[derive(Default)]
    /// struct Ledger {
    ///     total: AtomicU64,
    /// }
    ///
    /// #[subscriber]
    /// impl Ledger {
    ///     #[subscribe]
    ///     fn on_deposit(&self, event: &Deposit) {
    ///         self.total.fetch_add(event.0, Ordering::SeqCst);
    ///     }
    /// }
    ///
    /// # fn main() -> Result<(), herald_event_bus::EventBusError> {
    /// let bus = EventBus::new()?;
    /// let ledger = Arc::new(Ledger::default());
    /// bus.register(&ledger)?;
    /// bus.post(Deposit(5));
    /// assert_eq!(ledger.total.load(Ordering::SeqCst), 5);
    /// # Ok(())
    /// # }
    /// ```
    pub fn register<S: Subscriber>(&self, subscriber: &Arc<S>) -> Result<(), EventBusError> {
        let methods = self.finder.find::<S>()?;

        if let Some(method) =
            methods.iter().find(|m| !self.dispatcher.lanes.supports(m.thread_mode()))
        {
            return Err(EventBusError::UnsupportedThreadMode {
                message: format!(
                    "{} needs the {} lane, which this bus does not provide",
                    method.descriptor(),
                    method.thread_mode()
                )
                .into(),
                context: None,
            });
        }

        let accepted = self
            .dispatcher
            .registry
            .add_all(methods.iter().map(|method| Subscription::new(subscriber, method)));

        debug!(
            subscriber = std::any::type_name::<S>(),
            accepted = accepted.len(),
            "Subscriber registered"
        );
        self.dispatcher.replay_sticky(&accepted);
        Ok(())
    }

    /// Removes every handler of `subscriber`.
    ///
    /// Deliveries already handed to a lane are skipped if they have not started yet; a handler
    /// that is running finishes normally. Returns `false` if nothing was registered, which is
    /// not an error.
    pub fn unregister<S>(&self, subscriber: &Arc<S>) -> bool {
        let removed = self.dispatcher.registry.remove_all(SubscriberId::of(subscriber));
        if removed == 0 {
            debug!(
                subscriber = std::any::type_name::<S>(),
                "Unregister ignored: subscriber was not registered"
            );
            return false;
        }
        debug!(subscriber = std::any::type_name::<S>(), removed, "Subscriber unregistered");
        true
    }

    #[must_use]
    pub fn is_registered<S>(&self, subscriber: &Arc<S>) -> bool {
        self.dispatcher.registry.contains(SubscriberId::of(subscriber))
    }

    /// Delivers `event` to every handler registered for its exact type.
    ///
    /// POSTING handlers run before this returns; the other modes are only queued. Handler
    /// failures are logged and never reach the caller.
    pub fn post<E: Event>(&self, event: E) {
        self.post_arc(Arc::new(event));
    }

    /// Same as [`post`](Self::post) for an already shared event.
    pub fn post_arc<E: Event>(&self, event: Arc<E>) {
        self.dispatcher.post(EventType::of::<E>(), event);
    }

    /// Stores `event` as the sticky event of its type, then posts it.
    ///
    /// # Examples
    /// ```rust
    /// use herald_event_bus::EventBus;
    ///
    /// #[derive(Debug, PartialEq)]
    /// struct Theme(&'static str);
    ///
    /// # fn main() -> Result<(), herald_event_bus::EventBusError> {
    /// let bus = EventBus::new()?;
    /// bus.post_sticky(Theme("dark"));
    /// assert_eq!(*bus.sticky_event::<Theme>().unwrap(), Theme("dark"));
    /// # Ok(())
    /// # }
    /// ```
    pub fn post_sticky<E: Event>(&self, event: E) {
        self.post_sticky_arc(Arc::new(event));
    }

    pub fn post_sticky_arc<E: Event>(&self, event: Arc<E>) {
        let event_type = EventType::of::<E>();
        let event: AnyEvent = event;
        self.dispatcher.sticky.put(event_type, Arc::clone(&event));
        self.dispatcher.post(event_type, event);
    }

    /// The stored sticky event of type `E`, without removing it.
    #[must_use]
    pub fn sticky_event<E: Event>(&self) -> Option<Arc<E>> {
        self.dispatcher.sticky.get_typed::<E>()
    }

    /// Removes and returns the sticky event of type `E`.
    pub fn remove_sticky_event_by_type<E: Event>(&self) -> Option<Arc<E>> {
        self.dispatcher.sticky.remove_typed::<E>()
    }

    /// Removes the sticky event of `event`'s type only if the stored one equals `event`.
    pub fn remove_sticky_event<E: Event + PartialEq>(&self, event: &E) -> bool {
        self.dispatcher.sticky.remove_if_equal(event)
    }

    /// Removes the sticky event of `E` only if it is the instance `event` points to.
    ///
    /// Works for event types without `PartialEq`; pair it with
    /// [`post_sticky_arc`](Self::post_sticky_arc) to keep the instance.
    pub fn remove_sticky_event_arc<E: Event>(&self, event: &Arc<E>) -> bool {
        self.dispatcher.sticky.remove_if_same(event)
    }

    pub fn remove_all_sticky_events(&self) {
        let removed = self.dispatcher.sticky.clear();
        debug!(removed, "Sticky events cleared");
    }

    #[must_use]
    pub fn has_subscriber_for_event<E: Event>(&self) -> bool {
        self.dispatcher.registry.has_subscriptions_for(EventType::of::<E>())
    }

    /// Whether both subscription indices agree with each other.
    ///
    /// Meant for diagnostics and tests; it takes the registry read lock.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.dispatcher.registry.is_consistent()
    }

    #[must_use]
    pub fn config(&self) -> &BusConfig {
        &self.dispatcher.config
    }
}

/// Configures and creates an [`EventBus`].
#[derive(Debug, Default)]
pub struct EventBusBuilder {
    config: BusConfig,
    runtime: Option<Handle>,
    main_scheduler: Option<Arc<dyn Scheduler>>,
}

impl EventBusBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn config(mut self, config: BusConfig) -> Self {
        self.config = config;
        self
    }

    /// Runtime that drives the BACKGROUND lane. Defaults to the process runtime.
    #[must_use]
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Scheduler for the MAIN lane. Takes precedence over the configured lane kind.
    #[must_use]
    pub fn main_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.main_scheduler = Some(scheduler);
        self
    }

    #[must_use]
    pub fn log_subscriber_exceptions(mut self, enabled: bool) -> Self {
        self.config.log_subscriber_exceptions = enabled;
        self
    }

    #[must_use]
    pub fn log_no_subscriber_messages(mut self, enabled: bool) -> Self {
        self.config.log_no_subscriber_messages = enabled;
        self
    }

    #[must_use]
    pub fn send_subscriber_exception_event(mut self, enabled: bool) -> Self {
        self.config.send_subscriber_exception_event = enabled;
        self
    }

    #[must_use]
    pub fn send_no_subscriber_event(mut self, enabled: bool) -> Self {
        self.config.send_no_subscriber_event = enabled;
        self
    }

    #[must_use]
    pub fn background_concurrency(mut self, permits: usize) -> Self {
        self.config.background_concurrency = permits;
        self
    }

    #[must_use]
    pub fn main_lane(mut self, kind: MainLaneKind) -> Self {
        self.config.main_lane = kind;
        self
    }

    /// # Errors
    /// Returns [`EventBusError::Io`] if the dedicated main lane thread cannot be spawned.
    pub fn build(self) -> Result<EventBus, EventBusError> {
        let config = self.config.normalized();

        let main = match (self.main_scheduler, config.main_lane) {
            (Some(scheduler), _) => Some(scheduler),
            (None, MainLaneKind::Dedicated) => {
                Some(Arc::new(MainThread::spawn()?) as Arc<dyn Scheduler>)
            },
            (None, MainLaneKind::Disabled) => None,
        };
        let runtime =
            self.runtime.unwrap_or_else(|| herald_runtime::get_global_runtime().handle().clone());

        debug!(
            background_concurrency = config.background_concurrency,
            main_lane = main.is_some(),
            "Event bus created"
        );

        let lanes = Lanes::new(main, runtime, config.background_concurrency);
        Ok(EventBus {
            dispatcher: Arc::new(Dispatcher::new(lanes, config)),
            finder: Arc::new(SubscriberMethodFinder::new()),
        })
    }

    /// Builds the bus and makes it the one returned by [`EventBus::get_default`].
    ///
    /// # Errors
    /// Returns [`EventBusError::DefaultAlreadyInstalled`] if the default bus already exists,
    /// or any error of [`build`](Self::build).
    pub fn install_default(self) -> Result<&'static EventBus, EventBusError> {
        DEFAULT_BUS.set(self.build()?).map_err(|_| EventBusError::DefaultAlreadyInstalled {
            message: "EventBus::get_default() was already initialised".into(),
            context: None,
        })?;
        DEFAULT_BUS.get().ok_or_else(|| EventBusError::from("default bus missing after install"))
    }
}

//! # Event Bus
//!
//! An in-process, type-safe publish/subscribe bus.
//!
//! ## Overview
//!
//! Components register handler methods for event types; publishers post events without
//! knowing who listens. Every event is routed to the handlers registered for its exact
//! Rust type, on the lane selected by each handler's [`ThreadMode`].
//!
//! ## Features
//!
//! * **Exact typing**: events are matched by `TypeId`, never by trait or supertype.
//! * **Four lanes**: inline (`posting`), a single ordered `main` lane, a bounded
//!   `background` pool and unbounded `async` tasks.
//! * **Sticky events**: the last sticky event of a type is replayed to late subscribers.
//! * **Failure isolation**: a failing or panicking handler is logged and reported as a
//!   [`SubscriberExceptionEvent`]; the publisher never sees it.
//! * **Weak subscribers**: the bus never keeps a subscriber alive.
//! * **High Performance**: `FxHashMap` + `parking_lot::RwLock`, copy-on-write subscription
//!   lists, no lock held while a handler runs.
//!
//! # Example
//!
//! ```rust
//! use herald_event_bus::{EventBus, EventBusError, subscriber};
//! use std::sync::{Arc, Mutex};
//!
//! struct UserCreated {
//!     id: u64,
//! }
//!
//! #[derive(Default)]
//! struct Directory {
//!     users: Mutex<Vec<u64>>,
//! }
//!
//! #[subscriber]
//! impl Directory {
//!     #[subscribe]
//!     fn on_user_created(&self, event: &UserCreated) {
//!         self.users.lock().unwrap().push(event.id);
//!     }
//! }
//!
//! fn main() -> Result<(), EventBusError> {
//!     let bus = EventBus::new()?;
//!     let directory = Arc::new(Directory::default());
//!
//!     bus.register(&directory)?;
//!     bus.post(UserCreated { id: 42 });
//!     assert_eq!(*directory.users.lock().unwrap(), vec![42]);
//!
//!     bus.unregister(&directory);
//!     bus.post(UserCreated { id: 43 });
//!     assert_eq!(directory.users.lock().unwrap().len(), 1);
//!     Ok(())
//! }
//! ```

extern crate self as herald_event_bus;

mod bus;
mod config;
mod dispatch;
mod error;
mod event;
mod finder;
mod handler;
mod lanes;
mod method;
mod registry;
mod sticky;
mod subscription;
mod system_events;
mod thread_mode;

pub use self::config::{BusConfig, MainLaneKind};
pub use bus::{EventBus, EventBusBuilder};
pub use error::{EventBusError, EventBusErrorExt};
pub use event::{AnyEvent, Event, EventType};
pub use finder::SubscriberMethodFinder;
pub use handler::{BoxError, HandlerError, HandlerErrorExt, HandlerOutput};
pub use lanes::{MainLoop, MainThread, Scheduler, Task};
pub use method::{MethodDescriptor, Subscriber, SubscriberMethod};
pub use registry::{SubscriptionList, SubscriptionRegistry};
pub use sticky::StickyEventStore;
pub use subscription::{DeliveryHandle, SubscriberId, Subscription};
pub use system_events::{NoSubscriberEvent, SubscriberExceptionEvent};
pub use thread_mode::ThreadMode;

/// Derives [`Subscriber`] for an inherent `impl` block.
///
/// Mark handler methods with `#[subscribe]`, optionally with `thread_mode = "..."` and
/// `sticky`. See the crate-level example.
pub use herald_derive::subscriber;

use herald_event_bus::{NoSubscriberEvent, SubscriberExceptionEvent, subscriber};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OrderPlaced {
    pub(crate) id: u64,
    pub(crate) quantity: u32,
}

/// Sticky: late subscribers learn the current link state on registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Connectivity {
    pub(crate) online: bool,
}

/// Nobody listens for this one.
#[derive(Debug)]
pub(crate) struct Heartbeat;

/// Work finished off the posting thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Done {
    Reserved(u64),
    Mailed(u64),
}

/// Screen state, updated on the main lane only.
#[derive(Debug, Default)]
pub(crate) struct Dashboard {
    pub(crate) orders: AtomicUsize,
}

#[subscriber]
impl Dashboard {
    #[subscribe(thread_mode = "main")]
    fn on_order(&self, event: &OrderPlaced) {
        let shown = self.orders.fetch_add(1, Ordering::SeqCst) + 1;
        info!(order = event.id, shown, "Dashboard updated");
    }

    #[subscribe(thread_mode = "main", sticky)]
    fn on_connectivity(&self, event: &Connectivity) {
        info!(online = event.online, "Dashboard link indicator changed");
    }
}

/// Reserves stock for each order on the background pool.
#[derive(Debug)]
pub(crate) struct Warehouse {
    done: Sender<Done>,
}

impl Warehouse {
    pub(crate) const fn new(done: Sender<Done>) -> Self {
        Self { done }
    }
}

#[subscriber]
impl Warehouse {
    #[subscribe(thread_mode = "background")]
    fn on_order(&self, event: &OrderPlaced) -> Result<(), String> {
        let _ = self.done.send(Done::Reserved(event.id));
        if event.quantity == 0 {
            return Err(format!("order {} has no items to reserve", event.id));
        }
        info!(order = event.id, quantity = event.quantity, "Stock reserved");
        Ok(())
    }
}

/// Sends a confirmation for each order as an independent async task.
#[derive(Debug)]
pub(crate) struct Mailer {
    done: Sender<Done>,
}

impl Mailer {
    pub(crate) const fn new(done: Sender<Done>) -> Self {
        Self { done }
    }
}

#[subscriber]
impl Mailer {
    #[subscribe(thread_mode = "async")]
    fn on_order(&self, event: &OrderPlaced) {
        info!(order = event.id, "Confirmation sent");
        let _ = self.done.send(Done::Mailed(event.id));
    }
}

/// Observes orders inline and collects the bus' own failure reports.
#[derive(Debug, Default)]
pub(crate) struct Audit {
    pub(crate) failures: AtomicUsize,
    pub(crate) unheard: AtomicUsize,
}

#[subscriber]
impl Audit {
    #[subscribe]
    fn on_order(&self, event: &OrderPlaced) {
        info!(order = event.id, "Order accepted");
    }

    #[subscribe]
    fn on_exception(&self, event: &SubscriberExceptionEvent) {
        self.failures.fetch_add(1, Ordering::SeqCst);
        warn!(handler = %event.method, error = %event.error, "Handler failure reported");
    }

    #[subscribe]
    fn on_no_subscriber(&self, event: &NoSubscriberEvent) {
        self.unheard.fetch_add(1, Ordering::SeqCst);
        info!(event_type = event.event_type.name(), "Event had no subscribers");
    }
}

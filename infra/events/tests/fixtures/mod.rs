use herald_event_bus::{
    EventBus, EventBusError, NoSubscriberEvent, Subscriber, SubscriberExceptionEvent,
    SubscriberMethod, ThreadMode, subscriber,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::Duration;

pub const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestEvent(pub usize);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OtherEvent(pub usize);

pub type Log = Arc<Mutex<Vec<(&'static str, usize)>>>;

pub fn bus() -> EventBus {
    EventBus::new().unwrap()
}

pub fn entries(log: &Log) -> Vec<(&'static str, usize)> {
    log.lock().unwrap().clone()
}

/// Appends every `TestEvent` to a shared log, tagged with its label.
pub struct Recorder {
    label: &'static str,
    log: Log,
}

#[subscriber]
impl Recorder {
    #[subscribe]
    fn on_test(&self, event: &TestEvent) {
        self.log.lock().unwrap().push((self.label, event.0));
    }
}

pub fn recorder(label: &'static str, log: &Log) -> Arc<Recorder> {
    Arc::new(Recorder { label, log: Arc::clone(log) })
}

/// Sticky listener for `TestEvent`.
#[derive(Default)]
pub struct StickyRecorder {
    pub seen: Mutex<Vec<usize>>,
}

#[subscriber]
impl StickyRecorder {
    #[subscribe(sticky)]
    fn on_test(&self, event: &TestEvent) {
        self.seen.lock().unwrap().push(event.0);
    }
}

/// Returns an error for every `TestEvent`.
pub struct Faulty;

#[subscriber]
impl Faulty {
    #[subscribe]
    fn on_test(&self, _event: &TestEvent) -> Result<(), std::io::Error> {
        Err(std::io::Error::other("faulty handler"))
    }
}

/// Panics on every `TestEvent`.
pub struct Panicky;

#[subscriber]
impl Panicky {
    #[subscribe]
    fn on_test(&self, _event: &TestEvent) {
        panic!("panicky handler");
    }
}

/// Keeps every `SubscriberExceptionEvent` it sees.
#[derive(Default)]
pub struct ExceptionWatcher {
    pub seen: Mutex<Vec<(String, Option<usize>, bool)>>,
}

#[subscriber]
impl ExceptionWatcher {
    #[subscribe]
    fn on_exception(&self, event: &SubscriberExceptionEvent) {
        let value = event.causing_event.downcast_ref::<TestEvent>().map(|e| e.0);
        let panicked = matches!(event.error, herald_event_bus::HandlerError::Panicked { .. });
        self.seen.lock().unwrap().push((event.method.method().to_owned(), value, panicked));
    }
}

/// Fails on every `SubscriberExceptionEvent` and counts the calls.
#[derive(Default)]
pub struct FaultyWatcher {
    pub calls: AtomicUsize,
}

#[subscriber]
impl FaultyWatcher {
    #[subscribe]
    fn on_exception(&self, _event: &SubscriberExceptionEvent) -> Result<(), String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err("watcher failed too".to_owned())
    }
}

/// Keeps the type names carried by `NoSubscriberEvent`.
#[derive(Default)]
pub struct NoSubscriberWatcher {
    pub seen: Mutex<Vec<&'static str>>,
}

#[subscriber]
impl NoSubscriberWatcher {
    #[subscribe]
    fn on_no_subscriber(&self, event: &NoSubscriberEvent) {
        self.seen.lock().unwrap().push(event.event_type.name());
    }
}

#[derive(Debug)]
pub struct Delivery {
    pub mode: ThreadMode,
    pub value: usize,
    pub thread: ThreadId,
    pub thread_name: Option<String>,
}

/// One `TestEvent` handler per thread mode; reports where each ran.
pub struct LaneReporter {
    tx: Sender<Delivery>,
}

impl LaneReporter {
    pub fn new() -> (Arc<Self>, Receiver<Delivery>) {
        let (tx, rx) = mpsc::channel();
        (Arc::new(Self { tx }), rx)
    }

    fn report(&self, mode: ThreadMode, event: &TestEvent) {
        let current = thread::current();
        let delivery = Delivery {
            mode,
            value: event.0,
            thread: current.id(),
            thread_name: current.name().map(str::to_owned),
        };
        let _ = self.tx.send(delivery);
    }
}

#[subscriber]
impl LaneReporter {
    #[subscribe(thread_mode = "posting")]
    fn on_posting(&self, event: &TestEvent) {
        self.report(ThreadMode::Posting, event);
    }

    #[subscribe(thread_mode = "main")]
    fn on_main(&self, event: &TestEvent) {
        self.report(ThreadMode::Main, event);
    }

    #[subscribe(thread_mode = "background")]
    fn on_background(&self, event: &TestEvent) {
        self.report(ThreadMode::Background, event);
    }

    #[subscribe(thread_mode = "async")]
    fn on_async(&self, event: &TestEvent) {
        self.report(ThreadMode::Async, event);
    }
}

/// Sticky `TestEvent` handlers on the MAIN and BACKGROUND lanes.
pub struct StickyLaneReporter {
    reporter: LaneReporter,
}

impl StickyLaneReporter {
    pub fn new() -> (Arc<Self>, Receiver<Delivery>) {
        let (tx, rx) = mpsc::channel();
        (Arc::new(Self { reporter: LaneReporter { tx } }), rx)
    }
}

#[subscriber]
impl StickyLaneReporter {
    #[subscribe(thread_mode = "main", sticky)]
    fn on_main(&self, event: &TestEvent) {
        self.reporter.report(ThreadMode::Main, event);
    }

    #[subscribe(thread_mode = "background", sticky)]
    fn on_background(&self, event: &TestEvent) {
        self.reporter.report(ThreadMode::Background, event);
    }
}

/// Sticky handler that registers, posts and unregisters on its own bus while it runs.
pub struct Rejoiner {
    bus: EventBus,
    pub follower: Arc<OtherRecorder>,
    pub leaver: Arc<Recorder>,
}

impl Rejoiner {
    pub fn new(bus: &EventBus, leaver: &Arc<Recorder>) -> Arc<Self> {
        Arc::new(Self {
            bus: bus.clone(),
            follower: Arc::new(OtherRecorder::default()),
            leaver: Arc::clone(leaver),
        })
    }
}

#[subscriber]
impl Rejoiner {
    #[subscribe(sticky)]
    fn on_test(&self, event: &TestEvent) -> Result<(), EventBusError> {
        self.bus.register(&self.follower)?;
        self.bus.post_sticky(OtherEvent(event.0 + 1));
        self.bus.unregister(&self.leaver);
        Ok(())
    }
}

/// Sticky payload without `PartialEq`.
pub struct Token(pub &'static str);

/// A single MAIN handler forwarding values to a channel.
pub struct MainListener {
    tx: Sender<(usize, ThreadId)>,
}

impl MainListener {
    pub fn new() -> (Arc<Self>, Receiver<(usize, ThreadId)>) {
        let (tx, rx) = mpsc::channel();
        (Arc::new(Self { tx }), rx)
    }
}

#[subscriber]
impl MainListener {
    #[subscribe(thread_mode = "MAIN")]
    fn on_test(&self, event: &TestEvent) {
        let _ = self.tx.send((event.0, thread::current().id()));
    }
}

/// Re-posts every `TestEvent` as an `OtherEvent` from inside its handler.
pub struct Relay {
    bus: EventBus,
}

impl Relay {
    pub fn new(bus: &EventBus) -> Arc<Self> {
        Arc::new(Self { bus: bus.clone() })
    }
}

#[subscriber]
impl Relay {
    #[subscribe]
    fn on_test(&self, event: &TestEvent) {
        self.bus.post(OtherEvent(event.0 + 1));
    }
}

#[derive(Default)]
pub struct OtherRecorder {
    pub seen: Mutex<Vec<usize>>,
}

#[subscriber]
impl OtherRecorder {
    #[subscribe]
    fn on_other(&self, event: &OtherEvent) {
        self.seen.lock().unwrap().push(event.0);
    }
}

/// Declares no handlers at all.
pub struct Mute;

impl Subscriber for Mute {
    fn subscriber_methods() -> Vec<SubscriberMethod<Self>> {
        Vec::new()
    }
}

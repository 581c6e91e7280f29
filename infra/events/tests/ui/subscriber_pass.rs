use herald_event_bus::{EventBus, Subscriber, ThreadMode, subscriber};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

struct Opened;
struct Closed;
struct Renamed(&'static str);

#[derive(Default)]
struct Window {
    events: AtomicUsize,
}

#[subscriber]
impl Window {
    #[subscribe]
    fn on_opened(&self, _event: &Opened) {
        self.events.fetch_add(1, Ordering::SeqCst);
    }

    #[subscribe(thread_mode = "Background", sticky = false)]
    fn on_closed(&self, _event: &Closed) -> Result<(), std::io::Error> {
        Ok(())
    }

    #[subscribe(sticky, thread_mode = "async")]
    fn on_renamed(&self, event: &Renamed) -> Result<(), String> {
        if event.0.is_empty() { Err("empty title".to_owned()) } else { Ok(()) }
    }

    fn title(&self) -> &'static str {
        "untitled"
    }
}

fn main() {
    let methods = Window::subscriber_methods();
    assert_eq!(methods.len(), 3);
    assert_eq!(methods[0].descriptor().method(), "on_opened");
    assert_eq!(methods[1].thread_mode(), ThreadMode::Background);
    assert!(!methods[1].is_sticky());
    assert_eq!(methods[2].thread_mode(), ThreadMode::Async);
    assert!(methods[2].is_sticky());

    let window = Arc::new(Window::default());
    assert_eq!(window.title(), "untitled");

    let bus = EventBus::new().unwrap();
    bus.register(&window).unwrap();
    bus.post(Opened);
    assert_eq!(window.events.load(Ordering::SeqCst), 1);
}

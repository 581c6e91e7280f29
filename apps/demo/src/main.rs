mod logging;
mod subscribers;

use anyhow::{Context, bail};
use herald_event_bus::{BusConfig, EventBus, MainLoop};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};
use subscribers::{
    Audit, Connectivity, Dashboard, Done, Heartbeat, Mailer, OrderPlaced, Warehouse,
};
use tracing::info;

const CONFIG_FILE: &str = "herald.toml";
const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);
const PUMP_INTERVAL: Duration = Duration::from_millis(20);

fn main() -> anyhow::Result<()> {
    logging::init()?;

    let config =
        BusConfig::load(CONFIG_FILE).context("Critical: Failed to load event bus configuration")?;

    // The demo thread plays the host's UI loop.
    let main_loop = Arc::new(MainLoop::new());
    let bus = EventBus::builder()
        .config(config)
        .main_scheduler(main_loop.clone())
        .install_default()
        .context("Critical: Failed to install the default event bus")?;

    info!(name = env!("CARGO_PKG_NAME"), version = env!("CARGO_PKG_VERSION"), "Starting");

    let (done_tx, done_rx) = mpsc::channel();
    let audit = Arc::new(Audit::default());
    let dashboard = Arc::new(Dashboard::default());
    let warehouse = Arc::new(Warehouse::new(done_tx.clone()));
    let mailer = Arc::new(Mailer::new(done_tx));

    bus.register(&audit)?;
    bus.post(Heartbeat);
    bus.post_sticky(Connectivity { online: true });

    // Registration replays the sticky link state onto the main lane.
    bus.register(&dashboard)?;
    bus.register(&warehouse)?;
    bus.register(&mailer)?;

    let orders = [
        OrderPlaced { id: 1, quantity: 3 },
        OrderPlaced { id: 2, quantity: 0 },
        OrderPlaced { id: 3, quantity: 1 },
    ];
    for order in &orders {
        bus.post(order.clone());
    }

    let (mut reserved, mut mailed) = (Vec::new(), Vec::new());
    let deadline = Instant::now() + SETTLE_TIMEOUT;
    while reserved.len() + mailed.len() < orders.len() * 2 {
        main_loop.pump();
        match done_rx.recv_timeout(PUMP_INTERVAL) {
            Ok(Done::Reserved(id)) => reserved.push(id),
            Ok(Done::Mailed(id)) => mailed.push(id),
            Err(RecvTimeoutError::Timeout) if Instant::now() < deadline => {},
            Err(RecvTimeoutError::Timeout) => bail!("Timed out waiting for order processing"),
            Err(RecvTimeoutError::Disconnected) => bail!("Order processors hung up"),
        }
    }
    main_loop.pump();

    info!(
        ?reserved,
        ?mailed,
        shown = dashboard.orders.load(Ordering::SeqCst),
        failures = audit.failures.load(Ordering::SeqCst),
        unheard = audit.unheard.load(Ordering::SeqCst),
        "Orders settled"
    );

    let unregistered = [
        bus.unregister(&dashboard),
        bus.unregister(&warehouse),
        bus.unregister(&mailer),
        bus.unregister(&audit),
    ];
    let link = bus.remove_sticky_event_by_type::<Connectivity>();
    info!(
        unregistered = unregistered.iter().filter(|removed| **removed).count(),
        sticky_cleared = link.is_some(),
        "Shutting down"
    );
    Ok(())
}

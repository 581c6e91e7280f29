use crate::error::EventBusError;
use crate::thread_mode::ThreadMode;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tokio::runtime::Handle;
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, error};

/// A unit of delivery work handed to a lane.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Executes delivery tasks on some execution context.
///
/// The bus uses an injected scheduler for the MAIN lane, so hosts can plug in their own
/// UI or event-loop thread.
pub trait Scheduler: fmt::Debug + Send + Sync + 'static {
    /// Queues `task` for execution. Tasks must run in the order they were scheduled.
    ///
    /// # Errors
    /// Returns [`EventBusError::LaneClosed`] if the scheduler no longer accepts work.
    fn schedule(&self, task: Task) -> Result<(), EventBusError>;
}

/// A MAIN lane backed by one dedicated OS thread.
#[derive(Debug)]
pub struct MainThread {
    sender: mpsc::UnboundedSender<Task>,
    thread_id: ThreadId,
}

impl MainThread {
    pub const THREAD_NAME: &'static str = "herald-main";

    /// Spawns the lane thread. It exits once every sender is dropped and the queue is drained.
    ///
    /// # Errors
    /// Returns [`EventBusError::Io`] if the thread cannot be spawned.
    pub fn spawn() -> Result<Self, EventBusError> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Task>();
        let handle = thread::Builder::new().name(Self::THREAD_NAME.into()).spawn(move || {
            while let Some(task) = receiver.blocking_recv() {
                task();
            }
            debug!("Main lane stopped");
        })?;

        Ok(Self { sender, thread_id: handle.thread().id() })
    }

    #[must_use]
    pub const fn thread_id(&self) -> ThreadId {
        self.thread_id
    }
}

impl Scheduler for MainThread {
    fn schedule(&self, task: Task) -> Result<(), EventBusError> {
        self.sender.send(task).map_err(|_| EventBusError::LaneClosed {
            message: "main lane thread has stopped".into(),
            context: Some(Self::THREAD_NAME.into()),
        })
    }
}

/// A MAIN lane drained by the host's own loop.
///
/// Deliveries run on whichever thread calls [`MainLoop::pump`].
#[derive(Default)]
pub struct MainLoop {
    queue: Mutex<VecDeque<Task>>,
}

impl MainLoop {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the tasks queued so far, in order, and returns how many ran.
    ///
    /// Tasks scheduled while pumping wait for the next call.
    pub fn pump(&self) -> usize {
        let batch = std::mem::take(&mut *self.queue.lock());
        let count = batch.len();
        for task in batch {
            task();
        }
        count
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }
}

impl Scheduler for MainLoop {
    fn schedule(&self, task: Task) -> Result<(), EventBusError> {
        self.queue.lock().push_back(task);
        Ok(())
    }
}

impl fmt::Debug for MainLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MainLoop").field("pending", &self.pending()).finish()
    }
}

/// Name of the threads started for ASYNC deliveries, one per delivery.
pub(crate) const ASYNC_THREAD_NAME: &str = "herald-async";

/// The four delivery lanes of a bus.
///
/// BACKGROUND runs on the runtime's blocking pool under a permit limit. ASYNC starts its own
/// thread per delivery and never uses that pool.
#[derive(Debug)]
pub(crate) struct Lanes {
    main: Option<Arc<dyn Scheduler>>,
    runtime: Handle,
    background: Arc<Semaphore>,
}

impl Lanes {
    pub(crate) fn new(
        main: Option<Arc<dyn Scheduler>>,
        runtime: Handle,
        background_concurrency: usize,
    ) -> Self {
        Self { main, runtime, background: Arc::new(Semaphore::new(background_concurrency)) }
    }

    pub(crate) const fn supports(&self, mode: ThreadMode) -> bool {
        !matches!(mode, ThreadMode::Main) || self.main.is_some()
    }

    /// Hands `task` to the lane for `mode`. POSTING runs it inline.
    pub(crate) fn schedule(&self, mode: ThreadMode, task: Task) -> Result<(), EventBusError> {
        match mode {
            ThreadMode::Posting => {
                task();
                Ok(())
            },
            ThreadMode::Main => match &self.main {
                Some(main) => main.schedule(task),
                None => Err(EventBusError::UnsupportedThreadMode {
                    message: "the main lane is disabled".into(),
                    context: None,
                }),
            },
            ThreadMode::Background => {
                let permits = Arc::clone(&self.background);
                self.runtime.spawn(async move {
                    let Ok(_permit) = permits.acquire_owned().await else {
                        return;
                    };
                    if let Err(err) = tokio::task::spawn_blocking(task).await {
                        error!(%err, "Background delivery task failed");
                    }
                });
                Ok(())
            },
            ThreadMode::Async => {
                thread::Builder::new().name(ASYNC_THREAD_NAME.into()).spawn(task)?;
                Ok(())
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc as std_mpsc;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn lanes(main: Option<Arc<dyn Scheduler>>) -> Lanes {
        Lanes::new(main, herald_runtime::get_global_runtime().handle().clone(), 2)
    }

    #[test]
    fn test_main_thread_runs_tasks_in_order_on_its_thread() {
        let main = MainThread::spawn().unwrap();
        let (tx, rx) = std_mpsc::channel();

        for n in 0..10 {
            let tx = tx.clone();
            main.schedule(Box::new(move || {
                let name = thread::current().name().map(str::to_owned);
                tx.send((n, name)).unwrap();
            }))
            .unwrap();
        }

        for expected in 0..10 {
            let (n, name) = rx.recv_timeout(TIMEOUT).unwrap();
            assert_eq!(n, expected);
            assert_eq!(name.as_deref(), Some(MainThread::THREAD_NAME));
        }
    }

    #[test]
    fn test_main_loop_runs_only_when_pumped() {
        let main = Arc::new(MainLoop::new());
        let (tx, rx) = std_mpsc::channel();
        let lanes = lanes(Some(Arc::clone(&main) as Arc<dyn Scheduler>));

        lanes
            .schedule(
                ThreadMode::Main,
                Box::new(move || {
                    tx.send(()).unwrap();
                }),
            )
            .unwrap();

        assert!(rx.try_recv().is_err());
        assert_eq!(main.pending(), 1);
        assert_eq!(main.pump(), 1);
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_disabled_main_lane_rejects_tasks() {
        let lanes = lanes(None);
        assert!(!lanes.supports(ThreadMode::Main));
        assert!(lanes.supports(ThreadMode::Async));

        let err = lanes.schedule(ThreadMode::Main, Box::new(|| {})).unwrap_err();
        assert!(matches!(err, EventBusError::UnsupportedThreadMode { .. }));
    }

    #[test]
    fn test_worker_lanes_run_off_the_calling_thread() {
        let lanes = lanes(None);
        let caller = thread::current().id();
        let (tx, rx) = std_mpsc::channel();

        for mode in [ThreadMode::Background, ThreadMode::Async] {
            let tx = tx.clone();
            let task: Task = Box::new(move || {
                let current = thread::current();
                tx.send((mode, current.id(), current.name().map(str::to_owned))).unwrap();
            });
            lanes.schedule(mode, task).unwrap();
        }

        for _ in 0..2 {
            let (mode, id, name) = rx.recv_timeout(TIMEOUT).unwrap();
            assert_ne!(id, caller);
            if mode == ThreadMode::Async {
                assert_eq!(name.as_deref(), Some(ASYNC_THREAD_NAME));
            }
        }
    }

    #[test]
    fn test_async_lane_is_not_capped_by_the_blocking_pool() {
        const DELIVERIES: usize = 300;

        let config = herald_runtime::RuntimeConfig::default().with_max_blocking_threads(4);
        let runtime = herald_runtime::build_runtime_with_config(&config).unwrap();
        let lanes = Lanes::new(None, runtime.handle().clone(), 2);
        let gate = Arc::new((std::sync::Mutex::new(false), std::sync::Condvar::new()));
        let (tx, rx) = std_mpsc::channel();

        for _ in 0..DELIVERIES {
            let gate = Arc::clone(&gate);
            let tx = tx.clone();
            let task: Task = Box::new(move || {
                tx.send(()).unwrap();
                let (open, signal) = &*gate;
                let mut open = open.lock().unwrap();
                while !*open {
                    open = signal.wait(open).unwrap();
                }
            });
            lanes.schedule(ThreadMode::Async, task).unwrap();
        }

        // Every ASYNC handler is running at once, far beyond the blocking pool size.
        for _ in 0..DELIVERIES {
            rx.recv_timeout(TIMEOUT).unwrap();
        }

        let (quick_tx, quick_rx) = std_mpsc::channel();
        let task: Task = Box::new(move || quick_tx.send(()).unwrap());
        lanes.schedule(ThreadMode::Background, task).unwrap();
        let background = quick_rx.recv_timeout(TIMEOUT);

        let (open, signal) = &*gate;
        *open.lock().unwrap() = true;
        signal.notify_all();

        assert!(background.is_ok());
    }
}

//! # Runtime
//!
//! The [Tokio](https://tokio.rs) runtime that executes the event bus BACKGROUND lane.
//!
//! Handlers delivered on the `Background` lane are synchronous closures, so they run on the
//! runtime's blocking pool. This crate owns the sizing of that pool and exposes a
//! lazily-initialised process runtime that lives for the rest of the process.
//!
//! ## Example
//!
//! ```rust
//! use herald_runtime::{RuntimeConfig, build_runtime_with_config};
//!
//! let config = RuntimeConfig::default().with_worker_threads(2).with_max_blocking_threads(16);
//! let runtime = build_runtime_with_config(&config).unwrap();
//! assert_eq!(runtime.block_on(async { 40 + 2 }), 42);
//! ```

pub use anyhow::Result;

use anyhow::anyhow;
use std::{sync::OnceLock, thread::available_parallelism, time::Duration};
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info};

/// Environment override for the async worker count.
pub const WORKER_THREADS_ENV: &str = "HERALD_WORKER_THREADS";

const DEFAULT_WORKER_THREADS: usize = 2;
const DEFAULT_MAX_BLOCKING_THREADS: usize = 256;
const DEFAULT_STACK_SIZE: usize = 2 * 1024 * 1024;
const MIN_STACK_SIZE: usize = 1024 * 1024;
const MAX_STACK_SIZE: usize = 16 * 1024 * 1024;
const MAX_THREADS: usize = 1024;
const DEFAULT_THREAD_NAME: &str = "herald-lane";
const THREAD_KEEP_ALIVE: Duration = Duration::from_secs(30);

static WORKER_THREADS: OnceLock<usize> = OnceLock::new();

/// Worker count from [`WORKER_THREADS_ENV`], falling back to the available parallelism.
fn detected_worker_threads() -> usize {
    *WORKER_THREADS.get_or_init(|| {
        std::env::var(WORKER_THREADS_ENV)
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|&n| n > 0 && n <= MAX_THREADS)
            .unwrap_or_else(|| {
                available_parallelism()
                    .map(std::num::NonZero::get)
                    .unwrap_or(DEFAULT_WORKER_THREADS)
            })
    })
}

fn thread_name_or_default(name: String) -> String {
    if name.trim().is_empty() { DEFAULT_THREAD_NAME.to_owned() } else { name }
}

/// Configuration for the lane runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Async workers. Lane tasks only park on them briefly while waiting for a permit.
    pub worker_threads: usize,
    /// Upper bound of the blocking pool that runs the handlers.
    pub max_blocking_threads: usize,
    pub stack_size: usize,
    pub thread_name: String,
    pub thread_keep_alive: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: detected_worker_threads(),
            max_blocking_threads: DEFAULT_MAX_BLOCKING_THREADS,
            stack_size: DEFAULT_STACK_SIZE,
            thread_name: DEFAULT_THREAD_NAME.to_owned(),
            thread_keep_alive: THREAD_KEEP_ALIVE,
        }
    }
}

impl RuntimeConfig {
    #[must_use = "Customize the number of async worker threads"]
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads.clamp(1, MAX_THREADS);
        self
    }

    #[must_use = "Customize the size of the blocking pool running handlers"]
    pub fn with_max_blocking_threads(mut self, threads: usize) -> Self {
        self.max_blocking_threads = threads.clamp(1, MAX_THREADS);
        self
    }

    #[must_use = "Customize the stack size for lane threads"]
    pub fn with_stack_size(mut self, size: usize) -> Self {
        self.stack_size = size.clamp(MIN_STACK_SIZE, MAX_STACK_SIZE);
        self
    }

    #[must_use = "Customize the lane thread name"]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = thread_name_or_default(name.into());
        self
    }

    #[must_use = "Customize how long idle lane threads stay alive"]
    pub const fn with_thread_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.thread_keep_alive = keep_alive;
        self
    }

    fn normalized(&self) -> Self {
        Self {
            worker_threads: self.worker_threads.clamp(1, MAX_THREADS),
            max_blocking_threads: self.max_blocking_threads.clamp(1, MAX_THREADS),
            stack_size: self.stack_size.clamp(MIN_STACK_SIZE, MAX_STACK_SIZE),
            thread_name: thread_name_or_default(self.thread_name.clone()),
            thread_keep_alive: self.thread_keep_alive,
        }
    }
}

/// Creates a multi-threaded runtime from `config`.
///
/// Out-of-range values are clamped rather than rejected.
///
/// # Errors
///
/// Returns an [`anyhow::Error`] if the OS refuses to create the runtime threads.
pub fn build_runtime_with_config(config: &RuntimeConfig) -> Result<Runtime> {
    let config = config.normalized();
    debug!(config = ?config, "Building lane runtime");

    Builder::new_multi_thread()
        .worker_threads(config.worker_threads)
        .max_blocking_threads(config.max_blocking_threads)
        .thread_name(&config.thread_name)
        .thread_stack_size(config.stack_size)
        .thread_keep_alive(config.thread_keep_alive)
        .enable_all()
        .build()
        .map_err(|e| anyhow!("Failed to initialize lane runtime: {e}"))
}

static GLOBAL_RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Access the lazily initialized process runtime.
///
/// The runtime is never shut down, so lane handles cloned from it stay valid for the
/// lifetime of the process.
///
/// # Panics
///
/// Panics if the runtime cannot be initialized (e.g. the OS refuses to allocate threads).
/// This is treated as a fatal system error.
pub fn get_global_runtime() -> &'static Runtime {
    GLOBAL_RUNTIME.get_or_init(|| {
        let config = RuntimeConfig::default();
        info!(
            workers = config.worker_threads,
            blocking = config.max_blocking_threads,
            "Initializing process lane runtime"
        );
        build_runtime_with_config(&config)
            .expect("CRITICAL: Failed to initialize the process lane runtime")
    })
}

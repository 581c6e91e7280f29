use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Installs a compact console logger filtered by `RUST_LOG` (INFO when unset).
pub(crate) fn init() -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::builder().with_default_directive(LevelFilter::INFO.into()).from_env_lossy();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().compact().with_ansi(true).with_thread_names(true))
        .try_init()?;

    Ok(())
}

use crate::error::{EventBusError, EventBusErrorExt};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

const MAX_BACKGROUND_CONCURRENCY: usize = 1024;

/// How the MAIN lane of a bus is provided.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MainLaneKind {
    /// A dedicated `herald-main` thread, unless a scheduler is injected through the builder.
    #[default]
    Dedicated,
    /// No MAIN lane; registering a MAIN handler fails.
    Disabled,
}

/// Tunables of an [`EventBus`](crate::EventBus).
///
/// Every field has a default, so a partial source only overrides what it names.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub log_subscriber_exceptions: bool,
    pub log_no_subscriber_messages: bool,
    pub send_subscriber_exception_event: bool,
    pub send_no_subscriber_event: bool,
    /// Maximum number of BACKGROUND deliveries running at once.
    pub background_concurrency: usize,
    pub main_lane: MainLaneKind,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            log_subscriber_exceptions: true,
            log_no_subscriber_messages: true,
            send_subscriber_exception_event: true,
            send_no_subscriber_event: true,
            background_concurrency: std::thread::available_parallelism().map_or(4, usize::from),
            main_lane: MainLaneKind::Dedicated,
        }
    }
}

impl BusConfig {
    /// Prefix of the environment overrides, e.g. `HERALD__BACKGROUND_CONCURRENCY=8`.
    pub const ENV_PREFIX: &'static str = "HERALD";

    /// Reads the configuration from `HERALD__*` environment variables.
    ///
    /// # Errors
    /// Returns [`EventBusError::Config`] if a variable cannot be deserialized.
    pub fn from_env() -> Result<Self, EventBusError> {
        Self::build(None)
    }

    /// Reads the configuration from an optional file, then applies environment overrides.
    ///
    /// The format is inferred from the file extension.
    ///
    /// # Errors
    /// Returns [`EventBusError::Config`] if the file is malformed or a value has the wrong type.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EventBusError> {
        Self::build(Some(path.as_ref()))
    }

    fn build(file: Option<&Path>) -> Result<Self, EventBusError> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(false));
        }
        builder = builder.add_source(
            Environment::with_prefix(Self::ENV_PREFIX).separator("__").try_parsing(true),
        );

        let config = builder
            .build()
            .context("Failed to build bus config")?
            .try_deserialize::<Self>()
            .context("Failed to deserialize bus config")?;

        Ok(config.normalized())
    }

    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.background_concurrency =
            self.background_concurrency.clamp(1, MAX_BACKGROUND_CONCURRENCY);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_enable_every_flag() {
        let config = BusConfig::default();
        assert!(config.log_subscriber_exceptions);
        assert!(config.send_subscriber_exception_event);
        assert!(config.send_no_subscriber_event);
        assert!(config.background_concurrency >= 1);
        assert_eq!(config.main_lane, MainLaneKind::Dedicated);
    }

    #[test]
    fn test_load_overrides_named_fields_only() {
        let file = write_config(
            "send_no_subscriber_event = false\nbackground_concurrency = 3\nmain_lane = \"disabled\"\n",
        );

        let config = BusConfig::load(file.path()).unwrap();
        assert!(!config.send_no_subscriber_event);
        assert!(config.log_no_subscriber_messages);
        assert_eq!(config.background_concurrency, 3);
        assert_eq!(config.main_lane, MainLaneKind::Disabled);
    }

    #[test]
    fn test_load_rejects_unknown_lane_kind() {
        let file = write_config("main_lane = \"ui\"\n");
        let err = BusConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, EventBusError::Config { .. }));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = BusConfig::load("does/not/exist.toml").unwrap();
        assert_eq!(config.main_lane, MainLaneKind::Dedicated);
    }

    #[test]
    fn test_concurrency_is_clamped() {
        let config = BusConfig { background_concurrency: 0, ..BusConfig::default() }.normalized();
        assert_eq!(config.background_concurrency, 1);

        let config =
            BusConfig { background_concurrency: 1 << 20, ..BusConfig::default() }.normalized();
        assert_eq!(config.background_concurrency, MAX_BACKGROUND_CONCURRENCY);
    }
}

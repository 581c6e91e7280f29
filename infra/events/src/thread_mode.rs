use crate::error::EventBusError;
use std::fmt;
use std::str::FromStr;

/// The lane a handler is invoked on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ThreadMode {
    /// Synchronously, on the thread that called `post`.
    #[default]
    Posting,
    /// On the single designated main lane; deliveries are totally ordered.
    Main,
    /// On the shared, bounded worker pool.
    Background,
    /// On a fresh worker task per delivery.
    Async,
}

impl ThreadMode {
    pub const ALL: [Self; 4] = [Self::Posting, Self::Main, Self::Background, Self::Async];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Posting => "posting",
            Self::Main => "main",
            Self::Background => "background",
            Self::Async => "async",
        }
    }

    /// Whether `post` returns before the handler runs.
    #[must_use]
    pub const fn is_queued(self) -> bool {
        !matches!(self, Self::Posting)
    }
}

impl fmt::Display for ThreadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThreadMode {
    type Err = EventBusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL.into_iter().find(|mode| mode.as_str().eq_ignore_ascii_case(wanted)).ok_or_else(
            || EventBusError::UnknownThreadMode {
                message: format!("`{wanted}` is not one of posting, main, background, async")
                    .into(),
                context: None,
            },
        )
    }
}

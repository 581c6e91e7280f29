use std::borrow::Cow;

/// Errors that can occur while configuring the bus or registering subscribers.
///
/// Handler failures are never reported through this type; see [`HandlerError`](crate::HandlerError).
#[herald_derive::herald_error]
pub enum EventBusError {
    /// A thread-mode name that is not one of `posting`, `main`, `background`, `async`.
    #[error("Unknown thread mode{}: {message}", format_context(.context))]
    UnknownThreadMode { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The bus has no lane for the requested thread mode (e.g. the main lane is disabled).
    #[error("Unsupported thread mode{}: {message}", format_context(.context))]
    UnsupportedThreadMode { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The subscriber type declares no handler methods.
    #[error("No subscriber methods{}: {message}", format_context(.context))]
    NoSubscriberMethods { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// A delivery lane stopped accepting tasks.
    #[error("Lane closed{}: {message}", format_context(.context))]
    LaneClosed { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The process-wide default bus was already created.
    #[error("Default bus already installed{}: {message}", format_context(.context))]
    DefaultAlreadyInstalled { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Configuration sources could not be read or deserialized.
    #[error("Config error{}: {source}", format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },

    /// OS-level failure, e.g. spawning the main lane thread.
    #[error("IO error{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Internal event bus error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

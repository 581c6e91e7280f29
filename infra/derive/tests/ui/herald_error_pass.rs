use herald_derive::herald_error;
use std::borrow::Cow;

#[herald_error]
pub enum LaneError {
    #[error("IO error{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Lane closed{}: {message}", format_context(.context))]
    Closed { message: Cow<'static, str>, context: Option<std::borrow::Cow<'static, str>> },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn spawn() -> Result<(), LaneError> {
    Err(std::io::Error::other("no threads left")).context("spawning worker")
}

fn main() {
    let err = spawn().unwrap_err();
    assert_eq!(err.to_string(), "IO error (spawning worker): no threads left");

    let err: LaneError = "boom".into();
    assert!(matches!(err, LaneError::Internal { .. }));

    let err: Result<(), LaneError> =
        Err(LaneError::Closed { message: "main".into(), context: None });
    let err = err.context("scheduling").unwrap_err();
    assert_eq!(err.to_string(), "Lane closed (scheduling): main");
}

use std::any::Any;
use std::borrow::Cow;

/// Opaque error returned by a subscriber handler.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why a single handler invocation failed.
///
/// These never reach the publisher; the bus logs them and may re-post them inside a
/// [`SubscriberExceptionEvent`](crate::SubscriberExceptionEvent).
#[herald_derive::herald_error]
pub enum HandlerError {
    /// The handler returned an error.
    #[error("Handler failed{}: {source}", format_context(.context))]
    Failed { source: BoxError, context: Option<Cow<'static, str>> },

    /// The handler panicked; the payload is rendered into `message` when it is a string.
    #[error("Handler panicked{}: {message}", format_context(.context))]
    Panicked { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The erased event did not have the type the handler was registered for.
    #[error("Event type mismatch{}: {message}", format_context(.context))]
    TypeMismatch { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl HandlerError {
    pub(crate) fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message: Cow<'static, str> = if let Some(s) = payload.downcast_ref::<&'static str>() {
            Cow::Borrowed(s)
        } else if let Some(s) = payload.downcast_ref::<String>() {
            Cow::Owned(s.clone())
        } else {
            Cow::Borrowed("non-string panic payload")
        };
        Self::Panicked { message, context: None }
    }
}

/// Return types accepted from handler methods.
///
/// Implemented for `()` and for `Result<(), E>` where `E` converts into a [`BoxError`].
pub trait HandlerOutput {
    /// Converts the handler's return value into the bus's uniform result.
    ///
    /// # Errors
    /// Returns [`HandlerError::Failed`] when the handler reported an error.
    fn into_handler_result(self) -> Result<(), HandlerError>;
}

impl HandlerOutput for () {
    #[inline]
    fn into_handler_result(self) -> Result<(), HandlerError> {
        Ok(())
    }
}

impl<E: Into<BoxError>> HandlerOutput for Result<(), E> {
    #[inline]
    fn into_handler_result(self) -> Result<(), HandlerError> {
        self.map_err(|e| HandlerError::Failed { source: e.into(), context: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_output_is_success() {
        assert!(().into_handler_result().is_ok());
    }

    #[test]
    fn test_error_output_is_wrapped() {
        let output: Result<(), std::io::Error> = Err(std::io::Error::other("disk gone"));
        let err = output.into_handler_result().unwrap_err();
        assert!(matches!(err, HandlerError::Failed { .. }));
        assert_eq!(err.to_string(), "Handler failed: disk gone");

        let output: Result<(), &str> = Err("plain message");
        assert!(output.into_handler_result().is_err());
    }

    #[test]
    fn test_panic_payloads_are_rendered() {
        let err = HandlerError::from_panic(&"static payload");
        assert_eq!(err.to_string(), "Handler panicked: static payload");

        let err = HandlerError::from_panic(&String::from("owned payload"));
        assert_eq!(err.to_string(), "Handler panicked: owned payload");

        let err = HandlerError::from_panic(&42_u32);
        assert!(err.to_string().contains("non-string"));
    }
}

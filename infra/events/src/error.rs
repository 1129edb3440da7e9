use crate::listener::BoxError;
use std::borrow::Cow;

/// Errors that can occur during event bus operations.
#[kff_derive::kff_error]
pub enum EventBusError {
    /// Invalid bus configuration or handler table, detected at the call that received it.
    #[error("Configuration error{}: {message}", format_context(.context))]
    Configuration { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The event type of an erased listener could not be recovered.
    #[error("Resolution error{}: {message}", format_context(.context))]
    Resolution { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// A listener failed while an event was being dispatched.
    #[error(
        "Dispatch fault in listener #{index} `{listener}` for {event}{}: {source}",
        format_context(.context)
    )]
    Dispatch {
        event: &'static str,
        listener: Cow<'static, str>,
        index: usize,
        source: BoxError,
        context: Option<Cow<'static, str>>,
    },

    /// `set_canceled` was called on an event that is not cancelable.
    #[error("Event is not cancelable{}: {message}", format_context(.context))]
    NotCancelable { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_is_attached_to_bus_errors() {
        let result: Result<(), EventBusError> = Err(EventBusError::Resolution {
            message: "Failed to resolve the event type of listener `bridge`".into(),
            context: None,
        });
        let err = result.context("EVENTS").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Resolution error (EVENTS): Failed to resolve the event type of listener `bridge`"
        );
    }
}

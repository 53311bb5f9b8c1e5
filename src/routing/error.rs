//! Error tiers of the routing core.
//!
//! - [`RegistryError`] is a static configuration defect. It is raised while the
//!   registry is built and aborts startup.
//! - [`HandlerError`] is a runtime failure of a single handler invocation. It is
//!   logged and converted into a generic failure response; dispatch goes on.

use std::any::Any;

use thiserror::Error;

/// Errors raised while building the [`HandlerRegistry`](crate::routing::HandlerRegistry).
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Two handlers (or one handler twice) claim the same command name.
    #[error("command `{name}` is claimed by both `{first}` and `{second}`")]
    DuplicateCommand {
        name: String,
        first: &'static str,
        second: &'static str,
    },
    /// A command name is empty or contains whitespace.
    #[error("handler `{handler}` declares an invalid command name `{name}`")]
    InvalidCommandName { handler: &'static str, name: String },
    /// A URL pattern does not compile.
    #[error("processor `{processor}` declares an invalid pattern `{pattern}`: {cause}")]
    InvalidPattern {
        processor: &'static str,
        pattern: String,
        cause: regex::Error,
    },
    /// A URL pattern has no capture group to identify the resource.
    #[error("processor `{processor}` declares pattern `{pattern}` without a capture group")]
    MissingCaptureGroup {
        processor: &'static str,
        pattern: String,
    },
}

/// Failure of one handler invocation, synchronous or asynchronous.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler returned an error.
    #[error("handler `{handler}` failed: {cause}")]
    Failed {
        handler: &'static str,
        cause: anyhow::Error,
    },
    /// The handler panicked.
    #[error("handler `{handler}` panicked: {message}")]
    Panicked {
        handler: &'static str,
        message: String,
    },
}

impl HandlerError {
    /// Builds a [`HandlerError::Panicked`] from a caught panic payload.
    pub fn from_panic(handler: &'static str, payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_owned()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "unknown panic payload".to_owned()
        };

        HandlerError::Panicked { handler, message }
    }

    /// Converts the outcome of a handler invocation into an error, if any.
    pub fn from_outcome<T>(
        handler: &'static str,
        outcome: Result<anyhow::Result<T>, Box<dyn Any + Send>>,
    ) -> Result<T, Self> {
        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(cause)) => Err(HandlerError::Failed { handler, cause }),
            Err(payload) => Err(HandlerError::from_panic(handler, payload)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::panic;

    use super::*;

    #[test]
    fn test_duplicate_command_message() {
        let error = RegistryError::DuplicateCommand {
            name: "x".to_string(),
            first: "alpha",
            second: "beta",
        };
        assert_eq!(
            error.to_string(),
            "command `x` is claimed by both `alpha` and `beta`"
        );
    }

    #[test]
    fn test_from_outcome_ok() {
        let result = HandlerError::from_outcome("echo", Ok(Ok(true)));
        assert!(matches!(result, Ok(true)));
    }

    #[test]
    fn test_from_outcome_failed() {
        let result: Result<(), _> =
            HandlerError::from_outcome("echo", Ok(Err(anyhow::anyhow!("boom"))));
        match result {
            Err(HandlerError::Failed { handler, cause }) => {
                assert_eq!(handler, "echo");
                assert_eq!(cause.to_string(), "boom");
            }
            _ => panic!("Expected Failed error"),
        }
    }

    fn panic_with_str() {
        panic!("static message");
    }

    fn panic_with_string(value: u32) {
        panic!("formatted {}", value);
    }

    #[test]
    fn test_from_panic_with_str_and_string_payloads() {
        let payload = panic::catch_unwind(panic_with_str).unwrap_err();
        let error = HandlerError::from_panic("echo", payload);
        assert_eq!(error.to_string(), "handler `echo` panicked: static message");

        let payload = panic::catch_unwind(|| panic_with_string(42)).unwrap_err();
        let error = HandlerError::from_panic("echo", payload);
        assert_eq!(error.to_string(), "handler `echo` panicked: formatted 42");
    }
}

//! Inbound line dispatch.
//!
//! The [`Dispatcher`] handles one line per call and never awaits:
//!
//! ```text
//! RECEIVED ──prefix?──► COMMAND_CANDIDATE ──resolve──► COMMAND_DISPATCHED
//!     │                        │ miss                        │
//!     └────────────────────────┴─────────────┬───────────────┘
//!                                            ▼
//!                        URL scanning (first matching route wins)
//!                                 │                    │
//!                                 ▼                    ▼
//!                          URL_DISPATCHED          NO_MATCH
//! ```
//!
//! The command path and the URL path are independent: a line that runs a
//! command is still scanned for a URL.

use std::{panic, sync::Arc};

use log::{debug, error};

use crate::{
    api::{CommandEvent, InboundLine, Origin, UrlMatch},
    routing::{HandlerError, HandlerRegistry, Responder, ResponseSink, WorkerPool},
};

/// What a single [`Dispatcher::dispatch`] call invoked.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Dispatch {
    /// Name of the command that was dispatched
    pub command: Option<String>,
    /// Name of the URL processor that was dispatched
    pub url: Option<&'static str>,
}

impl Dispatch {
    /// Whether the line was silently ignored.
    pub fn is_no_match(&self) -> bool {
        self.command.is_none() && self.url.is_none()
    }
}

/// Splits a prefixed line into a candidate command name and argument line.
///
/// Returns `None` if `line` does not start with `prefix` or if no name follows
/// the prefix directly. The argument line is the trimmed rest of the line and
/// is `None` when empty.
///
/// # Examples
///
/// ```
/// assert_eq!(parse_command_line("!", "!covid Germany"), Some(("covid", Some("Germany"))));
/// assert_eq!(parse_command_line("!", "!covid"), Some(("covid", None)));
/// assert_eq!(parse_command_line("!", "covid"), None);
/// ```
pub fn parse_command_line<'a>(prefix: &str, line: &'a str) -> Option<(&'a str, Option<&'a str>)> {
    let rest = line.strip_prefix(prefix)?;
    let (name, arg_line) = match rest.find(char::is_whitespace) {
        Some(index) => rest.split_at(index),
        None => (rest, ""),
    };

    if name.is_empty() {
        return None;
    }

    let arg_line = arg_line.trim();
    Some((name, (!arg_line.is_empty()).then_some(arg_line)))
}

/// Classifies inbound lines and invokes their owners.
pub struct Dispatcher {
    /// Command prefix (e.g. `!`)
    prefix: String,
    registry: Arc<HandlerRegistry>,
    sink: ResponseSink,
    workers: WorkerPool,
}

impl Dispatcher {
    /// Creates a new [`Dispatcher`].
    ///
    /// # Arguments
    ///
    /// * `prefix` - Command prefix lines must start with
    /// * `registry` - Read-only plugin tables
    /// * `sink` - Queue every response goes through
    /// * `workers` - Pool running asynchronous handler work
    pub fn new(
        prefix: &str,
        registry: Arc<HandlerRegistry>,
        sink: ResponseSink,
        workers: WorkerPool,
    ) -> Self {
        Dispatcher {
            prefix: prefix.to_owned(),
            registry,
            sink,
            workers,
        }
    }

    /// Dispatches one inbound line.
    ///
    /// Handler failures are contained: they are logged and answered with the
    /// generic failure response, and never escape this call.
    pub fn dispatch(&self, line: &InboundLine) -> Dispatch {
        Dispatch {
            command: self.dispatch_command(line),
            url: self.dispatch_url(line),
        }
    }

    fn dispatch_command(&self, line: &InboundLine) -> Option<String> {
        let (name, arg_line) = parse_command_line(&self.prefix, &line.text)?;
        let (command, handler) = self.registry.resolve_command(name)?;

        debug!(
            "dispatching command {} from {} in {} to {}",
            name,
            line.actor,
            line.channel,
            handler.name()
        );

        let responder = self.bind(line);
        let event = CommandEvent::new(
            handler.name(),
            line,
            command.clone(),
            arg_line.map(str::to_owned),
            responder.clone(),
            self.workers.clone(),
        );

        let outcome = panic::catch_unwind(panic::AssertUnwindSafe(|| handler.on_command(&event)));
        match HandlerError::from_outcome(handler.name(), outcome) {
            Ok(true) => debug!("command {} handled by {}", name, handler.name()),
            Ok(false) => debug!("command {} declined by {}", name, handler.name()),
            Err(error) => Self::report(&responder, error),
        }

        Some(command.name().to_owned())
    }

    fn dispatch_url(&self, line: &InboundLine) -> Option<&'static str> {
        let (route, groups) = self.registry.resolve_url(&line.text)?;
        let processor = route.processor();

        debug!(
            "dispatching url {} from {} in {} to {}",
            line.text,
            line.actor,
            line.channel,
            processor.name()
        );

        let responder = self.bind(line);
        let url_match = UrlMatch::new(
            processor.name(),
            line,
            groups,
            responder.clone(),
            self.workers.clone(),
        );

        let outcome =
            panic::catch_unwind(panic::AssertUnwindSafe(|| processor.process(&url_match)));
        if let Err(error) = HandlerError::from_outcome(processor.name(), outcome) {
            Self::report(&responder, error);
        }

        Some(processor.name())
    }

    fn bind(&self, line: &InboundLine) -> Responder {
        self.sink.bind(Origin::from(line))
    }

    fn report(responder: &Responder, error: HandlerError) {
        error!(
            "{} (origin {} in {})",
            error,
            responder.origin().actor,
            responder.origin().channel
        );
        responder.fail();
    }
}

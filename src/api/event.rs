//! Events handed to plugins.
//!
//! A [`CommandEvent`] or [`UrlMatch`] is built by the dispatcher once per
//! matched inbound line. Both carry a [`Responder`] bound to the [`Origin`] of
//! that line at construction time, so a late response still reaches the
//! conversation that triggered it.

use std::future::Future;

use crate::{
    api::Command,
    routing::{Responder, WorkerPool},
};

/// One line of chat text as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundLine {
    /// Nick or user id of the sender
    pub actor: String,
    /// Channel (or query partner) the line was sent to
    pub channel: String,
    /// Raw message text
    pub text: String,
}

/// The channel/user context a response must be delivered back to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin {
    /// Sender of the triggering line
    pub actor: String,
    /// Channel the triggering line was sent to
    pub channel: String,
}

impl From<&InboundLine> for Origin {
    fn from(line: &InboundLine) -> Self {
        Origin {
            actor: line.actor.clone(),
            channel: line.channel.clone(),
        }
    }
}

/// Snapshot of an inbound line that resolved to a registered command.
///
/// The event is immutable. It is cheap to clone, which is how a handler moves
/// it into an asynchronous completion.
#[derive(Debug, Clone)]
pub struct CommandEvent {
    /// Name of the handler owning the command
    handler: &'static str,
    origin: Origin,
    raw_line: String,
    command: Command,
    /// Trimmed text after the command name, absent when empty
    arg_line: Option<String>,
    responder: Responder,
    workers: WorkerPool,
}

impl CommandEvent {
    pub(crate) fn new(
        handler: &'static str,
        line: &InboundLine,
        command: Command,
        arg_line: Option<String>,
        responder: Responder,
        workers: WorkerPool,
    ) -> Self {
        CommandEvent {
            handler,
            origin: Origin::from(line),
            raw_line: line.text.clone(),
            command,
            arg_line,
            responder,
            workers,
        }
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn raw_line(&self) -> &str {
        &self.raw_line
    }

    /// The registered command the line resolved to.
    pub fn command(&self) -> &Command {
        &self.command
    }

    /// Arguments typed after the command name, trimmed.
    pub fn arg_line(&self) -> Option<&str> {
        self.arg_line.as_deref()
    }

    /// Sends a response to the origin of this event.
    ///
    /// Multi-line text is split on line breaks and delivered as one block.
    pub fn respond(&self, text: impl Into<String>) {
        self.responder.respond(text);
    }

    /// Returns the response capability bound to this event's origin.
    ///
    /// Use [`Responder::respond_lines`] to send a sequence of lines as one
    /// block, or to answer from an asynchronous completion.
    pub fn responder(&self) -> Responder {
        self.responder.clone()
    }

    /// Runs `task` on the worker pool without blocking dispatch.
    ///
    /// If the task fails or panics, a generic failure response is sent to the
    /// origin of this event.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.workers
            .submit(self.handler, self.responder.clone(), task);
    }
}

/// An inbound line that matched one of the registered URL patterns.
#[derive(Debug, Clone)]
pub struct UrlMatch {
    /// Name of the processor owning the matched pattern
    processor: &'static str,
    origin: Origin,
    /// The whole matched line
    source_url: String,
    /// Capture groups of the matched pattern, in order
    groups: Vec<String>,
    responder: Responder,
    workers: WorkerPool,
}

impl UrlMatch {
    pub(crate) fn new(
        processor: &'static str,
        line: &InboundLine,
        groups: Vec<String>,
        responder: Responder,
        workers: WorkerPool,
    ) -> Self {
        UrlMatch {
            processor,
            origin: Origin::from(line),
            source_url: line.text.clone(),
            groups,
            responder,
            workers,
        }
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    /// The identifying capture group (the first one) of the matched pattern.
    pub fn id(&self) -> Option<&str> {
        self.groups.first().map(String::as_str)
    }

    pub fn respond(&self, text: impl Into<String>) {
        self.responder.respond(text);
    }

    pub fn responder(&self) -> Responder {
        self.responder.clone()
    }

    /// Runs `task` on the worker pool, see [`CommandEvent::spawn`].
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.workers
            .submit(self.processor, self.responder.clone(), task);
    }
}

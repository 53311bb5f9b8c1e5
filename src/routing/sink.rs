//! Response delivery.
//!
//! The [`ResponseSink`] is the only shared, mutable touchpoint between handlers
//! and the transport. Handlers enqueue whole response blocks; a single delivery
//! loop drains the [`Outbox`] and writes each block with one transport call, so
//! the lines of one block are never interleaved with another block.

use std::sync::Arc;

use log::warn;
use tokio::sync::mpsc;

use crate::api::Origin;

/// A response block destined for one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    /// Target channel, taken from the origin of the triggering line
    pub channel: String,
    /// Lines to write, in order
    pub lines: Vec<String>,
}

/// Receiving end of the response queue, drained by the delivery loop.
pub type Outbox = mpsc::UnboundedReceiver<Outbound>;

/// Thread-safe queue of response blocks.
///
/// Cloning a sink is cheap; every clone feeds the same [`Outbox`].
#[derive(Debug, Clone)]
pub struct ResponseSink {
    tx: mpsc::UnboundedSender<Outbound>,
    /// Text sent when a handler fails
    failure_message: Arc<str>,
}

impl ResponseSink {
    /// Creates a sink and the outbox it feeds.
    ///
    /// # Arguments
    ///
    /// * `failure_message` - Generic response sent when a handler fails
    pub fn channel(failure_message: &str) -> (Self, Outbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = ResponseSink {
            tx,
            failure_message: Arc::from(failure_message),
        };
        (sink, rx)
    }

    /// Enqueues `lines` as one block for the channel of `origin`.
    ///
    /// Never blocks. Empty blocks are dropped.
    pub fn respond(&self, origin: &Origin, lines: Vec<String>) {
        if lines.is_empty() {
            return;
        }

        let outbound = Outbound {
            channel: origin.channel.clone(),
            lines,
        };
        if self.tx.send(outbound).is_err() {
            warn!(
                "outbox closed, dropping response to {} in {}",
                origin.actor, origin.channel
            );
        }
    }

    /// Returns a response capability fixed to `origin`.
    pub fn bind(&self, origin: Origin) -> Responder {
        Responder {
            origin,
            sink: self.clone(),
        }
    }
}

/// A response capability bound to one origin.
#[derive(Debug, Clone)]
pub struct Responder {
    origin: Origin,
    sink: ResponseSink,
}

impl Responder {
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Sends `text`, split on line breaks, as one block.
    pub fn respond(&self, text: impl Into<String>) {
        let text = text.into();
        self.respond_lines(text.lines());
    }

    /// Sends `lines` as one block.
    pub fn respond_lines<I, S>(&self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sink
            .respond(&self.origin, lines.into_iter().map(Into::into).collect());
    }

    /// Sends the generic failure response.
    pub fn fail(&self) {
        self.respond(self.sink.failure_message.as_ref());
    }
}

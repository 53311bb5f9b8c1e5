//! Plugin-facing types of the bot.
//!
//! Everything a handler needs to know about lives here: the [`Command`] it owns,
//! the [`CommandEvent`] or [`UrlMatch`] it receives, and the two plugin traits
//! [`CommandHandler`] and [`UrlProcessor`].
//!
//! # Handler Pattern
//!
//! Handlers follow a consistent pattern:
//! 1. Declare what they own ([`CommandHandler::commands`] or [`UrlProcessor::url_patterns`])
//! 2. Receive an event bound to the origin of the inbound line
//! 3. Respond right away, or hand network work to the worker pool with `spawn`
//!
//! A response always travels back to the channel the line came from, no matter
//! when it is produced.

mod command;
mod event;
mod handler;

pub use crate::api::command::Command;
pub use crate::api::event::{CommandEvent, InboundLine, Origin, UrlMatch};
#[cfg(test)]
pub use crate::api::handler::{MockCommandHandler, MockUrlProcessor};
pub use crate::api::handler::{CommandHandler, UrlProcessor};

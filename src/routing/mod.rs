//! Message routing core.
//!
//! This module turns inbound chat lines into handler invocations and carries
//! the responses back to the transport.
//!
//! # Architecture
//!
//! ```text
//! InboundLine
//!      │
//!      ▼
//! ┌────────────┐  resolve_command / resolve_url  ┌─────────────────┐
//! │ Dispatcher │ ──────────────────────────────► │ HandlerRegistry │
//! └────────────┘                                 └─────────────────┘
//!      │ on_command / process
//!      ▼
//! ┌──────────────────┐  spawn   ┌────────────┐
//! │ Handler (sync)   │ ───────► │ WorkerPool │
//! └──────────────────┘          └────────────┘
//!      │ respond                      │ respond / failure
//!      ▼                              ▼
//! ┌──────────────────────────────────────────┐
//! │ ResponseSink ─► Outbox ─► delivery loop  │
//! └──────────────────────────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! - [`registry`] - Startup-time plugin tables, collision checks
//! - [`dispatcher`] - Line classification and handler invocation
//! - [`sink`] - Response queue bound to origins
//! - [`worker`] - Asynchronous handler work and failure containment
//! - [`error`] - Startup and per-invocation error tiers

mod dispatcher;
mod error;
mod registry;
mod sink;
mod worker;

pub use crate::routing::dispatcher::Dispatcher;
pub use crate::routing::error::{HandlerError, RegistryError};
pub use crate::routing::registry::{HandlerRegistry, Plugins};
pub use crate::routing::sink::{Outbound, Outbox, Responder, ResponseSink};
pub use crate::routing::worker::WorkerPool;

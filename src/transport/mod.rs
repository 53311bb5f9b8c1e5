//! Chat network boundary.
//!
//! The routing core only talks to the chat network through the [`Transport`]
//! trait: inbound lines come from [`Transport::receive`], response blocks go out
//! through [`Transport::send`]. The [`ConsoleTransport`] implementation speaks
//! over standard input and output, which is enough to drive the bot locally.

mod console;

pub use crate::transport::console::ConsoleTransport;
use crate::api::InboundLine;

/// Connection to a chat network.
///
/// The bot never calls `send` from inside a dispatch; all writes come from the
/// delivery loop, one block at a time.
pub trait Transport {
    /// Waits for the next inbound line. `None` means the connection is gone.
    async fn receive(&self) -> Option<InboundLine>;

    /// Writes `lines` to `channel`, in order.
    async fn send(&self, channel: &str, lines: &[String]) -> anyhow::Result<()>;
}

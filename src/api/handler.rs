//! Plugin traits.

#[cfg(test)]
use mockall::automock;

use crate::api::{Command, CommandEvent, UrlMatch};

/// A plugin owning one or more commands.
///
/// Ownership is decided once, at registry construction, by exact command name.
/// A handler is only ever invoked for the commands it reported.
///
/// Work that talks to the network must not run inside [`Self::on_command`]:
/// hand it to [`CommandEvent::spawn`] and respond from the completion.
#[cfg_attr(test, automock)]
pub trait CommandHandler: Send + Sync {
    /// Short name used in logs and failure reports.
    fn name(&self) -> &'static str;

    /// Commands owned by this handler.
    fn commands(&self) -> Vec<Command>;

    /// Executes a matched command.
    ///
    /// Returns `Ok(true)` when the command was fully handled. The value is only
    /// used for diagnostics. An `Err` (or a panic) is turned into a generic
    /// failure response to the origin of the event.
    fn on_command(&self, event: &CommandEvent) -> anyhow::Result<bool>;
}

/// A plugin enriching lines that consist of a recognised URL.
#[cfg_attr(test, automock)]
pub trait UrlProcessor: Send + Sync {
    /// Short name used in logs and failure reports.
    fn name(&self) -> &'static str;

    /// Ordered regular expressions for the URL forms this processor knows.
    ///
    /// Each pattern is matched against the whole line and must contain at least
    /// one capture group, the first of which identifies the resource.
    fn url_patterns(&self) -> Vec<String>;

    /// Produces the enrichment for a matched line.
    fn process(&self, url_match: &UrlMatch) -> anyhow::Result<()>;
}

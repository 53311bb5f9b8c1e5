//! Console transport over standard input and output.

use log::{debug, error};
use tokio::{
    io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines},
    sync::Mutex,
};

use crate::{api::InboundLine, transport::Transport};

/// Transport reading chat lines from a reader and writing responses to a writer.
///
/// Every inbound line is attributed to the same actor and channel. Responses
/// are written as `[channel] line`.
pub struct ConsoleTransport<R, W> {
    /// Actor every inbound line is attributed to
    actor: String,
    /// Channel every inbound line is attributed to
    channel: String,
    lines: Mutex<Lines<R>>,
    writer: Mutex<W>,
}

impl ConsoleTransport<BufReader<io::Stdin>, io::Stdout> {
    /// Creates a transport on the process standard input and output.
    pub fn stdio(actor: &str, channel: &str) -> Self {
        ConsoleTransport::new(actor, channel, BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R, W> ConsoleTransport<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(actor: &str, channel: &str, reader: R, writer: W) -> Self {
        ConsoleTransport {
            actor: actor.to_owned(),
            channel: channel.to_owned(),
            lines: Mutex::new(reader.lines()),
            writer: Mutex::new(writer),
        }
    }

    /// Consumes the transport and returns its writer.
    pub fn into_writer(self) -> W {
        self.writer.into_inner()
    }
}

impl<R, W> Transport for ConsoleTransport<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    async fn receive(&self) -> Option<InboundLine> {
        let mut lines = self.lines.lock().await;
        loop {
            match lines.next_line().await {
                Ok(Some(text)) if text.trim().is_empty() => continue,
                Ok(Some(text)) => {
                    return Some(InboundLine {
                        actor: self.actor.clone(),
                        channel: self.channel.clone(),
                        text,
                    });
                }
                Ok(None) => {
                    debug!("console input closed");
                    return None;
                }
                Err(e) => {
                    error!("failed to read console input: {:?}", e);
                    return None;
                }
            }
        }
    }

    async fn send(&self, channel: &str, lines: &[String]) -> anyhow::Result<()> {
        let mut writer = self.writer.lock().await;
        for line in lines {
            writer
                .write_all(format!("[{}] {}\n", channel, line).as_bytes())
                .await?;
        }
        writer.flush().await?;

        Ok(())
    }
}

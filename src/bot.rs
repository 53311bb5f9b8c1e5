//! Bot module driving the routing core over a transport.
//!
//! This module provides the main [`Bot`] implementation that connects a
//! [`Transport`] with the [`Dispatcher`]. It owns the two loops of the
//! process:
//!
//! 1. **Inbound loop**: receives lines from the transport one at a time and
//!    dispatches each of them. Dispatch never awaits, so a slow handler never
//!    holds up the next line.
//!
//! 2. **Delivery loop**: drains the response [`Outbox`] and writes every block
//!    with a single [`Transport::send`] call, which keeps the lines of one block
//!    contiguous.
//!
//! Both loops run in the same task, so the transport does not need to be
//! shared across threads.
//!
//! # Lifecycle
//!
//! ```text
//! receive → dispatch ─┐
//!    ▲                ├─► loop until the transport closes
//! outbox → send ──────┘
//!
//! transport closed → deliver until workers idle or grace expires → flush
//! ```
//!
//! # Example
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use throughbot::{bot::Bot, config::Config, routing::{HandlerRegistry, Plugins}, transport::ConsoleTransport};
//! # async fn run() -> Result<(), anyhow::Error> {
//! let config = Config::load("config.yaml")?;
//! let registry = Arc::new(HandlerRegistry::new(Plugins::default())?);
//! let transport = ConsoleTransport::stdio("console", "#console");
//!
//! let bot = Bot::new(&config.bot, registry, transport);
//! bot.start().await; // Runs until the console input ends
//! # Ok(())
//! # }
//! ```

use std::{sync::Arc, time::Duration};

use log::{debug, error, info, warn};
use tokio::time;

use crate::{
    config,
    routing::{Dispatcher, HandlerRegistry, Outbound, Outbox, ResponseSink, WorkerPool},
    transport::Transport,
};

/// Main bot structure tying a transport to the routing core.
pub struct Bot<T> {
    /// Connection to the chat network.
    ///
    /// Only this struct reads from or writes to it.
    transport: T,

    /// Classifies inbound lines and invokes their handlers.
    dispatcher: Dispatcher,

    /// Response blocks waiting for delivery.
    outbox: Outbox,

    /// Pool running the asynchronous handler work, watched on shutdown.
    workers: WorkerPool,

    /// Time given to in-flight handler work once the transport has closed.
    shutdown_grace: Duration,
}

impl<T: Transport> Bot<T> {
    /// Creates a new [`Bot`] on the current tokio runtime.
    ///
    /// # Arguments
    ///
    /// * `config` - Routing settings (command prefix, failure message, grace period)
    /// * `registry` - Plugin tables built at startup
    /// * `transport` - Chat network connection
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    pub fn new(config: &config::Bot, registry: Arc<HandlerRegistry>, transport: T) -> Self {
        let (sink, outbox) = ResponseSink::channel(&config.failure_message);
        let workers = WorkerPool::current();
        let dispatcher = Dispatcher::new(&config.command_prefix, registry, sink, workers.clone());

        Bot {
            transport,
            dispatcher,
            outbox,
            workers,
            shutdown_grace: Duration::from_secs(config.shutdown_grace_secs),
        }
    }

    /// Runs the bot until the transport closes.
    ///
    /// Pending responses are delivered before inbound lines are read, so the
    /// outbox never grows while the transport keeps talking. Once the transport
    /// is closed, responses of in-flight handler work are still delivered for at
    /// most the configured grace period.
    pub async fn start(self) {
        let Bot {
            transport,
            dispatcher,
            mut outbox,
            workers,
            shutdown_grace,
        } = self;

        info!("Bot started, waiting for lines");

        let mut received = 0usize;
        let mut dispatched = 0usize;
        loop {
            tokio::select! {
                biased;

                Some(outbound) = outbox.recv() => Self::deliver(&transport, outbound).await,
                inbound = transport.receive() => {
                    let Some(line) = inbound else {
                        break;
                    };

                    received += 1;
                    if !dispatcher.dispatch(&line).is_no_match() {
                        dispatched += 1;
                    }
                }
            }
        }

        info!(
            "Transport closed, waiting for {} handler task(s)",
            workers.in_flight()
        );

        let idle = workers.wait_idle();
        tokio::pin!(idle);
        let grace = time::sleep(shutdown_grace);
        tokio::pin!(grace);

        loop {
            tokio::select! {
                biased;

                Some(outbound) = outbox.recv() => Self::deliver(&transport, outbound).await,
                _ = &mut idle => break,
                _ = &mut grace => {
                    warn!(
                        "{} handler task(s) still running after {:?}, dropping their responses",
                        workers.in_flight(),
                        shutdown_grace
                    );
                    break;
                }
            }
        }

        // Responses enqueued right before the workers went idle
        while let Ok(outbound) = outbox.try_recv() {
            Self::deliver(&transport, outbound).await;
        }

        info!(
            "Bot stopped, {} of {} line(s) dispatched",
            dispatched, received
        );
    }

    /// Writes one response block, logging delivery failures.
    async fn deliver(transport: &T, outbound: Outbound) {
        debug!(
            "delivering {} line(s) to {}",
            outbound.lines.len(),
            outbound.channel
        );

        if let Err(e) = transport.send(&outbound.channel, &outbound.lines).await {
            error!("Failed to deliver response to {}: {:?}", outbound.channel, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex, Once},
    };

    use log::{LevelFilter, Log, Metadata, Record};

    use super::*;
    use crate::{
        api::{Command, CommandEvent, CommandHandler, InboundLine, MockCommandHandler},
        routing::Plugins,
    };

    /// Transport replaying a fixed list of lines and recording what is sent.
    struct FakeTransport {
        inbound: Mutex<VecDeque<InboundLine>>,
        sent: Arc<Mutex<Vec<Outbound>>>,
        /// Channel every send to fails
        broken_channel: Option<String>,
    }

    impl FakeTransport {
        fn new(lines: &[(&str, &str)]) -> (Self, Arc<Mutex<Vec<Outbound>>>) {
            let inbound = lines
                .iter()
                .map(|(channel, text)| InboundLine {
                    actor: "erin".to_string(),
                    channel: channel.to_string(),
                    text: text.to_string(),
                })
                .collect();
            let sent = Arc::new(Mutex::new(Vec::new()));
            let transport = FakeTransport {
                inbound: Mutex::new(inbound),
                sent: Arc::clone(&sent),
                broken_channel: None,
            };
            (transport, sent)
        }
    }

    impl Transport for FakeTransport {
        async fn receive(&self) -> Option<InboundLine> {
            self.inbound.lock().unwrap().pop_front()
        }

        async fn send(&self, channel: &str, lines: &[String]) -> anyhow::Result<()> {
            if self.broken_channel.as_deref() == Some(channel) {
                anyhow::bail!("channel {} is gone", channel);
            }

            self.sent.lock().unwrap().push(Outbound {
                channel: channel.to_string(),
                lines: lines.to_vec(),
            });
            Ok(())
        }
    }

    /// Handler answering from a worker task after `delay`.
    struct SleepyHandler {
        delay: Duration,
    }

    impl CommandHandler for SleepyHandler {
        fn name(&self) -> &'static str {
            "sleepy"
        }

        fn commands(&self) -> Vec<Command> {
            vec![Command::new("sleepy", "sleepy")]
        }

        fn on_command(&self, event: &CommandEvent) -> anyhow::Result<bool> {
            let delay = self.delay;
            let responder = event.responder();
            event.spawn(async move {
                time::sleep(delay).await;
                responder.respond_lines(["woke up", "after a nap"]);
                Ok(())
            });
            Ok(true)
        }
    }

    fn create_echo_handler() -> MockCommandHandler {
        let mut handler = MockCommandHandler::new();
        handler.expect_name().return_const("echo");
        handler
            .expect_commands()
            .returning(|| vec![Command::new("echo", "echo <text>")]);
        handler.expect_on_command().returning(|event| {
            event.respond(event.arg_line().unwrap_or_default());
            Ok(true)
        });
        handler
    }

    /// Logger keeping every record of the test binary.
    struct CapturingLogger {
        records: Mutex<Vec<String>>,
    }

    impl Log for CapturingLogger {
        fn enabled(&self, _metadata: &Metadata) -> bool {
            true
        }

        fn log(&self, record: &Record) {
            self.records
                .lock()
                .unwrap()
                .push(format!("{} {}", record.level(), record.args()));
        }

        fn flush(&self) {}
    }

    static LOGGER: CapturingLogger = CapturingLogger {
        records: Mutex::new(Vec::new()),
    };

    /// Installs the capturing logger once and returns it.
    fn capture_logs() -> &'static CapturingLogger {
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            log::set_logger(&LOGGER).unwrap();
            log::set_max_level(LevelFilter::Trace);
        });
        &LOGGER
    }

    fn create_config(shutdown_grace_secs: u64) -> config::Bot {
        config::Bot {
            shutdown_grace_secs,
            ..config::Bot::default()
        }
    }

    fn create_registry(plugins: Plugins) -> Arc<HandlerRegistry> {
        Arc::new(HandlerRegistry::new(plugins).unwrap())
    }

    #[tokio::test]
    async fn test_responses_go_back_to_origin_channel() {
        let (transport, sent) = FakeTransport::new(&[
            ("#rust", "!echo hello"),
            ("#java.de", "just chatting"),
            ("#java.de", "!echo hallo"),
        ]);
        let registry = create_registry(Plugins::default().command_handler(create_echo_handler()));

        Bot::new(&create_config(1), registry, transport).start().await;

        let sent = sent.lock().unwrap();
        assert_eq!(
            *sent,
            vec![
                Outbound {
                    channel: "#rust".to_string(),
                    lines: vec!["hello".to_string()],
                },
                Outbound {
                    channel: "#java.de".to_string(),
                    lines: vec!["hallo".to_string()],
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_in_flight_work_is_delivered_after_transport_closes() {
        let (transport, sent) = FakeTransport::new(&[("#rust", "!sleepy")]);
        let registry = create_registry(Plugins::default().command_handler(SleepyHandler {
            delay: Duration::from_millis(20),
        }));

        Bot::new(&create_config(5), registry, transport).start().await;

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].lines, vec!["woke up", "after a nap"]);
    }

    #[tokio::test]
    async fn test_grace_period_bounds_shutdown() {
        let (transport, sent) = FakeTransport::new(&[("#rust", "!sleepy")]);
        let registry = create_registry(Plugins::default().command_handler(SleepyHandler {
            delay: Duration::from_secs(30),
        }));

        let started = time::Instant::now();
        Bot::new(&create_config(0), registry, transport).start().await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delivery_failure_does_not_stop_the_bot() {
        let (mut transport, sent) =
            FakeTransport::new(&[("#gone", "!echo lost"), ("#rust", "!echo kept")]);
        transport.broken_channel = Some("#gone".to_string());
        let registry = create_registry(Plugins::default().command_handler(create_echo_handler()));

        Bot::new(&create_config(1), registry, transport).start().await;

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].channel, "#rust");
        assert_eq!(sent[0].lines, vec!["kept"]);
    }

    #[tokio::test]
    async fn test_plain_chat_line_is_ignored_without_logging() {
        let logger = capture_logs();
        let (transport, sent) = FakeTransport::new(&[("#lurkers", "nothing to see here")]);
        let registry = create_registry(Plugins::default().command_handler(create_echo_handler()));

        Bot::new(&create_config(1), registry, transport).start().await;

        assert!(sent.lock().unwrap().is_empty());
        let records = logger.records.lock().unwrap();
        assert!(records.iter().any(|record| record.contains("Bot stopped")));
        assert!(
            !records
                .iter()
                .any(|record| record.contains("#lurkers") || record.contains("nothing to see")),
            "unexpected log entries: {:?}",
            *records
        );
    }
}

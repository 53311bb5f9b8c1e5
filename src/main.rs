//! Throughbot - a chat bot answering commands and enriching links.
//!
//! This is the main entry point of the bot. It wires the configured plugins
//! into the routing core and runs it over the console transport.
//!
//! # Overview
//!
//! Every inbound chat line goes through two independent paths:
//!
//! - **Commands**: a line starting with the command prefix (e.g. `!covid Germany`)
//!   is routed to the one handler owning the command name
//! - **Links**: a line consisting of a link is routed to the first URL processor
//!   whose pattern matches it (e.g. a YouTube link is answered with the video title)
//!
//! Lines matching neither path are ignored silently.
//!
//! # Configuration
//!
//! Create a `config.yaml` file with your settings:
//!
//! ```yaml
//! bot:
//!   command_prefix: "!"
//!
//! coinmarketcap:
//!   api_key: "your-api-key"
//!
//! youtube:
//!   api_key: "your-api-key"
//! ```
//!
//! See the [`config`] module for every setting and its default.
//!
//! # Environment Variable Overrides
//!
//! Override any configuration value using environment variables with the
//! `THROUGHBOT_` prefix:
//!
//! ```bash
//! export THROUGHBOT_COINMARKETCAP__API_KEY="your-api-key"
//! export THROUGHBOT_YOUTUBE__API_KEY="your-api-key"
//! ```
//!
//! # Usage
//!
//! ```bash
//! throughbot --config config.yaml
//! ```
//!
//! Then type chat lines on standard input, responses are printed on standard
//! output as `[channel] line`.
//!
//! # Architecture
//!
//! - [`api`] - Types and traits plugins are written against
//! - [`routing`] - Registry, dispatcher, response sink and worker pool
//! - [`handlers`] - The plugins shipped with the bot
//! - [`transport`] - Chat network boundary and the console transport
//! - [`bot`] - Inbound and delivery loops over a transport
//! - [`config`] - YAML configuration with environment variable support
//!
//! # Environment Variables
//!
//! - `RUST_LOG` - Controls logging level (default: `info`)
//!   - Set to `debug` to trace every dispatch and HTTP request
//!   - Set to `warn` or `error` for minimal logging

use std::{process::ExitCode, sync::Arc};

use clap::Parser;
use env_logger::Env;
use log::{error, info};

use crate::{
    bot::Bot, config::Config, routing::HandlerRegistry, transport::ConsoleTransport,
};

mod api;
mod bot;
mod config;
mod handlers;
mod routing;
mod transport;

/// Command-line arguments for the bot.
///
/// # Examples
///
/// ```bash
/// throughbot --config config.yaml
/// ```
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration file.
    ///
    /// A missing file is treated as empty, every setting has a default.
    #[arg(short, long)]
    config: String,
}

/// Main entry point of the bot.
///
/// 1. **Logging Setup**: `info` level by default, overridden by `RUST_LOG`
/// 2. **Configuration Loading**: YAML file plus `THROUGHBOT_` environment overrides
/// 3. **Registration**: builds the plugin list and the handler registry; a
///    registration conflict stops the process before any line is read
/// 4. **Bot Execution**: runs the bot over standard input and output until
///    the input ends
#[tokio::main]
async fn main() -> ExitCode {
    // Put logger at info level by default
    let env = Env::default().filter_or("RUST_LOG", "info");
    env_logger::init_from_env(env);

    info!("Starting throughbot {}...", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    let config = match Config::load(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load config file: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let client = match handlers::http_client(&config.http) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create http client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let registry = match HandlerRegistry::new(handlers::plugins(&config, client)) {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            error!("Failed to register plugins: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let commands: Vec<&str> = registry.commands().iter().map(|c| c.name()).collect();
    info!("Registered commands [{}]", commands.join(", "));
    for route in registry.url_routes() {
        info!(
            "Registered url pattern {} of {}",
            route.pattern(),
            route.processor().name()
        );
    }

    let transport =
        ConsoleTransport::stdio(&config.bot.console_actor, &config.bot.console_channel);
    Bot::new(&config.bot, registry, transport).start().await;

    ExitCode::SUCCESS
}

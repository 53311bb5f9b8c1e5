//! Configuration file structures for the bot.
//!
//! The configuration is read from a YAML file and can be overridden with
//! environment variables prefixed with `THROUGHBOT_` (nested keys separated by
//! `__`). Every section has sensible defaults, so `{}` is a valid configuration
//! that runs the `help`, `covid` and link title handlers.
//!
//! # Configuration File Format
//!
//! ```yaml
//! bot:
//!   # Prefix a line must start with to be read as a command
//!   command_prefix: "!"
//!   # Response sent when a handler fails
//!   failure_message: "that didn't work"
//!   # Seconds to wait for in-flight handler work when input ends
//!   shutdown_grace_secs: 5
//!   console_actor: "console"
//!   console_channel: "#console"
//!
//! http:
//!   timeout_secs: 10
//!   user_agent: "throughbot"
//!
//! # Enables the crypto command
//! coinmarketcap:
//!   api_key: "your-api-key"
//!
//! covid:
//!   api_url: "https://corona.lmao.ninja/v2"
//!
//! # Enables youtube link enrichment
//! youtube:
//!   api_key: "your-api-key"
//!
//! title:
//!   enabled: true
//!   # Fetch links to loopback and private network addresses
//!   allow_private_hosts: false
//!   max_body_bytes: 1048576
//! ```
//!
//! # Environment Variable Overrides
//!
//! ```bash
//! export THROUGHBOT_BOT__COMMAND_PREFIX="?"
//! export THROUGHBOT_COINMARKETCAP__API_KEY="secret-from-env"
//! ```

use anyhow::bail;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::Deserialize;

/// Prefix of the environment variables overriding the configuration file.
const ENV_PREFIX: &str = "THROUGHBOT_";

/// Root configuration structure.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Routing core settings
    #[serde(default)]
    pub bot: Bot,
    /// Settings of the HTTP client shared by the handlers
    #[serde(default)]
    pub http: Http,
    /// CoinMarketCap API access, enables the crypto command
    pub coinmarketcap: Option<CoinMarketCap>,
    /// Covid statistics API
    #[serde(default)]
    pub covid: Covid,
    /// YouTube Data API access, enables youtube link enrichment
    pub youtube: Option<YouTube>,
    /// Link title enrichment
    #[serde(default)]
    pub title: Title,
}

/// Routing core settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Bot {
    /// Prefix a line must start with to be read as a command.
    ///
    /// Must not be empty or contain whitespace.
    pub command_prefix: String,

    /// Generic response sent to the origin when a handler fails.
    pub failure_message: String,

    /// Seconds to wait for in-flight handler work once the input has ended.
    pub shutdown_grace_secs: u64,

    /// Actor the console transport attributes every line to.
    pub console_actor: String,

    /// Channel the console transport attributes every line to.
    pub console_channel: String,
}

impl Default for Bot {
    fn default() -> Self {
        Bot {
            command_prefix: "!".to_owned(),
            failure_message: "that didn't work".to_owned(),
            shutdown_grace_secs: 5,
            console_actor: "console".to_owned(),
            console_channel: "#console".to_owned(),
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Http {
    /// Timeout of a single request, in seconds
    pub timeout_secs: u64,
    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for Http {
    fn default() -> Self {
        Http {
            timeout_secs: 10,
            user_agent: format!("throughbot/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// CoinMarketCap API settings.
#[derive(Debug, Deserialize)]
pub struct CoinMarketCap {
    /// Pro API key, sent as `X-CMC_PRO_API_KEY`
    pub api_key: String,
    /// Base URL of the pro API
    #[serde(default = "CoinMarketCap::default_api_url")]
    pub api_url: String,
}

impl CoinMarketCap {
    fn default_api_url() -> String {
        "https://pro-api.coinmarketcap.com/v1".to_owned()
    }
}

/// Covid statistics API settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Covid {
    /// Base URL of the API, without trailing slash
    pub api_url: String,
}

impl Default for Covid {
    fn default() -> Self {
        Covid {
            api_url: "https://corona.lmao.ninja/v2".to_owned(),
        }
    }
}

/// YouTube Data API settings.
#[derive(Debug, Deserialize)]
pub struct YouTube {
    pub api_key: String,
    /// Base URL of the Data API v3
    #[serde(default = "YouTube::default_api_url")]
    pub api_url: String,
}

impl YouTube {
    fn default_api_url() -> String {
        "https://www.googleapis.com/youtube/v3".to_owned()
    }
}

/// Link title enrichment settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Title {
    pub enabled: bool,

    /// Fetch links to loopback, private and link-local addresses.
    ///
    /// Off by default, any channel member can post a link.
    pub allow_private_hosts: bool,

    /// Bytes of a page read at most while looking for its title.
    pub max_body_bytes: usize,
}

impl Default for Title {
    fn default() -> Self {
        Title {
            enabled: true,
            allow_private_hosts: false,
            max_body_bytes: 1024 * 1024,
        }
    }
}

impl Config {
    /// Loads the configuration from the YAML file at `path`, then applies the
    /// `THROUGHBOT_` environment overrides.
    ///
    /// A missing file is treated as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed, a value has the wrong
    /// type, or the command prefix is invalid.
    pub fn load(path: &str) -> Result<Self, anyhow::Error> {
        let figment = Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let mut config: Config = figment.extract()?;
        config.normalize();
        config.validate()?;

        Ok(config)
    }

    /// Removes trailing slashes from the API base URLs.
    fn normalize(&mut self) {
        trim_trailing_slash(&mut self.covid.api_url);
        if let Some(coinmarketcap) = self.coinmarketcap.as_mut() {
            trim_trailing_slash(&mut coinmarketcap.api_url);
        }
        if let Some(youtube) = self.youtube.as_mut() {
            trim_trailing_slash(&mut youtube.api_url);
        }
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        let prefix = &self.bot.command_prefix;
        if prefix.is_empty() || prefix.chars().any(char::is_whitespace) {
            bail!("invalid command prefix {:?}", prefix);
        }
        if self.bot.failure_message.trim().is_empty() {
            bail!("failure message must not be empty");
        }
        if self.title.enabled && self.title.max_body_bytes == 0 {
            bail!("title max_body_bytes must be greater than 0");
        }

        Ok(())
    }
}

fn trim_trailing_slash(url: &mut String) {
    while url.ends_with('/') {
        url.pop();
    }
}

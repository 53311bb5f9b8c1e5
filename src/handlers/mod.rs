//! Plugins shipped with the bot.
//!
//! Command handlers:
//!
//! - [`help::HelpCommandHandler`] - `help [<command>]`
//! - [`covid::CovidCommandHandler`] - `covid [<country>]`
//! - [`crypto::CryptoCommandHandler`] - `crypto [<amount>] <symbols> [in <currency>]`,
//!   only when a CoinMarketCap API key is configured
//!
//! URL processors, in priority order:
//!
//! - [`youtube::YouTubeUrlProcessor`] - only when a YouTube API key is configured
//! - [`title::TitleUrlProcessor`] - any other public link, unless disabled
//!
//! Network calls run on the worker pool through `spawn`, so the handlers
//! themselves return immediately.

use std::time::Duration;

use reqwest::Client;

use crate::{
    api::Command,
    config::{self, Config},
    routing::Plugins,
};

pub mod colors;
pub mod covid;
pub mod crypto;
pub mod help;
pub mod title;
pub mod youtube;

/// Builds the HTTP client shared by all handlers.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn http_client(config: &config::Http) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(&config.user_agent)
        .build()
}

/// Returns the explicit plugin list for `config`.
///
/// The help handler is registered last so it can list every other command.
pub fn plugins(config: &Config, client: Client) -> Plugins {
    let mut plugins = Plugins::default().command_handler(covid::CovidCommandHandler::new(
        client.clone(),
        &config.covid,
    ));

    if let Some(coinmarketcap) = &config.coinmarketcap {
        plugins = plugins.command_handler(crypto::CryptoCommandHandler::new(
            client.clone(),
            coinmarketcap,
        ));
    }

    let commands: Vec<Command> = plugins
        .command_handlers
        .iter()
        .flat_map(|handler| handler.commands())
        .collect();
    plugins = plugins.command_handler(help::HelpCommandHandler::new(
        &config.bot.command_prefix,
        commands,
    ));

    if let Some(youtube) = &config.youtube {
        plugins =
            plugins.url_processor(youtube::YouTubeUrlProcessor::new(client.clone(), youtube));
    }
    if config.title.enabled {
        plugins = plugins.url_processor(title::TitleUrlProcessor::new(client, &config.title));
    }

    plugins
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::HandlerRegistry;

    fn create_config(with_api_keys: bool) -> Config {
        let mut config = Config::default();
        if with_api_keys {
            config.coinmarketcap = Some(config::CoinMarketCap {
                api_key: "cmc-key".to_string(),
                api_url: "http://localhost:1".to_string(),
            });
            config.youtube = Some(config::YouTube {
                api_key: "yt-key".to_string(),
                api_url: "http://localhost:1".to_string(),
            });
        }
        config
    }

    #[test]
    fn test_plugins_without_api_keys() {
        let plugins = plugins(&create_config(false), Client::new());
        let registry = HandlerRegistry::new(plugins).unwrap();

        let names: Vec<&str> = registry.commands().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["covid", "help"]);

        let processors: Vec<&str> = registry
            .url_routes()
            .iter()
            .map(|route| route.processor().name())
            .collect();
        assert_eq!(processors, vec!["title"]);
    }

    #[test]
    fn test_plugins_with_api_keys() {
        let plugins = plugins(&create_config(true), Client::new());
        let registry = HandlerRegistry::new(plugins).unwrap();

        let names: Vec<&str> = registry.commands().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["covid", "crypto", "help"]);

        let (route, groups) = registry.resolve_url("http://youtu.be/0zM3nApSvMg").unwrap();
        assert_eq!(route.processor().name(), "youtube");
        assert_eq!(groups, vec!["0zM3nApSvMg"]);

        let (route, _) = registry.resolve_url("https://www.rust-lang.org").unwrap();
        assert_eq!(route.processor().name(), "title");
    }

    #[test]
    fn test_title_processor_can_be_disabled() {
        let mut config = create_config(false);
        config.title.enabled = false;
        let registry = HandlerRegistry::new(plugins(&config, Client::new())).unwrap();

        assert!(registry.url_routes().is_empty());
    }
}

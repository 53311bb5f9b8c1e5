//! The `covid` command.
//!
//! Fetches case statistics, worldwide or for one country, from a
//! disease.sh compatible API:
//!
//! - `GET {api_url}/all`
//! - `GET {api_url}/countries/{country}`
//!
//! Both return a json object such as:
//! ```json
//! { "country": "Germany", "cases": 100, "active": 20, "deaths": 3, "recovered": 77 }
//! ```
//! The `country` field is absent for the worldwide statistics.

use std::fmt;

use log::{debug, info};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::{
    api::{Command, CommandEvent, CommandHandler},
    config,
};

/// Case statistics as returned by the API.
#[derive(Debug, Deserialize, PartialEq)]
pub struct CovidStats {
    pub country: Option<String>,
    pub cases: u64,
    pub active: u64,
    pub deaths: u64,
}

impl fmt::Display for CovidStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(country) = &self.country {
            write!(f, "{}: ", country)?;
        }
        write!(
            f,
            "confirmed: {}, active: {}, deaths: {}",
            self.cases, self.active, self.deaths
        )
    }
}

/// Outcome of a statistics request.
#[derive(Debug, PartialEq)]
pub enum CovidResponse {
    Stats(CovidStats),
    /// The API answered with a status other than 200
    Status(StatusCode),
}

/// HTTP client for the statistics API.
#[derive(Clone)]
pub struct CovidRequester {
    /// Base URL, without trailing slash
    url: String,
    client: Client,
}

impl CovidRequester {
    pub fn new(client: Client, url: &str) -> Self {
        CovidRequester {
            url: url.to_owned(),
            client,
        }
    }

    /// Requests the statistics of `country`, or the worldwide ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or a 200 response cannot be parsed.
    pub async fn get_stats(&self, country: Option<&str>) -> Result<CovidResponse, reqwest::Error> {
        let url = match country {
            Some(country) => format!(
                "{}/countries/{}",
                &self.url,
                urlencoding::encode(country)
            ),
            None => format!("{}/all", &self.url),
        };
        info!("request covid stats of {}", country.unwrap_or("the world"));
        debug!("request {}", &url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            debug!("response from {} -> {}", &url, status);
            return Ok(CovidResponse::Status(status));
        }

        let stats: CovidStats = response.json().await?;
        debug!("response from {} -> {:?}", &url, &stats);

        Ok(CovidResponse::Stats(stats))
    }
}

/// Handler of the `covid` command.
pub struct CovidCommandHandler {
    requester: CovidRequester,
}

impl CovidCommandHandler {
    pub fn new(client: Client, config: &config::Covid) -> Self {
        CovidCommandHandler {
            requester: CovidRequester::new(client, &config.api_url),
        }
    }
}

impl CommandHandler for CovidCommandHandler {
    fn name(&self) -> &'static str {
        "covid"
    }

    fn commands(&self) -> Vec<Command> {
        vec![Command::new("covid", "covid [<country>] - get covid stats")]
    }

    fn on_command(&self, event: &CommandEvent) -> anyhow::Result<bool> {
        let requester = self.requester.clone();
        let country = event.arg_line().map(str::to_owned);
        let responder = event.responder();

        event.spawn(async move {
            match requester.get_stats(country.as_deref()).await? {
                CovidResponse::Stats(stats) => responder.respond(stats.to_string()),
                CovidResponse::Status(status) => responder.respond(status.as_u16().to_string()),
            }
            Ok(())
        });

        Ok(true)
    }
}

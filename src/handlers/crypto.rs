//! The `crypto` command.
//!
//! Looks up crypto currency prices on CoinMarketCap:
//!
//! ```text
//! !crypto btc                 → BTC: $43210.12 (+1.2%) (Δ24h)
//! !crypto 2.5 btc,eth in eur  → 2.5 BTC: 98765.43€ (-0.4%) 2.5 ETH: 5432.10€ (+2.0%) (Δ24h)
//! ```
//!
//! Prices are colored green when the 24h change is positive or zero and red
//! otherwise.

use std::{collections::HashMap, str::FromStr, sync::LazyLock};

use log::{debug, info};
use regex::Regex;
use reqwest::{Client, StatusCode, header::ACCEPT};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;

use crate::{
    api::{Command, CommandEvent, CommandHandler},
    config,
    handlers::colors,
};

/// `<symbols> in <currency>`
static QUOTE_CURRENCY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*)\s+in\s+(\w+)\s*$").expect("valid regex"));

/// `<amount> <symbols>`
static AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d*(\.\d+)?)\s+(.*)$").expect("valid regex"));

static SYMBOL_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s,;|]+").expect("valid regex"));

const DEFAULT_CURRENCY: &str = "USD";

/// A parsed `crypto` argument line.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteQuery {
    /// Upper-cased symbols, comma separated
    pub symbols: String,
    /// Upper-cased currency to convert to
    pub convert: String,
    /// Amount as typed, keeping its trailing zeros
    pub amount: Decimal,
}

impl QuoteQuery {
    /// Parses `[<amount>] <symbols> [in <currency>]`.
    ///
    /// The amount defaults to 1 and the currency to USD. Symbols may be
    /// separated by whitespace, `,`, `;` or `|`.
    ///
    /// # Examples
    ///
    /// ```
    /// let query = QuoteQuery::parse("2.5 btc eth in eur");
    /// assert_eq!(query.symbols, "BTC,ETH");
    /// assert_eq!(query.convert, "EUR");
    /// assert_eq!(query.amount.to_string(), "2.5");
    /// ```
    pub fn parse(input: &str) -> Self {
        let (symbols, convert) = match QUOTE_CURRENCY.captures(input) {
            Some(captures) => (
                captures.get(1).map_or("", |m| m.as_str()),
                captures
                    .get(2)
                    .map_or(DEFAULT_CURRENCY.to_owned(), |m| m.as_str().to_uppercase()),
            ),
            None => (input, DEFAULT_CURRENCY.to_owned()),
        };

        let (symbols, amount) = match AMOUNT.captures(symbols) {
            Some(captures) => {
                let amount = captures.get(1).and_then(|m| parse_amount(m.as_str()));
                match amount {
                    Some(amount) => (captures.get(3).map_or("", |m| m.as_str()), amount),
                    None => (symbols, Decimal::ONE),
                }
            }
            None => (symbols, Decimal::ONE),
        };

        let symbols = SYMBOL_SEPARATOR
            .split(&symbols.to_uppercase())
            .filter(|symbol| !symbol.is_empty())
            .collect::<Vec<_>>()
            .join(",");

        QuoteQuery {
            symbols,
            convert,
            amount,
        }
    }
}

/// Parses `2.50` or `.5`, keeping the scale as typed.
fn parse_amount(text: &str) -> Option<Decimal> {
    if text.starts_with('.') {
        Decimal::from_str(&format!("0{}", text)).ok()
    } else {
        Decimal::from_str(text).ok()
    }
}

/// Latest price of one crypto currency.
#[derive(Debug, Clone, PartialEq)]
pub struct CryptoQuote {
    pub symbol: String,
    /// Currency the price is expressed in
    pub currency: String,
    pub price: Decimal,
    pub percent_change_24h: Decimal,
}

/// Outcome of a quotes request.
#[derive(Debug, PartialEq)]
pub enum QuotesResponse {
    Quotes(Vec<CryptoQuote>),
    /// The API reported an error in its status block
    Error { code: i64, message: String },
    /// The body could not be read as an API response
    Unparsable(StatusCode),
}

#[derive(Debug, Deserialize)]
struct CmcResponse {
    status: CmcStatus,
    data: Option<HashMap<String, CmcCryptoCurrency>>,
}

#[derive(Debug, Deserialize)]
struct CmcStatus {
    error_code: i64,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CmcCryptoCurrency {
    symbol: String,
    quote: HashMap<String, CmcQuote>,
}

#[derive(Debug, Deserialize)]
struct CmcQuote {
    price: Decimal,
    percent_change_24h: Decimal,
}

/// HTTP client for the CoinMarketCap pro API.
#[derive(Clone)]
pub struct CryptoRequester {
    /// Base URL of the pro API
    url: String,
    api_key: String,
    client: Client,
}

impl CryptoRequester {
    pub fn new(client: Client, config: &config::CoinMarketCap) -> Self {
        CryptoRequester {
            url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            client,
        }
    }

    /// Request `/cryptocurrency/quotes/latest` for the symbols of `query`.
    ///
    /// This api call returns the quotes keyed by symbol:
    /// ```json
    /// {
    ///   "status": { "error_code": 0, "error_message": null },
    ///   "data": {
    ///     "BTC": { "symbol": "BTC", "quote": { "EUR": { "price": 40000.0, "percent_change_24h": 1.5 } } }
    ///   }
    /// }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, or if a 200 response has no data.
    pub async fn latest_quotes(&self, query: &QuoteQuery) -> anyhow::Result<QuotesResponse> {
        let url = format!("{}/cryptocurrency/quotes/latest", &self.url);
        info!("request quotes of {} in {}", &query.symbols, &query.convert);
        debug!(
            "request {}?symbol={}&convert={}",
            &url, &query.symbols, &query.convert
        );

        let response = self
            .client
            .get(&url)
            .header("X-CMC_PRO_API_KEY", &self.api_key)
            .header(ACCEPT, "application/json")
            .query(&[("symbol", &query.symbols), ("convert", &query.convert)])
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        let cmc_response: CmcResponse = match serde_json::from_str(&body) {
            Ok(cmc_response) => cmc_response,
            Err(e) => {
                debug!("could not parse response from {}: {:?}", &url, e);
                return Ok(QuotesResponse::Unparsable(status));
            }
        };
        debug!("response from {} -> {:?}", &url, &cmc_response);

        if status != StatusCode::OK {
            return Ok(QuotesResponse::Error {
                code: cmc_response.status.error_code,
                message: cmc_response.status.error_message.unwrap_or_default(),
            });
        }

        let data = cmc_response
            .data
            .ok_or_else(|| anyhow::anyhow!("quotes response without data"))?;
        let quotes = data
            .into_values()
            .filter_map(|currency| {
                // One quote per requested currency, only one is requested
                let (code, quote) = currency.quote.into_iter().next()?;
                Some(CryptoQuote {
                    symbol: currency.symbol,
                    currency: code,
                    price: quote.price,
                    percent_change_24h: quote.percent_change_24h,
                })
            })
            .collect();

        Ok(QuotesResponse::Quotes(quotes))
    }
}

/// Display symbol of well-known fiat currencies, in US notation.
fn currency_symbol(code: &str) -> Option<&'static str> {
    let symbol = match code {
        "USD" => "$",
        "EUR" => "€",
        "GBP" => "£",
        "JPY" => "¥",
        "CNY" => "CN¥",
        "CAD" => "CA$",
        "AUD" => "A$",
        "NZD" => "NZ$",
        "HKD" => "HK$",
        "BRL" => "R$",
        "MXN" => "MX$",
        "TWD" => "NT$",
        "INR" => "₹",
        "KRW" => "₩",
        "ILS" => "₪",
        "VND" => "₫",
        _ => return None,
    };
    Some(symbol)
}

/// Renders `price * amount` in `currency`.
///
/// Small totals get more decimals: 8 below 0.0001, 6 below 0.01, 4 below 1
/// and 2 otherwise, rounded half up. Symbols ending in `$` are put in front
/// of the number, all others after it.
pub fn render_price(amount: Decimal, price: Decimal, currency: &str) -> String {
    let total = price.checked_mul(amount).unwrap_or(Decimal::MAX);
    let precision = if total < Decimal::new(1, 4) {
        8
    } else if total < Decimal::new(1, 2) {
        6
    } else if total < Decimal::ONE {
        4
    } else {
        2
    };
    let total = round_half_up(total, precision);

    // Unknown codes are most likely crypto currencies
    let symbol = currency_symbol(currency).unwrap_or(currency);
    if symbol.ends_with('$') {
        format!("{}{:.*}", symbol, precision as usize, total)
    } else {
        format!("{:.*}{}", precision as usize, total, symbol)
    }
}

fn round_half_up(value: Decimal, precision: u32) -> Decimal {
    value.round_dp_with_strategy(precision, RoundingStrategy::MidpointAwayFromZero)
}

/// Renders a percentage with one decimal and an explicit sign.
fn render_change(change: Decimal) -> String {
    let rounded = round_half_up(change, 1);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        '-'
    } else {
        '+'
    };
    format!("{}{:.1}%", sign, rounded.abs())
}

fn render_symbol(amount: Decimal, symbol: &str) -> String {
    if amount == Decimal::ONE {
        symbol.to_owned()
    } else {
        format!("{} {}", amount, symbol)
    }
}

/// Renders all quotes on one line, sorted by symbol.
pub fn render_quotes(quotes: &[CryptoQuote], amount: Decimal) -> String {
    let mut quotes: Vec<&CryptoQuote> = quotes.iter().collect();
    quotes.sort_by(|a, b| a.symbol.cmp(&b.symbol));

    let rendered: Vec<String> = quotes
        .iter()
        .map(|quote| {
            let color = if quote.percent_change_24h >= Decimal::ZERO {
                colors::GREEN
            } else {
                colors::RED
            };
            format!(
                "{}: {}{} ({}){}",
                render_symbol(amount, &quote.symbol),
                color,
                render_price(amount, quote.price, &quote.currency),
                render_change(quote.percent_change_24h),
                colors::NORMAL
            )
        })
        .collect();

    format!("{} (\u{394}24h)", rendered.join(" "))
}

/// Handler of the `crypto` command.
pub struct CryptoCommandHandler {
    requester: CryptoRequester,
}

impl CryptoCommandHandler {
    pub fn new(client: Client, config: &config::CoinMarketCap) -> Self {
        CryptoCommandHandler {
            requester: CryptoRequester::new(client, config),
        }
    }
}

impl CommandHandler for CryptoCommandHandler {
    fn name(&self) -> &'static str {
        "crypto"
    }

    fn commands(&self) -> Vec<Command> {
        vec![Command::new(
            "crypto",
            "crypto [<amount>] <symbols> [in <currency>] - get price information on crypto \
             currencies - currency defaults to USD, amount to 1",
        )]
    }

    fn on_command(&self, event: &CommandEvent) -> anyhow::Result<bool> {
        let Some(arg_line) = event.arg_line() else {
            event.respond(event.command().usage());
            return Ok(true);
        };

        let query = QuoteQuery::parse(arg_line);
        if query.symbols.is_empty() {
            event.respond(event.command().usage());
            return Ok(true);
        }

        let requester = self.requester.clone();
        let responder = event.responder();
        event.spawn(async move {
            let response = match requester.latest_quotes(&query).await? {
                QuotesResponse::Quotes(quotes) if quotes.is_empty() => {
                    format!("no quotes for {}", query.symbols)
                }
                QuotesResponse::Quotes(quotes) => render_quotes(&quotes, query.amount),
                QuotesResponse::Error { code, message } => format!("{}: {}", code, message),
                QuotesResponse::Unparsable(status) => format!(
                    "could not parse response, status: {}",
                    status.as_u16()
                ),
            };
            responder.respond(response);
            Ok(())
        });

        Ok(true)
    }
}

//! Link title enrichment.
//!
//! A line consisting of a single http(s) link is answered with the title of
//! the linked HTML page. Registered last, so links handled by a more specific
//! processor never reach it.
//!
//! Links are posted by anyone in the channel, so a page is only fetched when:
//!
//! - the scheme is `http` or `https`
//! - the host is not a loopback, private, link-local or unspecified address,
//!   neither literally nor through DNS, unless `title.allow_private_hosts` is set
//!
//! The peer actually connected to is checked again once the response arrives,
//! which covers redirects. At most `title.max_body_bytes` of the page are read.

use std::{
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
    sync::LazyLock,
};

use log::{debug, info, warn};
use regex::{Captures, Regex};
use reqwest::{Client, Response, Url, header::CONTENT_TYPE};
use thiserror::Error;
use tokio::net;

use crate::{
    api::{UrlMatch, UrlProcessor},
    config,
};

const URL_PATTERN: &str = r"(https?://\S+)";

/// Reading stops once this end tag has been received.
const TITLE_END: &[u8] = b"</title>";

static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid regex"));

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").expect("valid regex")
});

/// Reasons a link is not fetched.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("unsupported scheme {0}")]
    UnsupportedScheme(String),

    #[error("no host in {0}")]
    MissingHost(String),

    #[error("cannot resolve {host}: {cause}")]
    Unresolved {
        host: String,
        #[source]
        cause: std::io::Error,
    },

    #[error("{host} is the private address {addr}")]
    PrivateAddress { host: String, addr: IpAddr },
}

/// Extracts the content of the `<title>` element of `html`.
///
/// Entities are decoded and whitespace runs collapsed to a single space.
/// Returns `None` if there is no title or it is blank.
pub fn extract_title(html: &str) -> Option<String> {
    let raw = TITLE.captures(html)?.get(1)?.as_str();
    let decoded = decode_entities(raw);
    let title = WHITESPACE.replace_all(decoded.trim(), " ").into_owned();

    (!title.is_empty()).then_some(title)
}

/// Decodes the common named entities and every numeric one in a single pass.
///
/// Unknown or invalid entities are kept as written.
fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |captures: &Captures| {
            let entity = &captures[1];
            let decoded = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some(' '),
                _ => entity.strip_prefix('#').and_then(decode_numeric_entity),
            };
            decoded.map_or_else(|| captures[0].to_owned(), String::from)
        })
        .into_owned()
}

/// Decodes the code point of `&#8211;` or `&#x2F;` style entities, given
/// without the leading `&#`.
fn decode_numeric_entity(code: &str) -> Option<char> {
    let code = match code.strip_prefix(&['x', 'X'][..]) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => code.parse().ok()?,
    };
    char::from_u32(code)
}

fn is_private_ip(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(ip) => is_private_ipv4(ip),
        IpAddr::V6(ip) => is_private_ipv6(ip),
    }
}

fn is_private_ipv4(ip: &Ipv4Addr) -> bool {
    let [first, second, ..] = ip.octets();
    first == 127 // loopback
        || first == 10
        || (first == 172 && (16..=31).contains(&second))
        || (first == 192 && second == 168)
        || (first == 169 && second == 254) // link-local
        || first == 0
}

fn is_private_ipv6(ip: &Ipv6Addr) -> bool {
    if ip.is_loopback() || ip.is_unspecified() {
        return true;
    }
    let first = ip.segments()[0];
    // fc00::/7 unique local, fe80::/10 link-local
    if first & 0xfe00 == 0xfc00 || first & 0xffc0 == 0xfe80 {
        return true;
    }
    ip.to_ipv4_mapped().is_some_and(|v4| is_private_ipv4(&v4))
}

/// Checks that `url` may be fetched: http(s) only, and the host must not be
/// or resolve to a private address.
pub async fn check_public(url: &Url) -> Result<(), LinkError> {
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LinkError::UnsupportedScheme(url.scheme().to_owned()));
    }

    let host = url
        .host_str()
        .ok_or_else(|| LinkError::MissingHost(url.to_string()))?;

    // IPv6 literals keep their brackets in the host string
    let literal = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(addr) = literal.parse::<IpAddr>() {
        return check_addr(host, addr);
    }

    let port = url.port_or_known_default().unwrap_or(80);
    let addrs: Vec<_> = net::lookup_host((host, port))
        .await
        .map_err(|cause| LinkError::Unresolved {
            host: host.to_owned(),
            cause,
        })?
        .collect();
    if addrs.is_empty() {
        return Err(LinkError::Unresolved {
            host: host.to_owned(),
            cause: std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses returned"),
        });
    }

    for addr in addrs {
        check_addr(host, addr.ip())?;
    }
    Ok(())
}

fn check_addr(host: &str, addr: IpAddr) -> Result<(), LinkError> {
    if is_private_ip(&addr) {
        return Err(LinkError::PrivateAddress {
            host: host.to_owned(),
            addr,
        });
    }
    Ok(())
}

/// Reads at most `max_bytes` of the body, stopping early once the end of the
/// title has been received.
async fn read_head(mut response: Response, max_bytes: usize) -> Result<String, reqwest::Error> {
    let mut body: Vec<u8> = Vec::new();

    while let Some(chunk) = response.chunk().await? {
        // The end tag may straddle two chunks
        let scan_from = body.len().saturating_sub(TITLE_END.len());
        let room = max_bytes - body.len();
        body.extend_from_slice(&chunk[..chunk.len().min(room)]);

        if body.len() >= max_bytes {
            debug!("stop reading {} after {} bytes", response.url(), max_bytes);
            break;
        }
        if body[scan_from..]
            .windows(TITLE_END.len())
            .any(|window| window.eq_ignore_ascii_case(TITLE_END))
        {
            break;
        }
    }

    Ok(String::from_utf8_lossy(&body).into_owned())
}

/// HTTP client fetching linked pages.
#[derive(Clone)]
pub struct PageRequester {
    client: Client,
    allow_private_hosts: bool,
    max_body_bytes: usize,
}

impl PageRequester {
    pub fn new(client: Client, config: &config::Title) -> Self {
        PageRequester {
            client,
            allow_private_hosts: config.allow_private_hosts,
            max_body_bytes: config.max_body_bytes,
        }
    }

    /// Requests `url` and returns the page title.
    ///
    /// Returns `None` for unsuccessful responses, non HTML content and pages
    /// without title within the first `max_body_bytes`.
    ///
    /// # Errors
    ///
    /// Returns an error if the link is invalid, points to a private address
    /// or the request fails.
    pub async fn get_title(&self, url: &str) -> anyhow::Result<Option<String>> {
        let url = Url::parse(url)?;
        if !self.allow_private_hosts {
            check_public(&url).await?;
        }

        info!("request title of {}", url);
        let response = self.client.get(url.clone()).send().await?;

        // Redirects and DNS changes are only visible on the connected peer
        if !self.allow_private_hosts {
            if let Some(peer) = response.remote_addr() {
                check_addr(response.url().host_str().unwrap_or_default(), peer.ip())?;
            }
        }

        if !response.status().is_success() {
            debug!("response from {} -> {}", url, response.status());
            return Ok(None);
        }

        let is_html = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_none_or(|value| value.contains("html"));
        if !is_html {
            debug!("response from {} is not html", url);
            return Ok(None);
        }

        let head = read_head(response, self.max_body_bytes).await?;
        let title = extract_title(&head);
        debug!("response from {} -> title {:?}", url, &title);

        Ok(title)
    }
}

/// Answers links with the title of the linked page.
pub struct TitleUrlProcessor {
    requester: PageRequester,
}

impl TitleUrlProcessor {
    pub fn new(client: Client, config: &config::Title) -> Self {
        TitleUrlProcessor {
            requester: PageRequester::new(client, config),
        }
    }
}

impl UrlProcessor for TitleUrlProcessor {
    fn name(&self) -> &'static str {
        "title"
    }

    fn url_patterns(&self) -> Vec<String> {
        vec![URL_PATTERN.to_owned()]
    }

    fn process(&self, url_match: &UrlMatch) -> anyhow::Result<()> {
        let url = url_match.source_url().to_owned();
        let requester = self.requester.clone();
        let responder = url_match.responder();
        let origin = url_match.origin().clone();

        url_match.spawn(async move {
            match requester.get_title(&url).await {
                Ok(Some(title)) => responder.respond(format!("Title: {}", title)),
                Ok(None) => {}
                Err(e) => warn!(
                    "failed to request {} posted by {} in {}: {:?}",
                    url, origin.actor, origin.channel, e
                ),
            }
            Ok(())
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing;

    /// Settings letting the processor reach the local mock server.
    fn create_config(max_body_bytes: usize) -> config::Title {
        config::Title {
            allow_private_hosts: true,
            max_body_bytes,
            ..config::Title::default()
        }
    }

    #[test]
    fn test_extract_title() {
        assert_eq!(
            extract_title("<html><head><title>The Rust Programming Language</title></head></html>"),
            Some("The Rust Programming Language".to_string())
        );
        assert_eq!(
            extract_title("<TITLE lang=\"en\">\n  Tom &amp; Jerry &lt;3\n  &quot;classic&quot;\n</TITLE>"),
            Some("Tom & Jerry <3 \"classic\"".to_string())
        );
        assert_eq!(extract_title("<title>   </title>"), None);
        assert_eq!(extract_title("<html><body>no title</body></html>"), None);
    }

    #[test]
    fn test_extract_title_decodes_numeric_entities() {
        assert_eq!(
            extract_title("<title>Rust &#8211; docs&#x2F;std &#X41;&#39;s</title>"),
            Some("Rust \u{2013} docs/std A's".to_string())
        );
        // Decoded once, unknown and invalid entities are kept
        assert_eq!(
            extract_title("<title>&amp;lt; &copy; &#xD800; &#99999999;</title>"),
            Some("&lt; &copy; &#xD800; &#99999999;".to_string())
        );
    }

    #[test]
    fn test_private_addresses() {
        for addr in [
            "127.0.0.1",
            "10.0.0.1",
            "172.16.0.1",
            "172.31.255.255",
            "192.168.1.1",
            "169.254.169.254",
            "0.0.0.0",
            "::1",
            "::",
            "fd00::1",
            "fe80::1",
            "::ffff:10.0.0.1",
        ] {
            let addr: IpAddr = addr.parse().unwrap();
            assert!(is_private_ip(&addr), "{} should be private", addr);
        }

        for addr in ["93.184.216.34", "172.32.0.1", "2606:4700::1111"] {
            let addr: IpAddr = addr.parse().unwrap();
            assert!(!is_private_ip(&addr), "{} should be public", addr);
        }
    }

    #[tokio::test]
    async fn test_check_public() {
        for url in [
            "http://127.0.0.1:8080/admin",
            "http://[::1]/",
            "http://192.168.1.1/router",
            "https://localhost/",
        ] {
            let result = check_public(&Url::parse(url).unwrap()).await;
            assert!(
                matches!(result, Err(LinkError::PrivateAddress { .. })),
                "{} was not rejected: {:?}",
                url,
                result
            );
        }

        let result = check_public(&Url::parse("ftp://93.184.216.34/file").unwrap()).await;
        assert!(matches!(result, Err(LinkError::UnsupportedScheme(_))));

        assert!(
            check_public(&Url::parse("http://93.184.216.34/").unwrap())
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_process_responds_with_title() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/blog/rust-2024")
            .with_status(200)
            .with_header("content-type", "text/html; charset=utf-8")
            .with_body("<html><head><title>Rust 2024 &amp; beyond</title></head></html>")
            .create_async()
            .await;

        let url = format!("{}/blog/rust-2024", server.url());
        let processor = TitleUrlProcessor::new(Client::new(), &create_config(1024));
        let (url_match, mut outbox) = testing::url_match(&url, vec![url.clone()]);

        processor.process(&url_match).unwrap();
        assert_eq!(
            testing::next_block(&mut outbox).await,
            vec!["Title: Rust 2024 & beyond"]
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_loopback_link_is_not_requested() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/admin")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<title>internal admin</title>")
            .expect(0)
            .create_async()
            .await;

        let url = format!("{}/admin", server.url());
        let processor = TitleUrlProcessor::new(Client::new(), &config::Title::default());
        let (url_match, outbox) = testing::url_match(&url, vec![url.clone()]);

        processor.process(&url_match).unwrap();
        testing::assert_silent(url_match, outbox).await;
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_title_beyond_body_limit_is_ignored() {
        let mut server = mockito::Server::new_async().await;
        let body = format!(
            "<html><head>{}<title>internal admin</title></head></html>",
            " ".repeat(64 * 1024)
        );
        server
            .mock("GET", "/huge")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(body)
            .create_async()
            .await;

        let url = format!("{}/huge", server.url());
        let processor = TitleUrlProcessor::new(Client::new(), &create_config(1024));
        let (url_match, outbox) = testing::url_match(&url, vec![url.clone()]);

        processor.process(&url_match).unwrap();
        testing::assert_silent(url_match, outbox).await;
    }

    #[tokio::test]
    async fn test_title_before_body_limit_is_found() {
        let mut server = mockito::Server::new_async().await;
        let body = format!(
            "<html><head><title>early bird</title></head><body>{}</body></html>",
            "x".repeat(64 * 1024)
        );
        server
            .mock("GET", "/long")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(body)
            .create_async()
            .await;

        let requester = PageRequester::new(Client::new(), &create_config(1024));
        let title = requester
            .get_title(&format!("{}/long", server.url()))
            .await
            .unwrap();

        assert_eq!(title, Some("early bird".to_string()));
    }

    #[tokio::test]
    async fn test_non_html_stays_silent() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/image.png")
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body("<title>not really</title>")
            .create_async()
            .await;

        let url = format!("{}/image.png", server.url());
        let processor = TitleUrlProcessor::new(Client::new(), &create_config(1024));
        let (url_match, outbox) = testing::url_match(&url, vec![url.clone()]);

        processor.process(&url_match).unwrap();
        testing::assert_silent(url_match, outbox).await;
    }

    #[tokio::test]
    async fn test_error_status_stays_silent() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/missing")
            .with_status(404)
            .with_header("content-type", "text/html")
            .with_body("<title>404 Not Found</title>")
            .create_async()
            .await;

        let url = format!("{}/missing", server.url());
        let processor = TitleUrlProcessor::new(Client::new(), &create_config(1024));
        let (url_match, outbox) = testing::url_match(&url, vec![url.clone()]);

        processor.process(&url_match).unwrap();
        testing::assert_silent(url_match, outbox).await;
    }
}

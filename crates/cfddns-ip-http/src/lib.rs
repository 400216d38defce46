// # HTTP IP Discovery
//
// Finds the machine's public IP by asking HTTP echo services, in order,
// until one answers with a usable address.
//
// ## Accepted Responses
//
// A `200 OK` whose body is either
// - a bare IP literal (surrounding whitespace ignored), as returned by
//   ipify, ifconfig.me and icanhazip; or
// - a JSON object with a string `ip` field, as returned by ipinfo.io.
//
// Anything else (network error, other status, unparsable body) makes the
// service count as failed for this attempt and the next one is tried. So
// does an address of the wrong family: a discovery built for `AAAA` records
// skips services that answer over IPv4, and the default `A` one skips
// IPv6 answers.

use async_trait::async_trait;
use cfddns_core::traits::{IpDiscovery, RecordType};
use cfddns_core::{Error, Result};
use serde::Deserialize;
use std::net::IpAddr;
use std::time::Duration;

/// Echo services queried when the configuration names none
pub const DEFAULT_IP_SOURCES: &[&str] = &[
    "https://api.ipify.org",  // plain text
    "https://ifconfig.me/ip", // plain text
    "https://icanhazip.com",  // plain text, trailing newline
    "https://ipinfo.io/json", // JSON object
];

/// Default per-request timeout (10 seconds)
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Public IP discovery over a list of HTTP echo services
pub struct HttpIpDiscovery {
    /// Services, in the order they are tried
    sources: Vec<String>,

    /// Record type the address is meant for
    record_type: RecordType,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpIpDiscovery {
    /// Create a discovery over `sources` with the default timeout
    pub fn new(sources: Vec<String>) -> Self {
        Self::with_timeout(sources, DEFAULT_TIMEOUT)
    }

    /// Create a discovery over [`DEFAULT_IP_SOURCES`]
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_IP_SOURCES.iter().map(|s| s.to_string()).collect())
    }

    /// Create with a custom per-request timeout
    pub fn with_timeout(sources: Vec<String>, timeout: Duration) -> Self {
        Self {
            sources,
            record_type: RecordType::A,
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }

    /// Only accept addresses that fit a `record_type` record
    pub fn for_record_type(mut self, record_type: RecordType) -> Self {
        self.record_type = record_type;
        self
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    /// Ask one service
    async fn fetch(&self, url: &str) -> Result<IpAddr> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::transport(format!("Request failed: {}", e)))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(Error::transport(format!(
                "Echo service answered with HTTP {}",
                status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::transport(format!("Failed to read response: {}", e)))?;

        let ip = parse_ip_body(&body).ok_or_else(|| {
            Error::transport(format!(
                "Echo service returned no IP address: {:?}",
                body.trim()
            ))
        })?;

        if !self.record_type.matches(ip) {
            return Err(Error::transport(format!(
                "Echo service returned {}, which does not fit a {} record",
                ip, self.record_type
            )));
        }

        Ok(ip)
    }
}

impl std::fmt::Debug for HttpIpDiscovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpIpDiscovery")
            .field("sources", &self.sources)
            .field("record_type", &self.record_type)
            .finish()
    }
}

#[async_trait]
impl IpDiscovery for HttpIpDiscovery {
    async fn discover(&self) -> Result<IpAddr> {
        for url in &self.sources {
            match self.fetch(url).await {
                Ok(ip) => {
                    tracing::debug!("Public IP {} reported by {}", ip, url);
                    return Ok(ip);
                }
                Err(e) => {
                    tracing::warn!("Failed to get public IP from {}: {}", url, e);
                }
            }
        }

        Err(Error::DiscoveryExhausted {
            attempted: self.sources.len(),
        })
    }
}

#[derive(Deserialize)]
struct EchoObject {
    ip: String,
}

/// Extract an IP address from an echo service response body
///
/// The trimmed body is tried as a bare IP literal first, then as a JSON
/// object whose `ip` field holds one.
pub fn parse_ip_body(body: &str) -> Option<IpAddr> {
    let trimmed = body.trim();
    if let Ok(ip) = trimmed.parse::<IpAddr>() {
        return Some(ip);
    }

    serde_json::from_str::<EchoObject>(trimmed)
        .ok()
        .and_then(|object| object.ip.trim().parse().ok())
}

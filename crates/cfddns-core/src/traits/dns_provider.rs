// # DNS Provider Trait
//
// Defines the client contract for one tracked domain at a DNS provider.
//
// ## Implementations
//
// - Cloudflare: `cfddns-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use cfddns_core::traits::{DnsProvider, RecordType};
//
// let mut provider = /* DnsProvider implementation */;
// match provider.lookup_record(RecordType::A, "example.org").await? {
//     Some(record) => println!("{} -> {}", record.name, record.content),
//     None => println!("no record yet"),
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::net::IpAddr;

use crate::config::DomainEntry;

/// TTL value the provider interprets as "automatic"
pub const AUTO_TTL: u32 = 1;

/// DNS record type bound to an address family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    /// IPv4 address record
    #[serde(rename = "A")]
    A,
    /// IPv6 address record
    #[serde(rename = "AAAA")]
    Aaaa,
}

impl RecordType {
    /// Record type matching the address family of `ip`
    pub fn for_ip(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => RecordType::A,
            IpAddr::V6(_) => RecordType::Aaaa,
        }
    }

    /// Whether `ip` belongs to the address family this type stores
    pub fn matches(&self, ip: IpAddr) -> bool {
        *self == Self::for_ip(ip)
    }

    /// Parse a wire name, case-insensitively
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "A" => Some(RecordType::A),
            "AAAA" => Some(RecordType::Aaaa),
            _ => None,
        }
    }

    /// Wire name of the record type
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider zone a domain belongs to
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ZoneInfo {
    /// Zone identifier used in API paths
    pub id: String,
    /// Zone apex name
    #[serde(default)]
    pub name: String,
}

/// A DNS record as stored at the provider
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DnsRecord {
    /// Provider-assigned record id
    pub id: String,
    /// Record type
    #[serde(rename = "type")]
    pub record_type: RecordType,
    /// Fully qualified record name
    pub name: String,
    /// Record content (the IP address literal)
    pub content: String,
    /// Time-to-live, `1` meaning automatic
    #[serde(default)]
    pub ttl: Option<u32>,
    /// Whether traffic goes through the provider's proxy
    #[serde(default, deserialize_with = "strict_bool")]
    pub proxied: bool,
}

impl DnsRecord {
    /// Whether the record already points at `ip`
    pub fn points_to(&self, ip: IpAddr) -> bool {
        match self.content.trim().parse::<IpAddr>() {
            Ok(current) => current == ip,
            Err(_) => self.content == ip.to_string(),
        }
    }
}

/// Only a literal JSON `true` counts as true; absent, `null`, strings and
/// numbers all become `false`.
fn strict_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(normalize_proxied(value.as_ref()))
}

/// Proxy flag normalization shared by record parsing and write payloads
pub fn normalize_proxied(value: Option<&serde_json::Value>) -> bool {
    matches!(value, Some(serde_json::Value::Bool(true)))
}

/// Account credentials sent with every provider request
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account email
    pub email: String,
    /// Global API key
    pub api_key: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            api_key: api_key.into(),
        }
    }
}

// Custom Debug implementation that hides the API key
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("api_key", &"<REDACTED>")
            .finish()
    }
}

/// Client for one tracked domain at a DNS provider
///
/// An instance is bound to a single zone, resolved when it was created, and
/// keeps a local copy of the records it has looked up or written. Every
/// lookup goes to the provider; the copy only supplies record ids to later
/// writes.
///
/// Implementations must not retry. A failed call returns an error and the
/// next reconciliation cycle is the retry.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Zone this client operates on
    fn zone(&self) -> &ZoneInfo;

    /// Fetch the current record of `record_type` named `name`
    ///
    /// `Ok(None)` means the record does not exist and needs to be created.
    /// It is an expected outcome, not an error.
    async fn lookup_record(
        &mut self,
        record_type: RecordType,
        name: &str,
    ) -> Result<Option<DnsRecord>, crate::Error>;

    /// Create a record
    ///
    /// `proxied` is sent as `true` only when it is `Some(true)`. `ttl` is
    /// sent only when set to something other than [`AUTO_TTL`].
    async fn create_record(
        &mut self,
        record_type: RecordType,
        name: &str,
        content: &str,
        proxied: Option<bool>,
        ttl: Option<u32>,
    ) -> Result<DnsRecord, crate::Error>;

    /// Replace the content of a record found by a prior lookup
    async fn update_record(
        &mut self,
        record_type: RecordType,
        name: &str,
        content: &str,
        proxied: Option<bool>,
        ttl: Option<u32>,
    ) -> Result<DnsRecord, crate::Error>;

    /// Delete a record found by a prior lookup, returning its id
    async fn delete_record(
        &mut self,
        record_type: RecordType,
        name: &str,
    ) -> Result<String, crate::Error>;

    /// Locally cached copy of a record, if any
    fn cached_record(&self, record_type: RecordType, name: &str) -> Option<&DnsRecord>;

    /// Provider name for logging
    fn provider_name(&self) -> &'static str;
}

/// Builds connected provider clients, one per tracked domain
#[async_trait]
pub trait DnsProviderFactory: Send + Sync {
    /// Connect a client for `entry`, resolving its zone
    async fn connect(
        &self,
        credentials: &Credentials,
        entry: &DomainEntry,
    ) -> Result<Box<dyn DnsProvider>, crate::Error>;
}

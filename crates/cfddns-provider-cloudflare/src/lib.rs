// # Cloudflare DNS Provider
//
// Cloudflare API v4 client for the DDNS updater. One client is connected
// per tracked domain; it resolves the domain's zone once and then serves
// record lookups and writes inside that zone.
//
// ## Behaviour
//
// - One HTTP request per operation, no retries (the next cycle is the retry)
// - 30 second timeout on every request
// - Records seen by a lookup or write are cached by (type, name) so that
//   updates and deletes can address them by id
//
// ## Security Requirements
//
// - The API key is sent as a sensitive header and NEVER appears in logs
//   or `Debug` output
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List Zones: GET `/zones?name=...`
// - List DNS Records: GET `/zones/:zone_id/dns_records?type=...&name=...`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`
// - Delete DNS Record: DELETE `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use cfddns_core::config::DomainEntry;
use cfddns_core::traits::{
    AUTO_TTL, Credentials, DnsProvider, DnsProviderFactory, DnsRecord, RecordType, ZoneInfo,
};
use cfddns_core::{Error, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Zones endpoint of the Cloudflare API
pub const DEFAULT_API_BASE: &str = "https://api.cloudflare.com/client/v4/zones";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const PROVIDER_NAME: &str = "cloudflare";

const AUTH_EMAIL_HEADER: &str = "x-auth-email";
const AUTH_KEY_HEADER: &str = "x-auth-key";

/// Cloudflare client bound to one zone
pub struct CloudflareClient {
    /// HTTP client carrying the auth headers
    client: reqwest::Client,

    /// Zones endpoint, without trailing slash
    api_base: String,

    /// Zone resolved at connect time
    zone: ZoneInfo,

    /// Records seen so far, by (type, name)
    records: HashMap<(RecordType, String), DnsRecord>,
}

// Custom Debug implementation that keeps the HTTP client (and its auth
// headers) out of the output
impl std::fmt::Debug for CloudflareClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareClient")
            .field("api_base", &self.api_base)
            .field("zone", &self.zone)
            .field("cached_records", &self.records.len())
            .finish()
    }
}

impl CloudflareClient {
    /// Build a client for `domain` and resolve its zone
    ///
    /// # Parameters
    ///
    /// - `credentials`: Account email and global API key
    /// - `domain`: Tracked record name, e.g. `home.example.org`
    /// - `api_base`: Zones endpoint, normally [`DEFAULT_API_BASE`]
    ///
    /// # Returns
    ///
    /// - `Ok(CloudflareClient)`: Connected to the most specific matching zone
    /// - `Err(Error::ZoneNotFound)`: No suffix of `domain` is a zone of the account
    /// - `Err(Error)`: Any request failed
    pub async fn connect(credentials: &Credentials, domain: &str, api_base: &str) -> Result<Self> {
        let client = build_http_client(credentials)?;
        let api_base = api_base.trim_end_matches('/').to_string();

        let zone = resolve_zone(&client, &api_base, domain).await?;
        tracing::debug!(
            domain = %domain,
            zone_id = %zone.id,
            zone_name = %zone.name,
            "Resolved zone"
        );

        Ok(Self {
            client,
            api_base,
            zone,
            records: HashMap::new(),
        })
    }

    fn records_url(&self) -> String {
        format!("{}/{}/dns_records", self.api_base, self.zone.id)
    }

    fn record_url(&self, record_id: &str) -> String {
        format!("{}/{}/dns_records/{}", self.api_base, self.zone.id, record_id)
    }

    fn cached_id(&self, record_type: RecordType, name: &str) -> Result<String> {
        self.records
            .get(&(record_type, name.to_string()))
            .map(|record| record.id.clone())
            .ok_or_else(|| Error::record_not_cached(record_type.as_str(), name))
    }
}

#[async_trait]
impl DnsProvider for CloudflareClient {
    fn zone(&self) -> &ZoneInfo {
        &self.zone
    }

    async fn lookup_record(
        &mut self,
        record_type: RecordType,
        name: &str,
    ) -> Result<Option<DnsRecord>> {
        tracing::debug!("Looking up {} record for {}", record_type, name);

        let request = self
            .client
            .get(self.records_url())
            .query(&[("type", record_type.as_str()), ("name", name)]);
        let records: Vec<DnsRecord> = send(request).await?;

        let key = (record_type, name.to_string());
        match records.into_iter().next() {
            Some(record) => {
                tracing::debug!("Found record {} -> {}", record.id, record.content);
                self.records.insert(key, record.clone());
                Ok(Some(record))
            }
            None => {
                self.records.remove(&key);
                Ok(None)
            }
        }
    }

    async fn create_record(
        &mut self,
        record_type: RecordType,
        name: &str,
        content: &str,
        proxied: Option<bool>,
        ttl: Option<u32>,
    ) -> Result<DnsRecord> {
        let payload = RecordPayload::new(record_type, name, content, proxied, ttl);
        tracing::debug!("Creating {} record {} -> {}", record_type, name, content);

        let request = self.client.post(self.records_url()).json(&payload);
        let record: DnsRecord = send(request).await?;

        self.records.insert((record_type, name.to_string()), record.clone());
        Ok(record)
    }

    async fn update_record(
        &mut self,
        record_type: RecordType,
        name: &str,
        content: &str,
        proxied: Option<bool>,
        ttl: Option<u32>,
    ) -> Result<DnsRecord> {
        let record_id = self.cached_id(record_type, name)?;
        let payload = RecordPayload::new(record_type, name, content, proxied, ttl);
        tracing::debug!("Updating {} record {} ({}) -> {}", record_type, name, record_id, content);

        let request = self.client.put(self.record_url(&record_id)).json(&payload);
        let record: DnsRecord = send(request).await?;

        self.records.insert((record_type, name.to_string()), record.clone());
        Ok(record)
    }

    async fn delete_record(&mut self, record_type: RecordType, name: &str) -> Result<String> {
        let record_id = self.cached_id(record_type, name)?;
        tracing::debug!("Deleting {} record {} ({})", record_type, name, record_id);

        let deleted: DeletedRecord = send(self.client.delete(self.record_url(&record_id))).await?;

        self.records.remove(&(record_type, name.to_string()));
        Ok(deleted.id)
    }

    fn cached_record(&self, record_type: RecordType, name: &str) -> Option<&DnsRecord> {
        self.records.get(&(record_type, name.to_string()))
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

/// Factory connecting one [`CloudflareClient`] per tracked domain
#[derive(Debug, Clone)]
pub struct CloudflareFactory {
    api_base: String,
}

impl CloudflareFactory {
    pub fn new() -> Self {
        Self::with_api_base(DEFAULT_API_BASE)
    }

    /// Point the clients at another zones endpoint
    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
        }
    }
}

impl Default for CloudflareFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DnsProviderFactory for CloudflareFactory {
    async fn connect(
        &self,
        credentials: &Credentials,
        entry: &DomainEntry,
    ) -> Result<Box<dyn DnsProvider>> {
        let client = CloudflareClient::connect(credentials, &entry.domain, &self.api_base).await?;
        Ok(Box::new(client))
    }
}

/// Suffixes of `domain` that could be its zone, most specific first
///
/// `www.example.co.uk` gives `www.example.co.uk`, `example.co.uk`, `co.uk`.
pub fn zone_candidates(domain: &str) -> Vec<String> {
    let labels: Vec<&str> = domain
        .trim_end_matches('.')
        .split('.')
        .filter(|label| !label.is_empty())
        .collect();

    if labels.len() < 2 {
        return Vec::new();
    }

    (0..=labels.len() - 2)
        .map(|start| labels[start..].join("."))
        .collect()
}

fn build_http_client(credentials: &Credentials) -> Result<reqwest::Client> {
    let email = HeaderValue::from_str(&credentials.email)
        .map_err(|_| Error::config("'email' contains characters not allowed in an HTTP header"))?;
    let mut key = HeaderValue::from_str(&credentials.api_key)
        .map_err(|_| Error::config("'api_key' contains characters not allowed in an HTTP header"))?;
    key.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTH_EMAIL_HEADER, email);
    headers.insert(AUTH_KEY_HEADER, key);

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(DEFAULT_HTTP_TIMEOUT)
        .build()
        .map_err(|e| Error::transport(format!("Failed to build HTTP client: {}", e)))
}

async fn resolve_zone(client: &reqwest::Client, api_base: &str, domain: &str) -> Result<ZoneInfo> {
    for candidate in zone_candidates(domain) {
        tracing::debug!("Looking up zone {}", candidate);

        let request = client.get(api_base).query(&[("name", candidate.as_str())]);
        let zones: Vec<ZoneInfo> = send(request).await?;

        if let Some(zone) = zones.into_iter().next() {
            return Ok(zone);
        }
    }

    Err(Error::ZoneNotFound(domain.to_string()))
}

/// Write body for create and update
#[derive(Debug, Serialize)]
struct RecordPayload<'a> {
    #[serde(rename = "type")]
    record_type: RecordType,
    name: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ttl: Option<u32>,
    proxied: bool,
}

impl<'a> RecordPayload<'a> {
    fn new(
        record_type: RecordType,
        name: &'a str,
        content: &'a str,
        proxied: Option<bool>,
        ttl: Option<u32>,
    ) -> Self {
        Self {
            record_type,
            name,
            content,
            ttl: ttl.filter(|ttl| *ttl != AUTO_TTL),
            proxied: proxied == Some(true),
        }
    }
}

/// Response envelope shared by every endpoint
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct DeletedRecord {
    id: String,
}

/// Send a request and unwrap the `result` of a successful envelope
async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
    let response = request
        .send()
        .await
        .map_err(|e| Error::transport(format!("HTTP request failed: {}", e)))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| Error::transport(format!("Failed to read response body: {}", e)))?;

    if status != StatusCode::OK {
        return Err(Error::provider(PROVIDER_NAME, error_message(&body, status)));
    }

    let envelope: Envelope<T> = serde_json::from_str(&body).map_err(|e| {
        Error::provider(PROVIDER_NAME, format!("Failed to parse response: {}", e))
    })?;

    envelope
        .result
        .ok_or_else(|| Error::provider(PROVIDER_NAME, "Invalid response format: no result"))
}

/// Best human-readable message of an error response
///
/// The envelope's `message`, else every `errors[].message` joined, else
/// the HTTP status itself.
fn error_message(body: &str, status: StatusCode) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        if let Some(message) = json["message"].as_str().filter(|m| !m.is_empty()) {
            return message.to_string();
        }

        let joined = json["errors"]
            .as_array()
            .map(|errors| {
                errors
                    .iter()
                    .filter_map(|error| error["message"].as_str())
                    .collect::<Vec<_>>()
                    .join("; ")
            })
            .unwrap_or_default();
        if !joined.is_empty() {
            return joined;
        }
    }

    status.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn zone_candidates_most_specific_first() {
        assert_eq!(
            zone_candidates("www.example.co.uk"),
            vec!["www.example.co.uk", "example.co.uk", "co.uk"]
        );
        assert_eq!(zone_candidates("example.org."), vec!["example.org"]);
        assert!(zone_candidates("localhost").is_empty());
        assert!(zone_candidates("").is_empty());
    }

    #[test]
    fn payload_omits_automatic_ttl() {
        let payload =
            RecordPayload::new(RecordType::A, "example.org", "203.0.113.1", None, Some(1));
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "type": "A",
                "name": "example.org",
                "content": "203.0.113.1",
                "proxied": false,
            })
        );

        let payload = RecordPayload::new(
            RecordType::Aaaa,
            "example.org",
            "2001:db8::1",
            Some(true),
            Some(300),
        );
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "type": "AAAA",
                "name": "example.org",
                "content": "2001:db8::1",
                "ttl": 300,
                "proxied": true,
            })
        );
    }

    #[test]
    fn payload_proxied_only_when_explicitly_true() {
        for (input, expected) in [(None, false), (Some(false), false), (Some(true), true)] {
            let payload =
                RecordPayload::new(RecordType::A, "example.org", "203.0.113.1", input, None);
            assert_eq!(payload.proxied, expected, "proxied {:?}", input);
        }
    }

    #[test]
    fn error_message_prefers_top_level_message() {
        let body = json!({
            "success": false,
            "message": "Invalid request headers",
            "errors": [{"code": 6003, "message": "ignored"}],
        })
        .to_string();
        assert_eq!(
            error_message(&body, StatusCode::BAD_REQUEST),
            "Invalid request headers"
        );
    }

    #[test]
    fn error_message_joins_errors() {
        let body = json!({
            "success": false,
            "errors": [
                {"code": 9103, "message": "Unknown X-Auth-Key or X-Auth-Email"},
                {"code": 10000, "message": "Authentication error"},
            ],
        })
        .to_string();
        assert_eq!(
            error_message(&body, StatusCode::FORBIDDEN),
            "Unknown X-Auth-Key or X-Auth-Email; Authentication error"
        );
    }

    #[test]
    fn error_message_falls_back_to_status() {
        assert_eq!(
            error_message("<html>bad gateway</html>", StatusCode::BAD_GATEWAY),
            "502 Bad Gateway"
        );
        assert_eq!(
            error_message(r#"{"errors": []}"#, StatusCode::FORBIDDEN),
            "403 Forbidden"
        );
    }

    #[test]
    fn factory_defaults_to_cloudflare_api() {
        let factory = CloudflareFactory::default();
        assert_eq!(factory.api_base, DEFAULT_API_BASE);
    }
}

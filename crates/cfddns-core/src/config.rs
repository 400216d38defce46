//! Configuration loading for the DDNS updater
//!
//! The configuration is a YAML document:
//!
//! ```yaml
//! email: username@example.org
//! api_key: qP5EZa648oCRm6qlIDmbIOy37RbmLVRX7jpso
//! periodicity: 60    # in seconds
//! record_type: A     # or AAAA
//! domains:
//!   - example.org    # 'proxied: true' is implied
//!   - www.example.org
//!   - domain: ssh.example.org
//!     proxied: false
//! ```
//!
//! Validation happens on the raw YAML tree rather than through derived
//! deserialization so that short-form domain entries can be expanded and
//! malformed ones skipped with a warning instead of failing the whole file.

use serde_yaml::{Mapping, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::traits::{Credentials, RecordType};

/// Default timeout between reconciliation cycles, in seconds
pub const DEFAULT_PERIODICITY_SECS: f64 = 60.0;

/// Name of the user- or system-wide configuration file
pub const CONFIG_FILE_NAME: &str = "cloudflare-ddns-config";

/// A domain to keep pointed at the current IP
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainEntry {
    /// Fully qualified record name
    pub domain: String,

    /// Whether new records are created behind the provider's proxy
    pub proxied: bool,
}

impl DomainEntry {
    /// Create a new domain entry
    pub fn new(domain: impl Into<String>, proxied: bool) -> Self {
        Self {
            domain: domain.into(),
            proxied,
        }
    }
}

/// Main DDNS configuration
#[derive(Clone, PartialEq)]
pub struct DdnsConfig {
    /// Account email
    pub email: String,

    /// Global API key
    pub api_key: String,

    /// Seconds to sleep between cycles
    pub periodicity: f64,

    /// Record type every domain is kept in, fixed for the whole run
    pub record_type: RecordType,

    /// Override for the IP discovery endpoints
    pub ip_sources: Option<Vec<String>>,

    /// Domains to track, in declared order
    pub domains: Vec<DomainEntry>,
}

impl DdnsConfig {
    /// Credentials for the provider API
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.email, &self.api_key)
    }

    /// Sleep interval between cycles
    pub fn interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.periodicity)
            .unwrap_or(Duration::from_secs_f64(DEFAULT_PERIODICITY_SECS))
    }
}

// Custom Debug implementation that hides the API key
impl fmt::Debug for DdnsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DdnsConfig")
            .field("email", &self.email)
            .field("api_key", &"<REDACTED>")
            .field("periodicity", &self.periodicity)
            .field("record_type", &self.record_type)
            .field("ip_sources", &self.ip_sources)
            .field("domains", &self.domains)
            .finish()
    }
}

/// Result of expanding the `domains` sequence
#[derive(Debug, Default, Clone, PartialEq)]
pub struct NormalizedDomains {
    /// Valid entries, in original order
    pub entries: Vec<DomainEntry>,
    /// Rendering of every element that was dropped
    pub ignored: Vec<String>,
}

/// Read, validate and normalize a configuration file
pub fn load(path: impl AsRef<Path>) -> Result<DdnsConfig> {
    let path = path.as_ref();
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::ConfigNotFound(path.display().to_string()));
        }
        Err(e) => return Err(e.into()),
    };
    load_str(&text)
}

/// Validate and normalize a configuration document
pub fn load_str(text: &str) -> Result<DdnsConfig> {
    let document: Value = serde_yaml::from_str(text)?;
    let Value::Mapping(root) = document else {
        return Err(Error::config(
            "Invalid configuration file: the root element must be a mapping!",
        ));
    };

    let (email, api_key) = match (root.get("email"), root.get("api_key")) {
        (Some(email), Some(api_key)) => (
            string_field("email", email)?,
            string_field("api_key", api_key)?,
        ),
        _ => {
            return Err(Error::config(
                "Specify both 'email' and 'api_key' for Cloudflare API!",
            ));
        }
    };

    let domains = match root.get("domains") {
        Some(Value::Sequence(entries)) => normalize_domains(entries).entries,
        _ => {
            return Err(Error::config(
                "Domain entries must be specified as a list under the 'domains' key.",
            ));
        }
    };

    Ok(DdnsConfig {
        email,
        api_key,
        periodicity: periodicity(&root)?,
        record_type: record_type(&root)?,
        ip_sources: ip_sources(&root)?,
        domains,
    })
}

/// Expand short-form entries and drop malformed ones
///
/// - `example.org` becomes `{domain: example.org, proxied: true}`
/// - a mapping without `proxied` gets `proxied: true`
/// - a `proxied` value that is not a boolean counts as `false`
/// - anything else is ignored with a warning
pub fn normalize_domains(entries: &[Value]) -> NormalizedDomains {
    let mut normalized = NormalizedDomains::default();

    for entry in entries {
        match entry {
            Value::String(domain) => {
                info!("Domain '{}' will be proxied by Cloudflare.", domain);
                normalized.entries.push(DomainEntry::new(domain, true));
            }
            Value::Mapping(map) => match map.get("domain") {
                Some(Value::String(domain)) => {
                    let proxied = proxied_flag(domain, map);
                    normalized.entries.push(DomainEntry::new(domain, proxied));
                }
                _ => ignore_entry(&mut normalized, entry),
            },
            _ => ignore_entry(&mut normalized, entry),
        }
    }

    normalized
}

fn proxied_flag(domain: &str, entry: &Mapping) -> bool {
    match entry.get("proxied") {
        None => {
            info!("Domain '{}' will be proxied by Cloudflare.", domain);
            true
        }
        Some(Value::Bool(proxied)) => *proxied,
        Some(other) => {
            warn!(
                "Domain '{}' has a non-boolean 'proxied' value ({}), so it will not be proxied.",
                domain,
                describe(other)
            );
            false
        }
    }
}

fn ignore_entry(normalized: &mut NormalizedDomains, entry: &Value) {
    let rendered = describe(entry);
    warn!(
        "Domain entry is not a string or a mapping with a 'domain' key, so it is ignored ({}).",
        rendered
    );
    normalized.ignored.push(rendered);
}

/// Compact single-line rendering of a YAML value for log messages
fn describe(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("{:?}", value))
}

fn string_field(key: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(Error::config(format!("'{}' must be a string", key))),
    }
}

fn periodicity(root: &Mapping) -> Result<f64> {
    let seconds = match root.get("periodicity") {
        None | Some(Value::Null) => return Ok(DEFAULT_PERIODICITY_SECS),
        Some(Value::Number(n)) => n.as_f64(),
        Some(_) => None,
    };

    match seconds {
        Some(s) if s > 0.0 && Duration::try_from_secs_f64(s).is_ok() => Ok(s),
        _ => Err(Error::config(
            "'periodicity' must be a positive number of seconds",
        )),
    }
}

fn record_type(root: &Mapping) -> Result<RecordType> {
    let invalid = || Error::config("'record_type' must be either 'A' or 'AAAA'");

    match root.get("record_type") {
        None | Some(Value::Null) => Ok(RecordType::A),
        Some(Value::String(name)) => RecordType::parse(name).ok_or_else(invalid),
        Some(_) => Err(invalid()),
    }
}

fn ip_sources(root: &Mapping) -> Result<Option<Vec<String>>> {
    let invalid = || Error::config("'ip_sources' must be a list of URLs");

    match root.get("ip_sources") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Sequence(urls)) => urls
            .iter()
            .map(|url| url.as_str().map(str::to_string).ok_or_else(invalid))
            .collect::<Result<Vec<_>>>()
            .map(Some),
        Some(_) => Err(invalid()),
    }
}

/// Find the configuration file to use
///
/// An explicit path is returned unchanged (a missing file is reported by
/// [`load`]). Otherwise `~/.cloudflare-ddns-config` is tried, then, on Unix,
/// `/etc/cloudflare-ddns-config`.
pub fn locate_config(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    let candidates = default_config_candidates(dirs::home_dir());
    first_existing(&candidates, |path| path.exists()).ok_or_else(|| {
        Error::ConfigNotFound(format!(
            "no path given and none of the default locations exist ({})",
            candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    })
}

/// Default configuration locations, user-wide first
pub fn default_config_candidates(home: Option<PathBuf>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(home) = home {
        candidates.push(home.join(format!(".{}", CONFIG_FILE_NAME)));
    }
    if cfg!(unix) {
        candidates.push(Path::new("/etc").join(CONFIG_FILE_NAME));
    }
    candidates
}

/// First candidate for which `exists` holds
pub fn first_existing<F>(candidates: &[PathBuf], exists: F) -> Option<PathBuf>
where
    F: Fn(&Path) -> bool,
{
    candidates.iter().find(|path| exists(path)).cloned()
}

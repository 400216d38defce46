//! Core traits for the DDNS updater
//!
//! This module defines the abstract interfaces that implementations follow.
//!
//! - [`IpDiscovery`]: Find the current public IP address
//! - [`DnsProvider`]: Read and write records at a DNS provider
//! - [`DnsProviderFactory`]: Connect a provider client per tracked domain

pub mod ip_discovery;
pub mod dns_provider;

pub use ip_discovery::IpDiscovery;
pub use dns_provider::{
    AUTO_TTL, Credentials, DnsProvider, DnsProviderFactory, DnsRecord, RecordType, ZoneInfo,
    normalize_proxied,
};

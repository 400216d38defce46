// # IP Discovery Trait
//
// Defines the interface for finding the machine's current public address.
//
// ## Implementations
//
// - HTTP echo services with fallback: `cfddns-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use cfddns_core::IpDiscovery;
//
// let discovery = /* IpDiscovery implementation */;
// let ip = discovery.discover().await?;
// ```

use async_trait::async_trait;
use std::net::IpAddr;

/// Trait for public IP discovery
///
/// Called once per reconciliation cycle; the result is shared by every
/// target in that cycle.
///
/// An error means no address could be determined at all. Failures of
/// individual sources are the implementation's business and must not
/// surface here while another source can still answer.
#[async_trait]
pub trait IpDiscovery: Send + Sync {
    /// Determine the current public IP address
    ///
    /// # Returns
    ///
    /// - `Ok(IpAddr)`: The first usable address
    /// - `Err(Error::DiscoveryExhausted)`: No source produced one
    async fn discover(&self) -> Result<IpAddr, crate::Error>;
}

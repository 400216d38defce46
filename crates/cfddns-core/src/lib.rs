// # cfddns-core
//
// Core library for the Cloudflare dynamic DNS updater.
//
// ## Architecture Overview
//
// - **IpDiscovery**: Trait for finding the machine's current public IP
// - **DnsProvider**: Trait for reading and writing address records at a provider
// - **DnsProviderFactory**: Connects one provider client per tracked domain
// - **TrackedTarget**: Reconciles one domain's record against the current IP
// - **Scheduler**: Runs reconciliation cycles over all targets, periodically
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from HTTP implementations
// 2. **Level-Triggered**: Every cycle compares desired and actual state from scratch
// 3. **Failure Isolation**: One failing domain never stops the others
// 4. **No Retries**: The next cycle is the retry

pub mod traits;
pub mod config;
pub mod error;
pub mod reconcile;
pub mod scheduler;

// Re-export core types for convenience
pub use traits::{
    Credentials, DnsProvider, DnsProviderFactory, DnsRecord, IpDiscovery, RecordType, ZoneInfo,
};
pub use config::{DdnsConfig, DomainEntry, NormalizedDomains, locate_config};
pub use error::{Error, Result};
pub use reconcile::{ReconcileState, TrackedTarget};
pub use scheduler::{CycleReport, Scheduler};

//! Per-domain reconciliation
//!
//! A [`TrackedTarget`] pairs one configured domain with the provider client
//! that owns its zone. Each cycle it is reconciled against the discovered IP:
//!
//! ```text
//!              lookup_record
//!  Pending ──────────────────┬──────────────┬───────────────┐
//!                            │ none         │ differs       │ equal
//!                            ▼              ▼               ▼
//!                        NotFound         Stale          Current
//!                            │ create       │ update        │ (no write)
//!                            ▼              ▼               ▼
//!                         Created        Updated        Unchanged
//! ```
//!
//! Every target keeps one record type for its whole life (`A` unless set
//! otherwise). An address of the other family is refused before any
//! provider call. Any error on the way leaves the target in `Failed`.

use std::fmt;
use std::net::IpAddr;
use tracing::{debug, info};

use crate::config::DomainEntry;
use crate::error::{Error, Result};
use crate::traits::{DnsProvider, RecordType};

/// Where a target stands in the current cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReconcileState {
    /// Not reconciled yet this cycle
    Pending,
    /// Lookup found no record
    NotFound,
    /// Lookup found a record with another address
    Stale,
    /// Lookup found a record with the current address
    Current,
    /// A record was created
    Created,
    /// The record was updated
    Updated,
    /// Nothing needed to be written
    Unchanged,
    /// A provider call failed
    Failed,
}

impl ReconcileState {
    /// Whether this is an end state of a cycle
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReconcileState::Created
                | ReconcileState::Updated
                | ReconcileState::Unchanged
                | ReconcileState::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileState::Pending => "pending",
            ReconcileState::NotFound => "not_found",
            ReconcileState::Stale => "stale",
            ReconcileState::Current => "current",
            ReconcileState::Created => "created",
            ReconcileState::Updated => "updated",
            ReconcileState::Unchanged => "unchanged",
            ReconcileState::Failed => "failed",
        }
    }
}

impl fmt::Display for ReconcileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configured domain bound to its provider client
pub struct TrackedTarget {
    entry: DomainEntry,
    provider: Box<dyn DnsProvider>,
    record_type: RecordType,
    state: ReconcileState,
}

impl TrackedTarget {
    /// Create a new target from a connected provider client
    pub fn new(entry: DomainEntry, provider: Box<dyn DnsProvider>) -> Self {
        Self {
            entry,
            provider,
            record_type: RecordType::A,
            state: ReconcileState::Pending,
        }
    }

    /// Track a record of `record_type` instead of the default `A`
    pub fn with_record_type(mut self, record_type: RecordType) -> Self {
        self.record_type = record_type;
        self
    }

    /// Tracked record name
    pub fn domain(&self) -> &str {
        &self.entry.domain
    }

    pub fn entry(&self) -> &DomainEntry {
        &self.entry
    }

    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    /// State reached by the last (or current) reconciliation
    pub fn state(&self) -> ReconcileState {
        self.state
    }

    pub fn provider(&self) -> &dyn DnsProvider {
        self.provider.as_ref()
    }

    /// Bring the provider's record in line with `ip`
    ///
    /// Returns the terminal state on success. On error the target is left
    /// in [`ReconcileState::Failed`] and the error is handed back so the
    /// caller can log it; nothing is retried here.
    pub async fn reconcile(&mut self, ip: IpAddr) -> Result<ReconcileState> {
        self.state = ReconcileState::Pending;
        match self.reconcile_inner(ip).await {
            Ok(state) => Ok(state),
            Err(e) => {
                self.state = ReconcileState::Failed;
                Err(e)
            }
        }
    }

    async fn reconcile_inner(&mut self, ip: IpAddr) -> Result<ReconcileState> {
        let record_type = self.record_type;
        if !record_type.matches(ip) {
            return Err(Error::AddressFamily { record_type, ip });
        }

        let content = ip.to_string();
        let domain = self.entry.domain.clone();

        let existing = self.provider.lookup_record(record_type, &domain).await?;

        match existing {
            None => {
                self.state = ReconcileState::NotFound;
                debug!("No {} record for {}, creating it", record_type, domain);

                let created = self
                    .provider
                    .create_record(record_type, &domain, &content, Some(self.entry.proxied), None)
                    .await?;

                info!(
                    record_id = %created.id,
                    "Successfully created new record with IP address {}",
                    ip
                );
                self.state = ReconcileState::Created;
            }
            Some(record) if !record.points_to(ip) => {
                self.state = ReconcileState::Stale;
                let old_ip = record.content;

                // The provider's flag may have been changed out-of-band; keep it.
                self.provider
                    .update_record(record_type, &domain, &content, Some(record.proxied), None)
                    .await?;

                info!(
                    "Successfully updated IP address from {} to {}",
                    old_ip, ip
                );
                self.state = ReconcileState::Updated;
            }
            Some(_) => {
                self.state = ReconcileState::Current;
                info!("IP address on Cloudflare is same as your current address");
                self.state = ReconcileState::Unchanged;
            }
        }

        Ok(self.state)
    }
}

impl fmt::Debug for TrackedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedTarget")
            .field("entry", &self.entry)
            .field("record_type", &self.record_type)
            .field("zone", self.provider.zone())
            .field("provider", &self.provider.provider_name())
            .field("state", &self.state)
            .finish()
    }
}

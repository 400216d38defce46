//! Reconciliation scheduler
//!
//! The scheduler owns every tracked target and drives cycles forever:
//!
//! 1. Discover the public IP once (failure ends the run)
//! 2. Reconcile each target in configured order (failure is logged, next target)
//! 3. Sleep for the configured periodicity
//!
//! Cycles never overlap. Termination is by signal only.

use chrono::{DateTime, Utc};
use std::net::IpAddr;
use std::time::Duration;
use tracing::{Instrument, debug, error, info, info_span};

use crate::config::DdnsConfig;
use crate::error::{Error, Result};
use crate::reconcile::{ReconcileState, TrackedTarget};
use crate::traits::{DnsProviderFactory, IpDiscovery};

/// Summary of one reconciliation cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// When the cycle started
    pub started_at: DateTime<Utc>,
    /// Address every target was reconciled against
    pub ip: IpAddr,
    /// Terminal state per domain, in processing order
    pub outcomes: Vec<(String, ReconcileState)>,
}

impl CycleReport {
    fn count(&self, state: ReconcileState) -> usize {
        self.outcomes.iter().filter(|(_, s)| *s == state).count()
    }

    pub fn created(&self) -> usize {
        self.count(ReconcileState::Created)
    }

    pub fn updated(&self) -> usize {
        self.count(ReconcileState::Updated)
    }

    pub fn unchanged(&self) -> usize {
        self.count(ReconcileState::Unchanged)
    }

    pub fn failed(&self) -> usize {
        self.count(ReconcileState::Failed)
    }
}

/// Periodic driver of the reconciliation loop
pub struct Scheduler {
    /// Source of the public IP
    discovery: Box<dyn IpDiscovery>,

    /// Targets, in configured order
    targets: Vec<TrackedTarget>,

    /// Sleep between cycles
    periodicity: Duration,
}

impl Scheduler {
    /// Create a scheduler over already connected targets
    pub fn new(
        discovery: Box<dyn IpDiscovery>,
        targets: Vec<TrackedTarget>,
        periodicity: Duration,
    ) -> Self {
        Self {
            discovery,
            targets,
            periodicity,
        }
    }

    /// Connect one target per configured domain and build a scheduler
    ///
    /// A domain whose client cannot be connected (typically because its
    /// zone cannot be resolved) is logged and left out; the others are
    /// still tracked. Fails with [`Error::NoTargets`] when nothing is left.
    pub async fn connect(
        config: &DdnsConfig,
        discovery: Box<dyn IpDiscovery>,
        factory: &dyn DnsProviderFactory,
    ) -> Result<Self> {
        let credentials = config.credentials();
        let mut targets = Vec::with_capacity(config.domains.len());

        for entry in &config.domains {
            match factory.connect(&credentials, entry).await {
                Ok(provider) => {
                    debug!(
                        domain = %entry.domain,
                        zone = %provider.zone().id,
                        record_type = %config.record_type,
                        "Tracking domain"
                    );
                    targets.push(
                        TrackedTarget::new(entry.clone(), provider)
                            .with_record_type(config.record_type),
                    );
                }
                Err(e) => {
                    error!(
                        domain = %entry.domain,
                        "Failed to initialise domain, it will not be tracked: {}",
                        e
                    );
                }
            }
        }

        if targets.is_empty() {
            return Err(Error::NoTargets);
        }

        Ok(Self::new(discovery, targets, config.interval()))
    }

    pub fn targets(&self) -> &[TrackedTarget] {
        &self.targets
    }

    pub fn periodicity(&self) -> Duration {
        self.periodicity
    }

    /// Run one reconciliation cycle over all targets
    ///
    /// # Returns
    ///
    /// - `Ok(CycleReport)`: Every target was attempted (some may have failed)
    /// - `Err(Error)`: IP discovery failed; no target was touched
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let started_at = Utc::now();
        let ip = self.discovery.discover().await?;
        debug!("Discovered public IP {}", ip);

        let mut outcomes = Vec::with_capacity(self.targets.len());

        for target in &mut self.targets {
            let domain = target.domain().to_string();
            let span = info_span!("target", domain = %domain);

            let state = match target.reconcile(ip).instrument(span).await {
                Ok(state) => state,
                Err(e) => {
                    error!(domain = %domain, "Failed to reconcile: {}", e);
                    ReconcileState::Failed
                }
            };
            outcomes.push((domain, state));
        }

        let report = CycleReport {
            started_at,
            ip,
            outcomes,
        };

        info!(
            started_at = %report.started_at.to_rfc3339(),
            ip = %report.ip,
            created = report.created(),
            updated = report.updated(),
            unchanged = report.unchanged(),
            failed = report.failed(),
            "Cycle finished"
        );

        Ok(report)
    }

    /// Run cycles until SIGINT/SIGTERM
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Shutdown signal received
    /// - `Err(Error)`: IP discovery failed, which is fatal for the run
    pub async fn run(&mut self) -> Result<()> {
        info!(
            "Updating {} domain(s) every {:?}",
            self.targets.len(),
            self.periodicity
        );

        tokio::select! {
            result = self.cycle_forever() => result,
            signal = shutdown_signal() => {
                info!("Received {}, shutting down", signal);
                Ok(())
            }
        }
    }

    /// Run cycles until `shutdown_rx` fires (or forever if `None`)
    ///
    /// Used where the caller controls shutdown, such as tests. An in-flight
    /// request or sleep is abandoned when the signal arrives. Dropping the
    /// sender without sending is not a shutdown request: cycles go on as if
    /// no receiver had been given.
    pub async fn run_with_shutdown(
        &mut self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        match shutdown_rx {
            Some(rx) => {
                tokio::select! {
                    result = self.cycle_forever() => result,
                    Ok(()) = rx => {
                        info!("Shutdown signal received");
                        Ok(())
                    }
                }
            }
            None => self.cycle_forever().await,
        }
    }

    async fn cycle_forever(&mut self) -> Result<()> {
        loop {
            self.run_cycle().await?;
            tokio::time::sleep(self.periodicity).await;
        }
    }
}

/// Wait for SIGTERM or SIGINT and name the one received
#[cfg(unix)]
async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => "SIGTERM",
                _ = sigint.recv() => "SIGINT",
            }
        }
        _ => {
            error!("Failed to install signal handlers, falling back to Ctrl-C");
            ctrl_c().await
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> &'static str {
    ctrl_c().await
}

async fn ctrl_c() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    "SIGINT"
}

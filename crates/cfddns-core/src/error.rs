//! Error types for the DDNS updater
//!
//! One enum covers the whole taxonomy. Which variants are fatal and which
//! only fail a single target is decided by the caller: see `Scheduler`.

use std::net::IpAddr;
use thiserror::Error;

use crate::traits::RecordType;

/// Result type alias for DDNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the DDNS updater
#[derive(Error, Debug)]
pub enum Error {
    /// No configuration file could be located
    #[error("Configuration file not found: {0}")]
    ConfigNotFound(String),

    /// Configuration failed validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file is not valid YAML
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Reading a file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Every IP discovery source failed
    #[error("None of the {attempted} public IP sources returned a usable address")]
    DiscoveryExhausted {
        /// Number of sources queried
        attempted: usize,
    },

    /// Network-level failure (connect, timeout, body read)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Provider replied with a non-success status or an unusable body
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Message reported by the provider
        message: String,
    },

    /// The provider has no zone for this domain
    #[error("Zone not found for domain: {0}")]
    ZoneNotFound(String),

    /// Update or delete attempted without a prior successful lookup
    #[error("No cached {record_type} record for {name}; look it up first")]
    RecordNotCached {
        /// Record type (A or AAAA)
        record_type: String,
        /// Record name
        name: String,
    },

    /// The discovered address cannot be stored in the tracked record type
    #[error("{record_type} record cannot hold address {ip}")]
    AddressFamily {
        /// Record type the target tracks
        record_type: RecordType,
        /// Address that was offered
        ip: IpAddr,
    },

    /// None of the configured domains could be initialised
    #[error("No domain could be initialised, nothing to track")]
    NoTargets,
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a "record not cached" error
    pub fn record_not_cached(record_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::RecordNotCached {
            record_type: record_type.into(),
            name: name.into(),
        }
    }

    /// Whether the error comes from reading or validating the configuration
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Yaml(_) | Self::Io(_))
    }
}

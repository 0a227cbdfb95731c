//! Error types for the updater
//!
//! This module defines all error types used throughout the crate.
//!
//! Errors fall into three groups:
//! - **Domain signals** (`RecordNotFound`, `RecordAlreadyExists`, `RecordUnchanged`):
//!   expected outcomes of the reconciliation state machine, recovered by the caller.
//! - **Transient failures** (`Transport`, `Timeout`, `Provider`): the current poll
//!   cycle is skipped and retried on the next one.
//! - **Startup failures** (`ZoneNotFound`, `Config`, `Credentials`): fatal to the daemon.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for updater operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the updater
#[derive(Error, Debug)]
pub enum Error {
    /// No zone reported by the provider matches the configured FQDN
    #[error("Zone not found: {0}")]
    ZoneNotFound(String),

    /// No address record exists under the given FQDN
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// An address record already exists under the given FQDN
    #[error("Record already exists, can't create: {0}")]
    RecordAlreadyExists(String),

    /// The remote record already matches the desired ttl and address
    #[error("Record matches existing, can't update: {0}")]
    RecordUnchanged(String),

    /// The delete phase of an update succeeded but the create phase failed.
    /// The record is now absent from the zone.
    #[error("Update of {fqdn} deleted the old record but failed to create the new one: {source}")]
    PartialUpdate {
        /// Record that is now missing
        fqdn: String,
        /// Failure of the create phase
        #[source]
        source: Box<Error>,
    },

    /// Network-level failure talking to a collaborator
    #[error("Transport error: {0}")]
    Transport(String),

    /// A collaborator call did not complete in time
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// Operation that was abandoned
        operation: &'static str,
        /// Configured limit
        after: Duration,
    },

    /// The discovered IP is not an IPv4 dotted quad
    #[error("Invalid IPv4 address: {0:?}")]
    InvalidIpFormat(String),

    /// A record reported by the provider violates the data contract
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Provider-specific refusal (auth, conflict, quota, server error)
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credential material could not be loaded or used
    #[error("Credential error: {0}")]
    Credentials(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Local I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a "zone not found" error
    pub fn zone_not_found(fqdn: impl Into<String>) -> Self {
        Self::ZoneNotFound(fqdn.into())
    }

    /// Create a "record not found" error
    pub fn record_not_found(fqdn: impl Into<String>) -> Self {
        Self::RecordNotFound(fqdn.into())
    }

    /// Create a "record already exists" error
    pub fn record_already_exists(fqdn: impl Into<String>) -> Self {
        Self::RecordAlreadyExists(fqdn.into())
    }

    /// Create a "record unchanged" error
    pub fn record_unchanged(fqdn: impl Into<String>) -> Self {
        Self::RecordUnchanged(fqdn.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create an invalid IP error
    pub fn invalid_ip(raw: impl Into<String>) -> Self {
        Self::InvalidIpFormat(raw.into())
    }

    /// Create an invalid record error
    pub fn invalid_record(msg: impl Into<String>) -> Self {
        Self::InvalidRecord(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a credential error
    pub fn credentials(msg: impl Into<String>) -> Self {
        Self::Credentials(msg.into())
    }

    /// Expected outcome of the reconciliation state machine rather than a failure
    pub fn is_domain_signal(&self) -> bool {
        matches!(
            self,
            Self::RecordNotFound(_) | Self::RecordAlreadyExists(_) | Self::RecordUnchanged(_)
        )
    }

    /// Failure that may clear up on its own by the next poll cycle
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Timeout { .. } | Self::Provider { .. }
        )
    }

    /// Failure that must stop the process at startup
    pub fn is_fatal_at_startup(&self) -> bool {
        matches!(
            self,
            Self::ZoneNotFound(_) | Self::Config(_) | Self::Credentials(_)
        )
    }
}

/// Bound `fut` by `after`, reporting expiry as [`Error::Timeout`]
pub(crate) async fn with_timeout<T, F>(after: Duration, operation: &'static str, fut: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    tokio::time::timeout(after, fut)
        .await
        .map_err(|_| Error::Timeout { operation, after })?
}

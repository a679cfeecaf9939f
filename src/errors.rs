//! Error types for inventory resolution and subnet reconciliation

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::config::ConfigError;
use crate::domain::{FactsError, HostnameError, NetworkError};
use crate::facts::FactSourceError;
use crate::inventory::InventoryError;
use crate::registry::RegistryError;
use crate::state_machine::TransitionError;

/// Coarse classification used for routing and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Named object absent at the expected scope
    NotFound,
    /// Unparsable address, CIDR, hostname or record
    MalformedInput,
    /// Required facts absent or DNS list too short
    IncompleteFacts,
    /// Upsert target ambiguous or rejected by the registry
    RegistryConflict,
    /// Inventory, fact source or registry unreachable
    ConnectivityFailure,
    /// Startup configuration invalid
    Configuration,
    /// Pipeline bookkeeping went wrong
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::MalformedInput => "malformed_input",
            ErrorKind::IncompleteFacts => "incomplete_facts",
            ErrorKind::RegistryConflict => "registry_conflict",
            ErrorKind::ConnectivityFailure => "connectivity_failure",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur anywhere in the crate
#[derive(Debug, Error)]
pub enum IpamError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Hostname(#[from] HostnameError),

    #[error(transparent)]
    Facts(#[from] FactsError),

    #[error(transparent)]
    FactSource(#[from] FactSourceError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for crate operations
pub type IpamResult<T> = Result<T, IpamError>;

impl From<serde_json::Error> for IpamError {
    fn from(err: serde_json::Error) -> Self {
        IpamError::Serialization(err.to_string())
    }
}

impl IpamError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            IpamError::Network(NetworkError::NoMatchingNetwork(_)) => ErrorKind::NotFound,
            IpamError::Network(_) | IpamError::Hostname(_) | IpamError::Serialization(_) => {
                ErrorKind::MalformedInput
            }
            IpamError::Facts(e) if e.is_incomplete() => ErrorKind::IncompleteFacts,
            IpamError::Facts(_) => ErrorKind::MalformedInput,
            IpamError::FactSource(e) => e.kind(),
            IpamError::Inventory(e) => inventory_kind(e),
            IpamError::Registry(e) => e.kind(),
            IpamError::Transition(_) => ErrorKind::Internal,
            IpamError::Config(_) => ErrorKind::Configuration,
        }
    }
}

fn inventory_kind(err: &InventoryError) -> ErrorKind {
    match err {
        InventoryError::NotFound { .. }
        | InventoryError::Ambiguous { .. }
        | InventoryError::NoDatastores { .. }
        | InventoryError::UnknownReference { .. } => ErrorKind::NotFound,
        InventoryError::SourceUnavailable(_) => ErrorKind::ConnectivityFailure,
        InventoryError::InvalidContainment { .. }
        | InventoryError::InvalidCapacity { .. }
        | InventoryError::DetailsMismatch(_)
        | InventoryError::UnknownNode(_)
        | InventoryError::InvalidSnapshot(_) => ErrorKind::MalformedInput,
    }
}

impl InventoryError {
    /// Classification of this error
    pub fn kind(&self) -> ErrorKind {
        inventory_kind(self)
    }
}

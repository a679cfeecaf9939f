// Copyright (c) 2025 - Cowboy AI, Inc.
//! Hostname Value Object
//!
//! Hosts are keyed by FQDN in the fact registry while the matching VM in
//! the inventory is usually named after the short hostname. [`Hostname`]
//! validates the FQDN once and answers both forms.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Hostname validation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostnameError {
    #[error("Hostname is empty")]
    Empty,

    #[error("Hostname exceeds maximum length of 253 characters: {0}")]
    TooLong(usize),

    #[error("Invalid label '{0}' in hostname")]
    InvalidLabel(String),
}

/// Validated DNS hostname (RFC 1123 labels)
///
/// # Examples
///
/// ```rust
/// use cim_vcenter_ipam::domain::Hostname;
///
/// let host = Hostname::new("web01.example.net").unwrap();
/// assert_eq!(host.short_name(), "web01");
/// assert!(host.matches_vm_name("WEB01"));
/// assert!(Hostname::new("-bad.example.net").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Hostname(String);

impl Hostname {
    /// Maximum total length for an FQDN
    pub const MAX_LENGTH: usize = 253;

    /// Maximum length for a single label
    pub const MAX_LABEL_LENGTH: usize = 63;

    /// Create a new hostname, lowercased, with a trailing dot removed
    pub fn new(hostname: impl AsRef<str>) -> Result<Self, HostnameError> {
        let hostname = hostname.as_ref().trim().trim_end_matches('.').to_ascii_lowercase();

        if hostname.is_empty() {
            return Err(HostnameError::Empty);
        }
        if hostname.len() > Self::MAX_LENGTH {
            return Err(HostnameError::TooLong(hostname.len()));
        }
        if let Some(bad) = hostname.split('.').find(|label| !Self::is_valid_label(label)) {
            return Err(HostnameError::InvalidLabel(bad.to_string()));
        }

        Ok(Self(hostname))
    }

    fn is_valid_label(label: &str) -> bool {
        !label.is_empty()
            && label.len() <= Self::MAX_LABEL_LENGTH
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            && !label.starts_with('-')
            && !label.ends_with('-')
    }

    /// Hostname as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First label
    pub fn short_name(&self) -> &str {
        self.0.split('.').next().unwrap_or(&self.0)
    }

    /// Domain part after the first label, if any
    pub fn domain(&self) -> Option<&str> {
        self.0.split_once('.').map(|(_, domain)| domain)
    }

    /// Whether a VM name refers to this host
    ///
    /// Matches the full name or the short name, ignoring ASCII case.
    pub fn matches_vm_name(&self, vm_name: &str) -> bool {
        vm_name.eq_ignore_ascii_case(&self.0) || vm_name.eq_ignore_ascii_case(self.short_name())
    }
}

impl fmt::Display for Hostname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Hostname {
    type Error = HostnameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Hostname> for String {
    fn from(value: Hostname) -> Self {
        value.0
    }
}

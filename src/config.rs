// Copyright (c) 2025 - Cowboy AI, Inc.
//! Reconciler Configuration
//!
//! Loaded from environment variables by the runner binary:
//!
//! | variable | default |
//! |---|---|
//! | `VCENTER_NAME` | `vcenter` |
//! | `INVENTORY_SNAPSHOT` | `inventory.json` |
//! | `HOST_DOMAIN` | empty (all hosts) |
//! | `RECONCILE_CONCURRENCY` | `8` |
//! | `RECONCILE_STRICT_NAMES` | `false` |
//! | `RECONCILE_AGGREGATION` | `ranked` (`ranked` or `consensus`) |
//! | `RECONCILE_DRY_RUN` | `false` |
//! | `FOREMAN_URL` | `https://foreman.localdomain` |
//! | `FOREMAN_USERNAME` | `admin` |
//! | `FOREMAN_PASSWORD` | required |
//! | `FOREMAN_VERIFY_TLS` | `true` |
//! | `FOREMAN_TIMEOUT_SECS` | `30` |
//!
//! Credentials stay in the returned value; nothing is stored globally.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use crate::subnet::AggregationStrategy;

/// Configuration errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{name} has invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Connection settings for the Foreman registry and fact source
#[derive(Clone, Serialize, Deserialize)]
pub struct ForemanConfig {
    /// Base URL (e.g., "https://foreman.example.net")
    pub base_url: String,

    pub username: String,

    #[serde(skip_serializing, default)]
    pub password: String,

    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Page size for fact and host searches
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_verify_tls() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

fn default_per_page() -> u32 {
    9000
}

impl Default for ForemanConfig {
    fn default() -> Self {
        Self {
            base_url: "https://foreman.localdomain".to_string(),
            username: "admin".to_string(),
            password: String::new(),
            verify_tls: default_verify_tls(),
            timeout_secs: default_timeout(),
            per_page: default_per_page(),
        }
    }
}

impl fmt::Debug for ForemanConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForemanConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"***")
            .field("verify_tls", &self.verify_tls)
            .field("timeout_secs", &self.timeout_secs)
            .field("per_page", &self.per_page)
            .finish()
    }
}

/// Settings for one reconciliation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// vCenter name written into subnet descriptions
    pub vcenter: String,

    /// Inventory export to resolve placements against
    pub inventory_snapshot: PathBuf,

    /// Only hosts under this domain are reconciled; empty means all
    #[serde(default)]
    pub host_domain: String,

    /// Hosts fetched and placed concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Fail on ambiguous inventory names
    #[serde(default)]
    pub strict_names: bool,

    #[serde(default)]
    pub aggregation: AggregationStrategy,

    /// Report what would change without writing
    #[serde(default)]
    pub dry_run: bool,

    pub foreman: ForemanConfig,
}

fn default_concurrency() -> usize {
    8
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            vcenter: "vcenter".to_string(),
            inventory_snapshot: PathBuf::from("inventory.json"),
            host_domain: String::new(),
            concurrency: default_concurrency(),
            strict_names: false,
            aggregation: AggregationStrategy::default(),
            dry_run: false,
            foreman: ForemanConfig::default(),
        }
    }
}

fn parse<T>(name: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

fn parse_flag(name: &'static str, value: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match value.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                name,
                value: v.clone(),
                reason: "expected a boolean".to_string(),
            }),
        },
    }
}

impl ReconcileConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through a variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let concurrency = parse("RECONCILE_CONCURRENCY", lookup("RECONCILE_CONCURRENCY"), defaults.concurrency)?;
        if concurrency == 0 {
            return Err(ConfigError::Invalid {
                name: "RECONCILE_CONCURRENCY",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let foreman = ForemanConfig {
            base_url: lookup("FOREMAN_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.foreman.base_url),
            username: lookup("FOREMAN_USERNAME").unwrap_or(defaults.foreman.username),
            password: lookup("FOREMAN_PASSWORD").ok_or(ConfigError::Missing("FOREMAN_PASSWORD"))?,
            verify_tls: parse_flag("FOREMAN_VERIFY_TLS", lookup("FOREMAN_VERIFY_TLS"), true)?,
            timeout_secs: parse("FOREMAN_TIMEOUT_SECS", lookup("FOREMAN_TIMEOUT_SECS"), default_timeout())?,
            per_page: defaults.foreman.per_page,
        };

        Ok(Self {
            vcenter: lookup("VCENTER_NAME").unwrap_or(defaults.vcenter),
            inventory_snapshot: lookup("INVENTORY_SNAPSHOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.inventory_snapshot),
            host_domain: lookup("HOST_DOMAIN").unwrap_or_default(),
            concurrency,
            strict_names: parse_flag("RECONCILE_STRICT_NAMES", lookup("RECONCILE_STRICT_NAMES"), false)?,
            aggregation: parse("RECONCILE_AGGREGATION", lookup("RECONCILE_AGGREGATION"), defaults.aggregation)?,
            dry_run: parse_flag("RECONCILE_DRY_RUN", lookup("RECONCILE_DRY_RUN"), false)?,
            foreman,
        })
    }
}

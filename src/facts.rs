// Copyright (c) 2025 - Cowboy AI, Inc.
//! Fact Source
//!
//! Per-host facts come from the configuration-management registry. The
//! reconciler only needs the normalized keys of [`FactFilter`] groups;
//! paging and transport belong to the implementation.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::domain::{FactFilter, FactMap, Hostname};
use crate::errors::ErrorKind;

/// Fact retrieval errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FactSourceError {
    #[error("Fact source unavailable: {0}")]
    Unavailable(String),

    #[error("Unknown host: {0}")]
    UnknownHost(Hostname),

    #[error("Invalid fact source response: {0}")]
    InvalidResponse(String),
}

impl FactSourceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FactSourceError::Unavailable(_) => ErrorKind::ConnectivityFailure,
            FactSourceError::UnknownHost(_) => ErrorKind::NotFound,
            FactSourceError::InvalidResponse(_) => ErrorKind::MalformedInput,
        }
    }
}

/// Result type for fact retrieval
pub type FactResult<T> = Result<T, FactSourceError>;

/// Supplies per-host network facts
#[async_trait]
pub trait FactSource: Send + Sync {
    /// Hosts whose name falls under `domain`
    async fn list_hosts(&self, domain: &str) -> FactResult<Vec<Hostname>>;

    /// One fact group of one host, keyed by normalized names
    async fn host_facts(&self, host: &Hostname, filter: FactFilter) -> FactResult<FactMap>;

    /// Every group merged into one map
    async fn all_facts(&self, host: &Hostname) -> FactResult<FactMap> {
        let mut facts = FactMap::new();
        for filter in FactFilter::ALL {
            facts.extend(self.host_facts(host, filter).await?);
        }
        Ok(facts)
    }

    /// Source name for logs
    fn name(&self) -> &str;
}

#[async_trait]
impl<F: FactSource + ?Sized> FactSource for Arc<F> {
    async fn list_hosts(&self, domain: &str) -> FactResult<Vec<Hostname>> {
        (**self).list_hosts(domain).await
    }

    async fn host_facts(&self, host: &Hostname, filter: FactFilter) -> FactResult<FactMap> {
        (**self).host_facts(host, filter).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Whether `host` lies in `domain` or one of its subdomains
pub fn in_domain(host: &Hostname, domain: &str) -> bool {
    let domain = domain.trim().trim_matches('.').to_ascii_lowercase();
    domain.is_empty()
        || host
            .domain()
            .map_or(false, |d| d == domain || d.ends_with(&format!(".{}", domain)))
}

/// Facts held in memory
#[derive(Debug, Clone, Default)]
pub struct StaticFactSource {
    hosts: BTreeMap<Hostname, FactMap>,
    unreachable: BTreeSet<Hostname>,
}

impl StaticFactSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a host with its normalized facts
    pub fn with_host(mut self, host: Hostname, facts: FactMap) -> Self {
        self.hosts.insert(host, facts);
        self
    }

    /// Register a host whose fact lookups fail with `Unavailable`
    pub fn with_unreachable_host(mut self, host: Hostname) -> Self {
        self.hosts.entry(host.clone()).or_default();
        self.unreachable.insert(host);
        self
    }
}

#[async_trait]
impl FactSource for StaticFactSource {
    async fn list_hosts(&self, domain: &str) -> FactResult<Vec<Hostname>> {
        Ok(self
            .hosts
            .keys()
            .filter(|host| in_domain(host, domain))
            .cloned()
            .collect())
    }

    async fn host_facts(&self, host: &Hostname, filter: FactFilter) -> FactResult<FactMap> {
        if self.unreachable.contains(host) {
            return Err(FactSourceError::Unavailable(format!("timed out fetching facts of {}", host)));
        }
        let facts = self
            .hosts
            .get(host)
            .ok_or_else(|| FactSourceError::UnknownHost(host.clone()))?;

        let group: FactMap = facts
            .iter()
            .filter(|(key, _)| filter.keys().contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        debug!("{} facts of {}: {} keys", filter.search_term(), host, group.len());
        Ok(group)
    }

    fn name(&self) -> &str {
        "static"
    }
}

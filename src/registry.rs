// Copyright (c) 2025 - Cowboy AI, Inc.
//! Subnet Registry Client
//!
//! The IPAM registry is the system of record for subnets. The reconciler
//! talks to it through [`RegistryClient`]:
//!
//! - `find_subnet_by_network` decides existence (by network CIDR)
//! - then exactly one of `create_subnet` or `update_subnet`
//!
//! # Implementations
//!
//! - [`InMemoryRegistry`] for tests and local runs
//! - [`DryRunRegistry`] reads from a real registry and keeps writes local
//! - `ForemanRegistry` (feature `foreman`) over the Foreman HTTP API

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::domain::{Ipv4Network, SubnetRecord};
use crate::errors::ErrorKind;

/// Registry operation errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Ambiguous lookup or duplicate create
    #[error("Registry conflict: {0}")]
    Conflict(String),

    #[error("Registry rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Registry unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid subnet record: {0}")]
    InvalidRecord(String),
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::Conflict(_) | RegistryError::Rejected { .. } => ErrorKind::RegistryConflict,
            RegistryError::Unavailable(_) => ErrorKind::ConnectivityFailure,
            RegistryError::InvalidRecord(_) => ErrorKind::MalformedInput,
        }
    }
}

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Create/update access to subnet records
///
/// # Idempotency
///
/// Lookup is by network; callers create only when the lookup found
/// nothing, so repeating a pass never duplicates a record.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Subnet whose network equals `network`, if any
    async fn find_subnet_by_network(&self, network: &Ipv4Network) -> RegistryResult<Option<SubnetRecord>>;

    /// Persist a new subnet; returns it with its registry id
    async fn create_subnet(&self, record: &SubnetRecord) -> RegistryResult<SubnetRecord>;

    /// Overwrite subnet `id`
    async fn update_subnet(&self, id: u64, record: &SubnetRecord) -> RegistryResult<SubnetRecord>;

    /// Verify connectivity before a pass
    async fn health_check(&self) -> RegistryResult<()> {
        Ok(())
    }

    /// Registry name for logs
    fn name(&self) -> &str;
}

#[async_trait]
impl<R: RegistryClient + ?Sized> RegistryClient for Arc<R> {
    async fn find_subnet_by_network(&self, network: &Ipv4Network) -> RegistryResult<Option<SubnetRecord>> {
        (**self).find_subnet_by_network(network).await
    }

    async fn create_subnet(&self, record: &SubnetRecord) -> RegistryResult<SubnetRecord> {
        (**self).create_subnet(record).await
    }

    async fn update_subnet(&self, id: u64, record: &SubnetRecord) -> RegistryResult<SubnetRecord> {
        (**self).update_subnet(id, record).await
    }

    async fn health_check(&self) -> RegistryResult<()> {
        (**self).health_check().await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    records: Vec<SubnetRecord>,
    next_id: u64,
    creates: usize,
    updates: usize,
}

/// Registry held in memory
///
/// Rejects a second subnet with the same network, as the real registry's
/// uniqueness validation does.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with records; missing ids are assigned
    pub fn with_records(records: Vec<SubnetRecord>) -> Self {
        let mut state = RegistryState::default();
        for record in records {
            let id = record.id.unwrap_or(state.next_id + 1);
            state.next_id = state.next_id.max(id);
            state.records.push(record.with_id(id));
        }
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Stored records in creation order
    pub async fn records(&self) -> Vec<SubnetRecord> {
        self.state.read().await.records.clone()
    }

    pub async fn create_count(&self) -> usize {
        self.state.read().await.creates
    }

    pub async fn update_count(&self) -> usize {
        self.state.read().await.updates
    }

    /// Creates plus updates since construction
    pub async fn mutation_count(&self) -> usize {
        let state = self.state.read().await;
        state.creates + state.updates
    }
}

#[async_trait]
impl RegistryClient for InMemoryRegistry {
    async fn find_subnet_by_network(&self, network: &Ipv4Network) -> RegistryResult<Option<SubnetRecord>> {
        let state = self.state.read().await;
        let mut matches = state.records.iter().filter(|r| r.network == *network);
        let found = matches.next().cloned();
        if matches.next().is_some() {
            return Err(RegistryError::Conflict(format!(
                "{} matches more than one subnet",
                network
            )));
        }
        Ok(found)
    }

    async fn create_subnet(&self, record: &SubnetRecord) -> RegistryResult<SubnetRecord> {
        let mut state = self.state.write().await;
        if state.records.iter().any(|r| r.network == record.network) {
            return Err(RegistryError::Conflict(format!(
                "subnet {} already exists",
                record.network
            )));
        }

        state.next_id += 1;
        let stored = record.clone().with_id(state.next_id);
        state.records.push(stored.clone());
        state.creates += 1;
        debug!("Created subnet {} with id {}", stored.network, state.next_id);
        Ok(stored)
    }

    async fn update_subnet(&self, id: u64, record: &SubnetRecord) -> RegistryResult<SubnetRecord> {
        let mut state = self.state.write().await;
        let slot = state
            .records
            .iter_mut()
            .find(|r| r.id == Some(id))
            .ok_or_else(|| RegistryError::Rejected {
                status: 404,
                body: format!("subnet {} not found", id),
            })?;

        *slot = record.clone().with_id(id);
        let stored = slot.clone();
        state.updates += 1;
        debug!("Updated subnet {} ({})", id, stored.network);
        Ok(stored)
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

/// Reads through to a registry, keeps writes in memory
///
/// Lookups see records planned earlier in the same pass first.
#[derive(Debug)]
pub struct DryRunRegistry<R> {
    inner: R,
    planned: RwLock<Vec<SubnetRecord>>,
}

impl<R: RegistryClient> DryRunRegistry<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            planned: RwLock::new(Vec::new()),
        }
    }

    /// Writes that would have been sent
    pub async fn planned(&self) -> Vec<SubnetRecord> {
        self.planned.read().await.clone()
    }
}

#[async_trait]
impl<R: RegistryClient> RegistryClient for DryRunRegistry<R> {
    async fn find_subnet_by_network(&self, network: &Ipv4Network) -> RegistryResult<Option<SubnetRecord>> {
        let planned = self
            .planned
            .read()
            .await
            .iter()
            .rev()
            .find(|r| r.network == *network)
            .cloned();
        match planned {
            Some(record) => Ok(Some(record)),
            None => self.inner.find_subnet_by_network(network).await,
        }
    }

    async fn create_subnet(&self, record: &SubnetRecord) -> RegistryResult<SubnetRecord> {
        info!("[dry run] would create subnet {}", record.network);
        self.planned.write().await.push(record.clone());
        Ok(record.clone())
    }

    async fn update_subnet(&self, id: u64, record: &SubnetRecord) -> RegistryResult<SubnetRecord> {
        info!("[dry run] would update subnet {} ({})", id, record.network);
        let stored = record.clone().with_id(id);
        self.planned.write().await.push(stored.clone());
        Ok(stored)
    }

    async fn health_check(&self) -> RegistryResult<()> {
        self.inner.health_check().await
    }

    fn name(&self) -> &str {
        "dry-run"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DescriptionTags, SubnetCandidate};

    fn record(cidr: &str) -> SubnetRecord {
        let network: Ipv4Network = cidr.parse().unwrap();
        let first = u32::from(network.network_address());
        SubnetRecord::from_candidate(&SubnetCandidate {
            network,
            gateway: (first + 1).into(),
            dns1: (first + 2).into(),
            dns2: (first + 3).into(),
            tags: DescriptionTags {
                vcenter: "vc01".into(),
                datacenter: "DC1".into(),
                cluster: "C1".into(),
                vlan: "VLAN100".into(),
            },
            source: None,
        })
    }

    #[tokio::test]
    async fn test_create_then_find() {
        let registry = InMemoryRegistry::new();
        let created = registry.create_subnet(&record("10.1.1.0/24")).await.unwrap();
        assert_eq!(created.id, Some(1));

        let network = "10.1.1.0/24".parse().unwrap();
        let found = registry.find_subnet_by_network(&network).await.unwrap();
        assert_eq!(found, Some(created));
        assert_eq!(registry.create_count().await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_create_conflicts() {
        let registry = InMemoryRegistry::new();
        registry.create_subnet(&record("10.1.1.0/24")).await.unwrap();
        let err = registry.create_subnet(&record("10.1.1.0/24")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RegistryConflict);
        assert_eq!(registry.records().await.len(), 1);
    }

    #[tokio::test]
    async fn test_update_unknown_id_rejected() {
        let registry = InMemoryRegistry::with_records(vec![record("10.1.1.0/24")]);
        assert!(matches!(
            registry.update_subnet(42, &record("10.1.1.0/24")).await,
            Err(RegistryError::Rejected { status: 404, .. })
        ));

        let mut changed = record("10.1.1.0/24");
        changed.description = "vc01,DC1,C1,VLAN200".into();
        let updated = registry.update_subnet(1, &changed).await.unwrap();
        assert_eq!(updated.description, "vc01,DC1,C1,VLAN200");
        assert_eq!(registry.mutation_count().await, 1);
    }

    #[tokio::test]
    async fn test_dry_run_keeps_writes_local() {
        let real = Arc::new(InMemoryRegistry::with_records(vec![record("10.1.1.0/24")]));
        let dry = DryRunRegistry::new(real.clone());

        dry.create_subnet(&record("10.2.2.0/24")).await.unwrap();
        let network = "10.2.2.0/24".parse().unwrap();
        assert!(dry.find_subnet_by_network(&network).await.unwrap().is_some());
        assert!(real.find_subnet_by_network(&network).await.unwrap().is_none());

        assert_eq!(dry.planned().await.len(), 1);
        assert_eq!(real.mutation_count().await, 0);
    }
}

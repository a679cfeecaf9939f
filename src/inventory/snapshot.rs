// Copyright (c) 2025 - Cowboy AI, Inc.
//! Inventory Snapshots and Sources
//!
//! An [`InventorySource`] opens an [`InventorySession`]. The bundled
//! sources read a serialized [`InventorySnapshot`] (an export of the
//! vCenter hierarchy) or hand out a tree built in memory.
//!
//! # Snapshot Format
//!
//! ```json
//! {
//!   "vcenter": "vc01",
//!   "datacenters": [{
//!     "name": "DC1",
//!     "clusters": [{
//!       "name": "C1",
//!       "hosts": [{ "name": "esx01", "datastores": ["ds1"], "networks": ["VLAN100"] }],
//!       "vms": [{ "name": "h1", "networks": ["VLAN100"] }]
//!     }],
//!     "datastore_clusters": [{ "name": "DSC1", "datastores": [{ "name": "ds1", "free_space": 10, "capacity": 20 }] }],
//!     "networks": ["VLAN100"],
//!     "folders": [{ "name": "Linux", "children": [{ "name": "Prod" }] }]
//!   }]
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info};

use super::{Hierarchy, InventoryError, InventoryResult, InventorySession, InventoryTree, NodeId, NodeKind};

/// Serialized inventory export
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    /// vCenter the export was taken from
    #[serde(default)]
    pub vcenter: Option<String>,
    #[serde(default)]
    pub datacenters: Vec<DatacenterSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatacenterSnapshot {
    pub name: String,
    #[serde(default)]
    pub clusters: Vec<ClusterSnapshot>,
    #[serde(default)]
    pub datastore_clusters: Vec<DatastoreClusterSnapshot>,
    /// Datastores outside any datastore cluster
    #[serde(default)]
    pub datastores: Vec<DatastoreSnapshot>,
    #[serde(default)]
    pub networks: Vec<String>,
    /// Folders of the VM hierarchy
    #[serde(default)]
    pub folders: Vec<FolderSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    pub name: String,
    #[serde(default)]
    pub hosts: Vec<HostSnapshot>,
    #[serde(default)]
    pub vms: Vec<VmSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSnapshot {
    pub name: String,
    #[serde(default)]
    pub datastores: Vec<String>,
    #[serde(default)]
    pub networks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmSnapshot {
    pub name: String,
    #[serde(default)]
    pub template: bool,
    /// Adapter networks in device order
    #[serde(default)]
    pub networks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatastoreClusterSnapshot {
    pub name: String,
    #[serde(default)]
    pub datastores: Vec<DatastoreSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatastoreSnapshot {
    pub name: String,
    pub free_space: u64,
    pub capacity: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderSnapshot {
    pub name: String,
    #[serde(default)]
    pub children: Vec<FolderSnapshot>,
}

impl InventorySnapshot {
    /// Parse a JSON export
    pub fn from_json(json: &str) -> InventoryResult<Self> {
        serde_json::from_str(json).map_err(|e| InventoryError::InvalidSnapshot(e.to_string()))
    }

    /// Build the arena tree
    ///
    /// Host datastore and network references are resolved by name within
    /// the host's datacenter; the first datastore of that name wins.
    pub fn to_tree(&self) -> InventoryResult<InventoryTree> {
        let mut tree = InventoryTree::new();

        for dc in &self.datacenters {
            let dc_id = tree.add_datacenter(dc.name.as_str())?;
            let root_of = |tree: &InventoryTree, hierarchy| {
                tree.hierarchy_root(dc_id, hierarchy)
                    .ok_or(InventoryError::UnknownNode(dc_id))
            };

            let storage = root_of(&tree, Hierarchy::Storage)?;
            let mut datastores: HashMap<&str, NodeId> = HashMap::new();
            for dsc in &dc.datastore_clusters {
                let dsc_id = tree.add_datastore_cluster(storage, dsc.name.as_str())?;
                for ds in &dsc.datastores {
                    let id = tree.add_datastore(dsc_id, ds.name.as_str(), ds.free_space, ds.capacity)?;
                    datastores.entry(ds.name.as_str()).or_insert(id);
                }
            }
            for ds in &dc.datastores {
                let id = tree.add_datastore(storage, ds.name.as_str(), ds.free_space, ds.capacity)?;
                datastores.entry(ds.name.as_str()).or_insert(id);
            }

            let network_root = root_of(&tree, Hierarchy::Network)?;
            let mut networks: HashMap<&str, NodeId> = HashMap::new();
            for net in &dc.networks {
                let id = tree.add_network(network_root, net.as_str())?;
                networks.entry(net.as_str()).or_insert(id);
            }

            let compute = root_of(&tree, Hierarchy::Compute)?;
            for cluster in &dc.clusters {
                let cluster_id = tree.add_cluster(compute, cluster.name.as_str())?;

                for host in &cluster.hosts {
                    let host_id = tree.add_host(cluster_id, host.name.as_str())?;
                    let host_scope = format!("host '{}' in datacenter '{}'", host.name, dc.name);

                    for ds in &host.datastores {
                        let ds_id = *datastores.get(ds.as_str()).ok_or_else(|| {
                            InventoryError::UnknownReference {
                                kind: NodeKind::Datastore,
                                name: ds.clone(),
                                scope: host_scope.clone(),
                            }
                        })?;
                        tree.attach_datastore(host_id, ds_id)?;
                    }
                    for net in &host.networks {
                        let net_id = *networks.get(net.as_str()).ok_or_else(|| {
                            InventoryError::UnknownReference {
                                kind: NodeKind::Network,
                                name: net.clone(),
                                scope: host_scope.clone(),
                            }
                        })?;
                        tree.attach_network(host_id, net_id)?;
                    }
                }

                for vm in &cluster.vms {
                    if vm.template {
                        tree.add_template(cluster_id, vm.name.as_str())?;
                    } else {
                        tree.add_vm(cluster_id, vm.name.as_str(), vm.networks.clone())?;
                    }
                }
            }

            let vm_root = root_of(&tree, Hierarchy::Vm)?;
            let mut pending: Vec<(NodeId, &FolderSnapshot)> =
                dc.folders.iter().rev().map(|f| (vm_root, f)).collect();
            while let Some((parent, folder)) = pending.pop() {
                let id = tree.add_folder(parent, folder.name.as_str())?;
                pending.extend(folder.children.iter().rev().map(|child| (id, child)));
            }
        }

        debug!("Built inventory tree with {} nodes", tree.len());
        Ok(tree)
    }
}

/// Opens inventory sessions
#[async_trait]
pub trait InventorySource: Send + Sync {
    /// Read the inventory and open a session
    async fn connect(&self) -> InventoryResult<InventorySession>;

    /// Source name for logs
    fn name(&self) -> &str;
}

/// Reads a JSON snapshot from disk on every connect
#[derive(Debug, Clone)]
pub struct SnapshotSource {
    path: PathBuf,
    vcenter: String,
}

impl SnapshotSource {
    /// `vcenter` is used when the snapshot does not name one
    pub fn new(path: impl Into<PathBuf>, vcenter: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            vcenter: vcenter.into(),
        }
    }
}

#[async_trait]
impl InventorySource for SnapshotSource {
    async fn connect(&self) -> InventoryResult<InventorySession> {
        let json = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            InventoryError::SourceUnavailable(format!("{}: {}", self.path.display(), e))
        })?;
        let snapshot = InventorySnapshot::from_json(&json)?;
        let tree = snapshot.to_tree()?;
        let vcenter = snapshot.vcenter.unwrap_or_else(|| self.vcenter.clone());

        info!(
            "Connected to inventory of {} from {} ({} nodes)",
            vcenter,
            self.path.display(),
            tree.len()
        );
        Ok(InventorySession::new(vcenter, tree))
    }

    fn name(&self) -> &str {
        "snapshot"
    }
}

/// Hands out a tree held in memory
#[derive(Debug, Clone)]
pub struct StaticSource {
    vcenter: String,
    tree: InventoryTree,
}

impl StaticSource {
    pub fn new(vcenter: impl Into<String>, tree: InventoryTree) -> Self {
        Self {
            vcenter: vcenter.into(),
            tree,
        }
    }
}

#[async_trait]
impl InventorySource for StaticSource {
    async fn connect(&self) -> InventoryResult<InventorySession> {
        Ok(InventorySession::new(self.vcenter.clone(), self.tree.clone()))
    }

    fn name(&self) -> &str {
        "static"
    }
}

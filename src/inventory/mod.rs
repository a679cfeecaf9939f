// Copyright (c) 2025 - Cowboy AI, Inc.
//! Virtualization Inventory
//!
//! A typed, read-only view of a vCenter-style object hierarchy:
//!
//! ```text
//! root (Folder)
//!  └─ Datacenter
//!      ├─ host      (Folder, compute hierarchy)  ─ ComputeCluster ─ Host / VirtualMachine / Template
//!      ├─ vm        (Folder, VM hierarchy)       ─ Folder ─ Folder ...
//!      ├─ datastore (Folder, storage hierarchy)  ─ DatastoreCluster ─ Datastore
//!      └─ network   (Folder, network hierarchy)  ─ Network
//! ```
//!
//! Nodes live in an arena owned by [`InventoryTree`]. Children are owned by
//! their parent through the arena; the parent link is a plain index used
//! only for path reconstruction. Names are not unique, so every lookup is
//! scoped by its ancestors (see [`resolver`]).

pub mod resolver;
pub mod snapshot;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub use resolver::{DatastoreCandidate, DatastoreClusterSummary, FolderEntry, InventoryResolver, Resolution};
pub use snapshot::{InventorySnapshot, InventorySource, SnapshotSource, StaticSource};

/// Inventory lookup and construction errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InventoryError {
    #[error("{kind} '{name}' not found in {scope}")]
    NotFound {
        kind: NodeKind,
        name: String,
        scope: String,
    },

    #[error("{kind} '{name}' is ambiguous: {count} matches")]
    Ambiguous {
        kind: NodeKind,
        name: String,
        count: usize,
    },

    #[error("No eligible datastores in datastore cluster '{datastore_cluster}'{}",
        .compute_cluster.as_ref().map(|c| format!(" reachable from compute cluster '{}'", c)).unwrap_or_default())]
    NoDatastores {
        datastore_cluster: String,
        compute_cluster: Option<String>,
    },

    #[error("A {parent} cannot contain a {child}")]
    InvalidContainment { parent: NodeKind, child: NodeKind },

    #[error("Datastore '{name}' reports {free_space} free bytes of {capacity}")]
    InvalidCapacity {
        name: String,
        free_space: u64,
        capacity: u64,
    },

    #[error("Details do not describe a {0}")]
    DetailsMismatch(NodeKind),

    #[error("Unknown inventory node: {0}")]
    UnknownNode(NodeId),

    #[error("{kind} '{name}' referenced from {scope} does not exist")]
    UnknownReference {
        kind: NodeKind,
        name: String,
        scope: String,
    },

    #[error("Inventory source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Invalid inventory snapshot: {0}")]
    InvalidSnapshot(String),
}

impl InventoryError {
    /// Whether the error means "the named object is not there"
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            InventoryError::NotFound { .. } | InventoryError::NoDatastores { .. }
        )
    }
}

/// Result type for inventory operations
pub type InventoryResult<T> = Result<T, InventoryError>;

/// Kind of inventory object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Datacenter,
    ComputeCluster,
    Host,
    Datastore,
    DatastoreCluster,
    Network,
    Folder,
    VirtualMachine,
    Template,
}

impl NodeKind {
    /// Canonical string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Datacenter => "datacenter",
            Self::ComputeCluster => "compute cluster",
            Self::Host => "host",
            Self::Datastore => "datastore",
            Self::DatastoreCluster => "datastore cluster",
            Self::Network => "network",
            Self::Folder => "folder",
            Self::VirtualMachine => "virtual machine",
            Self::Template => "template",
        }
    }

    /// Containment rules of the hierarchy
    pub fn can_contain(&self, child: NodeKind) -> bool {
        use NodeKind::*;

        match self {
            Folder => true,
            Datacenter => child == Folder,
            ComputeCluster => matches!(child, Host | VirtualMachine | Template),
            DatastoreCluster => child == Datastore,
            Host | Datastore | Network | VirtualMachine | Template => false,
        }
    }

    /// VM-like objects (plain VMs and templates)
    pub fn is_vm_like(&self) -> bool {
        matches!(self, NodeKind::VirtualMachine | NodeKind::Template)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four per-datacenter hierarchies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hierarchy {
    Compute,
    Vm,
    Storage,
    Network,
}

impl Hierarchy {
    /// All hierarchies in creation order
    pub const ALL: [Hierarchy; 4] = [
        Hierarchy::Compute,
        Hierarchy::Vm,
        Hierarchy::Storage,
        Hierarchy::Network,
    ];

    /// Folder name of the hierarchy root
    pub fn folder_name(&self) -> &'static str {
        match self {
            Hierarchy::Compute => "host",
            Hierarchy::Vm => "vm",
            Hierarchy::Storage => "datastore",
            Hierarchy::Network => "network",
        }
    }
}

/// Index of a node in its tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// Kind-specific attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeDetails {
    /// Datacenters, clusters, datastore clusters and networks
    Plain,
    Folder { hierarchy: Option<Hierarchy> },
    Datastore { free_space: u64, capacity: u64 },
    /// Mounted datastores and attached networks, in attach order
    Host {
        datastores: Vec<NodeId>,
        networks: Vec<NodeId>,
    },
    /// Adapter networks in device order
    Vm { networks: Vec<String> },
}

impl NodeDetails {
    fn fits(&self, kind: NodeKind) -> bool {
        use NodeKind::*;

        match self {
            NodeDetails::Plain => matches!(kind, Datacenter | ComputeCluster | DatastoreCluster | Network),
            NodeDetails::Folder { .. } => kind == Folder,
            NodeDetails::Datastore { .. } => kind == Datastore,
            NodeDetails::Host { .. } => kind == Host,
            NodeDetails::Vm { .. } => kind.is_vm_like(),
        }
    }
}

/// One object of the hierarchy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryNode {
    id: NodeId,
    kind: NodeKind,
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    details: NodeDetails,
}

impl InventoryNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn details(&self) -> &NodeDetails {
        &self.details
    }

    /// Free and total bytes, for datastores
    pub fn capacity(&self) -> Option<(u64, u64)> {
        match self.details {
            NodeDetails::Datastore {
                free_space,
                capacity,
            } => Some((free_space, capacity)),
            _ => None,
        }
    }
}

/// Arena-backed inventory hierarchy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryTree {
    nodes: Vec<InventoryNode>,
}

impl Default for InventoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl InventoryTree {
    /// Empty tree holding only the root folder
    pub fn new() -> Self {
        Self {
            nodes: vec![InventoryNode {
                id: NodeId(0),
                kind: NodeKind::Folder,
                name: "root".to_string(),
                parent: None,
                children: Vec::new(),
                details: NodeDetails::Folder { hierarchy: None },
            }],
        }
    }

    /// Root folder
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of nodes, root included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether only the root exists
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Add a node under `parent`
    ///
    /// # Invariants
    /// - `parent` exists and may contain `kind`
    /// - `details` describe `kind`
    /// - datastores report `free_space <= capacity`
    pub fn add_node(
        &mut self,
        parent: NodeId,
        kind: NodeKind,
        name: impl Into<String>,
        details: NodeDetails,
    ) -> InventoryResult<NodeId> {
        let name = name.into();
        let parent_kind = self.get(parent)?.kind;

        if !parent_kind.can_contain(kind) {
            return Err(InventoryError::InvalidContainment {
                parent: parent_kind,
                child: kind,
            });
        }
        if !details.fits(kind) {
            return Err(InventoryError::DetailsMismatch(kind));
        }
        if let NodeDetails::Datastore {
            free_space,
            capacity,
        } = details
        {
            if free_space > capacity {
                return Err(InventoryError::InvalidCapacity {
                    name,
                    free_space,
                    capacity,
                });
            }
        }

        let id = NodeId(self.nodes.len());
        self.nodes.push(InventoryNode {
            id,
            kind,
            name,
            parent: Some(parent),
            children: Vec::new(),
            details,
        });
        self.nodes[parent.0].children.push(id);
        Ok(id)
    }

    /// Add a datacenter with its four hierarchy folders
    pub fn add_datacenter(&mut self, name: impl Into<String>) -> InventoryResult<NodeId> {
        let root = self.root();
        let dc = self.add_node(root, NodeKind::Datacenter, name, NodeDetails::Plain)?;
        for hierarchy in Hierarchy::ALL {
            self.add_node(
                dc,
                NodeKind::Folder,
                hierarchy.folder_name(),
                NodeDetails::Folder {
                    hierarchy: Some(hierarchy),
                },
            )?;
        }
        Ok(dc)
    }

    pub fn add_folder(&mut self, parent: NodeId, name: impl Into<String>) -> InventoryResult<NodeId> {
        self.add_node(parent, NodeKind::Folder, name, NodeDetails::Folder { hierarchy: None })
    }

    pub fn add_cluster(&mut self, parent: NodeId, name: impl Into<String>) -> InventoryResult<NodeId> {
        self.add_node(parent, NodeKind::ComputeCluster, name, NodeDetails::Plain)
    }

    pub fn add_host(&mut self, cluster: NodeId, name: impl Into<String>) -> InventoryResult<NodeId> {
        self.add_node(
            cluster,
            NodeKind::Host,
            name,
            NodeDetails::Host {
                datastores: Vec::new(),
                networks: Vec::new(),
            },
        )
    }

    pub fn add_datastore_cluster(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
    ) -> InventoryResult<NodeId> {
        self.add_node(parent, NodeKind::DatastoreCluster, name, NodeDetails::Plain)
    }

    pub fn add_datastore(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        free_space: u64,
        capacity: u64,
    ) -> InventoryResult<NodeId> {
        self.add_node(
            parent,
            NodeKind::Datastore,
            name,
            NodeDetails::Datastore {
                free_space,
                capacity,
            },
        )
    }

    pub fn add_network(&mut self, parent: NodeId, name: impl Into<String>) -> InventoryResult<NodeId> {
        self.add_node(parent, NodeKind::Network, name, NodeDetails::Plain)
    }

    /// Add a VM under a compute cluster; `networks` in adapter order
    pub fn add_vm(
        &mut self,
        cluster: NodeId,
        name: impl Into<String>,
        networks: Vec<String>,
    ) -> InventoryResult<NodeId> {
        self.add_node(cluster, NodeKind::VirtualMachine, name, NodeDetails::Vm { networks })
    }

    pub fn add_template(&mut self, cluster: NodeId, name: impl Into<String>) -> InventoryResult<NodeId> {
        self.add_node(
            cluster,
            NodeKind::Template,
            name,
            NodeDetails::Vm {
                networks: Vec::new(),
            },
        )
    }

    /// Record that `host` mounts `datastore`
    pub fn attach_datastore(&mut self, host: NodeId, datastore: NodeId) -> InventoryResult<()> {
        self.expect_kind(datastore, NodeKind::Datastore)?;
        self.host_links(host).map(|(datastores, _)| {
            if !datastores.contains(&datastore) {
                datastores.push(datastore);
            }
        })
    }

    /// Record that `host` is attached to `network`
    pub fn attach_network(&mut self, host: NodeId, network: NodeId) -> InventoryResult<()> {
        self.expect_kind(network, NodeKind::Network)?;
        self.host_links(host).map(|(_, networks)| {
            if !networks.contains(&network) {
                networks.push(network);
            }
        })
    }

    fn host_links(&mut self, host: NodeId) -> InventoryResult<(&mut Vec<NodeId>, &mut Vec<NodeId>)> {
        let node = self
            .nodes
            .get_mut(host.0)
            .ok_or(InventoryError::UnknownNode(host))?;
        match &mut node.details {
            NodeDetails::Host {
                datastores,
                networks,
            } => Ok((datastores, networks)),
            _ => Err(InventoryError::DetailsMismatch(NodeKind::Host)),
        }
    }

    fn expect_kind(&self, id: NodeId, kind: NodeKind) -> InventoryResult<()> {
        if self.get(id)?.kind == kind {
            Ok(())
        } else {
            Err(InventoryError::DetailsMismatch(kind))
        }
    }

    /// Node by id
    pub fn node(&self, id: NodeId) -> Option<&InventoryNode> {
        self.nodes.get(id.0)
    }

    /// Node by id, as a result
    pub fn get(&self, id: NodeId) -> InventoryResult<&InventoryNode> {
        self.node(id).ok_or(InventoryError::UnknownNode(id))
    }

    /// Children of a node in tree order; empty for unknown ids
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Kind of a node
    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.node(id).map(|n| n.kind)
    }

    /// Children of the given kind, in tree order
    pub fn children_of_kind(&self, id: NodeId, kind: NodeKind) -> impl Iterator<Item = &InventoryNode> + '_ {
        self.children(id)
            .iter()
            .filter_map(move |child| self.node(*child))
            .filter(move |node| node.kind == kind)
    }

    /// Root folder of one of a datacenter's hierarchies
    pub fn hierarchy_root(&self, datacenter: NodeId, hierarchy: Hierarchy) -> Option<NodeId> {
        self.children_of_kind(datacenter, NodeKind::Folder)
            .find(|folder| {
                matches!(folder.details, NodeDetails::Folder { hierarchy: Some(h) } if h == hierarchy)
            })
            .map(|folder| folder.id)
    }

    /// Ancestor names joined by `/`, root excluded
    pub fn path(&self, id: NodeId) -> String {
        let mut names = Vec::new();
        let mut current = self.node(id);
        while let Some(node) = current {
            if node.parent.is_none() {
                break;
            }
            names.push(node.name.as_str());
            current = node.parent.and_then(|p| self.node(p));
        }
        names.reverse();
        names.join("/")
    }

    /// Nearest ancestor of the given kind
    pub fn ancestor_of_kind(&self, id: NodeId, kind: NodeKind) -> Option<&InventoryNode> {
        let mut current = self.node(id).and_then(|n| n.parent).and_then(|p| self.node(p));
        while let Some(node) = current {
            if node.kind == kind {
                return Some(node);
            }
            current = node.parent.and_then(|p| self.node(p));
        }
        None
    }
}

/// An open inventory connection
///
/// Carries the vCenter name and the tree snapshot. Passed explicitly to
/// the resolver; there is no process-wide session.
#[derive(Debug, Clone)]
pub struct InventorySession {
    vcenter: String,
    tree: Arc<InventoryTree>,
    connected_at: DateTime<Utc>,
}

impl InventorySession {
    pub fn new(vcenter: impl Into<String>, tree: InventoryTree) -> Self {
        Self {
            vcenter: vcenter.into(),
            tree: Arc::new(tree),
            connected_at: Utc::now(),
        }
    }

    /// vCenter the inventory was read from
    pub fn vcenter(&self) -> &str {
        &self.vcenter
    }

    pub fn tree(&self) -> &InventoryTree {
        &self.tree
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }
}

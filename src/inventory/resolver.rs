// Copyright (c) 2025 - Cowboy AI, Inc.
//! Inventory Resolver
//!
//! Resolves names to inventory nodes and answers placement queries.
//!
//! # Scoping
//!
//! Names are only unique within their immediate scope, so every lookup
//! is scoped by explicit ancestor names. When a scope holds several
//! objects of the same name the first one in tree order wins and the
//! match count is reported on the [`Resolution`]; a strict resolver
//! fails with [`InventoryError::Ambiguous`] instead.
//!
//! # Invariants
//!
//! - resolved nodes have the requested kind and exactly the requested name
//! - [`InventoryResolver::best_datastore`] returns a datastore with maximal
//!   free space, first in tree order on ties
//! - [`InventoryResolver::best_datastore_in_compute_cluster`] only returns
//!   datastores that belong to the datastore cluster AND are mounted by a
//!   host of the compute cluster

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

use super::{
    Hierarchy, InventoryError, InventoryNode, InventoryResult, InventorySession, InventoryTree,
    NodeDetails, NodeId, NodeKind,
};
use crate::domain::{Hostname, Placement};

/// A resolved node and the number of same-named matches in its scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution<'a> {
    pub node: &'a InventoryNode,
    pub matches: usize,
}

impl<'a> Resolution<'a> {
    /// More than one object carried the requested name
    pub fn is_ambiguous(&self) -> bool {
        self.matches > 1
    }

    pub fn id(&self) -> NodeId {
        self.node.id()
    }

    pub fn name(&self) -> &'a str {
        self.node.name()
    }
}

/// A datastore selected for placement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatastoreCandidate {
    pub node: NodeId,
    pub name: String,
    pub free_space: u64,
    pub capacity: u64,
    pub datastore_cluster: String,
    /// Compute cluster the selection was constrained to
    pub compute_cluster: Option<String>,
}

/// Aggregate view of a datastore cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatastoreClusterSummary {
    pub name: String,
    pub datastores: usize,
    pub free_space: u64,
    pub capacity: u64,
}

/// A folder of the VM hierarchy with its full path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderEntry {
    pub datacenter: String,
    pub name: String,
    /// `Datacenter/vm/Folder/...`
    pub path: String,
}

/// Name resolution and placement queries over one inventory session
#[derive(Debug, Clone)]
pub struct InventoryResolver {
    session: InventorySession,
    strict: bool,
}

impl InventoryResolver {
    pub fn new(session: InventorySession) -> Self {
        Self {
            session,
            strict: false,
        }
    }

    /// Fail on ambiguous names instead of taking the first match
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn session(&self) -> &InventorySession {
        &self.session
    }

    fn tree(&self) -> &InventoryTree {
        self.session.tree()
    }

    fn select<'a>(
        &self,
        kind: NodeKind,
        name: &str,
        scope: &str,
        candidates: impl Iterator<Item = &'a InventoryNode>,
    ) -> InventoryResult<Resolution<'a>> {
        let mut matches = candidates.filter(|node| node.kind() == kind && node.name() == name);
        let node = matches.next().ok_or_else(|| InventoryError::NotFound {
            kind,
            name: name.to_string(),
            scope: scope.to_string(),
        })?;
        let count = 1 + matches.count();

        if count > 1 {
            if self.strict {
                return Err(InventoryError::Ambiguous {
                    kind,
                    name: name.to_string(),
                    count,
                });
            }
            warn!("{} '{}' has {} matches in {}, using the first", kind, name, count, scope);
        }

        debug!("Resolved {} '{}' to {}", kind, name, node.id());
        Ok(Resolution {
            node,
            matches: count,
        })
    }

    fn datacenters(&self) -> impl Iterator<Item = &InventoryNode> + '_ {
        let tree = self.tree();
        tree.children_of_kind(tree.root(), NodeKind::Datacenter)
    }

    fn hierarchy_children(
        &self,
        datacenter: NodeId,
        hierarchy: Hierarchy,
        kind: NodeKind,
    ) -> impl Iterator<Item = &InventoryNode> + '_ {
        let tree = self.tree();
        tree.hierarchy_root(datacenter, hierarchy)
            .into_iter()
            .flat_map(move |root| tree.children_of_kind(root, kind))
    }

    fn all_compute_clusters(&self) -> impl Iterator<Item = &InventoryNode> + '_ {
        self.datacenters().flat_map(move |dc| {
            self.hierarchy_children(dc.id(), Hierarchy::Compute, NodeKind::ComputeCluster)
        })
    }

    fn all_datastore_clusters(&self) -> impl Iterator<Item = &InventoryNode> + '_ {
        self.datacenters().flat_map(move |dc| {
            self.hierarchy_children(dc.id(), Hierarchy::Storage, NodeKind::DatastoreCluster)
        })
    }

    fn inventory_scope(&self) -> String {
        format!("vCenter '{}'", self.session.vcenter())
    }

    /// Datacenter among the root's direct children
    pub fn resolve_datacenter(&self, name: &str) -> InventoryResult<Resolution<'_>> {
        self.select(NodeKind::Datacenter, name, &self.inventory_scope(), self.datacenters())
    }

    /// Compute cluster under a datacenter's compute hierarchy
    pub fn resolve_cluster(&self, datacenter: &str, cluster: &str) -> InventoryResult<Resolution<'_>> {
        let dc = self.resolve_datacenter(datacenter)?;
        self.select(
            NodeKind::ComputeCluster,
            cluster,
            &format!("datacenter '{}'", datacenter),
            self.hierarchy_children(dc.id(), Hierarchy::Compute, NodeKind::ComputeCluster),
        )
    }

    fn find_compute_cluster(&self, name: &str) -> InventoryResult<Resolution<'_>> {
        self.select(
            NodeKind::ComputeCluster,
            name,
            &self.inventory_scope(),
            self.all_compute_clusters(),
        )
    }

    fn find_datastore_cluster(&self, name: &str) -> InventoryResult<Resolution<'_>> {
        self.select(
            NodeKind::DatastoreCluster,
            name,
            &self.inventory_scope(),
            self.all_datastore_clusters(),
        )
    }

    fn best_of<'a>(datastores: impl Iterator<Item = &'a InventoryNode>) -> Option<(&'a InventoryNode, u64, u64)> {
        let mut best: Option<(&InventoryNode, u64, u64)> = None;
        for datastore in datastores {
            if let Some((free_space, capacity)) = datastore.capacity() {
                if best.map_or(true, |(_, most, _)| free_space > most) {
                    best = Some((datastore, free_space, capacity));
                }
            }
        }
        best
    }

    /// Datastore with the most free space in a datastore cluster
    pub fn best_datastore(&self, datastore_cluster: &str) -> InventoryResult<DatastoreCandidate> {
        let dsc = self.find_datastore_cluster(datastore_cluster)?;
        let datastores = self.tree().children_of_kind(dsc.id(), NodeKind::Datastore);

        let (node, free_space, capacity) =
            Self::best_of(datastores).ok_or_else(|| InventoryError::NoDatastores {
                datastore_cluster: datastore_cluster.to_string(),
                compute_cluster: None,
            })?;

        debug!(
            "Best datastore in {}: {} ({} bytes free)",
            datastore_cluster,
            node.name(),
            free_space
        );
        Ok(DatastoreCandidate {
            node: node.id(),
            name: node.name().to_string(),
            free_space,
            capacity,
            datastore_cluster: datastore_cluster.to_string(),
            compute_cluster: None,
        })
    }

    /// Datastores mounted by any host of a compute cluster, first-seen order
    pub fn reachable_datastores(&self, compute_cluster: NodeId) -> Vec<NodeId> {
        self.host_links(compute_cluster, |details| match details {
            NodeDetails::Host { datastores, .. } => datastores.as_slice(),
            _ => &[],
        })
    }

    fn host_links(
        &self,
        compute_cluster: NodeId,
        links: impl Fn(&NodeDetails) -> &[NodeId],
    ) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        let mut reachable = Vec::new();
        for host in self.tree().children_of_kind(compute_cluster, NodeKind::Host) {
            for id in links(host.details()) {
                if seen.insert(*id) {
                    reachable.push(*id);
                }
            }
        }
        reachable
    }

    /// Datastore with the most free space that belongs to the datastore
    /// cluster and is mounted by at least one host of the compute cluster
    pub fn best_datastore_in_compute_cluster(
        &self,
        datastore_cluster: &str,
        compute_cluster: &str,
    ) -> InventoryResult<DatastoreCandidate> {
        let dsc = self.find_datastore_cluster(datastore_cluster)?;
        let cluster = self.find_compute_cluster(compute_cluster)?;

        let reachable: HashSet<NodeId> = self.reachable_datastores(cluster.id()).into_iter().collect();
        let eligible = self
            .tree()
            .children_of_kind(dsc.id(), NodeKind::Datastore)
            .filter(|datastore| reachable.contains(&datastore.id()));

        let (node, free_space, capacity) =
            Self::best_of(eligible).ok_or_else(|| InventoryError::NoDatastores {
                datastore_cluster: datastore_cluster.to_string(),
                compute_cluster: Some(compute_cluster.to_string()),
            })?;

        debug!(
            "Best datastore in {} for {}: {} ({} bytes free)",
            datastore_cluster,
            compute_cluster,
            node.name(),
            free_space
        );
        Ok(DatastoreCandidate {
            node: node.id(),
            name: node.name().to_string(),
            free_space,
            capacity,
            datastore_cluster: datastore_cluster.to_string(),
            compute_cluster: Some(compute_cluster.to_string()),
        })
    }

    fn folders_of(&self, datacenter: &InventoryNode) -> Vec<FolderEntry> {
        let tree = self.tree();
        let Some(vm_root) = tree.hierarchy_root(datacenter.id(), Hierarchy::Vm) else {
            return Vec::new();
        };
        let root_path = format!("{}/{}", datacenter.name(), Hierarchy::Vm.folder_name());

        let mut entries = Vec::new();
        let mut pending: Vec<(NodeId, String)> = Vec::new();
        let push_children = |pending: &mut Vec<(NodeId, String)>, parent: NodeId, path: &str| {
            let children: Vec<NodeId> = tree
                .children_of_kind(parent, NodeKind::Folder)
                .map(|f| f.id())
                .collect();
            pending.extend(children.into_iter().rev().map(|id| (id, path.to_string())));
        };

        push_children(&mut pending, vm_root, &root_path);
        while let Some((id, parent_path)) = pending.pop() {
            let Some(folder) = tree.node(id) else {
                continue;
            };
            let path = format!("{}/{}", parent_path, folder.name());
            push_children(&mut pending, id, &path);
            entries.push(FolderEntry {
                datacenter: datacenter.name().to_string(),
                name: folder.name().to_string(),
                path,
            });
        }
        entries
    }

    /// Every folder of every datacenter's VM hierarchy, depth first
    pub fn list_folders(&self) -> Vec<FolderEntry> {
        self.datacenters().flat_map(|dc| self.folders_of(dc)).collect()
    }

    /// Template of the given name directly under a compute cluster
    pub fn resolve_template(&self, cluster: &str, template: &str) -> InventoryResult<Resolution<'_>> {
        let cluster_node = self.find_compute_cluster(cluster)?;
        self.select(
            NodeKind::Template,
            template,
            &format!("compute cluster '{}'", cluster),
            self.tree().children_of_kind(cluster_node.id(), NodeKind::Template),
        )
    }

    /// Datacenter names in tree order
    pub fn list_datacenters(&self) -> Vec<&str> {
        self.datacenters().map(|dc| dc.name()).collect()
    }

    /// Compute cluster names of a datacenter
    pub fn list_clusters(&self, datacenter: &str) -> InventoryResult<Vec<&str>> {
        let dc = self.resolve_datacenter(datacenter)?;
        Ok(self
            .hierarchy_children(dc.id(), Hierarchy::Compute, NodeKind::ComputeCluster)
            .map(|c| c.name())
            .collect())
    }

    /// Datastore clusters of a datacenter with summed capacity
    pub fn list_datastore_clusters(&self, datacenter: &str) -> InventoryResult<Vec<DatastoreClusterSummary>> {
        let dc = self.resolve_datacenter(datacenter)?;
        let tree = self.tree();

        Ok(self
            .hierarchy_children(dc.id(), Hierarchy::Storage, NodeKind::DatastoreCluster)
            .map(|dsc| {
                let capacities: Vec<(u64, u64)> = tree
                    .children_of_kind(dsc.id(), NodeKind::Datastore)
                    .filter_map(|ds| ds.capacity())
                    .collect();
                DatastoreClusterSummary {
                    name: dsc.name().to_string(),
                    datastores: capacities.len(),
                    free_space: capacities.iter().map(|(free, _)| free).sum(),
                    capacity: capacities.iter().map(|(_, total)| total).sum(),
                }
            })
            .collect())
    }

    /// Networks attached to any host of a compute cluster, first-seen order
    pub fn cluster_networks(&self, datacenter: &str, cluster: &str) -> InventoryResult<Vec<&str>> {
        let cluster = self.resolve_cluster(datacenter, cluster)?;
        let tree = self.tree();

        Ok(self
            .host_links(cluster.id(), |details| match details {
                NodeDetails::Host { networks, .. } => networks.as_slice(),
                _ => &[],
            })
            .into_iter()
            .filter_map(|id| tree.node(id).map(|n| n.name()))
            .collect())
    }

    /// Full path of a named folder in a datacenter's VM hierarchy
    pub fn folder_path(&self, datacenter: &str, folder: &str) -> InventoryResult<FolderEntry> {
        let dc = self.resolve_datacenter(datacenter)?;
        let mut matches = self
            .folders_of(dc.node)
            .into_iter()
            .filter(|entry| entry.name == folder);

        let entry = matches.next().ok_or_else(|| InventoryError::NotFound {
            kind: NodeKind::Folder,
            name: folder.to_string(),
            scope: format!("datacenter '{}'", datacenter),
        })?;
        let count = 1 + matches.count();
        if count > 1 && self.strict {
            return Err(InventoryError::Ambiguous {
                kind: NodeKind::Folder,
                name: folder.to_string(),
                count,
            });
        }
        Ok(entry)
    }

    /// Where a host's VM runs: datacenter, compute cluster and first adapter network
    ///
    /// VM names are matched against the full hostname or its short name.
    pub fn locate_vm(&self, hostname: &Hostname) -> InventoryResult<Placement> {
        let tree = self.tree();
        let mut found = Vec::new();

        for dc in self.datacenters() {
            for cluster in self.hierarchy_children(dc.id(), Hierarchy::Compute, NodeKind::ComputeCluster) {
                found.extend(
                    tree.children_of_kind(cluster.id(), NodeKind::VirtualMachine)
                        .filter(|vm| hostname.matches_vm_name(vm.name()))
                        .map(|vm| (dc, cluster, vm)),
                );
            }
        }

        let (dc, cluster, vm) = *found.first().ok_or_else(|| InventoryError::NotFound {
            kind: NodeKind::VirtualMachine,
            name: hostname.to_string(),
            scope: self.inventory_scope(),
        })?;
        if found.len() > 1 {
            if self.strict {
                return Err(InventoryError::Ambiguous {
                    kind: NodeKind::VirtualMachine,
                    name: hostname.to_string(),
                    count: found.len(),
                });
            }
            warn!("{} matches {} virtual machines, using {}", hostname, found.len(), tree.path(vm.id()));
        }

        let network = match vm.details() {
            NodeDetails::Vm { networks } => networks.first().cloned(),
            _ => None,
        }
        .ok_or_else(|| InventoryError::NotFound {
            kind: NodeKind::Network,
            name: format!("adapter of {}", vm.name()),
            scope: format!("compute cluster '{}'", cluster.name()),
        })?;

        debug!("Located {} in {}/{} on {}", hostname, dc.name(), cluster.name(), network);
        Ok(Placement {
            datacenter: dc.name().to_string(),
            cluster: cluster.name().to_string(),
            network,
        })
    }
}

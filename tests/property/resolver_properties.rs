// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for the Inventory Resolver
//!
//! Random inventories, built through the public tree API, checked against
//! the resolver's placement guarantees.

use cim_vcenter_ipam::inventory::{
    Hierarchy, InventoryError, InventoryResolver, InventorySession, InventoryTree, NodeKind,
};
use proptest::prelude::*;

// ============================================================================
// Generators
// ============================================================================

/// Datastores as (free space, mounted by the compute cluster)
fn datastores() -> impl Strategy<Value = Vec<(u64, bool)>> {
    prop::collection::vec((0u64..1_000, any::<bool>()), 1..10)
}

/// One datacenter, one compute cluster with one host, one datastore cluster
fn placement_inventory(datastores: &[(u64, bool)]) -> InventoryResolver {
    let mut tree = InventoryTree::new();
    let dc = tree.add_datacenter("DC1").unwrap();
    let compute = tree.hierarchy_root(dc, Hierarchy::Compute).unwrap();
    let storage = tree.hierarchy_root(dc, Hierarchy::Storage).unwrap();

    let cluster = tree.add_cluster(compute, "C1").unwrap();
    let host = tree.add_host(cluster, "esx01").unwrap();
    let dsc = tree.add_datastore_cluster(storage, "DSC1").unwrap();

    for (i, (free, mounted)) in datastores.iter().enumerate() {
        let ds = tree
            .add_datastore(dsc, format!("ds{}", i), *free, free + 1_000)
            .unwrap();
        if *mounted {
            tree.attach_datastore(host, ds).unwrap();
        }
    }

    InventoryResolver::new(InventorySession::new("vc01", tree))
}

fn datacenter_names() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(prop::sample::select(vec!["DC1", "DC2", "DC3", "LAB"]), 0..6)
        .prop_map(|names| names.into_iter().map(str::to_string).collect())
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Resolution returns a datacenter with exactly the queried name, or NotFound
    #[test]
    fn prop_resolve_datacenter(names in datacenter_names(), query in prop::sample::select(vec!["DC1", "DC2", "DC3", "LAB"])) {
        let mut tree = InventoryTree::new();
        for name in &names {
            tree.add_datacenter(name.as_str()).unwrap();
        }
        let resolver = InventoryResolver::new(InventorySession::new("vc01", tree));

        match resolver.resolve_datacenter(query) {
            Ok(resolution) => {
                prop_assert_eq!(resolution.node.kind(), NodeKind::Datacenter);
                prop_assert_eq!(resolution.name(), query);
                prop_assert_eq!(resolution.matches, names.iter().filter(|n| *n == query).count());
            }
            Err(err) => {
                prop_assert!(err.is_not_found());
                prop_assert!(!names.iter().any(|n| n == query));
            }
        }
    }

    /// The best datastore has at least as much free space as every other
    #[test]
    fn prop_best_datastore_is_maximal(datastores in datastores()) {
        let resolver = placement_inventory(&datastores);
        let best = resolver.best_datastore("DSC1").unwrap();

        let most = datastores.iter().map(|(free, _)| *free).max().unwrap();
        prop_assert_eq!(best.free_space, most);

        // Ties go to the first datastore in tree order
        let first = datastores.iter().position(|(free, _)| *free == most).unwrap();
        prop_assert_eq!(best.name, format!("ds{}", first));
    }

    /// The constrained pick lies in the intersection and is maximal there
    #[test]
    fn prop_best_in_compute_cluster_is_in_intersection(datastores in datastores()) {
        let resolver = placement_inventory(&datastores);
        let result = resolver.best_datastore_in_compute_cluster("DSC1", "C1");

        let mounted: Vec<(usize, u64)> = datastores
            .iter()
            .enumerate()
            .filter(|(_, (_, mounted))| *mounted)
            .map(|(i, (free, _))| (i, *free))
            .collect();

        match result {
            Ok(best) => {
                let index: usize = best.name.trim_start_matches("ds").parse().unwrap();
                prop_assert!(mounted.iter().any(|(i, _)| *i == index));
                prop_assert!(mounted.iter().all(|(_, free)| *free <= best.free_space));
            }
            Err(err) => {
                prop_assert!(mounted.is_empty());
                let is_no_datastores = matches!(err, InventoryError::NoDatastores { .. });
                prop_assert!(is_no_datastores);
            }
        }
    }
}

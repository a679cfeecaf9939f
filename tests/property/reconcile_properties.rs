// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Reconciliation Idempotence
//!
//! Any fact set reconciled twice against the same registry produces no
//! mutations on the second pass and exactly one record per subnet.

use std::collections::BTreeSet;
use std::sync::Arc;

use cim_vcenter_ipam::domain::facts::{ADDRESS, DNS_SERVERS, GATEWAY, NETMASK};
use cim_vcenter_ipam::domain::{FactMap, Hostname};
use cim_vcenter_ipam::facts::StaticFactSource;
use cim_vcenter_ipam::inventory::{Hierarchy, InventorySession, InventoryTree};
use cim_vcenter_ipam::reconcile::{ReconcileOptions, ReconciliationDriver};
use cim_vcenter_ipam::registry::InMemoryRegistry;
use proptest::prelude::*;

const MAX_HOSTS: usize = 6;

/// Per host: (subnet index, host offset, secondary resolver)
fn host_specs() -> impl Strategy<Value = Vec<(u8, u8, u8)>> {
    prop::collection::vec((0u8..3, 10u8..250, 3u8..5), 1..=MAX_HOSTS)
}

fn session() -> InventorySession {
    let mut tree = InventoryTree::new();
    let dc = tree.add_datacenter("DC1").unwrap();
    let compute = tree.hierarchy_root(dc, Hierarchy::Compute).unwrap();
    let cluster = tree.add_cluster(compute, "C1").unwrap();
    for i in 0..MAX_HOSTS {
        tree.add_vm(cluster, format!("h{}", i), vec!["VLAN100".to_string()])
            .unwrap();
    }
    InventorySession::new("vc01", tree)
}

fn source(specs: &[(u8, u8, u8)]) -> (StaticFactSource, Vec<Hostname>) {
    let mut source = StaticFactSource::new();
    let mut hosts = Vec::new();
    for (i, (subnet, offset, dns2)) in specs.iter().enumerate() {
        let mut facts = FactMap::new();
        facts.insert(ADDRESS.into(), format!("10.{}.0.{}", subnet, offset).as_str().into());
        facts.insert(NETMASK.into(), "255.255.255.0".into());
        facts.insert(GATEWAY.into(), format!("10.{}.0.1", subnet).as_str().into());
        let dns = [format!("10.{}.0.2", subnet), format!("10.{}.0.{}", subnet, dns2)];
        facts.insert(
            DNS_SERVERS.into(),
            dns.iter().map(String::as_str).collect::<Vec<_>>().into(),
        );

        let host = Hostname::new(format!("h{}.example.net", i)).unwrap();
        source = source.with_host(host.clone(), facts);
        hosts.push(host);
    }
    (source, hosts)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_second_pass_is_a_no_op(specs in host_specs()) {
        let (source, hosts) = source(&specs);
        let source = Arc::new(source);
        let registry = Arc::new(InMemoryRegistry::new());
        let subnets: BTreeSet<u8> = specs.iter().map(|(subnet, _, _)| *subnet).collect();

        let options = ReconcileOptions {
            vcenter: "vc01".into(),
            concurrency: 3,
            ..Default::default()
        };
        let driver = ReconciliationDriver::new(source, registry.clone(), session(), options);

        let first = tokio_test::block_on(driver.run(hosts.clone())).unwrap();
        prop_assert_eq!(first.mutation_count(), subnets.len());

        let second = tokio_test::block_on(driver.run(hosts)).unwrap();
        prop_assert_eq!(second.mutation_count(), 0);

        let records = tokio_test::block_on(registry.records());
        prop_assert_eq!(records.len(), subnets.len());
    }
}

// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for cim-vcenter-ipam
//!
//! Provides a deterministic vCenter inventory and host fact set shared by
//! the integration tests.
//!
//! # Inventory
//!
//! ```text
//! DC1
//!  ├─ C1  hosts esx01 (ds1, ds2; VLAN100)  vms h1, h2, h4 (VLAN100), h3 (no adapter), rhel9 (template)
//!  ├─ C2  hosts esx02 (ds3, ds4; VLAN200)  vms db1 (VLAN200), dup (VLAN200)
//!  ├─ DSC1  ds1 100/500, ds2 300/500, ds3 400/500
//!  ├─ DSC2  ds4 50/100
//!  └─ vm folders  Linux/Prod, Windows
//! DC2
//!  └─ C9  hosts esx09 (ds9; VLAN900)  vms dup (VLAN900)
//! ```
//!
//! # Design Principles
//! - All test data is deterministic
//! - Tests use fixtures, never hand-built inventories for shared scenarios

#![allow(dead_code)]

use std::sync::Arc;

use cim_vcenter_ipam::domain::facts::{ADDRESS, DNS_SERVERS, GATEWAY, NETMASK};
use cim_vcenter_ipam::domain::{FactMap, Hostname};
use cim_vcenter_ipam::facts::StaticFactSource;
use cim_vcenter_ipam::inventory::{InventoryResolver, InventorySession, InventorySnapshot};
use cim_vcenter_ipam::reconcile::{ReconcileOptions, ReconciliationDriver};
use cim_vcenter_ipam::registry::InMemoryRegistry;

pub const VCENTER: &str = "vc01";

pub const INVENTORY_JSON: &str = r#"{
    "vcenter": "vc01",
    "datacenters": [
        {
            "name": "DC1",
            "clusters": [
                {
                    "name": "C1",
                    "hosts": [{ "name": "esx01", "datastores": ["ds1", "ds2"], "networks": ["VLAN100"] }],
                    "vms": [
                        { "name": "h1", "networks": ["VLAN100"] },
                        { "name": "h2", "networks": ["VLAN100"] },
                        { "name": "h3" },
                        { "name": "h4", "networks": ["VLAN100"] },
                        { "name": "rhel9", "template": true }
                    ]
                },
                {
                    "name": "C2",
                    "hosts": [{ "name": "esx02", "datastores": ["ds3", "ds4"], "networks": ["VLAN200"] }],
                    "vms": [
                        { "name": "db1", "networks": ["VLAN200"] },
                        { "name": "dup", "networks": ["VLAN200"] }
                    ]
                }
            ],
            "datastore_clusters": [
                {
                    "name": "DSC1",
                    "datastores": [
                        { "name": "ds1", "free_space": 100, "capacity": 500 },
                        { "name": "ds2", "free_space": 300, "capacity": 500 },
                        { "name": "ds3", "free_space": 400, "capacity": 500 }
                    ]
                },
                {
                    "name": "DSC2",
                    "datastores": [{ "name": "ds4", "free_space": 50, "capacity": 100 }]
                }
            ],
            "networks": ["VLAN100", "VLAN200"],
            "folders": [
                { "name": "Linux", "children": [{ "name": "Prod" }] },
                { "name": "Windows" }
            ]
        },
        {
            "name": "DC2",
            "clusters": [
                {
                    "name": "C9",
                    "hosts": [{ "name": "esx09", "datastores": ["ds9"], "networks": ["VLAN900"] }],
                    "vms": [{ "name": "dup", "networks": ["VLAN900"] }]
                }
            ],
            "datastore_clusters": [
                { "name": "DSC9", "datastores": [{ "name": "ds9", "free_space": 10, "capacity": 10 }] }
            ],
            "networks": ["VLAN900"]
        }
    ]
}"#;

/// Inventory session over [`INVENTORY_JSON`]
pub fn session() -> InventorySession {
    let tree = InventorySnapshot::from_json(INVENTORY_JSON)
        .expect("Invalid inventory fixture")
        .to_tree()
        .expect("Inventory fixture does not build");
    InventorySession::new(VCENTER, tree)
}

pub fn resolver() -> InventoryResolver {
    InventoryResolver::new(session())
}

pub fn host(name: &str) -> Hostname {
    Hostname::new(name).expect("Invalid hostname in test fixture")
}

/// Normalized primary-interface facts
pub fn network_facts(address: &str, netmask: &str, gateway: &str, dns: &[&str]) -> FactMap {
    let mut facts = FactMap::new();
    facts.insert(ADDRESS.into(), address.into());
    facts.insert(NETMASK.into(), netmask.into());
    facts.insert(GATEWAY.into(), gateway.into());
    facts.insert(DNS_SERVERS.into(), dns.to_vec().into());
    facts
}

/// h1 from the end-to-end scenario: 10.1.1.10/24 via 10.1.1.1
pub fn h1_facts() -> FactMap {
    network_facts("10.1.1.10", "255.255.255.0", "10.1.1.1", &["10.1.1.2", "10.1.1.3"])
}

/// Hosts that all reconcile cleanly: h1 and h2 share 10.1.1.0/24, db1 sits in 10.2.2.0/24
pub fn healthy_source() -> StaticFactSource {
    StaticFactSource::new()
        .with_host(host("h1.example.net"), h1_facts())
        .with_host(
            host("h2.example.net"),
            network_facts("10.1.1.11", "255.255.255.0", "10.1.1.1", &["10.1.1.2", "10.1.1.3"]),
        )
        .with_host(
            host("db1.example.net"),
            network_facts("10.2.2.20", "255.255.255.0", "10.2.2.1", &["10.2.2.2", "10.2.2.3"]),
        )
}

pub fn healthy_hosts() -> Vec<Hostname> {
    vec![host("h1.example.net"), host("h2.example.net"), host("db1.example.net")]
}

pub fn options() -> ReconcileOptions {
    ReconcileOptions {
        vcenter: VCENTER.to_string(),
        concurrency: 4,
        ..Default::default()
    }
}

pub fn driver(
    source: StaticFactSource,
    registry: Arc<InMemoryRegistry>,
    options: ReconcileOptions,
) -> ReconciliationDriver<StaticFactSource, InMemoryRegistry> {
    ReconciliationDriver::new(Arc::new(source), registry, session(), options)
}

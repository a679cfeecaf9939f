// Copyright (c) 2025 - Cowboy AI, Inc.
//! Subnet Candidates and Registry Records
//!
//! A [`SubnetCandidate`] is one host's view of the subnet it sits in. Many
//! hosts produce candidates for the same network; the aggregator orders
//! them and the effective one becomes a [`SubnetRecord`] in the registry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

use super::facts::{HostNetworkFact, Placement};
use super::hostname::Hostname;
use super::network::Ipv4Network;

/// Tags folded into the registry description
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DescriptionTags {
    pub vcenter: String,
    pub datacenter: String,
    pub cluster: String,
    pub vlan: String,
}

impl DescriptionTags {
    /// `vcenter,datacenter,cluster,vlan`
    pub fn description(&self) -> String {
        [
            self.vcenter.as_str(),
            self.datacenter.as_str(),
            self.cluster.as_str(),
            self.vlan.as_str(),
        ]
        .join(",")
    }
}

impl fmt::Display for DescriptionTags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

/// One host's description of its subnet
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubnetCandidate {
    /// Logical key: candidates with the same network describe the same subnet
    pub network: Ipv4Network,
    pub gateway: Ipv4Addr,
    pub dns1: Ipv4Addr,
    pub dns2: Ipv4Addr,
    pub tags: DescriptionTags,
    /// Host the candidate was derived from; not compared
    pub source: Option<Hostname>,
}

impl SubnetCandidate {
    /// Names of the compared fields, in [`SubnetCandidate::fields`] order
    pub const FIELD_NAMES: [&'static str; 9] = [
        "network",
        "mask",
        "gateway",
        "dns1",
        "dns2",
        "vlan",
        "cluster",
        "datacenter",
        "vcenter",
    ];

    /// Build a candidate from a validated fact and its placement
    pub fn from_fact(fact: &HostNetworkFact, placement: &Placement, vcenter: &str) -> Self {
        Self {
            network: fact.network,
            gateway: fact.gateway,
            dns1: fact.dns[0],
            dns2: fact.dns[1],
            tags: DescriptionTags {
                vcenter: vcenter.to_string(),
                datacenter: placement.datacenter.clone(),
                cluster: placement.cluster.clone(),
                vlan: placement.network.clone(),
            },
            source: Some(fact.hostname.clone()),
        }
    }

    /// Compared field values, in [`SubnetCandidate::FIELD_NAMES`] order
    pub fn fields(&self) -> [String; 9] {
        [
            self.network.network_address().to_string(),
            self.network.netmask().to_string(),
            self.gateway.to_string(),
            self.dns1.to_string(),
            self.dns2.to_string(),
            self.tags.vlan.clone(),
            self.tags.cluster.clone(),
            self.tags.datacenter.clone(),
            self.tags.vcenter.clone(),
        ]
    }

    /// Names of the fields on which two candidates disagree
    pub fn disagreements(&self, other: &SubnetCandidate) -> Vec<&'static str> {
        Self::FIELD_NAMES
            .iter()
            .zip(self.fields().iter().zip(other.fields().iter()))
            .filter(|(_, (a, b))| a != b)
            .map(|(name, _)| *name)
            .collect()
    }
}

/// Subnet as persisted by the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetRecord {
    /// Registry identifier, `None` until created
    pub id: Option<u64>,
    pub name: String,
    pub network: Ipv4Network,
    pub gateway: Ipv4Addr,
    pub dns_primary: Ipv4Addr,
    pub dns_secondary: Ipv4Addr,
    pub description: String,
}

impl SubnetRecord {
    /// Record derived from a candidate; named after its network address
    pub fn from_candidate(candidate: &SubnetCandidate) -> Self {
        Self {
            id: None,
            name: candidate.network.network_address().to_string(),
            network: candidate.network,
            gateway: candidate.gateway,
            dns_primary: candidate.dns1,
            dns_secondary: candidate.dns2,
            description: candidate.tags.description(),
        }
    }

    /// Dotted netmask of the network
    pub fn mask(&self) -> Ipv4Addr {
        self.network.netmask()
    }

    /// Equal in everything but the registry identifier
    pub fn same_content(&self, other: &SubnetRecord) -> bool {
        self.name == other.name
            && self.network == other.network
            && self.gateway == other.gateway
            && self.dns_primary == other.dns_primary
            && self.dns_secondary == other.dns_secondary
            && self.description == other.description
    }

    /// Copy carrying the given registry identifier
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }
}

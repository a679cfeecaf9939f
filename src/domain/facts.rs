// Copyright (c) 2025 - Cowboy AI, Inc.
//! Host Network Facts
//!
//! Raw facts arrive from the configuration-management registry as a flat
//! key/value map per host. This module normalizes the keys the reconciler
//! depends on and turns a map into a validated [`HostNetworkFact`].
//!
//! # Required keys
//!
//! | key | example |
//! |---|---|
//! | `address` | `10.1.1.10` |
//! | `netmask` | `255.255.255.0` or `/24` |
//! | `gateway` | `10.1.1.1` |
//! | `dns-servers` | `["10.1.1.2", "10.1.1.3"]` (at least two) |
//!
//! `network` is optional; when present it must agree with address + netmask.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use thiserror::Error;

use super::hostname::Hostname;
use super::network::{
    classify_address, is_assignable, parse_ipv4, parse_netmask, Ipv4Network, NetworkError,
};

/// Normalized fact key: interface address
pub const ADDRESS: &str = "address";
/// Normalized fact key: netmask
pub const NETMASK: &str = "netmask";
/// Normalized fact key: default gateway
pub const GATEWAY: &str = "gateway";
/// Normalized fact key: network address (optional)
pub const NETWORK: &str = "network";
/// Normalized fact key: resolver list
pub const DNS_SERVERS: &str = "dns-servers";

/// Minimum number of resolvers a host must report
pub const MIN_DNS_SERVERS: usize = 2;

/// Errors turning raw facts into a [`HostNetworkFact`]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FactsError {
    #[error("Missing facts: {}", .missing.join(", "))]
    Incomplete { missing: Vec<&'static str> },

    #[error("Expected at least 2 DNS servers, found {found}")]
    InsufficientDns { found: usize },

    #[error("Malformed fact: {0}")]
    Malformed(#[from] NetworkError),

    #[error("Reported network {reported} does not match derived network {derived}")]
    NetworkMismatch {
        reported: String,
        derived: Ipv4Network,
    },

    #[error("Address {address} is not assignable in {network} with gateway {gateway}")]
    UnassignableAddress {
        address: Ipv4Addr,
        network: Ipv4Network,
        gateway: Ipv4Addr,
    },
}

impl FactsError {
    /// Whether the facts were absent rather than wrong
    pub fn is_incomplete(&self) -> bool {
        matches!(self, FactsError::Incomplete { .. } | FactsError::InsufficientDns { .. })
    }
}

/// A single fact value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactValue {
    Text(String),
    List(Vec<String>),
}

impl FactValue {
    /// Scalar view of the value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FactValue::Text(s) => Some(s.as_str()),
            FactValue::List(_) => None,
        }
    }

    /// List view of the value
    ///
    /// Text that looks like a serialized list (`"['a', 'b']"`) is parsed;
    /// other text is split on commas and whitespace.
    pub fn to_list(&self) -> Vec<String> {
        match self {
            FactValue::List(items) => items.iter().map(|s| s.trim().to_string()).collect(),
            FactValue::Text(text) => {
                let text = text.trim();
                if text.starts_with('[') {
                    let json = text.replace('\'', "\"");
                    if let Ok(items) = serde_json::from_str::<Vec<String>>(&json) {
                        return items;
                    }
                }
                text.trim_matches(|c| c == '[' || c == ']')
                    .split(|c: char| c == ',' || c.is_whitespace())
                    .map(|s| s.trim_matches(|c| c == '"' || c == '\''))
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            }
        }
    }
}

impl From<&str> for FactValue {
    fn from(value: &str) -> Self {
        FactValue::Text(value.to_string())
    }
}

impl From<Vec<&str>> for FactValue {
    fn from(value: Vec<&str>) -> Self {
        FactValue::List(value.into_iter().map(str::to_string).collect())
    }
}

/// Normalized facts for one host
pub type FactMap = BTreeMap<String, FactValue>;

/// Fact groups a source can be asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactFilter {
    /// Primary interface facts (address, netmask, gateway, network)
    DefaultIpv4,
    /// Resolver facts
    Dns,
}

impl FactFilter {
    /// Both groups, in fetch order
    pub const ALL: [FactFilter; 2] = [FactFilter::DefaultIpv4, FactFilter::Dns];

    /// Search term understood by Ansible-fed registries
    pub fn search_term(&self) -> &'static str {
        match self {
            FactFilter::DefaultIpv4 => "ansible_default_ipv4",
            FactFilter::Dns => "ansible_dns",
        }
    }

    /// Normalized keys belonging to this group
    pub fn keys(&self) -> &'static [&'static str] {
        match self {
            FactFilter::DefaultIpv4 => &[ADDRESS, NETMASK, GATEWAY, NETWORK],
            FactFilter::Dns => &[DNS_SERVERS],
        }
    }

    /// Map a raw registry key onto a normalized key of this group
    pub fn normalize_key(&self, raw: &str) -> Option<&'static str> {
        let (group, field) = raw.split_once("::")?;
        if group != self.search_term() {
            return None;
        }
        match (self, field) {
            (FactFilter::DefaultIpv4, "address") => Some(ADDRESS),
            (FactFilter::DefaultIpv4, "netmask") => Some(NETMASK),
            (FactFilter::DefaultIpv4, "gateway") => Some(GATEWAY),
            (FactFilter::DefaultIpv4, "network") => Some(NETWORK),
            (FactFilter::Dns, "nameservers") => Some(DNS_SERVERS),
            _ => None,
        }
    }
}

/// Where a host's VM lives in the inventory
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placement {
    pub datacenter: String,
    pub cluster: String,
    /// Network (port group) of the VM's first adapter
    pub network: String,
}

/// Validated network facts of one host's primary interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostNetworkFact {
    pub hostname: Hostname,
    pub address: Ipv4Addr,
    pub network: Ipv4Network,
    pub gateway: Ipv4Addr,
    /// Primary and secondary resolvers
    pub dns: [Ipv4Addr; 2],
    /// Further resolvers, in reported order
    pub extra_dns: Vec<Ipv4Addr>,
    pub placement: Option<Placement>,
}

impl HostNetworkFact {
    /// Validate a normalized fact map
    ///
    /// Completeness is checked first so a host with several gaps reports
    /// all of them at once.
    pub fn from_facts(hostname: Hostname, facts: &FactMap) -> Result<Self, FactsError> {
        let text = |key: &str| facts.get(key).and_then(FactValue::as_text).map(str::trim);

        let missing: Vec<&'static str> = [ADDRESS, NETMASK, GATEWAY, DNS_SERVERS]
            .into_iter()
            .filter(|key| match facts.get(*key) {
                None => true,
                Some(FactValue::Text(s)) => s.trim().is_empty(),
                Some(FactValue::List(_)) => *key != DNS_SERVERS,
            })
            .collect();
        if !missing.is_empty() {
            return Err(FactsError::Incomplete { missing });
        }

        let dns_raw = facts.get(DNS_SERVERS).map(FactValue::to_list).unwrap_or_default();
        if dns_raw.len() < MIN_DNS_SERVERS {
            return Err(FactsError::InsufficientDns { found: dns_raw.len() });
        }

        let address = parse_ipv4(text(ADDRESS).unwrap_or_default())?;
        let prefix = parse_netmask(text(NETMASK).unwrap_or_default())?;
        let gateway = parse_ipv4(text(GATEWAY).unwrap_or_default())?;
        let mut dns_servers = dns_raw
            .iter()
            .map(|s| parse_ipv4(s))
            .collect::<Result<Vec<_>, _>>()?;
        let extra_dns = dns_servers.split_off(MIN_DNS_SERVERS);
        let dns = match dns_servers[..] {
            [primary, secondary] => [primary, secondary],
            _ => return Err(FactsError::InsufficientDns { found: dns_servers.len() }),
        };

        classify_address(address)?;
        let network = Ipv4Network::containing(address, prefix)?;

        if let Some(reported) = text(NETWORK).filter(|s| !s.is_empty()) {
            let reported_addr = parse_ipv4(reported)?;
            if reported_addr != network.network_address() {
                return Err(FactsError::NetworkMismatch {
                    reported: reported.to_string(),
                    derived: network,
                });
            }
        }

        if !is_assignable(address, &network, gateway) {
            return Err(FactsError::UnassignableAddress {
                address,
                network,
                gateway,
            });
        }

        Ok(Self {
            hostname,
            address,
            network,
            gateway,
            dns,
            extra_dns,
            placement: None,
        })
    }

    /// All resolvers in reported order
    pub fn dns_servers(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
        self.dns.iter().chain(self.extra_dns.iter()).copied()
    }

    /// Attach the resolved inventory placement
    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = Some(placement);
        self
    }

    /// VLAN / port-group label, once placed
    pub fn vlan_label(&self) -> Option<&str> {
        self.placement.as_ref().map(|p| p.network.as_str())
    }
}

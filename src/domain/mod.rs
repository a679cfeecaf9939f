// Copyright (c) 2025 - Cowboy AI, Inc.
//! Reconciliation Domain Models
//!
//! Value objects with validation invariants shared by the inventory
//! resolver, the subnet aggregator and the reconciliation driver.
//!
//! # Value Objects with Invariants
//!
//! - [`Hostname`] - DNS-validated hostnames (RFC 1123)
//! - [`Ipv4Network`] - IPv4 CIDR block with an explicit prefix
//! - [`HostNetworkFact`] - one host's validated primary-interface facts
//! - [`SubnetCandidate`] - one host's view of its subnet
//! - [`SubnetRecord`] - the registry's persisted subnet

pub mod facts;
pub mod hostname;
pub mod network;
pub mod subnet;

pub use facts::{FactFilter, FactMap, FactValue, FactsError, HostNetworkFact, Placement};
pub use hostname::{Hostname, HostnameError};
pub use network::{
    classify_address, is_assignable, is_usable_host_address, match_network, parse_ipv4,
    parse_netmask, validate_cidr, AddressClass, Ipv4Network, NetworkError,
};
pub use subnet::{DescriptionTags, SubnetCandidate, SubnetRecord};

// Copyright (c) 2025 - Cowboy AI, Inc.
//! IPv4 Network Value Objects and Address Validation
//!
//! Everything the reconciler needs to reason about host addresses:
//!
//! - [`Ipv4Network`] - an IPv4 block with an explicit prefix length
//! - [`AddressClass`] - private / reserved / global classification
//! - [`validate_cidr`] - strict CIDR parsing (prefix required)
//! - [`is_usable_host_address`] - network/broadcast/gateway exclusion
//! - [`match_network`] - first containing network in list order
//!
//! All functions are pure; nothing here performs I/O.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// Network validation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Invalid IPv4 address: {0}")]
    InvalidIpAddress(String),

    #[error("Network '{0}' is missing the prefix length")]
    MissingPrefix(String),

    #[error("Invalid CIDR notation: {0}")]
    InvalidCidr(String),

    #[error("Invalid prefix length: {0} (must be 0-32)")]
    InvalidPrefixLength(u8),

    #[error("Network '{0}' has host bits set")]
    HostBitsSet(String),

    #[error("Invalid netmask: {0}")]
    InvalidNetmask(String),

    #[error("Address {0} is multicast")]
    Multicast(Ipv4Addr),

    #[error("Address {0} is neither private, reserved nor global")]
    Unclassified(Ipv4Addr),

    #[error("No candidate network contains {0}")]
    NoMatchingNetwork(Ipv4Addr),
}

impl NetworkError {
    /// Whether this error came from unparsable or structurally wrong input
    pub fn is_malformed(&self) -> bool {
        !matches!(self, NetworkError::NoMatchingNetwork(_))
    }
}

/// IPv4 network block (CIDR)
///
/// Invariants:
/// - prefix length is 0-32
/// - the stored address is the network address (no host bits)
///
/// # Examples
///
/// ```rust
/// use cim_vcenter_ipam::domain::Ipv4Network;
///
/// let net: Ipv4Network = "10.0.0.0/24".parse().unwrap();
/// assert_eq!(net.broadcast().to_string(), "10.0.0.255");
/// assert!("10.0.0.0".parse::<Ipv4Network>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ipv4Network {
    address: Ipv4Addr,
    prefix: u8,
}

impl Ipv4Network {
    /// Maximum IPv4 prefix length
    pub const MAX_PREFIX: u8 = 32;

    /// Build a network from its network address and prefix
    ///
    /// # Invariants
    /// - `address` must not have host bits set for `prefix`
    pub fn new(address: Ipv4Addr, prefix: u8) -> Result<Self, NetworkError> {
        if prefix > Self::MAX_PREFIX {
            return Err(NetworkError::InvalidPrefixLength(prefix));
        }
        let network = Self::containing(address, prefix)?;
        if network.address != address {
            return Err(NetworkError::HostBitsSet(format!("{}/{}", address, prefix)));
        }
        Ok(network)
    }

    /// The network of the given prefix that contains `address`
    ///
    /// Host bits are cleared rather than rejected; used when deriving a
    /// subnet from an interface address and its netmask.
    pub fn containing(address: Ipv4Addr, prefix: u8) -> Result<Self, NetworkError> {
        if prefix > Self::MAX_PREFIX {
            return Err(NetworkError::InvalidPrefixLength(prefix));
        }
        let bits = u32::from(address) & prefix_to_mask_bits(prefix);
        Ok(Self {
            address: Ipv4Addr::from(bits),
            prefix,
        })
    }

    /// Network address (all host bits zero)
    pub fn network_address(&self) -> Ipv4Addr {
        self.address
    }

    /// Broadcast address (all host bits one)
    pub fn broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.address) | !prefix_to_mask_bits(self.prefix))
    }

    /// Prefix length
    pub fn prefix_len(&self) -> u8 {
        self.prefix
    }

    /// Dotted netmask, e.g. `255.255.255.0`
    pub fn netmask(&self) -> Ipv4Addr {
        Ipv4Addr::from(prefix_to_mask_bits(self.prefix))
    }

    /// Whether `ip` falls inside this block
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        u32::from(ip) & prefix_to_mask_bits(self.prefix) == u32::from(self.address)
    }
}

impl fmt::Display for Ipv4Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix)
    }
}

impl FromStr for Ipv4Network {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate_cidr(s)
    }
}

impl Serialize for Ipv4Network {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Ipv4Network {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        validate_cidr(&text).map_err(serde::de::Error::custom)
    }
}

fn prefix_to_mask_bits(prefix: u8) -> u32 {
    match prefix {
        0 => 0,
        p => u32::MAX << (32 - u32::from(p.min(32))),
    }
}

/// Address classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressClass {
    /// RFC 1918, loopback and link-local space
    Private,
    /// IETF-reserved space: 0/8, 240/4, documentation and benchmarking ranges
    Reserved,
    /// Publicly routable unicast
    Global,
}

impl AddressClass {
    /// Canonical string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Reserved => "reserved",
            Self::Global => "global",
        }
    }
}

impl fmt::Display for AddressClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const PRIVATE_BLOCKS: &[(u32, u8)] = &[
    (0x0A00_0000, 8),  // 10.0.0.0/8
    (0xAC10_0000, 12), // 172.16.0.0/12
    (0xC0A8_0000, 16), // 192.168.0.0/16
    (0x7F00_0000, 8),  // 127.0.0.0/8
    (0xA9FE_0000, 16), // 169.254.0.0/16
];

const RESERVED_BLOCKS: &[(u32, u8)] = &[
    (0x0000_0000, 8),  // 0.0.0.0/8
    (0xF000_0000, 4),  // 240.0.0.0/4, includes limited broadcast
    (0xC000_0200, 24), // 192.0.2.0/24
    (0xC633_6400, 24), // 198.51.100.0/24
    (0xCB00_7100, 24), // 203.0.113.0/24
    (0xC612_0000, 15), // 198.18.0.0/15
];

// Neither private, reserved nor global.
const UNCLASSIFIED_BLOCKS: &[(u32, u8)] = &[
    (0x6440_0000, 10), // 100.64.0.0/10 shared address space
    (0xC000_0000, 24), // 192.0.0.0/24 protocol assignments
];

fn in_blocks(ip: Ipv4Addr, blocks: &[(u32, u8)]) -> bool {
    let bits = u32::from(ip);
    blocks
        .iter()
        .any(|&(base, prefix)| bits & prefix_to_mask_bits(prefix) == base)
}

/// Parse an IPv4 literal
pub fn parse_ipv4(text: &str) -> Result<Ipv4Addr, NetworkError> {
    Ipv4Addr::from_str(text.trim()).map_err(|_| NetworkError::InvalidIpAddress(text.to_string()))
}

/// Classify an address as private, reserved or global
///
/// Multicast addresses are always rejected. An address that fits none of
/// the three classes is an error as well.
pub fn classify_address(ip: Ipv4Addr) -> Result<AddressClass, NetworkError> {
    if ip.is_multicast() {
        return Err(NetworkError::Multicast(ip));
    }
    if in_blocks(ip, PRIVATE_BLOCKS) {
        return Ok(AddressClass::Private);
    }
    if in_blocks(ip, RESERVED_BLOCKS) {
        return Ok(AddressClass::Reserved);
    }
    if in_blocks(ip, UNCLASSIFIED_BLOCKS) {
        return Err(NetworkError::Unclassified(ip));
    }
    Ok(AddressClass::Global)
}

/// Parse a CIDR block, requiring an explicit prefix length
///
/// A bare address is never widened to a host route.
pub fn validate_cidr(text: &str) -> Result<Ipv4Network, NetworkError> {
    let text = text.trim();
    let (addr_str, prefix_str) = text
        .split_once('/')
        .ok_or_else(|| NetworkError::MissingPrefix(text.to_string()))?;

    let address = parse_ipv4(addr_str)?;
    let prefix = parse_prefix(prefix_str).ok_or_else(|| NetworkError::InvalidCidr(text.to_string()))?;

    Ipv4Network::new(address, prefix)
}

/// Prefix length as plain decimal digits; signs and whitespace are refused
fn parse_prefix(text: &str) -> Option<u8> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Parse a netmask given as `255.255.255.0`, `/24` or `24`
pub fn parse_netmask(text: &str) -> Result<u8, NetworkError> {
    let trimmed = text.trim();
    let bare = trimmed.strip_prefix('/').unwrap_or(trimmed);

    if !bare.contains('.') {
        let prefix = parse_prefix(bare).ok_or_else(|| NetworkError::InvalidNetmask(text.to_string()))?;
        if prefix > Ipv4Network::MAX_PREFIX {
            return Err(NetworkError::InvalidPrefixLength(prefix));
        }
        return Ok(prefix);
    }

    let bits = u32::from(parse_ipv4(bare).map_err(|_| NetworkError::InvalidNetmask(text.to_string()))?);
    let prefix = bits.leading_ones();
    // Non-contiguous masks have a one somewhere after the first zero.
    if bits.checked_shl(prefix).unwrap_or(0) != 0 {
        return Err(NetworkError::InvalidNetmask(text.to_string()));
    }
    Ok(prefix as u8)
}

/// Whether `ip` may be handed to a host in `network`
///
/// `false` for the network address, the broadcast address and the gateway;
/// `true` otherwise. Containment is not checked here, see [`is_assignable`].
pub fn is_usable_host_address(ip: Ipv4Addr, network: &Ipv4Network, gateway: Ipv4Addr) -> bool {
    ip != network.network_address() && ip != network.broadcast() && ip != gateway
}

/// Usable host address that also lies inside `network`
pub fn is_assignable(ip: Ipv4Addr, network: &Ipv4Network, gateway: Ipv4Addr) -> bool {
    network.contains(ip) && is_usable_host_address(ip, network, gateway)
}

/// First network in `candidates` that contains `ip`
///
/// List order wins over specificity. Malformed entries are skipped with a
/// warning.
pub fn match_network<S: AsRef<str>>(
    ip: Ipv4Addr,
    candidates: &[S],
) -> Result<Ipv4Network, NetworkError> {
    for candidate in candidates {
        match validate_cidr(candidate.as_ref()) {
            Ok(network) if network.contains(ip) => return Ok(network),
            Ok(_) => {}
            Err(e) => warn!("Skipping malformed candidate network '{}': {}", candidate.as_ref(), e),
        }
    }
    Err(NetworkError::NoMatchingNetwork(ip))
}

// Copyright (c) 2025 - Cowboy AI, Inc.
//! vCenter Inventory Resolution and IPAM Subnet Reconciliation
//!
//! Two coupled subsystems:
//!
//! - [`inventory`] - a typed datacenter / cluster / datastore / network /
//!   folder tree with scoped name resolution and placement queries
//!   (most free datastore, compute × storage intersection, VM lookup)
//! - [`reconcile`] - per-host network facts from a fact source are
//!   validated, placed, aggregated per subnet and upserted into an IPAM
//!   registry without duplicates
//!
//! External systems sit behind traits: [`facts::FactSource`],
//! [`registry::RegistryClient`] and [`inventory::InventorySource`]. The
//! Foreman implementations live in [`adapters`] behind the `foreman`
//! feature.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod errors;
pub mod facts;
pub mod inventory;
pub mod reconcile;
pub mod registry;
pub mod state_machine;
pub mod subnet;

// Re-export commonly used types
pub use config::{ConfigError, ForemanConfig, ReconcileConfig};
pub use errors::{ErrorKind, IpamError, IpamResult};
pub use inventory::{InventoryError, InventoryResolver, InventorySession, InventoryTree, NodeKind};
pub use reconcile::{ReconcileOptions, ReconciliationDriver, ReconciliationReport};
pub use registry::{InMemoryRegistry, RegistryClient, RegistryError};

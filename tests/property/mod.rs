// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Module
//!
//! - `resolver_properties`: name resolution and datastore placement
//! - `network_properties`: address validation and subnet ranking
//! - `reconcile_properties`: idempotence of repeated passes

mod network_properties;
mod reconcile_properties;
mod resolver_properties;

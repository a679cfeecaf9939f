// Copyright (c) 2025 - Cowboy AI, Inc.

//! External system adapters
//!
//! Concrete implementations of [`crate::facts::FactSource`] and
//! [`crate::registry::RegistryClient`] for real services.

#[cfg(feature = "foreman")]
pub mod foreman;

#[cfg(feature = "foreman")]
pub use foreman::{ForemanFactSource, ForemanRegistry, ForemanSubnet};

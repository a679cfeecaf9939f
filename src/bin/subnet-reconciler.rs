// Copyright (c) 2025 - Cowboy AI, Inc.
//! Subnet Reconciler
//!
//! Reads Ansible facts of every host under `HOST_DOMAIN` from Foreman,
//! places each host's VM in a vCenter inventory export, and creates or
//! updates the matching Foreman subnets.
//!
//! Run with: cargo run --bin subnet-reconciler --features foreman
//!
//! Prerequisites:
//! 1. Foreman API reachable (via FOREMAN_URL environment variable)
//! 2. Foreman password set (via FOREMAN_PASSWORD environment variable)
//! 3. Inventory export on disk (via INVENTORY_SNAPSHOT environment variable)
//!
//! The report is written to stdout as JSON; logs go to stderr.

use anyhow::{Context, Result};
use cim_vcenter_ipam::{
    adapters::{ForemanFactSource, ForemanRegistry},
    inventory::{InventorySource, SnapshotSource},
    reconcile::{ReconcileOptions, ReconciliationDriver},
    registry::RegistryClient,
    ReconcileConfig,
};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting Subnet Reconciler");

    let config = ReconcileConfig::from_env().context("Invalid reconciler configuration")?;
    info!("Configuration loaded:");
    info!("  - vCenter: {}", config.vcenter);
    info!("  - Inventory: {}", config.inventory_snapshot.display());
    info!("  - Host domain: {}", config.host_domain);
    info!("  - Foreman URL: {}", config.foreman.base_url);
    info!("  - Aggregation: {}", config.aggregation);
    if config.dry_run {
        warn!("Dry run: no subnet will be written");
    }

    // Connections are the only fatal failures
    let session = SnapshotSource::new(&config.inventory_snapshot, &config.vcenter)
        .connect()
        .await
        .context("Failed to load vCenter inventory")?;
    info!("Inventory loaded: {} objects", session.tree().len());

    let registry = ForemanRegistry::new(&config.foreman).context("Failed to create Foreman registry client")?;
    registry
        .health_check()
        .await
        .context("Foreman is not reachable")?;
    let facts = ForemanFactSource::new(&config.foreman).context("Failed to create Foreman fact client")?;

    let driver = ReconciliationDriver::new(
        Arc::new(facts),
        Arc::new(registry),
        session,
        ReconcileOptions::from(&config),
    );
    let report = driver
        .run_domain()
        .await
        .context("Reconciliation failed")?;

    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to serialize report")?
    );

    for host in report.skipped_hosts() {
        if let Some(reason) = host.state.skip_reason() {
            warn!("  - {} skipped: {}", host.hostname, reason);
        }
    }
    info!(
        "Done: {} hosts, {} missing facts, {} subnets, {} mutations, {} failures",
        report.hosts.len(),
        report.missing_facts.len(),
        report.subnets.len(),
        report.mutation_count(),
        report.failed_subnets().count()
    );

    Ok(())
}

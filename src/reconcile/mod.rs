// Copyright (c) 2025 - Cowboy AI, Inc.
//! Subnet Reconciliation
//!
//! One pass turns per-host facts into registry subnets:
//!
//! ```text
//! hosts ──▶ fetch facts ──▶ validate ──▶ locate VM ──▶ (barrier) ──▶ aggregate ──▶ upsert per network
//!            └──────────── concurrent per host ────────────┘                     └─ concurrent across networks
//! ```
//!
//! Each host is driven through [`HostState`]; nothing a single host does
//! aborts the pass. Upserts run after every host has been placed, one
//! task per network key, so two hosts in the same subnet can never race
//! to create it. Only failing to list hosts is fatal.

pub mod report;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::ReconcileConfig;
use crate::domain::{HostNetworkFact, Hostname, Placement, SubnetCandidate, SubnetRecord};
use crate::errors::{ErrorKind, IpamError, IpamResult};
use crate::facts::FactSource;
use crate::inventory::{InventoryResolver, InventorySession};
use crate::registry::{DryRunRegistry, RegistryClient, RegistryError, RegistryResult};
use crate::state_machine::{HostInput, HostState, SkipReason, StateMachineWithHistory, TransitionResult};
use crate::subnet::{AggregatedSubnet, AggregationStrategy, SubnetAggregator};

pub use report::{HostOutcome, ReconciliationReport, SubnetOutcome, UpsertAction};

/// Settings of a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// vCenter name written into subnet descriptions
    pub vcenter: String,
    /// Hosts processed at once, and upserts in flight at once
    pub concurrency: usize,
    pub strict_names: bool,
    pub aggregation: AggregationStrategy,
    /// Domain for [`ReconciliationDriver::run_domain`]
    pub host_domain: String,
    pub dry_run: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            vcenter: "vcenter".to_string(),
            concurrency: 8,
            strict_names: false,
            aggregation: AggregationStrategy::default(),
            host_domain: String::new(),
            dry_run: false,
        }
    }
}

impl From<&ReconcileConfig> for ReconcileOptions {
    fn from(config: &ReconcileConfig) -> Self {
        Self {
            vcenter: config.vcenter.clone(),
            concurrency: config.concurrency,
            strict_names: config.strict_names,
            aggregation: config.aggregation,
            host_domain: config.host_domain.clone(),
            dry_run: config.dry_run,
        }
    }
}

/// A host on its way through the pipeline
struct HostProgress {
    hostname: Hostname,
    machine: StateMachineWithHistory<HostState>,
    placement: Option<Placement>,
    candidate: Option<SubnetCandidate>,
}

impl HostProgress {
    fn new(hostname: Hostname) -> Self {
        Self {
            hostname,
            machine: StateMachineWithHistory::new(HostState::Fetched),
            placement: None,
            candidate: None,
        }
    }

    fn advance(&mut self, input: HostInput) -> TransitionResult<()> {
        if let Some(reason) = self.machine.step(input)?.skipped {
            warn!("Skipping {}: {}", self.hostname, reason);
        }
        Ok(())
    }

    fn is_missing_facts(&self) -> bool {
        // Only a rejection at the first step counts as missing facts
        self.machine.history().len() == 1
            && self
                .machine
                .current_state()
                .skip_reason()
                .map_or(false, |r| r.kind == ErrorKind::IncompleteFacts)
    }

    fn into_outcome(self) -> HostOutcome {
        HostOutcome {
            network: self.candidate.as_ref().map(|c| c.network),
            hostname: self.hostname,
            state: self.machine.into_state(),
            placement: self.placement,
        }
    }
}

/// Drives reconciliation passes against one inventory session
pub struct ReconciliationDriver<F, R> {
    facts: Arc<F>,
    registry: Arc<R>,
    resolver: InventoryResolver,
    options: ReconcileOptions,
}

impl<F: FactSource, R: RegistryClient> ReconciliationDriver<F, R> {
    pub fn new(facts: Arc<F>, registry: Arc<R>, session: InventorySession, options: ReconcileOptions) -> Self {
        let resolver = InventoryResolver::new(session).strict(options.strict_names);
        Self {
            facts,
            registry,
            resolver,
            options,
        }
    }

    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    pub fn resolver(&self) -> &InventoryResolver {
        &self.resolver
    }

    /// Reconcile every host the fact source lists under the configured domain
    pub async fn run_domain(&self) -> IpamResult<ReconciliationReport> {
        let hosts = self.facts.list_hosts(&self.options.host_domain).await?;
        info!(
            "{} lists {} hosts under '{}'",
            self.facts.name(),
            hosts.len(),
            self.options.host_domain
        );
        self.run(hosts).await
    }

    /// Reconcile the given hosts
    ///
    /// Duplicate hostnames are processed once.
    pub async fn run(&self, hosts: Vec<Hostname>) -> IpamResult<ReconciliationReport> {
        let run_id = Uuid::now_v7();
        let started_at = Utc::now();
        info!(
            "Reconciliation {} started: {} hosts, strategy {}, registry {}{}",
            run_id,
            hosts.len(),
            self.options.aggregation,
            self.registry.name(),
            if self.options.dry_run { " (dry run)" } else { "" }
        );

        let mut seen = BTreeSet::new();
        let hosts: Vec<Hostname> = hosts.into_iter().filter(|h| seen.insert(h.clone())).collect();

        let concurrency = self.options.concurrency.max(1);
        let mut progress: Vec<HostProgress> = stream::iter(hosts)
            .map(|host| self.place_host(host))
            .buffered(concurrency)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<TransitionResult<_>>()?;

        // Barrier: every host is placed or skipped before anything is written
        let mut aggregator = SubnetAggregator::new(self.options.aggregation);
        for host in progress.iter_mut() {
            if let Some(candidate) = host.candidate.clone() {
                aggregator.add(candidate);
                host.advance(HostInput::Merged)?;
            }
        }
        info!(
            "Aggregated {} networks from {} placed hosts",
            aggregator.len(),
            progress.iter().filter(|h| h.candidate.is_some()).count()
        );
        let subnets = aggregator.finish();

        let outcomes = if self.options.dry_run {
            let dry = DryRunRegistry::new(self.registry.clone());
            self.upsert_all(&dry, subnets).await
        } else {
            self.upsert_all(self.registry.as_ref(), subnets).await
        };

        let index: BTreeMap<Hostname, usize> = progress
            .iter()
            .enumerate()
            .map(|(i, h)| (h.hostname.clone(), i))
            .collect();
        for outcome in outcomes.iter().filter(|o| !o.action.is_failure()) {
            for source in &outcome.sources {
                if let Some(&i) = index.get(source) {
                    progress[i].advance(HostInput::SubnetUpserted)?;
                }
            }
        }

        let missing_facts = progress
            .iter()
            .filter(|h| h.is_missing_facts())
            .map(|h| h.hostname.clone())
            .collect();

        let report = ReconciliationReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            dry_run: self.options.dry_run,
            hosts: progress.into_iter().map(HostProgress::into_outcome).collect(),
            missing_facts,
            subnets: outcomes,
        };

        info!(
            "Reconciliation {} finished: {} hosts, {} skipped, {} subnets, {} mutations, {} failures",
            run_id,
            report.hosts.len(),
            report.skipped_hosts().count(),
            report.subnets.len(),
            report.mutation_count(),
            report.failed_subnets().count()
        );
        Ok(report)
    }

    /// Fetched → Validated → Placed for one host
    async fn place_host(&self, hostname: Hostname) -> TransitionResult<HostProgress> {
        let mut host = HostProgress::new(hostname.clone());

        let facts = match self.facts.all_facts(&hostname).await {
            Ok(facts) => facts,
            Err(e) => {
                host.advance(HostInput::FactsRejected(SkipReason::new(e.kind(), e.to_string())))?;
                return Ok(host);
            }
        };

        let fact = match HostNetworkFact::from_facts(hostname.clone(), &facts) {
            Ok(fact) => fact,
            Err(e) => {
                let message = e.to_string();
                let kind = IpamError::from(e).kind();
                host.advance(HostInput::FactsRejected(SkipReason::new(kind, message)))?;
                return Ok(host);
            }
        };
        host.advance(HostInput::FactsValid)?;

        let placement = match self.resolver.locate_vm(&hostname) {
            Ok(placement) => placement,
            Err(e) => {
                host.advance(HostInput::PlacementFailed(SkipReason::new(e.kind(), e.to_string())))?;
                return Ok(host);
            }
        };
        host.advance(HostInput::PlacementResolved)?;
        debug!(
            "{} is {} in {}/{} on {}",
            hostname, fact.network, placement.datacenter, placement.cluster, placement.network
        );

        let fact = fact.with_placement(placement.clone());
        host.candidate = Some(SubnetCandidate::from_fact(&fact, &placement, &self.options.vcenter));
        host.placement = Some(placement);
        Ok(host)
    }

    /// One task per network key; keys are distinct so no two tasks touch
    /// the same subnet
    async fn upsert_all<C: RegistryClient + ?Sized>(
        &self,
        registry: &C,
        subnets: Vec<AggregatedSubnet>,
    ) -> Vec<SubnetOutcome> {
        stream::iter(subnets)
            .map(|subnet| Self::upsert_subnet(registry, subnet))
            .buffered(self.options.concurrency.max(1))
            .collect()
            .await
    }

    async fn upsert_subnet<C: RegistryClient + ?Sized>(registry: &C, subnet: AggregatedSubnet) -> SubnetOutcome {
        let desired = SubnetRecord::from_candidate(&subnet.effective);
        let sources = subnet.ranked.iter().filter_map(|c| c.source.clone()).collect();

        let (action, record) = match Self::upsert(registry, &desired).await {
            Ok((action, record)) => {
                match action {
                    UpsertAction::Unchanged => debug!("Subnet {} unchanged", desired.network),
                    _ => info!("Subnet {} {:?} ({})", desired.network, action, desired.description),
                }
                (action, Some(record))
            }
            Err(e) => {
                error!("Upsert of subnet {} failed: {}", desired.network, e);
                (
                    UpsertAction::Failed {
                        kind: e.kind(),
                        message: e.to_string(),
                    },
                    None,
                )
            }
        };

        SubnetOutcome {
            network: subnet.network,
            action,
            record,
            sources,
            superseded: subnet.superseded,
        }
    }

    /// Find by network, then create xor update
    async fn upsert<C: RegistryClient + ?Sized>(
        registry: &C,
        desired: &SubnetRecord,
    ) -> RegistryResult<(UpsertAction, SubnetRecord)> {
        match registry.find_subnet_by_network(&desired.network).await? {
            None => {
                let stored = registry.create_subnet(desired).await?;
                Ok((UpsertAction::Created, stored))
            }
            Some(existing) if existing.same_content(desired) => Ok((UpsertAction::Unchanged, existing)),
            Some(existing) => {
                let id = existing.id.ok_or_else(|| {
                    RegistryError::InvalidRecord(format!("subnet {} has no registry id", existing.network))
                })?;
                let stored = registry.update_subnet(id, desired).await?;
                Ok((UpsertAction::Updated, stored))
            }
        }
    }
}

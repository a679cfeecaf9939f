// Copyright (c) 2025 - Cowboy AI, Inc.
//! Reconciliation Report
//!
//! What one pass did to every host and every subnet. Serializes to JSON
//! for the runner's output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Hostname, Ipv4Network, Placement, SubnetRecord};
use crate::errors::ErrorKind;
use crate::state_machine::HostState;
use crate::subnet::Superseded;

/// Where one host ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostOutcome {
    pub hostname: Hostname,
    pub state: HostState,
    pub placement: Option<Placement>,
    /// Subnet derived from the host's facts, once validated
    pub network: Option<Ipv4Network>,
}

/// Registry operation performed for one subnet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UpsertAction {
    Created,
    Updated,
    /// The registry already held the same content
    Unchanged,
    Failed { kind: ErrorKind, message: String },
}

impl UpsertAction {
    /// Whether the registry was written
    pub fn is_mutation(&self) -> bool {
        matches!(self, UpsertAction::Created | UpsertAction::Updated)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, UpsertAction::Failed { .. })
    }
}

/// Outcome of one subnet key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetOutcome {
    pub network: Ipv4Network,
    pub action: UpsertAction,
    /// Record as stored (or planned, in a dry run)
    pub record: Option<SubnetRecord>,
    /// Hosts whose facts describe this subnet
    pub sources: Vec<Hostname>,
    pub superseded: Vec<Superseded>,
}

/// Result of one reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    /// Every host, in input order
    pub hosts: Vec<HostOutcome>,
    /// Hosts skipped for absent facts or a short DNS list
    pub missing_facts: Vec<Hostname>,
    /// Every subnet key, in network order
    pub subnets: Vec<SubnetOutcome>,
}

impl ReconciliationReport {
    /// Creates plus updates
    pub fn mutation_count(&self) -> usize {
        self.subnets.iter().filter(|s| s.action.is_mutation()).count()
    }

    pub fn skipped_hosts(&self) -> impl Iterator<Item = &HostOutcome> {
        self.hosts.iter().filter(|h| h.state.skip_reason().is_some())
    }

    pub fn failed_subnets(&self) -> impl Iterator<Item = &SubnetOutcome> {
        self.subnets.iter().filter(|s| s.action.is_failure())
    }

    /// Outcome of one host
    pub fn host(&self, hostname: &Hostname) -> Option<&HostOutcome> {
        self.hosts.iter().find(|h| &h.hostname == hostname)
    }

    /// Outcome of one subnet key
    pub fn subnet(&self, network: &Ipv4Network) -> Option<&SubnetOutcome> {
        self.subnets.iter().find(|s| &s.network == network)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::SkipReason;

    fn outcome(action: UpsertAction) -> SubnetOutcome {
        SubnetOutcome {
            network: "10.1.1.0/24".parse().unwrap(),
            action,
            record: None,
            sources: Vec::new(),
            superseded: Vec::new(),
        }
    }

    #[test]
    fn test_counts() {
        let now = Utc::now();
        let report = ReconciliationReport {
            run_id: Uuid::now_v7(),
            started_at: now,
            finished_at: now,
            dry_run: false,
            hosts: vec![HostOutcome {
                hostname: Hostname::new("h1.example.net").unwrap(),
                state: HostState::Skipped {
                    reason: SkipReason::new(ErrorKind::IncompleteFacts, "Missing facts: gateway"),
                },
                placement: None,
                network: None,
            }],
            missing_facts: vec![Hostname::new("h1.example.net").unwrap()],
            subnets: vec![
                outcome(UpsertAction::Created),
                outcome(UpsertAction::Unchanged),
                outcome(UpsertAction::Failed {
                    kind: ErrorKind::RegistryConflict,
                    message: "ambiguous".into(),
                }),
            ],
        };

        assert_eq!(report.mutation_count(), 1);
        assert_eq!(report.skipped_hosts().count(), 1);
        assert_eq!(report.failed_subnets().count(), 1);
    }

    #[test]
    fn test_action_serialization() {
        let json = serde_json::to_value(UpsertAction::Failed {
            kind: ErrorKind::ConnectivityFailure,
            message: "timeout".into(),
        })
        .unwrap();
        assert_eq!(json["action"], "failed");
        assert_eq!(json["kind"], "connectivity_failure");
    }
}

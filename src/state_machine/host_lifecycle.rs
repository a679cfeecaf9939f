// Copyright (c) 2025 - Cowboy AI, Inc.
//! Host Reconciliation Lifecycle
//!
//! Tracks one host through a reconciliation pass.
//!
//! # State Machine Type
//!
//! This is a **Mealy Machine**: outputs depend on both state and input.
//!
//! # States
//!
//! ```text
//! Fetched ─FactsValid─▶ Validated ─PlacementResolved─▶ Placed ─Merged─▶ Aggregated ─SubnetUpserted─▶ Upserted
//!    │                     │
//!    └─FactsRejected─▶ Skipped ◀─PlacementFailed─┘
//! ```
//!
//! `Skipped` is reachable only from `Fetched` and `Validated`. `Skipped`
//! and `Upserted` are terminal. A host whose subnet fails to upsert stays
//! `Aggregated`.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{StateMachine, TransitionError, TransitionResult};
use crate::errors::ErrorKind;

/// Why a host left the pipeline early
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipReason {
    pub kind: ErrorKind,
    pub message: String,
}

impl SkipReason {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Per-host pipeline state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum HostState {
    Fetched,
    Validated,
    Placed,
    Aggregated,
    Upserted,
    Skipped { reason: SkipReason },
}

impl HostState {
    pub fn name(&self) -> &'static str {
        match self {
            HostState::Fetched => "Fetched",
            HostState::Validated => "Validated",
            HostState::Placed => "Placed",
            HostState::Aggregated => "Aggregated",
            HostState::Upserted => "Upserted",
            HostState::Skipped { .. } => "Skipped",
        }
    }

    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match self {
            HostState::Skipped { reason } => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Display for HostState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pipeline events (FSM input)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostInput {
    /// Facts complete and consistent
    FactsValid,
    /// Facts missing, malformed or unreachable
    FactsRejected(SkipReason),
    /// VM placement found in the inventory
    PlacementResolved,
    PlacementFailed(SkipReason),
    /// Candidate merged into the batch
    Merged,
    /// The host's subnet reached the registry
    SubnetUpserted,
}

impl HostInput {
    fn name(&self) -> &'static str {
        match self {
            HostInput::FactsValid => "FactsValid",
            HostInput::FactsRejected(_) => "FactsRejected",
            HostInput::PlacementResolved => "PlacementResolved",
            HostInput::PlacementFailed(_) => "PlacementFailed",
            HostInput::Merged => "Merged",
            HostInput::SubnetUpserted => "SubnetUpserted",
        }
    }
}

/// Transition output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutput {
    /// Set when the step routed the host to `Skipped`
    pub skipped: Option<SkipReason>,
}

impl StepOutput {
    fn advanced() -> Self {
        Self { skipped: None }
    }

    fn skipped(reason: &SkipReason) -> Self {
        Self {
            skipped: Some(reason.clone()),
        }
    }
}

impl StateMachine for HostState {
    type Input = HostInput;
    type Output = StepOutput;

    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)> {
        use HostInput::*;
        use HostState::*;

        match (self, input) {
            (Fetched, FactsValid) => Ok((Validated, StepOutput::advanced())),
            (Fetched, FactsRejected(reason)) => Ok((
                Skipped {
                    reason: reason.clone(),
                },
                StepOutput::skipped(reason),
            )),
            (Validated, PlacementResolved) => Ok((Placed, StepOutput::advanced())),
            (Validated, PlacementFailed(reason)) => Ok((
                Skipped {
                    reason: reason.clone(),
                },
                StepOutput::skipped(reason),
            )),
            (Placed, Merged) => Ok((Aggregated, StepOutput::advanced())),
            (Aggregated, SubnetUpserted) => Ok((Upserted, StepOutput::advanced())),

            (Skipped { .. } | Upserted, _) => Err(TransitionError::Terminal(self.name().to_string())),
            (Fetched | Validated | Placed | Aggregated, _) => Err(TransitionError::InvalidTransition {
                from: self.name().to_string(),
                input: input.name().to_string(),
            }),
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, HostState::Skipped { .. } | HostState::Upserted)
    }
}

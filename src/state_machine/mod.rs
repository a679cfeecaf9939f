// Copyright (c) 2025 - Cowboy AI, Inc.
//! Finite State Machine Abstractions
//!
//! Generic state machine types used to model per-host progress through a
//! reconciliation pass. Transitions are pure: the machine computes the next
//! state, the caller performs the I/O that produced the input.
//!
//! # Mealy Machine
//!
//! Output depends on both current state and input:
//! ```text
//! (State, Input) → (State, Output)
//! ```
//!
//! # Example
//!
//! ```rust
//! use cim_vcenter_ipam::state_machine::*;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! enum Door { Open, Closed }
//!
//! impl StateMachine for Door {
//!     type Input = ();
//!     type Output = ();
//!
//!     fn transition(&self, _: &()) -> TransitionResult<(Self, ())> {
//!         match self {
//!             Door::Open => Ok((Door::Closed, ())),
//!             Door::Closed => Ok((Door::Open, ())),
//!         }
//!     }
//! }
//!
//! let mut door = StateMachineWithHistory::new(Door::Open);
//! door.step(()).unwrap();
//! assert_eq!(door.current_state(), &Door::Closed);
//! ```

pub mod host_lifecycle;

use chrono::{DateTime, Utc};

pub use host_lifecycle::{HostInput, HostState, SkipReason, StepOutput};

/// Outcome of a transition attempt
pub type TransitionResult<S> = Result<S, TransitionError>;

/// Rejected transitions
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// Transition from current state on this input is not allowed
    #[error("Invalid transition from {from} on {input}")]
    InvalidTransition { from: String, input: String },

    /// The current state accepts no further input
    #[error("State {0} is terminal")]
    Terminal(String),
}

/// A pure finite state machine
pub trait StateMachine: Sized + Clone {
    /// Event fed to the machine
    type Input;

    /// Emitted alongside the next state; `()` when nothing is emitted
    type Output;

    /// Next state and output for `input`, or why `input` is not accepted
    /// here. Never mutates `self`.
    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)>;

    /// Whether `input` would be accepted
    fn can_transition(&self, input: &Self::Input) -> bool {
        self.transition(input).is_ok()
    }

    /// Whether no input is accepted any more
    fn is_terminal(&self) -> bool {
        false
    }
}

/// One recorded step
#[derive(Debug, Clone)]
pub struct Transition<S, I> {
    pub from: S,
    pub to: S,
    pub input: I,
    pub timestamp: DateTime<Utc>,
}

impl<S, I> Transition<S, I> {
    pub fn new(from: S, to: S, input: I, timestamp: DateTime<Utc>) -> Self {
        Self {
            from,
            to,
            input,
            timestamp,
        }
    }
}

/// A machine plus the steps that led to its current state
#[derive(Debug, Clone)]
pub struct StateMachineWithHistory<FSM: StateMachine> {
    current: FSM,
    history: Vec<Transition<FSM, FSM::Input>>,
}

impl<FSM: StateMachine> StateMachineWithHistory<FSM> {
    pub fn new(initial: FSM) -> Self {
        Self {
            current: initial,
            history: Vec::new(),
        }
    }

    /// Apply `input` and record the step at `timestamp`
    ///
    /// A rejected input leaves both state and history untouched.
    pub fn transition_with_history(
        &mut self,
        input: FSM::Input,
        timestamp: DateTime<Utc>,
    ) -> TransitionResult<FSM::Output> {
        let (to, output) = self.current.transition(&input)?;
        let from = std::mem::replace(&mut self.current, to.clone());
        self.history.push(Transition::new(from, to, input, timestamp));
        Ok(output)
    }

    /// Transition stamped with the current time
    pub fn step(&mut self, input: FSM::Input) -> TransitionResult<FSM::Output> {
        self.transition_with_history(input, Utc::now())
    }

    pub fn history(&self) -> &[Transition<FSM, FSM::Input>] {
        &self.history
    }

    pub fn current_state(&self) -> &FSM {
        &self.current
    }

    /// Consume the wrapper, keeping the final state
    pub fn into_state(self) -> FSM {
        self.current
    }
}

// Copyright (c) 2025 - Cowboy AI, Inc.
//! Subnet Aggregation
//!
//! Groups per-host [`SubnetCandidate`](crate::domain::SubnetCandidate)s by
//! network and decides which one the registry should hold.

pub mod aggregator;

pub use aggregator::{
    consensus, rank, similarity_score, AggregatedSubnet, AggregationStrategy, SubnetAggregator,
    Superseded,
};

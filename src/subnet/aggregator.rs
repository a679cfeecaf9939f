// Copyright (c) 2025 - Cowboy AI, Inc.
//! Subnet Aggregator
//!
//! Hosts in the same subnet report it independently and do not always
//! agree: one host may carry stale resolvers, another may sit on a
//! differently labelled port group. The aggregator groups candidates by
//! network and orders each group by how well it is corroborated.
//!
//! # Strategies
//!
//! - [`AggregationStrategy::Ranked`] (default): candidates are ordered
//!   ascending by their summed pairwise similarity and the last one, the
//!   most corroborated, becomes the effective record. Disagreement is only
//!   surfaced through the ordering and the superseded list.
//! - [`AggregationStrategy::Consensus`]: field-wise majority vote over the
//!   group, ties going to the most corroborated candidate's value.
//!
//! Both strategies consider every candidate; none is discarded silently.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::domain::{DescriptionTags, Hostname, Ipv4Network, SubnetCandidate};

/// Number of compared fields on which two candidates agree
pub fn similarity_score(a: &SubnetCandidate, b: &SubnetCandidate) -> usize {
    a.fields()
        .iter()
        .zip(b.fields().iter())
        .filter(|(x, y)| x == y)
        .count()
}

/// Order candidates ascending by summed similarity to all others
///
/// Least corroborated first. The sort is stable, so equally corroborated
/// candidates keep their input order.
pub fn rank(candidates: Vec<SubnetCandidate>) -> Vec<SubnetCandidate> {
    let scores: Vec<usize> = (0..candidates.len())
        .map(|i| {
            (0..candidates.len())
                .filter(|&j| j != i)
                .map(|j| similarity_score(&candidates[i], &candidates[j]))
                .sum()
        })
        .collect();

    let mut indexed: Vec<(usize, SubnetCandidate)> = scores.into_iter().zip(candidates).collect();
    indexed.sort_by_key(|(score, _)| *score);
    indexed.into_iter().map(|(_, candidate)| candidate).collect()
}

fn majority<T: PartialEq + Clone>(ranked: &[SubnetCandidate], field: impl Fn(&SubnetCandidate) -> T) -> Option<T> {
    // (value, votes, last position in ranked order)
    let mut tally: Vec<(T, usize, usize)> = Vec::new();
    for (position, candidate) in ranked.iter().enumerate() {
        let value = field(candidate);
        match tally.iter_mut().find(|(v, _, _)| *v == value) {
            Some(entry) => {
                entry.1 += 1;
                entry.2 = position;
            }
            None => tally.push((value, 1, position)),
        }
    }
    tally
        .into_iter()
        .max_by_key(|(_, votes, last)| (*votes, *last))
        .map(|(value, _, _)| value)
}

/// Field-wise majority vote over candidates of one network
///
/// `ranked` must be in [`rank`] order; ties go to the value of the
/// candidate ranked last. Returns `None` for an empty slice.
pub fn consensus(ranked: &[SubnetCandidate]) -> Option<SubnetCandidate> {
    let anchor = ranked.last()?;
    let pick_addr = |f: fn(&SubnetCandidate) -> Ipv4Addr| majority(ranked, f);
    let pick_tag = |f: fn(&SubnetCandidate) -> String| majority(ranked, f);

    Some(SubnetCandidate {
        network: anchor.network,
        gateway: pick_addr(|c| c.gateway)?,
        dns1: pick_addr(|c| c.dns1)?,
        dns2: pick_addr(|c| c.dns2)?,
        tags: DescriptionTags {
            vcenter: pick_tag(|c| c.tags.vcenter.clone())?,
            datacenter: pick_tag(|c| c.tags.datacenter.clone())?,
            cluster: pick_tag(|c| c.tags.cluster.clone())?,
            vlan: pick_tag(|c| c.tags.vlan.clone())?,
        },
        source: anchor.source.clone(),
    })
}

/// How the effective candidate of a group is chosen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationStrategy {
    #[default]
    Ranked,
    Consensus,
}

impl fmt::Display for AggregationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregationStrategy::Ranked => f.write_str("ranked"),
            AggregationStrategy::Consensus => f.write_str("consensus"),
        }
    }
}

impl FromStr for AggregationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ranked" => Ok(AggregationStrategy::Ranked),
            "consensus" => Ok(AggregationStrategy::Consensus),
            other => Err(format!("unknown aggregation strategy '{}'", other)),
        }
    }
}

/// A candidate that lost to the effective record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Superseded {
    pub source: Option<Hostname>,
    /// Fields that differ from the effective record
    pub fields: Vec<String>,
}

/// Outcome of aggregating one network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedSubnet {
    pub network: Ipv4Network,
    /// All candidates, least corroborated first
    pub ranked: Vec<SubnetCandidate>,
    pub effective: SubnetCandidate,
    pub superseded: Vec<Superseded>,
}

impl AggregatedSubnet {
    /// Every candidate agreed with the effective record
    pub fn is_unanimous(&self) -> bool {
        self.superseded.is_empty()
    }
}

/// Collects candidates keyed by network
#[derive(Debug, Clone, Default)]
pub struct SubnetAggregator {
    strategy: AggregationStrategy,
    groups: BTreeMap<Ipv4Network, Vec<SubnetCandidate>>,
}

impl SubnetAggregator {
    pub fn new(strategy: AggregationStrategy) -> Self {
        Self {
            strategy,
            groups: BTreeMap::new(),
        }
    }

    pub fn strategy(&self) -> AggregationStrategy {
        self.strategy
    }

    /// Merge a candidate into its network's group
    pub fn add(&mut self, candidate: SubnetCandidate) {
        self.groups.entry(candidate.network).or_default().push(candidate);
    }

    /// Number of distinct networks
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Rank every group and pick its effective candidate, in network order
    pub fn finish(self) -> Vec<AggregatedSubnet> {
        let strategy = self.strategy;
        self.groups
            .into_iter()
            .filter_map(|(network, candidates)| {
                let ranked = rank(candidates);
                let effective = match strategy {
                    AggregationStrategy::Ranked => ranked.last().cloned(),
                    AggregationStrategy::Consensus => consensus(&ranked),
                }?;

                let superseded: Vec<Superseded> = ranked
                    .iter()
                    .filter_map(|candidate| {
                        let fields = candidate.disagreements(&effective);
                        (!fields.is_empty()).then(|| Superseded {
                            source: candidate.source.clone(),
                            fields: fields.into_iter().map(str::to_string).collect(),
                        })
                    })
                    .collect();

                for loser in &superseded {
                    warn!(
                        "{} from {} disagrees with the effective record on {}",
                        network,
                        loser
                            .source
                            .as_ref()
                            .map(|h| h.as_str())
                            .unwrap_or("unknown host"),
                        loser.fields.join(", ")
                    );
                }
                debug!(
                    "Aggregated {} candidates for {} ({})",
                    ranked.len(),
                    network,
                    strategy
                );

                Some(AggregatedSubnet {
                    network,
                    ranked,
                    effective,
                    superseded,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn candidate(host: &str, dns2: &str, vlan: &str) -> SubnetCandidate {
        SubnetCandidate {
            network: "10.1.1.0/24".parse().unwrap(),
            gateway: "10.1.1.1".parse().unwrap(),
            dns1: "10.1.1.2".parse().unwrap(),
            dns2: dns2.parse().unwrap(),
            tags: DescriptionTags {
                vcenter: "vc01".into(),
                datacenter: "DC1".into(),
                cluster: "C1".into(),
                vlan: vlan.into(),
            },
            source: Some(Hostname::new(host).unwrap()),
        }
    }

    #[test]
    fn test_similarity_ignores_source() {
        let a = candidate("h1", "10.1.1.3", "VLAN100");
        let b = candidate("h2", "10.1.1.3", "VLAN100");
        assert_eq!(similarity_score(&a, &b), SubnetCandidate::FIELD_NAMES.len());

        let c = candidate("h3", "10.1.1.9", "VLAN200");
        assert_eq!(similarity_score(&a, &c), SubnetCandidate::FIELD_NAMES.len() - 2);
    }

    #[test]
    fn test_rank_puts_outlier_first() {
        let ranked = rank(vec![
            candidate("h1", "10.1.1.3", "VLAN100"),
            candidate("h2", "10.1.1.9", "VLAN200"),
            candidate("h3", "10.1.1.3", "VLAN100"),
        ]);
        let order: Vec<&str> = ranked
            .iter()
            .map(|c| c.source.as_ref().unwrap().as_str())
            .collect();
        assert_eq!(order, vec!["h2", "h1", "h3"]);
    }

    #[test]
    fn test_rank_empty_and_single() {
        assert!(rank(Vec::new()).is_empty());
        assert_eq!(rank(vec![candidate("h1", "10.1.1.3", "VLAN100")]).len(), 1);
    }

    #[test]
    fn test_consensus_votes_per_field() {
        // h1 and h2 agree on dns2, h2 and h3 agree on vlan
        let ranked = rank(vec![
            candidate("h1", "10.1.1.3", "VLAN100"),
            candidate("h2", "10.1.1.3", "VLAN200"),
            candidate("h3", "10.1.1.9", "VLAN200"),
        ]);
        let merged = consensus(&ranked).unwrap();
        assert_eq!(merged.dns2, "10.1.1.3".parse::<Ipv4Addr>().unwrap());
        assert_eq!(merged.tags.vlan, "VLAN200");
    }

    #[test]
    fn test_ranked_strategy_reports_superseded() {
        let mut aggregator = SubnetAggregator::new(AggregationStrategy::Ranked);
        aggregator.add(candidate("h1", "10.1.1.3", "VLAN100"));
        aggregator.add(candidate("h2", "10.1.1.9", "VLAN100"));
        aggregator.add(candidate("h3", "10.1.1.3", "VLAN100"));
        assert_eq!(aggregator.len(), 1);

        let subnets = aggregator.finish();
        assert_eq!(subnets.len(), 1);
        let subnet = &subnets[0];
        assert_eq!(subnet.ranked.len(), 3);
        assert_eq!(subnet.effective.dns2, "10.1.1.3".parse::<Ipv4Addr>().unwrap());
        assert_eq!(
            subnet.superseded,
            vec![Superseded {
                source: Some(Hostname::new("h2").unwrap()),
                fields: vec!["dns2".to_string()],
            }]
        );
    }

    #[test]
    fn test_groups_by_network() {
        let mut other = candidate("h9", "10.2.2.3", "VLAN300");
        other.network = "10.2.2.0/24".parse().unwrap();

        let mut aggregator = SubnetAggregator::default();
        aggregator.add(other);
        aggregator.add(candidate("h1", "10.1.1.3", "VLAN100"));

        let networks: Vec<String> = aggregator
            .finish()
            .into_iter()
            .map(|s| s.network.to_string())
            .collect();
        assert_eq!(networks, vec!["10.1.1.0/24", "10.2.2.0/24"]);
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("Consensus".parse::<AggregationStrategy>(), Ok(AggregationStrategy::Consensus));
        assert!("vote".parse::<AggregationStrategy>().is_err());
    }
}

// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Network Validation and Ranking

use std::net::Ipv4Addr;

use cim_vcenter_ipam::domain::{
    is_usable_host_address, match_network, validate_cidr, DescriptionTags, Ipv4Network,
    SubnetCandidate,
};
use cim_vcenter_ipam::subnet::{rank, similarity_score};
use proptest::prelude::*;

fn network() -> impl Strategy<Value = Ipv4Network> {
    (any::<u32>(), 8u8..=30).prop_map(|(bits, prefix)| {
        Ipv4Network::containing(Ipv4Addr::from(bits), prefix).unwrap()
    })
}

fn candidate() -> impl Strategy<Value = SubnetCandidate> {
    let pick = |values: &'static [&'static str]| prop::sample::select(values.to_vec());
    (
        pick(&["10.1.1.1", "10.1.1.254"]),
        pick(&["10.1.1.2", "10.9.9.9"]),
        pick(&["10.1.1.3", "10.1.1.4"]),
        pick(&["VLAN100", "VLAN200"]),
        pick(&["C1", "C2"]),
    )
        .prop_map(|(gateway, dns1, dns2, vlan, cluster)| SubnetCandidate {
            network: "10.1.1.0/24".parse().unwrap(),
            gateway: gateway.parse().unwrap(),
            dns1: dns1.parse().unwrap(),
            dns2: dns2.parse().unwrap(),
            tags: DescriptionTags {
                vcenter: "vc01".into(),
                datacenter: "DC1".into(),
                cluster: cluster.into(),
                vlan: vlan.into(),
            },
            source: None,
        })
}

proptest! {
    /// Network, broadcast and gateway addresses are never usable
    #[test]
    fn prop_reserved_addresses_unusable(network in network(), offset in 1u32..4) {
        let gateway = Ipv4Addr::from(u32::from(network.network_address()) + offset);

        prop_assert!(!is_usable_host_address(network.network_address(), &network, gateway));
        prop_assert!(!is_usable_host_address(network.broadcast(), &network, gateway));
        prop_assert!(!is_usable_host_address(gateway, &network, gateway));
    }

    /// A CIDR built from a network's own address and prefix validates back to it
    #[test]
    fn prop_cidr_text_validates(network in network()) {
        let parsed = validate_cidr(&network.to_string()).unwrap();
        prop_assert_eq!(parsed, network);
        prop_assert!(parsed.contains(network.broadcast()));
    }

    /// The first containing network wins regardless of specificity
    #[test]
    fn prop_match_network_first_wins(network in network()) {
        let inside = Ipv4Addr::from(u32::from(network.network_address()) + 1);
        let wider = Ipv4Network::containing(inside, network.prefix_len() - 1).unwrap();

        let candidates = vec![wider.to_string(), network.to_string()];
        prop_assert_eq!(match_network(inside, &candidates).unwrap(), wider);
    }

    /// Ranking reorders but never drops or invents candidates
    #[test]
    fn prop_rank_is_permutation(candidates in prop::collection::vec(candidate(), 0..8)) {
        let ranked = rank(candidates.clone());
        prop_assert_eq!(ranked.len(), candidates.len());
        for c in &candidates {
            let before = candidates.iter().filter(|x| *x == c).count();
            let after = ranked.iter().filter(|x| *x == c).count();
            prop_assert_eq!(before, after);
        }
    }

    /// Similarity is symmetric and maximal on identical candidates
    #[test]
    fn prop_similarity_symmetric(a in candidate(), b in candidate()) {
        prop_assert_eq!(similarity_score(&a, &b), similarity_score(&b, &a));
        prop_assert_eq!(similarity_score(&a, &a), SubnetCandidate::FIELD_NAMES.len());
    }
}

// Copyright (c) 2025 - Cowboy AI, Inc.
//! Foreman Adapter Tests
//!
//! The Foreman registry and fact source against a mocked HTTP API.
//!
//! Run with: cargo test --features foreman

#![cfg(feature = "foreman")]

mod fixtures;

use std::sync::Arc;

use fixtures::{h1_facts, options, session};

use cim_vcenter_ipam::adapters::{ForemanFactSource, ForemanRegistry};
use cim_vcenter_ipam::config::ForemanConfig;
use cim_vcenter_ipam::domain::facts::{ADDRESS, DNS_SERVERS, GATEWAY, NETMASK};
use cim_vcenter_ipam::domain::{FactFilter, FactValue, HostNetworkFact, Hostname, Ipv4Network, SubnetRecord};
use cim_vcenter_ipam::facts::{FactSource, FactSourceError, StaticFactSource};
use cim_vcenter_ipam::reconcile::{ReconciliationDriver, UpsertAction};
use cim_vcenter_ipam::registry::{RegistryClient, RegistryError};
use cim_vcenter_ipam::ErrorKind;
use serde_json::json;
use wiremock::matchers::{basic_auth, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> ForemanConfig {
    ForemanConfig {
        base_url: server.uri(),
        username: "admin".to_string(),
        password: "changeme".to_string(),
        ..Default::default()
    }
}

fn host(name: &str) -> Hostname {
    Hostname::new(name).unwrap()
}

fn network(cidr: &str) -> Ipv4Network {
    cidr.parse().unwrap()
}

fn subnet_json(id: u64, network: &str, mask: &str) -> serde_json::Value {
    json!({
        "id": id,
        "name": network,
        "network": network,
        "mask": mask,
        "gateway": "10.1.1.1",
        "dns_primary": "10.1.1.2",
        "dns_secondary": "10.1.1.3",
        "description": "vc01,DC1,C1,VLAN100"
    })
}

fn record() -> SubnetRecord {
    SubnetRecord {
        id: None,
        name: "10.1.1.0".into(),
        network: network("10.1.1.0/24"),
        gateway: "10.1.1.1".parse().unwrap(),
        dns_primary: "10.1.1.2".parse().unwrap(),
        dns_secondary: "10.1.1.3".parse().unwrap(),
        description: "vc01,DC1,C1,VLAN100".into(),
    }
}

async fn mount_host_lookup(server: &MockServer, name: &str, id: u64) {
    Mock::given(method("GET"))
        .and(path("/api/hosts"))
        .and(query_param("search", format!("name={}", name).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{ "id": id, "name": name }]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_find_subnet_filters_by_mask() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/subnets"))
        .and(query_param("search", "network=10.1.1.0"))
        .and(basic_auth("admin", "changeme"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                subnet_json(7, "10.1.1.0", "255.255.255.0"),
                subnet_json(8, "10.1.1.0", "255.255.0.0")
            ]
        })))
        .mount(&server)
        .await;

    let registry = ForemanRegistry::new(&config(&server)).unwrap();

    let found = registry.find_subnet_by_network(&network("10.1.1.0/24")).await.unwrap().unwrap();
    assert_eq!(found.id, Some(7));
    assert_eq!(found.description, "vc01,DC1,C1,VLAN100");

    let none = registry.find_subnet_by_network(&network("10.1.1.0/25")).await.unwrap();
    assert!(none.is_none());
}

#[tokio::test]
async fn test_find_subnet_skips_unreadable_siblings() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/subnets"))
        .and(query_param("search", "network=10.1.1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                subnet_json(3, "10.1.1.0", "255.255.254.0"),
                subnet_json(4, "10.1.1.0", "not-a-mask"),
                subnet_json(7, "10.1.1.0", "255.255.255.0")
            ]
        })))
        .mount(&server)
        .await;

    let registry = ForemanRegistry::new(&config(&server)).unwrap();

    let found = registry.find_subnet_by_network(&network("10.1.1.0/24")).await.unwrap().unwrap();
    assert_eq!(found.id, Some(7));
    assert!(found.same_content(&record()));
}

#[tokio::test]
async fn test_partial_existing_subnet_is_updated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/subnets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{
                "id": 5,
                "name": "legacy",
                "network": "10.1.1.0",
                "mask": "255.255.255.0",
                "gateway": "10.1.1.1",
                "dns_primary": "10.1.1.2",
                "dns_secondary": null,
                "description": null
            }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/subnets/5"))
        .and(body_partial_json(json!({
            "subnet": { "dns_secondary": "10.1.1.3", "description": "vc01,DC1,C1,VLAN100" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(subnet_json(5, "10.1.1.0", "255.255.255.0")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/subnets"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let registry = ForemanRegistry::new(&config(&server)).unwrap();

    let existing = registry.find_subnet_by_network(&network("10.1.1.0/24")).await.unwrap().unwrap();
    assert_eq!(existing.id, Some(5));
    assert!(!existing.same_content(&record()));

    // Reconciling the subnet repairs the record in place
    let source = StaticFactSource::new().with_host(host("h1.example.net"), h1_facts());
    let report = ReconciliationDriver::new(Arc::new(source), Arc::new(registry), session(), options())
        .run(vec![host("h1.example.net")])
        .await
        .unwrap();

    let outcome = report.subnet(&network("10.1.1.0/24")).unwrap();
    assert_eq!(outcome.action, UpsertAction::Updated);
    assert_eq!(outcome.record.as_ref().and_then(|r| r.id), Some(5));
}

#[tokio::test]
async fn test_duplicate_subnets_conflict() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/subnets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                subnet_json(7, "10.1.1.0", "255.255.255.0"),
                subnet_json(9, "10.1.1.0", "255.255.255.0")
            ]
        })))
        .mount(&server)
        .await;

    let registry = ForemanRegistry::new(&config(&server)).unwrap();
    let err = registry
        .find_subnet_by_network(&network("10.1.1.0/24"))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::Conflict(_)));
    assert_eq!(err.kind(), ErrorKind::RegistryConflict);
}

#[tokio::test]
async fn test_create_and_update_subnet() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/subnets"))
        .and(body_partial_json(json!({
            "subnet": { "network": "10.1.1.0", "mask": "255.255.255.0", "dns_secondary": "10.1.1.3" }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(subnet_json(11, "10.1.1.0", "255.255.255.0")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/subnets/11"))
        .respond_with(ResponseTemplate::new(200).set_body_json(subnet_json(11, "10.1.1.0", "255.255.255.0")))
        .expect(1)
        .mount(&server)
        .await;

    let registry = ForemanRegistry::new(&config(&server)).unwrap();

    let created = registry.create_subnet(&record()).await.unwrap();
    assert_eq!(created.id, Some(11));
    assert_eq!(created.network, network("10.1.1.0/24"));

    let updated = registry.update_subnet(11, &record()).await.unwrap();
    assert_eq!(updated.id, Some(11));
}

#[tokio::test]
async fn test_rejected_and_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/subnets"))
        .respond_with(ResponseTemplate::new(422).set_body_string("Network has already been taken"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/status"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let registry = ForemanRegistry::new(&config(&server)).unwrap();

    let err = registry.create_subnet(&record()).await.unwrap_err();
    match err {
        RegistryError::Rejected { status, ref body } => {
            assert_eq!(status, 422);
            assert!(body.contains("already been taken"));
        }
        other => panic!("unexpected error: {:?}", other),
    }

    let err = registry.health_check().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConnectivityFailure);
}

#[tokio::test]
async fn test_health_check() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "ok", "version": "3.9.0" })))
        .mount(&server)
        .await;

    let registry = ForemanRegistry::new(&config(&server)).unwrap();
    registry.health_check().await.unwrap();
}

#[tokio::test]
async fn test_list_hosts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/hosts"))
        .and(query_param("search", "name~example.net"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                { "id": 1, "name": "h1.example.net" },
                { "id": 2, "name": "h2.example.net" },
                { "id": 3, "name": "not a hostname" }
            ]
        })))
        .mount(&server)
        .await;

    let facts = ForemanFactSource::new(&config(&server)).unwrap();
    let hosts = facts.list_hosts("example.net").await.unwrap();
    assert_eq!(hosts, vec![host("h1.example.net"), host("h2.example.net")]);
}

#[tokio::test]
async fn test_host_facts_are_normalized() {
    let server = MockServer::start().await;
    mount_host_lookup(&server, "h1.example.net", 42).await;

    Mock::given(method("GET"))
        .and(path("/api/hosts/42/facts"))
        .and(query_param("search", "ansible_default_ipv4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": { "h1.example.net": {
                "ansible_default_ipv4::address": "10.1.1.10",
                "ansible_default_ipv4::netmask": "255.255.255.0",
                "ansible_default_ipv4::gateway": "10.1.1.1",
                "ansible_default_ipv4::network": "10.1.1.0",
                "ansible_default_ipv4::mtu": "1500"
            }}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/hosts/42/facts"))
        .and(query_param("search", "ansible_dns"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": { "h1.example.net": {
                "ansible_dns::nameservers": "['10.1.1.2', '10.1.1.3']"
            }}
        })))
        .mount(&server)
        .await;

    let source = ForemanFactSource::new(&config(&server)).unwrap();
    let h1 = host("h1.example.net");

    let ipv4 = source.host_facts(&h1, FactFilter::DefaultIpv4).await.unwrap();
    assert_eq!(ipv4.get(ADDRESS), Some(&FactValue::Text("10.1.1.10".into())));
    assert_eq!(ipv4.len(), 4);

    let all = source.all_facts(&h1).await.unwrap();
    assert!(all.contains_key(NETMASK));
    assert!(all.contains_key(GATEWAY));
    assert!(all.contains_key(DNS_SERVERS));

    let fact = HostNetworkFact::from_facts(h1, &all).unwrap();
    assert_eq!(fact.network, network("10.1.1.0/24"));
    assert_eq!(fact.dns_servers().count(), 2);
}

#[tokio::test]
async fn test_unknown_host() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/hosts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
        .mount(&server)
        .await;

    let source = ForemanFactSource::new(&config(&server)).unwrap();
    let err = source
        .host_facts(&host("ghost.example.net"), FactFilter::Dns)
        .await
        .unwrap_err();
    assert_eq!(err, FactSourceError::UnknownHost(host("ghost.example.net")));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// Copyright (c) 2025 - Cowboy AI, Inc.

//! Foreman / Satellite Adapter
//!
//! Foreman is both the fact source (Ansible facts uploaded per host) and
//! the IPAM registry (subnets) for the reconciler.
//!
//! # Endpoints
//!
//! ```text
//! list_hosts(domain)        = GET  /api/hosts?search=name~{domain}
//! host_facts(host, filter)  = GET  /api/hosts?search=name={host}
//!                             GET  /api/hosts/{id}/facts?search={filter}
//! find_subnet_by_network(n) = GET  /api/subnets?search=network={address}
//! create_subnet(r)          = POST /api/subnets         {"subnet": {...}}
//! update_subnet(id, r)      = PUT  /api/subnets/{id}    {"subnet": {...}}
//! health_check()            = GET  /api/status
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use cim_vcenter_ipam::adapters::{ForemanFactSource, ForemanRegistry};
//! use cim_vcenter_ipam::config::ForemanConfig;
//! use cim_vcenter_ipam::registry::RegistryClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ForemanConfig {
//!         base_url: "https://foreman.example.net".to_string(),
//!         password: "changeme".to_string(),
//!         ..Default::default()
//!     };
//!
//!     let registry = ForemanRegistry::new(&config)?;
//!     registry.health_check().await?;
//!     let facts = ForemanFactSource::new(&config)?;
//!
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ForemanConfig;
use crate::domain::{
    parse_ipv4, parse_netmask, FactFilter, FactMap, FactValue, Hostname, Ipv4Network, NetworkError,
    SubnetRecord,
};
use crate::facts::{FactResult, FactSource, FactSourceError};
use crate::registry::{RegistryClient, RegistryError, RegistryResult};

/// Foreman subnet representation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForemanSubnet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub name: String,
    pub network: String,
    pub mask: String,
    #[serde(default)]
    pub gateway: Option<String>,
    #[serde(default)]
    pub dns_primary: Option<String>,
    #[serde(default)]
    pub dns_secondary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl From<&SubnetRecord> for ForemanSubnet {
    fn from(record: &SubnetRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            network: record.network.network_address().to_string(),
            mask: record.mask().to_string(),
            gateway: Some(record.gateway.to_string()),
            dns_primary: Some(record.dns_primary.to_string()),
            dns_secondary: Some(record.dns_secondary.to_string()),
            description: Some(record.description.clone()),
        }
    }
}

impl ForemanSubnet {
    /// Network address and prefix as stored, without requiring a clean network
    fn key(&self) -> Result<(Ipv4Addr, u8), NetworkError> {
        Ok((parse_ipv4(&self.network)?, parse_netmask(&self.mask)?))
    }

    /// Read an existing subnet already matched to `network`
    ///
    /// Foreman allows gateway, DNS and description to be unset. Such a field
    /// reads as the unspecified address or an empty description, which never
    /// equals a derived record, so the next upsert overwrites it.
    fn into_existing(self, network: Ipv4Network) -> SubnetRecord {
        let name = &self.name;
        let address = |field: &str, value: &Option<String>| match value.as_deref().map(parse_ipv4) {
            Some(Ok(addr)) => addr,
            Some(Err(e)) => {
                warn!("Foreman subnet '{}' has an invalid {}: {}", name, field, e);
                Ipv4Addr::UNSPECIFIED
            }
            None => Ipv4Addr::UNSPECIFIED,
        };

        SubnetRecord {
            id: self.id,
            gateway: address("gateway", &self.gateway),
            dns_primary: address("dns_primary", &self.dns_primary),
            dns_secondary: address("dns_secondary", &self.dns_secondary),
            description: self.description.clone().unwrap_or_default(),
            name: self.name.clone(),
            network,
        }
    }
}

impl TryFrom<ForemanSubnet> for SubnetRecord {
    type Error = RegistryError;

    fn try_from(subnet: ForemanSubnet) -> Result<Self, Self::Error> {
        let invalid = |e: crate::domain::NetworkError| {
            RegistryError::InvalidRecord(format!("subnet '{}': {}", subnet.name, e))
        };
        let address = |field: &Option<String>| -> Result<_, RegistryError> {
            parse_ipv4(field.as_deref().unwrap_or_default()).map_err(invalid)
        };

        let prefix = parse_netmask(&subnet.mask).map_err(invalid)?;
        let network = Ipv4Network::new(parse_ipv4(&subnet.network).map_err(invalid)?, prefix)
            .map_err(invalid)?;

        Ok(SubnetRecord {
            id: subnet.id,
            name: subnet.name.clone(),
            network,
            gateway: address(&subnet.gateway)?,
            dns_primary: address(&subnet.dns_primary)?,
            dns_secondary: address(&subnet.dns_secondary)?,
            description: subnet.description.clone().unwrap_or_default(),
        })
    }
}

#[derive(Debug, Serialize)]
struct SubnetEnvelope {
    subnet: ForemanSubnet,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    results: T,
}

#[derive(Debug, Deserialize)]
struct HostSummary {
    id: u64,
    name: String,
}

/// Shared HTTP plumbing
#[derive(Debug, Clone)]
struct ForemanApi {
    config: ForemanConfig,
    client: Client,
}

impl ForemanApi {
    fn new(config: &ForemanConfig) -> Result<Self, reqwest::Error> {
        info!("Connecting to Foreman at {}", config.base_url);
        if !config.verify_tls {
            warn!("TLS certificate verification disabled for {}", config.base_url);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()?;

        Ok(Self {
            config: config.clone(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn search_url(&self, path: &str, search: &str) -> String {
        format!(
            "{}?search={}&per_page={}",
            self.url(path),
            urlencoding::encode(search),
            self.config.per_page
        )
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.config.username, Some(&self.config.password))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, HttpFailure> {
        let response = self
            .authed(self.client.get(url))
            .send()
            .await
            .map_err(|e| HttpFailure::Transport(e.to_string()))?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, HttpFailure> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HttpFailure::Status(status, body));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| HttpFailure::Decode(e.to_string()))
    }
}

enum HttpFailure {
    Transport(String),
    Status(StatusCode, String),
    Decode(String),
}

impl From<HttpFailure> for RegistryError {
    fn from(failure: HttpFailure) -> Self {
        match failure {
            HttpFailure::Transport(e) => RegistryError::Unavailable(e),
            HttpFailure::Status(status, body) if status.is_server_error() => {
                RegistryError::Unavailable(format!("Foreman returned {}: {}", status, body))
            }
            HttpFailure::Status(status, body) => RegistryError::Rejected {
                status: status.as_u16(),
                body,
            },
            HttpFailure::Decode(e) => RegistryError::InvalidRecord(e),
        }
    }
}

impl From<HttpFailure> for FactSourceError {
    fn from(failure: HttpFailure) -> Self {
        match failure {
            HttpFailure::Transport(e) => FactSourceError::Unavailable(e),
            HttpFailure::Status(status, body) => {
                FactSourceError::Unavailable(format!("Foreman returned {}: {}", status, body))
            }
            HttpFailure::Decode(e) => FactSourceError::InvalidResponse(e),
        }
    }
}

/// Foreman subnets as the IPAM registry
#[derive(Debug, Clone)]
pub struct ForemanRegistry {
    api: ForemanApi,
}

impl ForemanRegistry {
    pub fn new(config: &ForemanConfig) -> RegistryResult<Self> {
        let api = ForemanApi::new(config)
            .map_err(|e| RegistryError::Unavailable(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { api })
    }

    async fn send_subnet(&self, request: RequestBuilder, record: &SubnetRecord) -> RegistryResult<SubnetRecord> {
        let envelope = SubnetEnvelope {
            subnet: ForemanSubnet {
                id: None,
                ..ForemanSubnet::from(record)
            },
        };
        let response = self
            .api
            .authed(request)
            .json(&envelope)
            .send()
            .await
            .map_err(|e| RegistryError::Unavailable(format!("Foreman API error: {}", e)))?;

        let stored: ForemanSubnet = ForemanApi::decode(response).await?;
        SubnetRecord::try_from(stored)
    }
}

#[async_trait]
impl RegistryClient for ForemanRegistry {
    async fn find_subnet_by_network(&self, network: &Ipv4Network) -> RegistryResult<Option<SubnetRecord>> {
        let url = self
            .api
            .search_url("/api/subnets", &format!("network={}", network.network_address()));
        let page: Page<Vec<ForemanSubnet>> = self.api.get_json(&url).await?;

        // The search matches the network address only; masks may differ
        let wanted = (network.network_address(), network.prefix_len());
        let mut matches = Vec::new();
        for subnet in page.results {
            match subnet.key() {
                Ok(key) if key == wanted => matches.push(subnet.into_existing(*network)),
                Ok((address, prefix)) => {
                    debug!("Foreman subnet '{}' is {}/{}, not {}", subnet.name, address, prefix, network)
                }
                Err(e) => warn!("Skipping Foreman subnet '{}': {}", subnet.name, e),
            }
        }

        match matches.len() {
            0 | 1 => {
                debug!("Subnet lookup for {}: {} match", network, matches.len());
                Ok(matches.pop())
            }
            n => Err(RegistryError::Conflict(format!(
                "{} matches {} Foreman subnets",
                network, n
            ))),
        }
    }

    async fn create_subnet(&self, record: &SubnetRecord) -> RegistryResult<SubnetRecord> {
        let request = self.api.client.post(self.api.url("/api/subnets"));
        let stored = self.send_subnet(request, record).await?;
        info!("Created Foreman subnet {} ({})", stored.network, stored.description);
        Ok(stored)
    }

    async fn update_subnet(&self, id: u64, record: &SubnetRecord) -> RegistryResult<SubnetRecord> {
        let request = self.api.client.put(self.api.url(&format!("/api/subnets/{}", id)));
        let stored = self.send_subnet(request, record).await?;
        info!("Updated Foreman subnet {} ({})", id, stored.network);
        Ok(stored)
    }

    async fn health_check(&self) -> RegistryResult<()> {
        let url = self.api.url("/api/status");
        let _: serde_json::Value = self
            .api
            .get_json(&url)
            .await
            .map_err(|failure| match RegistryError::from(failure) {
                RegistryError::Unavailable(e) => RegistryError::Unavailable(e),
                other => RegistryError::Unavailable(other.to_string()),
            })?;
        debug!("Foreman health check passed");
        Ok(())
    }

    fn name(&self) -> &str {
        "foreman"
    }
}

/// Foreman's uploaded Ansible facts as the fact source
#[derive(Debug, Clone)]
pub struct ForemanFactSource {
    api: ForemanApi,
}

impl ForemanFactSource {
    pub fn new(config: &ForemanConfig) -> FactResult<Self> {
        let api = ForemanApi::new(config).map_err(|e| {
            FactSourceError::Unavailable(format!("Failed to create HTTP client: {}", e))
        })?;
        Ok(Self { api })
    }

    async fn host_id(&self, host: &Hostname) -> FactResult<u64> {
        let url = self.api.search_url("/api/hosts", &format!("name={}", host));
        let page: Page<Vec<HostSummary>> = self.api.get_json(&url).await?;
        page.results
            .into_iter()
            .find(|h| h.name.eq_ignore_ascii_case(host.as_str()))
            .map(|h| h.id)
            .ok_or_else(|| FactSourceError::UnknownHost(host.clone()))
    }
}

fn fact_value(value: serde_json::Value) -> Option<FactValue> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(FactValue::Text(s)),
        serde_json::Value::Array(items) => Some(FactValue::List(
            items
                .into_iter()
                .map(|item| match item {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect(),
        )),
        other => Some(FactValue::Text(other.to_string())),
    }
}

#[async_trait]
impl FactSource for ForemanFactSource {
    async fn list_hosts(&self, domain: &str) -> FactResult<Vec<Hostname>> {
        let url = self.api.search_url("/api/hosts", &format!("name~{}", domain));
        let page: Page<Vec<HostSummary>> = self.api.get_json(&url).await?;

        let mut hosts = Vec::with_capacity(page.results.len());
        for summary in page.results {
            match Hostname::new(&summary.name) {
                Ok(host) => hosts.push(host),
                Err(e) => warn!("Ignoring Foreman host '{}': {}", summary.name, e),
            }
        }
        info!("Found {} hosts matching {}", hosts.len(), domain);
        Ok(hosts)
    }

    async fn host_facts(&self, host: &Hostname, filter: FactFilter) -> FactResult<FactMap> {
        let id = self.host_id(host).await?;
        let url = self
            .api
            .search_url(&format!("/api/hosts/{}/facts", id), filter.search_term());
        let page: Page<serde_json::Map<String, serde_json::Value>> = self.api.get_json(&url).await?;

        // Results are keyed by the host's name as Foreman stores it
        let raw = page
            .results
            .into_iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(host.as_str()))
            .map(|(_, facts)| facts)
            .unwrap_or(serde_json::Value::Null);

        let mut facts = FactMap::new();
        if let serde_json::Value::Object(entries) = raw {
            for (key, value) in entries {
                if let (Some(normalized), Some(value)) = (filter.normalize_key(&key), fact_value(value)) {
                    facts.insert(normalized.to_string(), value);
                }
            }
        }
        debug!("{} {} facts for {}", facts.len(), filter.search_term(), host);
        Ok(facts)
    }

    fn name(&self) -> &str {
        "foreman"
    }
}

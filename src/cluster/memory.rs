//! In-process cluster provider
//!
//! Keeps roles, clusters and ingress rules in memory. A cluster reports
//! `creating` for a configurable number of polls before turning
//! `available`, which is enough to drive the provisioner end to end without
//! a cloud account.

use super::provider::{ClusterProvider, ProviderError};
use super::types::{ClusterDescription, ClusterSpec, ClusterStatus, Endpoint, IngressRule};
use crate::types::JsonValue;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug)]
struct RoleEntry {
    arn: String,
    policies: BTreeSet<String>,
}

#[derive(Debug)]
struct ClusterEntry {
    region: String,
    port: u16,
    polls: u32,
    status: ClusterStatus,
}

#[derive(Debug, Default)]
struct MemoryState {
    roles: BTreeMap<String, RoleEntry>,
    clusters: BTreeMap<String, ClusterEntry>,
    ingress: BTreeMap<String, BTreeSet<IngressRule>>,
    failing: HashSet<String>,
    calls: Vec<String>,
}

/// [`ClusterProvider`] backed by process memory
#[derive(Debug)]
pub struct InMemoryClusterProvider {
    polls_until_available: Option<u32>,
    state: Mutex<MemoryState>,
}

impl Default for InMemoryClusterProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryClusterProvider {
    /// Clusters become available on the first poll after creation
    pub fn new() -> Self {
        Self::with_polls_until_available(1)
    }

    /// Clusters stay `creating` for `polls - 1` polls
    pub fn with_polls_until_available(polls: u32) -> Self {
        Self {
            polls_until_available: Some(polls),
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Clusters never leave `creating`
    pub fn never_available() -> Self {
        Self {
            polls_until_available: None,
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Make the named cluster report `failed` once created
    pub fn fail_cluster(self, identifier: &str) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.failing.insert(identifier.to_string());
        }
        self
    }

    /// Whether a role exists
    pub fn role_exists(&self, name: &str) -> bool {
        self.lock()
            .map(|state| state.roles.contains_key(name))
            .unwrap_or(false)
    }

    /// Policies attached to a role
    pub fn role_policies(&self, name: &str) -> Vec<String> {
        self.lock()
            .ok()
            .and_then(|state| {
                state
                    .roles
                    .get(name)
                    .map(|role| role.policies.iter().cloned().collect())
            })
            .unwrap_or_default()
    }

    /// Whether a cluster exists
    pub fn cluster_exists(&self, identifier: &str) -> bool {
        self.lock()
            .map(|state| state.clusters.contains_key(identifier))
            .unwrap_or(false)
    }

    /// Ingress rules authorized on a cluster
    pub fn ingress_rules(&self, identifier: &str) -> Vec<IngressRule> {
        self.lock()
            .ok()
            .and_then(|state| {
                state
                    .ingress
                    .get(identifier)
                    .map(|rules| rules.iter().cloned().collect())
            })
            .unwrap_or_default()
    }

    /// Provider calls in the order they were made
    pub fn calls(&self) -> Vec<String> {
        self.lock()
            .map(|state| state.calls.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, ProviderError> {
        self.state
            .lock()
            .map_err(|_| ProviderError::Other("provider state lock poisoned".to_string()))
    }

    fn record(&self, call: String) -> Result<MutexGuard<'_, MemoryState>, ProviderError> {
        let mut state = self.lock()?;
        state.calls.push(call);
        Ok(state)
    }
}

fn role_arn(name: &str) -> String {
    format!("arn:aws:iam::000000000000:role/{name}")
}

#[async_trait]
impl ClusterProvider for InMemoryClusterProvider {
    async fn create_role(
        &self,
        name: &str,
        _trust_policy: &JsonValue,
    ) -> Result<String, ProviderError> {
        let mut state = self.record(format!("create_role {name}"))?;
        if state.roles.contains_key(name) {
            return Err(ProviderError::AlreadyExists(format!("role {name}")));
        }
        let arn = role_arn(name);
        state.roles.insert(
            name.to_string(),
            RoleEntry {
                arn: arn.clone(),
                policies: BTreeSet::new(),
            },
        );
        Ok(arn)
    }

    async fn get_role(&self, name: &str) -> Result<String, ProviderError> {
        let state = self.record(format!("get_role {name}"))?;
        state
            .roles
            .get(name)
            .map(|role| role.arn.clone())
            .ok_or_else(|| ProviderError::NotFound(format!("role {name}")))
    }

    async fn attach_role_policy(&self, role: &str, policy_arn: &str) -> Result<(), ProviderError> {
        let mut state = self.record(format!("attach_role_policy {role}"))?;
        let entry = state
            .roles
            .get_mut(role)
            .ok_or_else(|| ProviderError::NotFound(format!("role {role}")))?;
        entry.policies.insert(policy_arn.to_string());
        Ok(())
    }

    async fn detach_role_policy(&self, role: &str, policy_arn: &str) -> Result<(), ProviderError> {
        let mut state = self.record(format!("detach_role_policy {role}"))?;
        let entry = state
            .roles
            .get_mut(role)
            .ok_or_else(|| ProviderError::NotFound(format!("role {role}")))?;
        if entry.policies.remove(policy_arn) {
            Ok(())
        } else {
            Err(ProviderError::NotFound(format!("policy {policy_arn}")))
        }
    }

    async fn delete_role(&self, role: &str) -> Result<(), ProviderError> {
        let mut state = self.record(format!("delete_role {role}"))?;
        match state.roles.get(role) {
            None => Err(ProviderError::NotFound(format!("role {role}"))),
            Some(entry) if !entry.policies.is_empty() => Err(ProviderError::Other(format!(
                "role {role} still has attached policies"
            ))),
            Some(_) => {
                state.roles.remove(role);
                Ok(())
            }
        }
    }

    async fn create_cluster(
        &self,
        spec: &ClusterSpec,
        role_arn: &str,
    ) -> Result<(), ProviderError> {
        let mut state = self.record(format!("create_cluster {}", spec.identifier))?;
        if state.clusters.contains_key(&spec.identifier) {
            return Err(ProviderError::AlreadyExists(format!(
                "cluster {}",
                spec.identifier
            )));
        }
        if !state.roles.values().any(|role| role.arn == role_arn) {
            return Err(ProviderError::Other(format!("unknown role {role_arn}")));
        }

        let status = if state.failing.contains(&spec.identifier) {
            ClusterStatus::Failed
        } else {
            ClusterStatus::Creating
        };
        state.clusters.insert(
            spec.identifier.clone(),
            ClusterEntry {
                region: spec.region.clone(),
                port: spec.db_port,
                polls: 0,
                status,
            },
        );
        Ok(())
    }

    async fn describe_cluster(
        &self,
        identifier: &str,
    ) -> Result<ClusterDescription, ProviderError> {
        let mut state = self.record(format!("describe_cluster {identifier}"))?;
        let threshold = self.polls_until_available;
        let entry = state
            .clusters
            .get_mut(identifier)
            .ok_or_else(|| ProviderError::NotFound(format!("cluster {identifier}")))?;

        entry.polls += 1;
        if entry.status == ClusterStatus::Creating
            && threshold.is_some_and(|polls| entry.polls >= polls)
        {
            entry.status = ClusterStatus::Available;
        }

        let endpoint = (entry.status == ClusterStatus::Available).then(|| Endpoint {
            address: format!(
                "{}.abc123.{}.redshift.amazonaws.com",
                identifier.to_ascii_lowercase(),
                entry.region
            ),
            port: entry.port,
        });

        Ok(ClusterDescription {
            identifier: identifier.to_string(),
            status: entry.status.clone(),
            endpoint,
        })
    }

    async fn delete_cluster(
        &self,
        identifier: &str,
        _skip_final_snapshot: bool,
    ) -> Result<(), ProviderError> {
        let mut state = self.record(format!("delete_cluster {identifier}"))?;
        if state.clusters.remove(identifier).is_none() {
            return Err(ProviderError::NotFound(format!("cluster {identifier}")));
        }
        state.ingress.remove(identifier);
        Ok(())
    }

    async fn authorize_ingress(
        &self,
        identifier: &str,
        rule: &IngressRule,
    ) -> Result<(), ProviderError> {
        let mut state = self.record(format!("authorize_ingress {identifier}"))?;
        if !state.clusters.contains_key(identifier) {
            return Err(ProviderError::NotFound(format!("cluster {identifier}")));
        }
        let rules = state.ingress.entry(identifier.to_string()).or_default();
        if rules.insert(rule.clone()) {
            Ok(())
        } else {
            Err(ProviderError::DuplicateIngress)
        }
    }
}

//! Cluster types

use crate::config::ClusterConfig;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Everything needed to create (and later tear down) a warehouse cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSpec {
    pub identifier: String,
    pub cluster_type: String,
    pub node_type: String,
    pub num_nodes: u32,
    pub db_name: String,
    pub db_user: String,
    pub db_password: String,
    pub db_port: u16,
    pub iam_role_name: String,
    pub region: String,
    pub ingress_cidr: String,
    /// Delay between status polls
    pub poll_interval: Duration,
    /// Upper bound for the whole wait
    pub timeout: Duration,
}

impl From<&ClusterConfig> for ClusterSpec {
    fn from(config: &ClusterConfig) -> Self {
        Self {
            identifier: config.identifier.clone(),
            cluster_type: config.cluster_type.clone(),
            node_type: config.node_type.clone(),
            num_nodes: config.num_nodes,
            db_name: config.db_name.clone(),
            db_user: config.db_user.clone(),
            db_password: config.db_password.clone(),
            db_port: config.db_port,
            iam_role_name: config.iam_role_name.clone(),
            region: config.region.clone(),
            ingress_cidr: config.ingress_cidr.clone(),
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

impl ClusterSpec {
    /// Ingress rule opening the database port to the configured CIDR
    pub fn ingress_rule(&self) -> IngressRule {
        IngressRule {
            cidr: self.ingress_cidr.clone(),
            protocol: "tcp".to_string(),
            port: self.db_port,
        }
    }
}

/// Cluster lifecycle status as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterStatus {
    Creating,
    Available,
    Modifying,
    Deleting,
    Failed,
    /// Anything else, verbatim
    Other(String),
}

impl ClusterStatus {
    /// Parse a provider status string
    pub fn parse(status: &str) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "creating" => Self::Creating,
            "available" => Self::Available,
            "modifying" => Self::Modifying,
            "deleting" => Self::Deleting,
            "failed" => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }

    /// Status string
    pub fn as_str(&self) -> &str {
        match self {
            Self::Creating => "creating",
            Self::Available => "available",
            Self::Modifying => "modifying",
            Self::Deleting => "deleting",
            Self::Failed => "failed",
            Self::Other(other) => other,
        }
    }

    /// Whether the cluster can no longer become available
    pub fn is_terminal_failure(&self) -> bool {
        match self {
            Self::Failed | Self::Deleting => true,
            Self::Other(other) => other.starts_with("incompatible-"),
            _ => false,
        }
    }
}

impl fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Database endpoint of an available cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    pub address: String,
    pub port: u16,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// Result of a status poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterDescription {
    pub identifier: String,
    pub status: ClusterStatus,
    /// Only present once the cluster is available
    pub endpoint: Option<Endpoint>,
}

/// A cluster ready to accept connections
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionedCluster {
    pub identifier: String,
    pub endpoint: Endpoint,
    /// Role the cluster uses to read the input bucket
    pub role_arn: String,
}

/// Inbound rule for the cluster's network security group
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct IngressRule {
    pub cidr: String,
    pub protocol: String,
    pub port: u16,
}

//! Cluster provider seam
//!
//! The provisioner only talks to a [`ClusterProvider`]. Implementations map
//! their backend's failures onto [`ProviderError`] so that "already exists"
//! and "not found" can be told apart from real failures.

use super::types::{ClusterDescription, ClusterSpec, IngressRule};
use crate::error::Error;
use crate::types::JsonValue;
use async_trait::async_trait;
use serde_json::json;
use thiserror::Error as ThisError;

/// Managed policy granting read-only access to object storage
pub const S3_READ_ONLY_POLICY_ARN: &str = "arn:aws:iam::aws:policy/AmazonS3ReadOnlyAccess";

/// Trust policy letting the warehouse service assume the role
pub fn warehouse_trust_policy() -> JsonValue {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Service": "redshift.amazonaws.com" },
            "Action": "sts:AssumeRole"
        }]
    })
}

/// Failure reported by a cluster provider
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum ProviderError {
    /// The entity to create already exists
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// The entity does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// The ingress rule is already present
    #[error("ingress rule already authorized")]
    DuplicateIngress,

    /// Anything else
    #[error("{0}")]
    Other(String),
}

impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        Error::cluster(err.to_string())
    }
}

/// Operations the provisioner needs from a cloud backend
#[async_trait]
pub trait ClusterProvider: Send + Sync {
    /// Create a role with the given trust policy, returning its ARN
    async fn create_role(
        &self,
        name: &str,
        trust_policy: &JsonValue,
    ) -> Result<String, ProviderError>;

    /// Look up an existing role's ARN
    async fn get_role(&self, name: &str) -> Result<String, ProviderError>;

    /// Attach a managed policy to a role
    async fn attach_role_policy(&self, role: &str, policy_arn: &str) -> Result<(), ProviderError>;

    /// Detach a managed policy from a role
    async fn detach_role_policy(&self, role: &str, policy_arn: &str) -> Result<(), ProviderError>;

    /// Delete a role
    async fn delete_role(&self, role: &str) -> Result<(), ProviderError>;

    /// Start creating a cluster
    async fn create_cluster(&self, spec: &ClusterSpec, role_arn: &str) -> Result<(), ProviderError>;

    /// Current status of a cluster
    async fn describe_cluster(&self, identifier: &str) -> Result<ClusterDescription, ProviderError>;

    /// Delete a cluster
    async fn delete_cluster(
        &self,
        identifier: &str,
        skip_final_snapshot: bool,
    ) -> Result<(), ProviderError>;

    /// Open an inbound rule on the cluster's security group
    async fn authorize_ingress(
        &self,
        identifier: &str,
        rule: &IngressRule,
    ) -> Result<(), ProviderError>;
}

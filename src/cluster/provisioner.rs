//! Idempotent cluster provisioning and teardown

use super::provider::{
    warehouse_trust_policy, ClusterProvider, ProviderError, S3_READ_ONLY_POLICY_ARN,
};
use super::types::{ClusterDescription, ClusterSpec, ClusterStatus, ProvisionedCluster};
use crate::error::{Error, Result};
use tracing::{debug, info};

/// Drives a [`ClusterProvider`] through provisioning and teardown
///
/// Every step tolerates the state it would create already being there, so
/// provisioning can simply be rerun after a partial failure.
pub struct ClusterProvisioner<P: ClusterProvider> {
    provider: P,
}

impl<P: ClusterProvider> ClusterProvisioner<P> {
    /// Create a provisioner over a provider
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// The wrapped provider
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Create the role, the cluster and the ingress rule, then wait until the
    /// cluster is available
    pub async fn provision_cluster(&self, spec: &ClusterSpec) -> Result<ProvisionedCluster> {
        let role_arn = self.ensure_role(&spec.iam_role_name).await?;

        match self.provider.create_cluster(spec, &role_arn).await {
            Ok(()) => info!("Creating cluster {}", spec.identifier),
            Err(ProviderError::AlreadyExists(_)) => {
                info!("Cluster {} already exists", spec.identifier);
            }
            Err(e) => return Err(e.into()),
        }

        let description = self.wait_until_available(spec).await?;
        let endpoint = description.endpoint.ok_or_else(|| {
            Error::cluster(format!(
                "cluster {} is available but reports no endpoint",
                spec.identifier
            ))
        })?;

        match self
            .provider
            .authorize_ingress(&spec.identifier, &spec.ingress_rule())
            .await
        {
            Ok(()) => info!(
                "Opened port {} to {} on {}",
                spec.db_port, spec.ingress_cidr, spec.identifier
            ),
            Err(ProviderError::DuplicateIngress) => {
                debug!("Ingress rule for {} already present", spec.identifier);
            }
            Err(e) => return Err(e.into()),
        }

        info!("Cluster {} available at {}", spec.identifier, endpoint);
        Ok(ProvisionedCluster {
            identifier: spec.identifier.clone(),
            endpoint,
            role_arn,
        })
    }

    /// Delete the cluster (without a final snapshot), detach the storage
    /// policy and delete the role; missing pieces are skipped
    pub async fn teardown_cluster(&self, identifier: &str, role_name: &str) -> Result<()> {
        match self.provider.delete_cluster(identifier, true).await {
            Ok(()) => info!("Deleting cluster {}", identifier),
            Err(ProviderError::NotFound(_)) => debug!("Cluster {} already gone", identifier),
            Err(e) => return Err(e.into()),
        }

        match self
            .provider
            .detach_role_policy(role_name, S3_READ_ONLY_POLICY_ARN)
            .await
        {
            Ok(()) | Err(ProviderError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        match self.provider.delete_role(role_name).await {
            Ok(()) => info!("Deleted role {}", role_name),
            Err(ProviderError::NotFound(_)) => debug!("Role {} already gone", role_name),
            Err(e) => return Err(e.into()),
        }

        Ok(())
    }

    /// Create the role or reuse an existing one, and attach the storage policy
    async fn ensure_role(&self, name: &str) -> Result<String> {
        let arn = match self
            .provider
            .create_role(name, &warehouse_trust_policy())
            .await
        {
            Ok(arn) => {
                info!("Created role {}", name);
                arn
            }
            Err(ProviderError::AlreadyExists(_)) => {
                debug!("Role {} already exists", name);
                self.provider.get_role(name).await?
            }
            Err(e) => return Err(e.into()),
        };

        match self
            .provider
            .attach_role_policy(name, S3_READ_ONLY_POLICY_ARN)
            .await
        {
            Ok(()) | Err(ProviderError::AlreadyExists(_)) => Ok(arn),
            Err(e) => Err(e.into()),
        }
    }

    /// Poll until available, bounded by `spec.timeout`
    async fn wait_until_available(&self, spec: &ClusterSpec) -> Result<ClusterDescription> {
        tokio::time::timeout(spec.timeout, self.poll_until_available(spec))
            .await
            .map_err(|_| Error::ProvisionTimeout {
                cluster_id: spec.identifier.clone(),
                timeout_secs: spec.timeout.as_secs(),
            })?
    }

    async fn poll_until_available(&self, spec: &ClusterSpec) -> Result<ClusterDescription> {
        loop {
            let description = self.provider.describe_cluster(&spec.identifier).await?;
            if description.status == ClusterStatus::Available {
                return Ok(description);
            }
            if description.status.is_terminal_failure() {
                return Err(Error::ClusterFailed {
                    cluster_id: spec.identifier.clone(),
                    status: description.status.to_string(),
                });
            }

            debug!(
                "Cluster {} is {}, next poll in {:?}",
                spec.identifier, description.status, spec.poll_interval
            );
            tokio::time::sleep(spec.poll_interval).await;
        }
    }
}

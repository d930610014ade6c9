//! Warehouse cluster provisioning
//!
//! Creates the role, cluster and ingress rule a columnar warehouse needs
//! before the row store can load into it, and tears them down again.
//!
//! The cloud backend sits behind [`ClusterProvider`]. [`ClusterProvisioner`]
//! only encodes the ordering and the idempotency rules:
//!
//! - an existing role is reused and the storage policy attached again
//! - an existing cluster is waited on rather than recreated
//! - a duplicate ingress rule is not an error
//! - teardown skips anything already gone
//!
//! [`InMemoryClusterProvider`] implements the seam in process.

mod memory;
mod provider;
mod provisioner;
mod types;

pub use memory::InMemoryClusterProvider;
pub use provider::{
    warehouse_trust_policy, ClusterProvider, ProviderError, S3_READ_ONLY_POLICY_ARN,
};
pub use provisioner::ClusterProvisioner;
pub use types::{
    ClusterDescription, ClusterSpec, ClusterStatus, Endpoint, IngressRule, ProvisionedCluster,
};

#[cfg(test)]
mod tests;

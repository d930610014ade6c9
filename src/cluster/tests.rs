//! Tests for cluster module

use super::*;
use crate::config::ClusterConfig;
use crate::error::Error;
use pretty_assertions::assert_eq;
use std::time::Duration;
use test_case::test_case;

fn spec(identifier: &str) -> ClusterSpec {
    ClusterSpec {
        identifier: identifier.to_string(),
        cluster_type: "multi-node".to_string(),
        node_type: "dc2.large".to_string(),
        num_nodes: 4,
        db_name: "dwh".to_string(),
        db_user: "dwhuser".to_string(),
        db_password: "Passw0rd".to_string(),
        db_port: 5439,
        iam_role_name: "dwhRole".to_string(),
        region: "us-west-2".to_string(),
        ingress_cidr: "0.0.0.0/0".to_string(),
        poll_interval: Duration::from_millis(1),
        timeout: Duration::from_millis(500),
    }
}

// ============================================================================
// Status Tests
// ============================================================================

#[test_case("available", ClusterStatus::Available, false)]
#[test_case("Creating", ClusterStatus::Creating, false)]
#[test_case("failed", ClusterStatus::Failed, true)]
#[test_case("deleting", ClusterStatus::Deleting, true)]
#[test_case("incompatible-network", ClusterStatus::Other("incompatible-network".to_string()), true)]
#[test_case("rebooting", ClusterStatus::Other("rebooting".to_string()), false)]
fn test_status_parse(raw: &str, expected: ClusterStatus, terminal: bool) {
    let status = ClusterStatus::parse(raw);
    assert_eq!(status, expected);
    assert_eq!(status.is_terminal_failure(), terminal);
}

#[test]
fn test_spec_from_config() {
    let config = ClusterConfig {
        identifier: "dwhCluster".to_string(),
        cluster_type: "multi-node".to_string(),
        node_type: "dc2.large".to_string(),
        num_nodes: 4,
        db_name: "dwh".to_string(),
        db_user: "dwhuser".to_string(),
        db_password: "Passw0rd".to_string(),
        db_port: 5439,
        iam_role_name: "dwhRole".to_string(),
        region: "us-west-2".to_string(),
        ingress_cidr: "10.0.0.0/16".to_string(),
        poll_interval_secs: 15,
        timeout_secs: 900,
    };
    let spec = ClusterSpec::from(&config);
    assert_eq!(spec.poll_interval, Duration::from_secs(15));
    assert_eq!(spec.timeout, Duration::from_secs(900));
    assert_eq!(
        spec.ingress_rule(),
        IngressRule {
            cidr: "10.0.0.0/16".to_string(),
            protocol: "tcp".to_string(),
            port: 5439,
        }
    );
}

#[test]
fn test_trust_policy_names_warehouse_service() {
    let policy = warehouse_trust_policy();
    assert_eq!(
        policy["Statement"][0]["Principal"]["Service"],
        "redshift.amazonaws.com"
    );
    assert_eq!(policy["Statement"][0]["Action"], "sts:AssumeRole");
}

// ============================================================================
// Provisioning Tests
// ============================================================================

#[tokio::test]
async fn test_provision_happy_path() {
    let provisioner =
        ClusterProvisioner::new(InMemoryClusterProvider::with_polls_until_available(3));
    let cluster = provisioner.provision_cluster(&spec("dwhCluster")).await.unwrap();

    assert_eq!(cluster.identifier, "dwhCluster");
    assert_eq!(cluster.role_arn, "arn:aws:iam::000000000000:role/dwhRole");
    assert_eq!(
        cluster.endpoint.to_string(),
        "dwhcluster.abc123.us-west-2.redshift.amazonaws.com:5439"
    );

    let provider = provisioner.provider();
    assert_eq!(provider.role_policies("dwhRole"), vec![S3_READ_ONLY_POLICY_ARN]);
    assert_eq!(provider.ingress_rules("dwhCluster").len(), 1);

    let polls = provider
        .calls()
        .iter()
        .filter(|c| c.starts_with("describe_cluster"))
        .count();
    assert_eq!(polls, 3);
}

#[tokio::test]
async fn test_provision_twice_is_idempotent() {
    let provisioner = ClusterProvisioner::new(InMemoryClusterProvider::new());
    let first = provisioner.provision_cluster(&spec("dwhCluster")).await.unwrap();
    let second = provisioner.provision_cluster(&spec("dwhCluster")).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(provisioner.provider().ingress_rules("dwhCluster").len(), 1);
}

#[tokio::test]
async fn test_existing_role_is_reused() {
    let provider = InMemoryClusterProvider::new();
    let arn = provider
        .create_role("dwhRole", &warehouse_trust_policy())
        .await
        .unwrap();

    let provisioner = ClusterProvisioner::new(provider);
    let cluster = provisioner.provision_cluster(&spec("dwhCluster")).await.unwrap();
    assert_eq!(cluster.role_arn, arn);
    assert!(provisioner
        .provider()
        .calls()
        .contains(&"get_role dwhRole".to_string()));
}

#[tokio::test]
async fn test_duplicate_ingress_tolerated() {
    let provider = InMemoryClusterProvider::new();
    let spec = spec("dwhCluster");
    let provisioner = ClusterProvisioner::new(provider);
    provisioner.provision_cluster(&spec).await.unwrap();

    let err = provisioner
        .provider()
        .authorize_ingress(&spec.identifier, &spec.ingress_rule())
        .await
        .unwrap_err();
    assert_eq!(err, ProviderError::DuplicateIngress);

    assert!(provisioner.provision_cluster(&spec).await.is_ok());
}

#[tokio::test]
async fn test_never_available_times_out() {
    let provisioner = ClusterProvisioner::new(InMemoryClusterProvider::never_available());
    let mut spec = spec("dwhCluster");
    spec.poll_interval = Duration::from_millis(5);
    spec.timeout = Duration::from_millis(50);

    let err = provisioner.provision_cluster(&spec).await.unwrap_err();
    assert!(
        matches!(err, Error::ProvisionTimeout { ref cluster_id, .. } if cluster_id == "dwhCluster")
    );
    assert!(provisioner.provider().ingress_rules("dwhCluster").is_empty());
}

#[tokio::test]
async fn test_failed_cluster_stops_polling() {
    let provisioner =
        ClusterProvisioner::new(InMemoryClusterProvider::new().fail_cluster("dwhCluster"));

    let err = provisioner
        .provision_cluster(&spec("dwhCluster"))
        .await
        .unwrap_err();
    match err {
        Error::ClusterFailed { cluster_id, status } => {
            assert_eq!(cluster_id, "dwhCluster");
            assert_eq!(status, "failed");
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ============================================================================
// Teardown Tests
// ============================================================================

#[tokio::test]
async fn test_teardown_removes_everything() {
    let provisioner = ClusterProvisioner::new(InMemoryClusterProvider::new());
    provisioner.provision_cluster(&spec("dwhCluster")).await.unwrap();

    provisioner
        .teardown_cluster("dwhCluster", "dwhRole")
        .await
        .unwrap();

    let provider = provisioner.provider();
    assert!(!provider.cluster_exists("dwhCluster"));
    assert!(!provider.role_exists("dwhRole"));
    assert!(provider.ingress_rules("dwhCluster").is_empty());
}

#[tokio::test]
async fn test_teardown_is_idempotent() {
    let provisioner = ClusterProvisioner::new(InMemoryClusterProvider::new());
    provisioner.provision_cluster(&spec("dwhCluster")).await.unwrap();

    provisioner
        .teardown_cluster("dwhCluster", "dwhRole")
        .await
        .unwrap();
    provisioner
        .teardown_cluster("dwhCluster", "dwhRole")
        .await
        .unwrap();

    // Nothing was ever created
    let fresh = ClusterProvisioner::new(InMemoryClusterProvider::new());
    assert!(fresh.teardown_cluster("other", "otherRole").await.is_ok());
}

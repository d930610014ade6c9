//! CLI runner - executes commands

use crate::cli::commands::{Cli, ClusterAction, Commands, SinkKind};
use crate::cluster::{
    ClusterProvisioner, ClusterSpec, InMemoryClusterProvider, ProvisionedCluster,
};
use crate::config::{EtlConfig, FileStoreConfig, RowStoreConfig, SinkConfig};
use crate::error::{Error, Result, ResultExt};
use crate::pipeline::{Pipeline, RunStats};
use serde::Serialize;
use tracing::info;

/// Overrides collected from `run` arguments
#[derive(Debug, Default, Clone)]
pub struct RunOverrides {
    pub sink: Option<SinkKind>,
    pub input_songs: Option<String>,
    pub input_logs: Option<String>,
    pub output: Option<String>,
    pub database: Option<String>,
    pub key_base: Option<i64>,
}

impl RunOverrides {
    /// Apply the overrides on top of a loaded config
    pub fn apply(&self, config: &mut EtlConfig) -> Result<()> {
        if let Some(songs) = &self.input_songs {
            config.input.song_data.clone_from(songs);
        }
        if let Some(logs) = &self.input_logs {
            config.input.log_data.clone_from(logs);
        }
        if let Some(base) = self.key_base {
            config.keys.base = base;
        }

        match self.sink {
            Some(SinkKind::FileStore) => {
                if !matches!(config.sink, SinkConfig::FileStore(_)) {
                    let output = self.output.clone().ok_or_else(|| {
                        Error::config("--output is required for the file-store sink")
                    })?;
                    config.sink = SinkConfig::FileStore(FileStoreConfig::new(output));
                }
            }
            Some(SinkKind::RowStore) => {
                if !matches!(config.sink, SinkConfig::RowStore(_)) {
                    config.sink = SinkConfig::RowStore(RowStoreConfig::default());
                }
            }
            None => {}
        }

        match &mut config.sink {
            SinkConfig::FileStore(file_store) => {
                if let Some(output) = &self.output {
                    file_store.output.clone_from(output);
                }
            }
            SinkConfig::RowStore(row_store) => {
                if let Some(database) = &self.database {
                    row_store.database.clone_from(database);
                }
            }
        }

        config.validate()
    }
}

/// Outcome of a `cluster` dry run
#[derive(Debug, Serialize)]
pub struct ClusterReport {
    pub identifier: String,
    /// Set after `up`
    pub cluster: Option<ProvisionedCluster>,
    /// Provider calls in order
    pub calls: Vec<String>,
}

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Run {
                sink,
                input_songs,
                input_logs,
                output,
                database,
                key_base,
            } => {
                let overrides = RunOverrides {
                    sink: *sink,
                    input_songs: input_songs.clone(),
                    input_logs: input_logs.clone(),
                    output: output.clone(),
                    database: database.clone(),
                    key_base: *key_base,
                };
                let stats = self.execute(&overrides).await?;
                println!("{}", serde_json::to_string_pretty(&stats)?);
                Ok(())
            }
            Commands::Validate => self.validate(),
            Commands::Cluster { action } => {
                let report = self.cluster(*action).await?;
                println!("{}", serde_json::to_string_pretty(&report)?);
                Ok(())
            }
        }
    }

    /// Run a cluster step from the config's `cluster` section in process
    pub async fn cluster(&self, action: ClusterAction) -> Result<ClusterReport> {
        let config = self.load_config()?;
        config.validate()?;
        let cluster = config
            .cluster
            .as_ref()
            .ok_or_else(|| Error::missing_field("cluster"))?;
        let spec = ClusterSpec::from(cluster);

        let provisioner = ClusterProvisioner::new(InMemoryClusterProvider::new());
        let provisioned = match action {
            ClusterAction::Up => Some(provisioner.provision_cluster(&spec).await?),
            ClusterAction::Down => {
                provisioner
                    .teardown_cluster(&spec.identifier, &spec.iam_role_name)
                    .await?;
                None
            }
        };

        Ok(ClusterReport {
            identifier: spec.identifier,
            cluster: provisioned,
            calls: provisioner.provider().calls(),
        })
    }

    /// Load the configuration, apply overrides and execute one run
    pub async fn execute(&self, overrides: &RunOverrides) -> Result<RunStats> {
        let mut config = self.load_config()?;
        overrides.apply(&mut config)?;

        let mut pipeline = Pipeline::from_config(config)?;
        pipeline.run().await
    }

    /// Load the config file, or the defaults when none is given
    fn load_config(&self) -> Result<EtlConfig> {
        match &self.cli.config {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                EtlConfig::from_file(path)
            }
            None => Ok(EtlConfig::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        let path = self
            .cli
            .config
            .as_ref()
            .ok_or_else(|| Error::config("Config file not specified (use -c flag)"))?;
        let config = EtlConfig::from_file(path)
            .with_context(|| format!("Invalid configuration {}", path.display()))?;

        let sink = match &config.sink {
            SinkConfig::RowStore(row_store) => row_store.describe(),
            SinkConfig::FileStore(file_store) => format!("file store at {}", file_store.output),
        };
        println!("✓ Configuration is valid");
        println!("  Songs: {}", config.input.song_data);
        println!("  Logs: {}", config.input.log_data);
        println!("  Sink: {sink}");
        if let Some(cluster) = &config.cluster {
            println!(
                "  Cluster: {} ({} x {})",
                cluster.identifier, cluster.num_nodes, cluster.node_type
            );
        }
        Ok(())
    }
}

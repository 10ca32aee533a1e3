/*!
Test harness for the CESI kernel

Owns a temporary directory holding a YAML configuration file and the SQLite
user database, a real [`TopologyStore`] reading them, and a scripted node
client for group queries.
*/

use crate::config_fixtures::ConfigBuilder;
use crate::node_stub::StubNodeClient;
use anyhow::{Context, Result};
use cesi_kernel::groups::GroupEnvironments;
use cesi_kernel::http::AppState;
use cesi_kernel::{GroupTree, Topology, TopologyStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Installs a test-friendly subscriber once; later calls are no-ops.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("cesi_kernel=debug")),
        )
        .with_test_writer()
        .try_init();
}

pub struct TestHarness {
    dir: TempDir,
    config_path: PathBuf,
    pub store: Arc<TopologyStore>,
    pub nodes: StubNodeClient,
}

impl TestHarness {
    /// Writes the configuration produced by `build` and loads it.
    ///
    /// `build` receives a builder whose `cesi` section already points at the
    /// harness database.
    pub fn new(build: impl FnOnce(ConfigBuilder) -> ConfigBuilder) -> Result<Self> {
        init_test_logging();
        let dir = tempfile::tempdir().context("creating temp dir")?;
        let config_path = dir.path().join("cesi.yaml");
        build(ConfigBuilder::new(&database_path(dir.path()))).write_to(&config_path)?;

        let store = TopologyStore::open(&config_path).context("loading initial topology")?;
        tracing::info!("[harness] loaded {}", config_path.display());
        Ok(Self { dir, config_path, store: Arc::new(store), nodes: StubNodeClient::new() })
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn database(&self) -> String {
        database_path(self.dir.path())
    }

    /// Replaces the configuration file on disk without reloading.
    pub fn rewrite(&self, build: impl FnOnce(ConfigBuilder) -> ConfigBuilder) -> Result<()> {
        build(ConfigBuilder::new(&self.database())).write_to(&self.config_path)
    }

    /// Rewrites the configuration file, then reloads the store from it.
    pub fn reload_with(
        &self,
        build: impl FnOnce(ConfigBuilder) -> ConfigBuilder,
    ) -> Result<Arc<Topology>> {
        self.rewrite(build)?;
        Ok(self.store.reload()?)
    }

    pub async fn groups_tree(&self) -> Vec<GroupTree> {
        self.store.groups_tree(&self.nodes).await
    }

    pub async fn groups_with_environments(&self) -> GroupEnvironments {
        self.store.groups_with_environments(&self.nodes).await
    }

    pub fn app_state(&self) -> AppState {
        AppState { store: self.store.clone(), nodes: Arc::new(self.nodes.clone()) }
    }
}

fn database_path(dir: &Path) -> String {
    dir.join("userinfo.db").to_string_lossy().into_owned()
}

/**
 * TOPOLOGY STORE - Current view of the supervisor fleet
 *
 * ROLE:
 * Holds the validated settings, the node list and the environment list
 * loaded from the configuration file, and answers lookups on them.
 *
 * HOW IT WORKS:
 * - Each load produces an immutable `Topology` snapshot
 * - `reload()` builds a complete new snapshot, then swaps it in one step
 * - A failed reload keeps the previous snapshot
 * - The credential bootstrap runs on every load and reload
 *
 * PROCESS-WIDE HANDLE:
 * Composition roots can pass an `Arc<TopologyStore>` around directly, or
 * `install()` it once so boundary code can reach it through `instance()`.
 */

use crate::config::{load_config, ConfigSource, Settings, YamlFileSource};
use crate::credentials::{bootstrap, CredentialStore, SqliteCredentialStore};
use crate::error::{ConfigError, Result, TopologyError};
use crate::models::{Environment, Node};
use crate::state::SnapshotCell;
use parking_lot::Mutex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use time::OffsetDateTime;
use tracing::{info, warn};

static INSTANCE: OnceLock<Arc<TopologyStore>> = OnceLock::new();

/// One consistent load of the configuration.
#[derive(Debug, Clone)]
pub struct Topology {
    pub settings: Settings,
    pub nodes: Vec<Node>,
    pub environments: Vec<Environment>,
    /// 1 for the initial load, +1 per successful reload.
    pub generation: u64,
    pub loaded_at: OffsetDateTime,
}

/// Serialized form of a node, with the environment it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeView {
    pub name: String,
    pub host: String,
    pub port: String,
    pub username: String,
    pub environment: Option<String>,
}

impl Topology {
    pub fn get_node(&self, node_name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == node_name)
    }

    pub fn get_node_or_400(&self, node_name: &str) -> Result<&Node> {
        self.get_node(node_name)
            .ok_or_else(|| TopologyError::NodeNotFound(node_name.to_string()))
    }

    pub fn get_environment(&self, environment_name: &str) -> Option<&Environment> {
        self.environments.iter().find(|e| e.name == environment_name)
    }

    pub fn get_environment_or_400(&self, environment_name: &str) -> Result<&Environment> {
        self.get_environment(environment_name)
            .ok_or_else(|| TopologyError::EnvironmentNotFound(environment_name.to_string()))
    }

    /// First environment, in list order, that lists the node.
    pub fn get_environment_by_node_name(&self, node_name: &str) -> Option<&Environment> {
        self.environments.iter().find(|e| e.contains(node_name))
    }

    pub fn node_view(&self, node: &Node) -> NodeView {
        NodeView {
            name: node.name.clone(),
            host: node.host.clone(),
            port: node.port.clone(),
            username: node.username.clone(),
            environment: self.get_environment_by_node_name(&node.name).map(|e| e.name.clone()),
        }
    }

    pub fn serialize_nodes(&self) -> Vec<NodeView> {
        self.nodes.iter().map(|n| self.node_view(n)).collect()
    }

    pub fn serialize_environments(&self) -> Vec<Environment> {
        self.environments.clone()
    }

    /// Nodes and environments in one flat object, keyed like their sections
    /// (`node:<name>`, `environment:<name>`) so the two kinds never collide.
    pub fn serialize(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut out = serde_json::Map::new();
        for view in self.serialize_nodes() {
            let key = format!("node:{}", view.name);
            out.insert(key, serde_json::to_value(view).unwrap_or_default());
        }
        for env in &self.environments {
            let value = serde_json::to_value(env).unwrap_or_default();
            out.insert(format!("environment:{}", env.name), value);
        }
        out
    }
}

pub struct TopologyStore {
    config_path: PathBuf,
    source: Arc<dyn ConfigSource>,
    credentials: Arc<dyn CredentialStore>,
    current: SnapshotCell<Topology>,
    reload_guard: Mutex<()>,
}

impl std::fmt::Debug for TopologyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopologyStore")
            .field("config_path", &self.config_path)
            .field("generation", &self.current.load().generation)
            .finish()
    }
}

impl TopologyStore {
    /// Loads the configuration at `config_path` and bootstraps the credential store.
    pub fn create(
        config_path: impl Into<PathBuf>,
        source: Arc<dyn ConfigSource>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self> {
        let config_path = config_path.into();
        info!("parsing config file {}...", config_path.display());
        let topology = load_topology(source.as_ref(), credentials.as_ref(), &config_path, 1)?;
        Ok(Self {
            config_path,
            source,
            credentials,
            current: SnapshotCell::new(topology),
            reload_guard: Mutex::new(()),
        })
    }

    /// YAML file + SQLite credential database.
    pub fn open(config_path: impl Into<PathBuf>) -> Result<Self> {
        Self::create(config_path, Arc::new(YamlFileSource), Arc::new(SqliteCredentialStore))
    }

    /// Publishes `store` as the process-wide instance. Only one store may be
    /// installed per process.
    pub fn install(store: Arc<Self>) -> Result<Arc<Self>> {
        INSTANCE
            .set(store.clone())
            .map_err(|_| TopologyError::AlreadyCreated)?;
        Ok(store)
    }

    /// Refuses a second instance before touching the file, then loads
    /// `config_path` (YAML + SQLite) and installs the result.
    pub fn create_instance(config_path: impl Into<PathBuf>) -> Result<Arc<Self>> {
        if INSTANCE.get().is_some() {
            return Err(TopologyError::AlreadyCreated);
        }
        Self::install(Arc::new(Self::open(config_path)?))
    }

    pub fn instance() -> Result<Arc<Self>> {
        INSTANCE.get().cloned().ok_or(TopologyError::NotCreated)
    }

    /// Re-reads the same configuration file and swaps in the new topology.
    pub fn reload(&self) -> Result<Arc<Topology>> {
        let _guard = self.reload_guard.lock();
        info!("reloading {}...", self.config_path.display());
        let generation = self.current.load().generation + 1;
        let topology = load_topology(
            self.source.as_ref(),
            self.credentials.as_ref(),
            &self.config_path,
            generation,
        )
        .inspect_err(|e| warn!("reload failed, keeping generation {}: {e}", generation - 1))?;
        self.current.publish(topology);
        info!("reloaded (generation {generation})");
        Ok(self.current.load())
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// The current topology; stays consistent across a concurrent reload.
    pub fn snapshot(&self) -> Arc<Topology> {
        self.current.load()
    }

    pub fn settings(&self) -> Settings {
        self.snapshot().settings.clone()
    }

    pub fn nodes(&self) -> Vec<Node> {
        self.snapshot().nodes.clone()
    }

    pub fn environments(&self) -> Vec<Environment> {
        self.snapshot().environments.clone()
    }

    pub fn get_node(&self, node_name: &str) -> Option<Node> {
        self.snapshot().get_node(node_name).cloned()
    }

    pub fn get_node_or_400(&self, node_name: &str) -> Result<Node> {
        self.snapshot().get_node_or_400(node_name).cloned()
    }

    pub fn get_environment(&self, environment_name: &str) -> Option<Environment> {
        self.snapshot().get_environment(environment_name).cloned()
    }

    pub fn get_environment_or_400(&self, environment_name: &str) -> Result<Environment> {
        self.snapshot().get_environment_or_400(environment_name).cloned()
    }

    pub fn get_environment_by_node_name(&self, node_name: &str) -> Option<Environment> {
        self.snapshot().get_environment_by_node_name(node_name).cloned()
    }

    pub fn serialize_nodes(&self) -> Vec<NodeView> {
        self.snapshot().serialize_nodes()
    }

    pub fn serialize_environments(&self) -> Vec<Environment> {
        self.snapshot().serialize_environments()
    }

    pub fn serialize(&self) -> serde_json::Map<String, serde_json::Value> {
        self.snapshot().serialize()
    }
}

fn load_topology(
    source: &dyn ConfigSource,
    credentials: &dyn CredentialStore,
    config_path: &Path,
    generation: u64,
) -> Result<Topology, ConfigError> {
    let loaded = load_config(source, config_path)?;
    bootstrap(credentials, &loaded.settings, config_path)?;
    Ok(Topology {
        settings: loaded.settings,
        nodes: loaded.nodes,
        environments: loaded.environments,
        generation,
        loaded_at: OffsetDateTime::now_utc(),
    })
}

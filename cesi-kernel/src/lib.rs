/**
 * CESI KERNEL - Control plane for a fleet of supervisor daemons
 *
 * ROLE: Loads the declarative fleet configuration (nodes, environments,
 * global settings), keeps it hot-reloadable, and derives the cross-node view
 * of program groups per environment.
 *
 * ARCHITECTURE: config -> topology snapshot (atomic swap on reload) ->
 * group aggregation over live node queries -> HTTP adapter.
 */

pub mod config;
pub mod credentials;
pub mod error;
pub mod groups;
pub mod http;
pub mod models;
pub mod state;
pub mod topology;

#[cfg(test)]
mod testing;

pub use config::{ConfigSource, RawSection, Settings, YamlFileSource};
pub use credentials::{CredentialStore, SqliteCredentialStore};
pub use error::{ConfigError, CredentialError, TopologyError};
pub use groups::{GroupEnvironment, GroupTree, NodeClient};
pub use models::{Environment, Node, NodeStatus, Process, DEFAULT_ENVIRONMENT};
pub use topology::{NodeView, Topology, TopologyStore};

//! Program groups across the fleet
//!
//! Groups are never stored: every call queries the nodes again, since the
//! supervisors can start or drop programs at any time.
//!
//! Ordering: groups and environments are sorted by name, members keep node
//! declaration order.

use crate::models::{Node, NodeStatus};
use crate::topology::{Topology, TopologyStore};
use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Live access to a node's supervisor.
///
/// Implementations must not fail: an unreachable or timed out node is
/// reported as [`NodeStatus::disconnected`].
#[async_trait]
pub trait NodeClient: Send + Sync {
    async fn query_processes(&self, node: &Node) -> NodeStatus;
}

/// group name -> node names, in node declaration order.
pub type GroupNodes = BTreeMap<String, Vec<String>>;

/// group name -> environment name -> node names.
pub type GroupEnvironments = BTreeMap<String, BTreeMap<String, Vec<String>>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupTree {
    pub name: String,
    pub environments: Vec<GroupEnvironment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEnvironment {
    pub name: String,
    pub members: Vec<String>,
}

/// Queries every node at once; one slow or dead node does not hold back the others.
pub async fn query_nodes<'a>(
    client: &dyn NodeClient,
    nodes: &'a [Node],
) -> Vec<(&'a Node, NodeStatus)> {
    let statuses = join_all(nodes.iter().map(|node| client.query_processes(node))).await;
    nodes.iter().zip(statuses).collect()
}

/// Groups reported by connected nodes. A node counts once per group, however
/// many of its processes carry that group.
pub fn collect_groups(statuses: &[(&Node, NodeStatus)]) -> GroupNodes {
    let mut result = GroupNodes::new();
    for (node, status) in statuses {
        if !status.connected {
            warn!("{} is not connected", node.name);
            continue;
        }
        for process in &status.processes {
            let members = result.entry(process.group.clone()).or_default();
            if !members.contains(&node.name) {
                members.push(node.name.clone());
            }
        }
    }
    debug!("groups: {:?}", result);
    result
}

/// Splits each group's nodes by environment.
pub fn with_environments(topology: &Topology, groups: &GroupNodes) -> GroupEnvironments {
    let mut result = GroupEnvironments::new();
    for (group_name, node_names) in groups {
        let environments = result.entry(group_name.clone()).or_default();
        for node_name in node_names {
            // Every loaded node has an environment; stale names are skipped.
            let Some(environment) = topology.get_environment_by_node_name(node_name) else {
                continue;
            };
            let members = environments.entry(environment.name.clone()).or_default();
            if !members.contains(node_name) {
                members.push(node_name.clone());
            }
        }
    }
    debug!("groups with environments: {:?}", result);
    result
}

pub fn flatten(groups: GroupEnvironments) -> Vec<GroupTree> {
    groups
        .into_iter()
        .map(|(name, environments)| GroupTree {
            name,
            environments: environments
                .into_iter()
                .map(|(name, members)| GroupEnvironment { name, members })
                .collect(),
        })
        .collect()
}

/// Computes groups for one topology snapshot.
pub async fn groups_tree_for(topology: &Topology, client: &dyn NodeClient) -> Vec<GroupTree> {
    let statuses = query_nodes(client, &topology.nodes).await;
    let groups = collect_groups(&statuses);
    flatten(with_environments(topology, &groups))
}

impl TopologyStore {
    pub async fn groups(&self, client: &dyn NodeClient) -> GroupNodes {
        let topology = self.snapshot();
        let statuses = query_nodes(client, &topology.nodes).await;
        collect_groups(&statuses)
    }

    pub async fn groups_with_environments(&self, client: &dyn NodeClient) -> GroupEnvironments {
        let topology = self.snapshot();
        let statuses = query_nodes(client, &topology.nodes).await;
        with_environments(&topology, &collect_groups(&statuses))
    }

    /// `[{name, environments: [{name, members}]}]` for the dashboard.
    pub async fn groups_tree(&self, client: &dyn NodeClient) -> Vec<GroupTree> {
        let topology = self.snapshot();
        groups_tree_for(&topology, client).await
    }
}

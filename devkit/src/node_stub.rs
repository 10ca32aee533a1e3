/*!
Stub node client for tests without supervisor daemons

Answers from a script keyed by node name and records every query, so tests
can assert both on the aggregated result and on which nodes were asked.
Unscripted nodes answer as disconnected.
*/

use async_trait::async_trait;
use cesi_kernel::{Node, NodeClient, NodeStatus, Process};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
struct Script {
    status: NodeStatus,
    delay: Option<Duration>,
}

#[derive(Debug, Clone, Default)]
pub struct StubNodeClient {
    scripts: Arc<Mutex<HashMap<String, Script>>>,
    queried: Arc<Mutex<Vec<String>>>,
}

impl StubNodeClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Node answers as connected with the given `(process, group)` pairs, all RUNNING.
    pub fn running(&self, node: &str, processes: &[(&str, &str)]) -> &Self {
        let processes = processes
            .iter()
            .map(|(name, group)| Process::new(*name, *group, "RUNNING"))
            .collect();
        self.set_status(node, NodeStatus::connected(processes))
    }

    pub fn disconnected(&self, node: &str) -> &Self {
        self.set_status(node, NodeStatus::disconnected())
    }

    pub fn set_status(&self, node: &str, status: NodeStatus) -> &Self {
        self.scripts
            .lock()
            .entry(node.to_string())
            .and_modify(|s| s.status = status.clone())
            .or_insert(Script { status, delay: None });
        self
    }

    /// Delays the node's answer, to simulate a slow supervisor.
    pub fn slow(&self, node: &str, delay: Duration) -> &Self {
        self.scripts
            .lock()
            .entry(node.to_string())
            .and_modify(|s| s.delay = Some(delay))
            .or_insert(Script { status: NodeStatus::disconnected(), delay: Some(delay) });
        self
    }

    /// Node names in the order their queries started.
    pub fn queried(&self) -> Vec<String> {
        self.queried.lock().clone()
    }

    pub fn query_count(&self, node: &str) -> usize {
        self.queried.lock().iter().filter(|n| *n == node).count()
    }

    pub fn clear_queries(&self) {
        self.queried.lock().clear();
    }
}

#[async_trait]
impl NodeClient for StubNodeClient {
    async fn query_processes(&self, node: &Node) -> NodeStatus {
        self.queried.lock().push(node.name.clone());
        let script = self.scripts.lock().get(&node.name).cloned();
        let Some(script) = script else {
            tracing::debug!("[stub] {} is not scripted, answering disconnected", node.name);
            return NodeStatus::disconnected();
        };
        if let Some(delay) = script.delay {
            tokio::time::sleep(delay).await;
        }
        script.status
    }
}

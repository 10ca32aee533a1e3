use serde::{Deserialize, Serialize};

/// Name of the synthetic environment holding nodes no declared environment claims.
pub const DEFAULT_ENVIRONMENT: &str = "defaults";

/// One remote supervisor endpoint, built from a `node:<name>` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub host: String,
    pub port: String,
    pub username: String,
    #[serde(skip_serializing)] // Never expose credentials
    pub password: String,
}

/// A process reported by a node's supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Process {
    pub name: String,
    pub group: String,
    pub state: String, // RUNNING, STOPPED, FATAL...
    pub pid: Option<u32>,
    pub description: Option<String>,
}

impl Process {
    pub fn new(
        name: impl Into<String>,
        group: impl Into<String>,
        state: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
            state: state.into(),
            pid: None,
            description: None,
        }
    }
}

/// Result of one live query against a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub connected: bool,
    pub processes: Vec<Process>,
}

impl NodeStatus {
    pub fn connected(processes: Vec<Process>) -> Self {
        Self { connected: true, processes }
    }

    /// Unreachable node: no processes.
    pub fn disconnected() -> Self {
        Self::default()
    }
}

/// A named partition of nodes (staging, production...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
    members: Vec<String>,
}

impl Environment {
    pub fn new<I, S>(name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut env = Self { name: name.into(), members: Vec::new() };
        env.set_members(members);
        env
    }

    /// Parses a `members` field: comma separated, tokens trimmed, empties dropped.
    pub fn from_members_string(name: impl Into<String>, members: &str) -> Self {
        Self::new(name, members.split(',').map(str::trim).filter(|m| !m.is_empty()))
    }

    /// Replaces the member list, keeping declaration order and dropping repeats.
    pub fn set_members<I, S>(&mut self, members: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.members.clear();
        for member in members {
            let member = member.into();
            if !self.members.contains(&member) {
                self.members.push(member);
            }
        }
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn contains(&self, node_name: &str) -> bool {
        self.members.iter().any(|m| m == node_name)
    }

    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_ENVIRONMENT
    }
}

//! Fixtures shared by the unit tests of this crate.

use crate::config::{ConfigSource, RawSection, Settings};
use crate::credentials::CredentialStore;
use crate::error::{ConfigError, CredentialError};
use crate::groups::NodeClient;
use crate::models::{Node, NodeStatus};
use crate::topology::TopologyStore;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// In-memory sections; replace them to simulate an edited file.
#[derive(Default)]
pub struct Sections(pub Mutex<Vec<RawSection>>);

impl Sections {
    pub fn new(sections: Vec<RawSection>) -> Arc<Self> {
        Arc::new(Self(Mutex::new(sections)))
    }

    pub fn replace(&self, sections: Vec<RawSection>) {
        *self.0.lock() = sections;
    }
}

impl ConfigSource for Sections {
    fn read(&self, _path: &Path) -> Result<Vec<RawSection>, ConfigError> {
        Ok(self.0.lock().clone())
    }
}

pub struct NoCredentials;

impl CredentialStore for NoCredentials {
    fn ensure_schema(&self, _database: &str) -> Result<(), CredentialError> {
        Ok(())
    }

    fn insert_if_absent(&self, _: &str, _: &str, _: &str, _: i64) -> Result<bool, CredentialError> {
        Ok(true)
    }

    fn drop_schema(&self, _database: &str) -> Result<(), CredentialError> {
        Ok(())
    }
}

/// Connects, but every statement fails as on a read-only database file.
pub struct ReadOnlyCredentials;

fn read_only() -> CredentialError {
    CredentialError::Statement(rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_READONLY),
        Some("attempt to write a readonly database".into()),
    ))
}

impl CredentialStore for ReadOnlyCredentials {
    fn ensure_schema(&self, _database: &str) -> Result<(), CredentialError> {
        Err(read_only())
    }

    fn insert_if_absent(&self, _: &str, _: &str, _: &str, _: i64) -> Result<bool, CredentialError> {
        Err(read_only())
    }

    fn drop_schema(&self, _database: &str) -> Result<(), CredentialError> {
        Err(read_only())
    }
}

/// Answers from a fixed table; unknown nodes are disconnected.
#[derive(Default)]
pub struct Scripted(pub HashMap<String, NodeStatus>);

#[async_trait]
impl NodeClient for Scripted {
    async fn query_processes(&self, node: &Node) -> NodeStatus {
        self.0.get(&node.name).cloned().unwrap_or_default()
    }
}

pub fn cesi_fields() -> Vec<(&'static str, &'static str)> {
    vec![
        ("host", "0.0.0.0"),
        ("port", "5000"),
        ("name", "CeSI"),
        ("theme", "superhero"),
        ("activity_log", "activity.log"),
        ("database", "userinfo.db"),
        ("debug", "True"),
        ("auto_reload", "False"),
        ("admin_username", "admin"),
        ("admin_password", "admin"),
    ]
}

pub fn cesi() -> RawSection {
    RawSection::new("cesi", cesi_fields())
}

pub fn node(name: &str) -> RawSection {
    RawSection::new(
        format!("node:{name}"),
        [("host", "localhost"), ("port", "9001"), ("username", "u"), ("password", "p")],
    )
}

pub fn env(name: &str, members: &str) -> RawSection {
    RawSection::new(format!("environment:{name}"), [("members", members)])
}

pub fn settings(database: &str) -> Settings {
    Settings {
        host: "0.0.0.0".into(),
        port: "5000".into(),
        name: "CeSI".into(),
        theme: "superhero".into(),
        activity_log: "activity.log".into(),
        database: database.into(),
        debug: false,
        auto_reload: false,
        admin_username: "admin".into(),
        admin_password: "hunter2".into(),
    }
}

pub fn store(sections: Vec<RawSection>) -> (Arc<Sections>, TopologyStore) {
    let source = Sections::new(sections);
    let store = TopologyStore::create("cesi.yaml", source.clone(), Arc::new(NoCredentials))
        .expect("fixture configuration loads");
    (source, store)
}

use cesi_devkit::{ConfigBuilder, MemoryCredentialStore, MemorySource, TestHarness};
use cesi_kernel::{ConfigError, GroupEnvironment, TopologyError, TopologyStore, DEFAULT_ENVIRONMENT};
use std::sync::Arc;
use std::time::Duration;

fn three_nodes(builder: ConfigBuilder) -> ConfigBuilder {
    builder.node("a").node("b").node("c").environment("prod", "a,b")
}

#[tokio::test]
async fn web_group_spans_prod_and_defaults() {
    let harness = TestHarness::new(three_nodes).unwrap();
    harness.nodes.running("a", &[("nginx", "web")]).running("c", &[("nginx", "web")]);
    harness.nodes.running("b", &[]);

    let tree = harness.groups_tree().await;
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].name, "web");
    assert_eq!(
        tree[0].environments,
        vec![
            GroupEnvironment { name: DEFAULT_ENVIRONMENT.into(), members: vec!["c".into()] },
            GroupEnvironment { name: "prod".into(), members: vec!["a".into()] },
        ]
    );

    let groups = harness.store.groups(&harness.nodes).await;
    assert_eq!(groups["web"], ["a", "c"]);

    let defaults = harness.store.get_environment(DEFAULT_ENVIRONMENT).unwrap();
    assert_eq!(defaults.members(), ["c"]);
}

#[tokio::test]
async fn disconnected_node_is_left_out() {
    let harness = TestHarness::new(three_nodes).unwrap();
    harness.nodes.running("a", &[("worker", "queue")]).disconnected("b");
    harness.nodes.running("c", &[("worker", "queue")]).slow("c", Duration::from_millis(20));

    let grouped = harness.groups_with_environments().await;
    assert_eq!(grouped["queue"]["prod"], ["a"]);
    assert_eq!(grouped["queue"][DEFAULT_ENVIRONMENT], ["c"]);
    for name in ["a", "b", "c"] {
        assert_eq!(harness.nodes.query_count(name), 1, "{name} queried once");
    }
}

#[test]
fn reload_moves_node_between_environments() {
    let harness = TestHarness::new(|b| b.node("a").node("b").environment("staging", "a")).unwrap();
    assert_eq!(harness.store.get_environment_by_node_name("a").unwrap().name, "staging");

    let topology = harness
        .reload_with(|b| b.node("a").node("b").environment("staging", "b"))
        .unwrap();
    assert_eq!(topology.generation, 2);
    assert_eq!(harness.store.get_environment_by_node_name("a").unwrap().name, DEFAULT_ENVIRONMENT);
    assert_eq!(harness.store.get_environment_by_node_name("b").unwrap().name, "staging");
}

#[test]
fn failed_reload_keeps_previous_topology() {
    let harness = TestHarness::new(three_nodes).unwrap();
    harness.rewrite(|b| b.node("a").set("cesi", "debug", "Maybe")).unwrap();

    let err = harness.store.reload().unwrap_err();
    assert!(matches!(err, TopologyError::Config(ConfigError::InvalidBoolean { .. })));
    let current = harness.store.snapshot();
    assert_eq!(current.generation, 1);
    assert_eq!(current.nodes.len(), 3);
}

#[test]
fn invalid_boolean_is_rejected_at_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cesi.yaml");
    let database = dir.path().join("userinfo.db");
    ConfigBuilder::new(database.to_str().unwrap())
        .set("cesi", "debug", "Maybe")
        .write_to(&path)
        .unwrap();

    let err = TopologyStore::open(&path).unwrap_err();
    match err {
        TopologyError::Config(ConfigError::InvalidBoolean { field, value, .. }) => {
            assert_eq!(field, "debug");
            assert_eq!(value, "Maybe");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_file_names_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.yaml");

    let err = TopologyStore::open(&path).unwrap_err();
    assert!(matches!(err, TopologyError::Config(ConfigError::SourceNotFound { .. })));
    assert!(err.to_string().contains("absent.yaml"));
}

#[test]
fn unknown_names_are_bad_requests() {
    let harness = TestHarness::new(three_nodes).unwrap();

    let err = harness.store.get_node_or_400("nonexistent").unwrap_err();
    assert!(matches!(err, TopologyError::NodeNotFound(ref name) if name == "nonexistent"));
    assert!(err.is_not_found());
    assert!(harness.store.get_environment_or_400("nonexistent").unwrap_err().is_not_found());
    assert!(harness.store.get_node("nonexistent").is_none());
}

#[test]
fn serialize_lists_nodes_and_environments() {
    let harness = TestHarness::new(three_nodes).unwrap();

    let out = harness.store.serialize();
    assert_eq!(out.len(), 5);
    assert_eq!(out["node:a"]["environment"], "prod");
    assert!(out["node:a"].get("password").is_none());
    assert_eq!(out["environment:defaults"]["members"], serde_json::json!(["c"]));
}

#[test]
fn sqlite_admin_is_seeded_once() {
    let harness = TestHarness::new(three_nodes).unwrap();
    harness.store.reload().unwrap();

    let conn = rusqlite::Connection::open(harness.database()).unwrap();
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM userinfo WHERE username = 'admin' AND type = 0",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn unreachable_database_is_fatal() {
    let source = Arc::new(MemorySource::new(ConfigBuilder::new("users").node("a").sections()));
    let credentials = Arc::new(MemoryCredentialStore::new());
    credentials.set_unreachable("users", true);

    let err = TopologyStore::create("cesi.yaml", source.clone(), credentials.clone()).unwrap_err();
    assert!(matches!(err, TopologyError::Config(ConfigError::Database { .. })));

    credentials.set_unreachable("users", false);
    let store = TopologyStore::create("cesi.yaml", source.clone(), credentials.clone()).unwrap();
    assert!(credentials.users("users").contains_key("admin"));

    source.replace(ConfigBuilder::empty().node("a").sections());
    assert!(matches!(
        store.reload().unwrap_err(),
        TopologyError::Config(ConfigError::MissingSection { .. })
    ));
}

#[test]
fn read_only_database_still_loads() {
    let source = Arc::new(MemorySource::new(three_nodes(ConfigBuilder::new("users")).sections()));
    let credentials = Arc::new(MemoryCredentialStore::new());
    credentials.set_read_only("users", true);

    let store = TopologyStore::create("cesi.yaml", source, credentials.clone()).unwrap();
    assert_eq!(store.snapshot().generation, 1);
    assert_eq!(store.nodes().len(), 3);
    assert!(credentials.users("users").is_empty());

    assert_eq!(store.reload().unwrap().generation, 2);
    credentials.set_read_only("users", false);
    store.reload().unwrap();
    assert!(credentials.users("users").contains_key("admin"));
}

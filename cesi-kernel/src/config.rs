//! Configuration loading for the CESI kernel
//!
//! A configuration source yields ordered sections of string fields:
//! - `cesi`: global settings (one section)
//! - `node:<name>`: one supervisor endpoint per section
//! - `environment:<name>`: a comma separated `members` list of node names
//!
//! Every section is validated into a typed [`Section`] before any record is
//! handed out, so a bad file never produces a half-loaded topology.

use crate::error::{ConfigError, TopologyError};
use crate::models::{Environment, Node, DEFAULT_ENVIRONMENT};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

const CESI_SECTION: &str = "cesi";
const NODE_PREFIX: &str = "node:";
const ENVIRONMENT_PREFIX: &str = "environment:";

const CESI_FIELDS: [&str; 10] = [
    "host",
    "port",
    "name",
    "theme",
    "activity_log",
    "database",
    "debug",
    "auto_reload",
    "admin_username",
    "admin_password",
];
const CESI_BOOLEAN_FIELDS: [&str; 2] = ["debug", "auto_reload"];
const NODE_FIELDS: [&str; 4] = ["host", "port", "username", "password"];
const ENVIRONMENT_FIELDS: [&str; 1] = ["members"];

/// One section as read from the source, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSection {
    pub name: String,
    pub fields: BTreeMap<String, String>,
}

impl RawSection {
    pub fn new<I, K, V>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            name: name.into(),
            fields: fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Reads a configuration file into raw sections.
///
/// Returns an empty list when the path cannot be opened; the loader turns
/// that into [`ConfigError::SourceNotFound`].
pub trait ConfigSource: Send + Sync {
    fn read(&self, path: &Path) -> Result<Vec<RawSection>, ConfigError>;
}

/// YAML dialect: top-level mapping of section name to a mapping of scalars.
///
/// ```yaml
/// cesi:
///   host: 0.0.0.0
///   debug: True
/// "node:web-1":
///   host: 10.0.0.11
///   port: 9001
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlFileSource;

impl ConfigSource for YamlFileSource {
    fn read(&self, path: &Path) -> Result<Vec<RawSection>, ConfigError> {
        let txt = match std::fs::read_to_string(path) {
            Ok(txt) => txt,
            Err(e) => {
                debug!("cannot open {}: {e}", path.display());
                return Ok(Vec::new());
            }
        };
        if txt.trim().is_empty() {
            return Ok(Vec::new());
        }
        parse_yaml_sections(path, &txt)
    }
}

/// Parses YAML text into sections, keeping document order.
pub fn parse_yaml_sections(path: &Path, txt: &str) -> Result<Vec<RawSection>, ConfigError> {
    let malformed = |reason: String| ConfigError::Malformed { path: path.to_path_buf(), reason };

    let doc: serde_yaml::Value = serde_yaml::from_str(txt).map_err(|e| malformed(e.to_string()))?;
    let root = match doc {
        serde_yaml::Value::Null => return Ok(Vec::new()),
        serde_yaml::Value::Mapping(root) => root,
        _ => return Err(malformed("top level must be a mapping of sections".into())),
    };

    let mut sections = Vec::with_capacity(root.len());
    for (key, value) in root {
        let name = scalar_text(&key)
            .ok_or_else(|| malformed("section names must be scalars".into()))?;
        let mut fields = BTreeMap::new();
        match value {
            serde_yaml::Value::Null => {}
            serde_yaml::Value::Mapping(map) => {
                for (field, value) in map {
                    let field = scalar_text(&field)
                        .ok_or_else(|| malformed(format!("non scalar field name in '{name}'")))?;
                    let value = scalar_text(&value).ok_or_else(|| {
                        malformed(format!("field '{field}' in '{name}' is not a scalar"))
                    })?;
                    fields.insert(field, value);
                }
            }
            _ => return Err(malformed(format!("section '{name}' must be a mapping"))),
        }
        sections.push(RawSection { name, fields });
    }
    Ok(sections)
}

// YAML booleans render as the True/False literals the validator expects.
fn scalar_text(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::Null => Some(String::new()),
        serde_yaml::Value::Bool(true) => Some("True".into()),
        serde_yaml::Value::Bool(false) => Some("False".into()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

/// Global settings from the `cesi` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    pub host: String,
    pub port: String,
    pub name: String,
    pub theme: String,
    pub activity_log: String,
    pub database: String,
    pub debug: bool,
    pub auto_reload: bool,
    pub admin_username: String,
    #[serde(skip_serializing)]
    pub admin_password: String,
}

/// Value of a setting looked up by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SettingValue<'a> {
    Text(&'a str),
    Flag(bool),
}

impl Settings {
    /// By-name access for boundary code (templates, admin views).
    pub fn attribute(&self, key: &str) -> Result<SettingValue<'_>, TopologyError> {
        let value = match key {
            "host" => SettingValue::Text(&self.host),
            "port" => SettingValue::Text(&self.port),
            "name" => SettingValue::Text(&self.name),
            "theme" => SettingValue::Text(&self.theme),
            "activity_log" => SettingValue::Text(&self.activity_log),
            "database" => SettingValue::Text(&self.database),
            "debug" => SettingValue::Flag(self.debug),
            "auto_reload" => SettingValue::Flag(self.auto_reload),
            "admin_username" => SettingValue::Text(&self.admin_username),
            "admin_password" => SettingValue::Text(&self.admin_password),
            other => return Err(TopologyError::NoSuchAttribute(other.to_string())),
        };
        Ok(value)
    }
}

/// A validated section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Section {
    Cesi(Settings),
    Node(Node),
    Environment(Environment),
}

impl Section {
    /// Classifies a raw section by name and checks its required fields.
    pub fn parse(path: &Path, raw: &RawSection) -> Result<Self, ConfigError> {
        if raw.name == CESI_SECTION {
            return parse_settings(path, raw).map(Section::Cesi);
        }
        if let Some(name) = raw.name.strip_prefix(NODE_PREFIX) {
            let name = non_empty_name(path, raw, name)?;
            require_all(path, raw, &NODE_FIELDS)?;
            return Ok(Section::Node(Node {
                name,
                host: raw.fields["host"].clone(),
                port: raw.fields["port"].clone(),
                username: raw.fields["username"].clone(),
                password: raw.fields["password"].clone(),
            }));
        }
        if let Some(name) = raw.name.strip_prefix(ENVIRONMENT_PREFIX) {
            let name = non_empty_name(path, raw, name)?;
            require_all(path, raw, &ENVIRONMENT_FIELDS)?;
            return Ok(Section::Environment(Environment::from_members_string(
                name,
                &raw.fields["members"],
            )));
        }
        Err(ConfigError::UnknownSection {
            path: path.to_path_buf(),
            section: raw.name.clone(),
        })
    }
}

fn non_empty_name(path: &Path, raw: &RawSection, name: &str) -> Result<String, ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::EmptySectionName {
            path: path.to_path_buf(),
            section: raw.name.clone(),
        });
    }
    Ok(name.to_string())
}

fn require_all(path: &Path, raw: &RawSection, fields: &[&str]) -> Result<(), ConfigError> {
    match fields.iter().find(|f| !raw.fields.contains_key(**f)) {
        Some(missing) => Err(ConfigError::MissingField {
            path: path.to_path_buf(),
            section: raw.name.clone(),
            field: missing.to_string(),
        }),
        None => Ok(()),
    }
}

fn parse_settings(path: &Path, raw: &RawSection) -> Result<Settings, ConfigError> {
    // Fields are checked in declaration order, booleans as they come.
    for field in CESI_FIELDS {
        let Some(value) = raw.fields.get(field) else {
            return Err(ConfigError::MissingField {
                path: path.to_path_buf(),
                section: raw.name.clone(),
                field: field.to_string(),
            });
        };
        if CESI_BOOLEAN_FIELDS.contains(&field) && value != "True" && value != "False" {
            return Err(ConfigError::InvalidBoolean {
                path: path.to_path_buf(),
                field: field.to_string(),
                value: value.clone(),
            });
        }
    }

    let text = |field: &str| raw.fields[field].clone();
    Ok(Settings {
        host: text("host"),
        port: text("port"),
        name: text("name"),
        theme: text("theme"),
        activity_log: text("activity_log"),
        database: text("database"),
        debug: raw.fields["debug"] == "True",
        auto_reload: raw.fields["auto_reload"] == "True",
        admin_username: text("admin_username"),
        admin_password: text("admin_password"),
    })
}

/// Output of a successful load.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub settings: Settings,
    pub nodes: Vec<Node>,
    pub environments: Vec<Environment>,
}

/// Reads, validates and builds the configuration found at `path`.
pub fn load_config(source: &dyn ConfigSource, path: &Path) -> Result<LoadedConfig, ConfigError> {
    let raw_sections = source.read(path)?;
    if raw_sections.is_empty() {
        return Err(ConfigError::SourceNotFound { path: path.to_path_buf() });
    }

    let sections = raw_sections
        .iter()
        .map(|raw| Section::parse(path, raw))
        .collect::<Result<Vec<_>, _>>()?;

    let mut settings = None;
    let mut nodes = Vec::new();
    let mut environments: Vec<Environment> = Vec::new();
    for section in sections {
        match section {
            Section::Cesi(s) => settings = Some(s),
            Section::Node(node) => nodes.push(node),
            Section::Environment(env) => {
                check_membership(path, &environments, &env)?;
                environments.push(env);
            }
        }
    }

    let settings = settings.ok_or_else(|| ConfigError::MissingSection {
        path: path.to_path_buf(),
        section: CESI_SECTION.to_string(),
    })?;

    fill_defaults_environment(&nodes, &mut environments);
    info!(
        "loaded {} nodes and {} environments from {}",
        nodes.len(),
        environments.len(),
        path.display()
    );

    Ok(LoadedConfig { settings, nodes, environments })
}

// A node name may be claimed by one declared environment only.
fn check_membership(
    path: &Path,
    declared: &[Environment],
    env: &Environment,
) -> Result<(), ConfigError> {
    for member in env.members() {
        if let Some(first) = declared.iter().find(|e| e.contains(member)) {
            return Err(ConfigError::DuplicateMembership {
                path: path.to_path_buf(),
                node: member.clone(),
                first: first.name.clone(),
                second: env.name.clone(),
            });
        }
    }
    Ok(())
}

/// Appends the `defaults` environment holding every node no declared
/// environment claims, in node declaration order.
pub fn fill_defaults_environment(nodes: &[Node], environments: &mut Vec<Environment>) {
    let orphans: Vec<&str> = nodes
        .iter()
        .filter(|node| !environments.iter().any(|e| e.contains(&node.name)))
        .map(|node| node.name.as_str())
        .collect();
    if !orphans.is_empty() {
        debug!("nodes without environment: {:?}", orphans);
    }
    environments.push(Environment::new(DEFAULT_ENVIRONMENT, orphans));
}

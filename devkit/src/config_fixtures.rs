/*!
Configuration fixtures

[`ConfigBuilder`] assembles a valid configuration section by section and
renders it either as raw sections (for [`MemorySource`]) or as a YAML file
read by the real loader.
*/

use anyhow::{Context, Result};
use cesi_kernel::{ConfigError, ConfigSource, RawSection};
use parking_lot::Mutex;
use serde_yaml::{Mapping, Value};
use std::path::Path;

/// Configuration source backed by a list of sections that tests can swap
/// between reloads.
#[derive(Debug, Default)]
pub struct MemorySource {
    sections: Mutex<Vec<RawSection>>,
}

impl MemorySource {
    pub fn new(sections: Vec<RawSection>) -> Self {
        Self { sections: Mutex::new(sections) }
    }

    pub fn replace(&self, sections: Vec<RawSection>) {
        *self.sections.lock() = sections;
    }
}

impl ConfigSource for MemorySource {
    fn read(&self, _path: &Path) -> Result<Vec<RawSection>, ConfigError> {
        Ok(self.sections.lock().clone())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    sections: Vec<RawSection>,
}

impl ConfigBuilder {
    /// Starts with a complete `cesi` section pointing at `database`.
    pub fn new(database: &str) -> Self {
        let cesi = RawSection::new(
            "cesi",
            [
                ("host", "0.0.0.0"),
                ("port", "5000"),
                ("name", "CeSI"),
                ("theme", "superhero"),
                ("activity_log", "activity.log"),
                ("database", database),
                ("debug", "True"),
                ("auto_reload", "False"),
                ("admin_username", "admin"),
                ("admin_password", "admin"),
            ],
        );
        Self { sections: vec![cesi] }
    }

    /// No sections at all, not even `cesi`.
    pub fn empty() -> Self {
        Self { sections: Vec::new() }
    }

    pub fn node(mut self, name: &str) -> Self {
        self.sections.push(RawSection::new(
            format!("node:{name}"),
            [("host", "localhost"), ("port", "9001"), ("username", "user"), ("password", "pass")],
        ));
        self
    }

    pub fn environment(mut self, name: &str, members: &str) -> Self {
        self.sections
            .push(RawSection::new(format!("environment:{name}"), [("members", members)]));
        self
    }

    /// Sets `field` on every section called `section`, adding the section if absent.
    pub fn set(mut self, section: &str, field: &str, value: &str) -> Self {
        let mut found = false;
        for raw in self.sections.iter_mut().filter(|s| s.name == section) {
            raw.fields.insert(field.to_string(), value.to_string());
            found = true;
        }
        if !found {
            self.sections.push(RawSection::new(section, [(field, value)]));
        }
        self
    }

    pub fn without(mut self, section: &str, field: &str) -> Self {
        for raw in self.sections.iter_mut().filter(|s| s.name == section) {
            raw.fields.remove(field);
        }
        self
    }

    pub fn sections(&self) -> Vec<RawSection> {
        self.sections.clone()
    }

    pub fn to_yaml(&self) -> Result<String> {
        let mut doc = Mapping::new();
        for section in &self.sections {
            let fields: Mapping = section
                .fields
                .iter()
                .map(|(k, v)| (Value::String(k.clone()), Value::String(v.clone())))
                .collect();
            doc.insert(Value::String(section.name.clone()), Value::Mapping(fields));
        }
        Ok(serde_yaml::to_string(&doc)?)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let yaml = self.to_yaml()?;
        std::fs::write(path, yaml).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}

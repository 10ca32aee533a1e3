use std::path::PathBuf;

/// Errors raised while reading and validating a configuration source.
/// Any of them aborts the load before a new topology is published.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to open/find {} file", path.display())]
    SourceNotFound { path: PathBuf },

    #[error("Failed to read {} file, {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("Failed to read {} file, unknown section name: '{section}'", path.display())]
    UnknownSection { path: PathBuf, section: String },

    #[error("Failed to read {} file, section '{section}' has an empty name", path.display())]
    EmptySectionName { path: PathBuf, section: String },

    #[error("Failed to read {} file, missing '{section}' section", path.display())]
    MissingSection { path: PathBuf, section: String },

    #[error(
        "Failed to read {} file, not found '{field}' field in '{section}' section",
        path.display()
    )]
    MissingField {
        path: PathBuf,
        section: String,
        field: String,
    },

    #[error(
        "Failed to read {} file, '{field}' field is not True or False (got '{value}')",
        path.display()
    )]
    InvalidBoolean {
        path: PathBuf,
        field: String,
        value: String,
    },

    #[error(
        "Failed to read {} file, node '{node}' is in both '{first}' and '{second}' environments",
        path.display()
    )]
    DuplicateMembership {
        path: PathBuf,
        node: String,
        first: String,
        second: String,
    },

    #[error("Failed to connect database '{database}' declared in {}: {source}", path.display())]
    Database {
        path: PathBuf,
        database: String,
        #[source]
        source: CredentialError,
    },
}

/// Errors surfaced by the credential store.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("cannot open credential database: {0}")]
    Connect(#[source] rusqlite::Error),
    #[error("credential statement failed: {0}")]
    Statement(#[from] rusqlite::Error),
}

/// Errors raised by the topology store and its lookups.
#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("a topology store is already installed for this process")]
    AlreadyCreated,
    #[error("no topology store installed yet, create one first")]
    NotCreated,
    #[error("Wrong node name: {0}")]
    NodeNotFound(String),
    #[error("Wrong environment name: {0}")]
    EnvironmentNotFound(String),
    #[error("no such attribute: {0}")]
    NoSuchAttribute(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl TopologyError {
    /// True for lookups the boundary layer reports as a client error.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NodeNotFound(_) | Self::EnvironmentNotFound(_) | Self::NoSuchAttribute(_)
        )
    }
}

pub type Result<T, E = TopologyError> = std::result::Result<T, E>;

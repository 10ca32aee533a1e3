//! Credential store bootstrap
//!
//! The dashboard keeps its users in one SQLite table:
//! `userinfo(username PRIMARY KEY, password, type)`.
//! Every load and reload makes sure the table exists and seeds the
//! administrator declared in the `cesi` section.

use crate::config::Settings;
use crate::error::{ConfigError, CredentialError};
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::{debug, info, warn};

/// `type` column value for administrators.
pub const ADMIN_USER_TYPE: i64 = 0;

/// Persistence for dashboard users. `database` is the location declared in
/// the `cesi` section.
pub trait CredentialStore: Send + Sync {
    /// Fails with [`CredentialError::Connect`] when the database cannot be opened.
    fn ensure_schema(&self, database: &str) -> Result<(), CredentialError>;

    /// Returns `false` when the user already exists.
    fn insert_if_absent(
        &self,
        database: &str,
        username: &str,
        password: &str,
        user_type: i64,
    ) -> Result<bool, CredentialError>;

    fn drop_schema(&self, database: &str) -> Result<(), CredentialError>;
}

/// SQLite backend, one short-lived connection per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteCredentialStore;

impl SqliteCredentialStore {
    fn connect(database: &str) -> Result<Connection, CredentialError> {
        let conn = Connection::open(Path::new(database)).map_err(CredentialError::Connect)?;
        conn.execute_batch("PRAGMA busy_timeout=5000;")
            .map_err(CredentialError::Connect)?;
        Ok(conn)
    }
}

impl CredentialStore for SqliteCredentialStore {
    fn ensure_schema(&self, database: &str) -> Result<(), CredentialError> {
        let conn = Self::connect(database)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS userinfo (
                username VARCHAR(30) PRIMARY KEY NOT NULL,
                password VARCHAR(50) NOT NULL,
                type INT NOT NULL
            );",
        )?;
        Ok(())
    }

    fn insert_if_absent(
        &self,
        database: &str,
        username: &str,
        password: &str,
        user_type: i64,
    ) -> Result<bool, CredentialError> {
        let conn = Self::connect(database)?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO userinfo (username, password, type) VALUES (?1, ?2, ?3)",
            params![username, password, user_type],
        )?;
        Ok(inserted == 1)
    }

    fn drop_schema(&self, database: &str) -> Result<(), CredentialError> {
        let conn = Self::connect(database)?;
        conn.execute_batch("DROP TABLE IF EXISTS userinfo;")?;
        Ok(())
    }
}

/// Creates the user table and seeds the administrator.
///
/// Only an unreachable database is fatal; statement failures are logged.
pub fn bootstrap(
    store: &dyn CredentialStore,
    settings: &Settings,
    config_path: &Path,
) -> Result<(), ConfigError> {
    let database = settings.database.as_str();
    let fatal = |source| ConfigError::Database {
        path: config_path.to_path_buf(),
        database: database.to_string(),
        source,
    };

    match store.ensure_schema(database) {
        Ok(()) => info!("connected database {database}"),
        Err(e @ CredentialError::Connect(_)) => return Err(fatal(e)),
        Err(e) => warn!("userinfo schema check failed: {e}"),
    }

    let username = settings.admin_username.as_str();
    match store.insert_if_absent(database, username, &settings.admin_password, ADMIN_USER_TYPE) {
        Ok(true) => info!("seeded admin user '{username}'"),
        Ok(false) => debug!("admin user '{username}' already present"),
        Err(e @ CredentialError::Connect(_)) => return Err(fatal(e)),
        Err(e) => warn!("failed to seed admin user '{username}': {e}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{settings, ReadOnlyCredentials};

    fn users(database: &str) -> Vec<(String, String, i64)> {
        let conn = Connection::open(database).unwrap();
        let mut stmt = conn
            .prepare("SELECT username, password, type FROM userinfo ORDER BY username")
            .unwrap();
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        rows
    }

    #[test]
    fn bootstrap_creates_table_and_admin() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("userinfo.db");
        let db = db.to_str().unwrap();

        bootstrap(&SqliteCredentialStore, &settings(db), Path::new("cesi.yaml")).unwrap();
        assert_eq!(users(db), vec![("admin".to_string(), "hunter2".to_string(), ADMIN_USER_TYPE)]);
    }

    #[test]
    fn bootstrap_twice_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("userinfo.db");
        let db = db.to_str().unwrap();

        bootstrap(&SqliteCredentialStore, &settings(db), Path::new("cesi.yaml")).unwrap();
        bootstrap(&SqliteCredentialStore, &settings(db), Path::new("cesi.yaml")).unwrap();
        assert_eq!(users(db).len(), 1);
        let inserted = SqliteCredentialStore
            .insert_if_absent(db, "admin", "other", ADMIN_USER_TYPE)
            .unwrap();
        assert!(!inserted);
    }

    #[test]
    fn unreachable_database_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("missing").join("userinfo.db");

        let settings = settings(db.to_str().unwrap());
        let err = bootstrap(&SqliteCredentialStore, &settings, Path::new("cesi.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Database { .. }));
    }

    #[test]
    fn statement_failures_are_not_fatal() {
        let store = ReadOnlyCredentials;
        assert!(matches!(store.ensure_schema("userinfo.db"), Err(CredentialError::Statement(_))));

        bootstrap(&store, &settings("userinfo.db"), Path::new("cesi.yaml")).unwrap();
    }

    #[test]
    fn drop_schema_removes_users() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("userinfo.db");
        let db = db.to_str().unwrap();

        bootstrap(&SqliteCredentialStore, &settings(db), Path::new("cesi.yaml")).unwrap();
        SqliteCredentialStore.drop_schema(db).unwrap();
        SqliteCredentialStore.ensure_schema(db).unwrap();
        assert!(users(db).is_empty());
    }
}

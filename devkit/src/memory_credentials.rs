/*!
In-memory credential store

Records the users the kernel seeds, per database name. A database can be
marked unreachable (connect error, fatal for the kernel) or read-only
(statement errors, logged by the kernel).
*/

use cesi_kernel::{CredentialError, CredentialStore};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUser {
    pub password: String,
    pub user_type: i64,
}

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    databases: Mutex<BTreeMap<String, BTreeMap<String, StoredUser>>>,
    unreachable: Mutex<HashSet<String>>,
    read_only: Mutex<HashSet<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unreachable(&self, database: &str, unreachable: bool) {
        let mut set = self.unreachable.lock();
        if unreachable {
            set.insert(database.to_string());
        } else {
            set.remove(database);
        }
    }

    pub fn set_read_only(&self, database: &str, read_only: bool) {
        let mut set = self.read_only.lock();
        if read_only {
            set.insert(database.to_string());
        } else {
            set.remove(database);
        }
    }

    pub fn users(&self, database: &str) -> BTreeMap<String, StoredUser> {
        self.databases.lock().get(database).cloned().unwrap_or_default()
    }

    fn check(&self, database: &str) -> Result<(), CredentialError> {
        if self.unreachable.lock().contains(database) {
            return Err(CredentialError::Connect(rusqlite::Error::InvalidPath(database.into())));
        }
        if self.read_only.lock().contains(database) {
            return Err(CredentialError::Statement(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_READONLY),
                Some("attempt to write a readonly database".into()),
            )));
        }
        Ok(())
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn ensure_schema(&self, database: &str) -> Result<(), CredentialError> {
        self.check(database)?;
        self.databases.lock().entry(database.to_string()).or_default();
        Ok(())
    }

    fn insert_if_absent(
        &self,
        database: &str,
        username: &str,
        password: &str,
        user_type: i64,
    ) -> Result<bool, CredentialError> {
        self.check(database)?;
        let mut databases = self.databases.lock();
        let users = databases.entry(database.to_string()).or_default();
        if users.contains_key(username) {
            return Ok(false);
        }
        users.insert(
            username.to_string(),
            StoredUser { password: password.to_string(), user_type },
        );
        Ok(true)
    }

    fn drop_schema(&self, database: &str) -> Result<(), CredentialError> {
        self.check(database)?;
        self.databases.lock().remove(database);
        Ok(())
    }
}

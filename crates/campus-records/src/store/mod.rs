//! Transactional relational store.
//!
//! Services never touch rows outside a unit of work: `read` hands out a consistent
//! snapshot, `write` runs a closure against a working copy and commits it only when
//! the closure succeeds. Unique constraints live on the row types (see
//! [`Constrained`]) and surface as [`StoreError::UniqueViolation`].

mod table;
mod tables;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub use table::{Constrained, Table, UniqueKey};
pub use tables::{CalendarCursor, Tables};

use crate::records_error::Conflict;

/// Storage failures. Constraint violations are the canonical conflict signal.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint violated: {conflict} ({key})")]
    UniqueViolation { conflict: Conflict, key: String },
    #[error("{entity} {key} not found")]
    RowMissing { entity: &'static str, key: String },
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("snapshot io failed for {path}: {source}")]
    SnapshotIo { path: PathBuf, source: io::Error },
    #[error("snapshot at {path} is not valid: {source}")]
    SnapshotFormat {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Unit-of-work access to the table set.
pub trait Database: Send + Sync {
    fn read<T>(&self, query: impl FnOnce(&Tables) -> T) -> Result<T, StoreError>;

    fn write<T, E>(&self, unit: impl FnOnce(&mut Tables) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>;
}

/// In-process store. Writers are serialised on one lock, which doubles as the
/// row lock taken before inspecting bed availability.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    tables: Mutex<Tables>,
    snapshot_path: Option<PathBuf>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tables(tables: Tables) -> Self {
        Self {
            tables: Mutex::new(tables),
            snapshot_path: None,
        }
    }

    /// Load the snapshot at `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let tables = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|source| StoreError::SnapshotIo {
                path: path.clone(),
                source,
            })?;
            serde_json::from_str(&raw).map_err(|source| StoreError::SnapshotFormat {
                path: path.clone(),
                source,
            })?
        } else {
            Tables::default()
        };

        Ok(Self {
            tables: Mutex::new(tables),
            snapshot_path: Some(path),
        })
    }

    /// Persist the committed state to the snapshot file, if one was opened.
    pub fn save(&self) -> Result<(), StoreError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let payload = self.read(serde_json::to_string_pretty)?.map_err(|source| {
            StoreError::SnapshotFormat {
                path: path.clone(),
                source,
            }
        })?;
        fs::write(path, payload).map_err(|source| StoreError::SnapshotIo {
            path: path.clone(),
            source,
        })
    }

    pub fn snapshot(&self) -> Result<Tables, StoreError> {
        self.read(Tables::clone)
    }
}

impl Database for MemoryDatabase {
    fn read<T>(&self, query: impl FnOnce(&Tables) -> T) -> Result<T, StoreError> {
        let guard = self
            .tables
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))?;
        Ok(query(&guard))
    }

    fn write<T, E>(&self, unit: impl FnOnce(&mut Tables) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let mut guard = self
            .tables
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))?;

        let mut working = guard.clone();
        let value = unit(&mut working)?;
        *guard = working;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{NewUser, User, UserCategory};
    use chrono::{TimeZone, Utc};

    fn user(username: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            national_id: None,
            category: UserCategory::Staff,
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            email: format!("{username}@campus.test"),
            phone: String::new(),
            gender: None,
            date_of_birth: None,
        }
    }

    fn insert(tables: &mut Tables, username: &str) -> Result<(), StoreError> {
        let created_at = Utc.with_ymd_and_hms(2024, 9, 1, 8, 0, 0).unwrap();
        tables
            .users
            .insert_with(|id| User::from_new(id, user(username), created_at))?;
        Ok(())
    }

    #[test]
    fn failed_unit_of_work_rolls_back_every_row() {
        let db = MemoryDatabase::new();
        db.write(|tables| insert(tables, "registrar"))
            .expect("first write commits");

        let result: Result<(), StoreError> = db.write(|tables| {
            insert(tables, "bursar")?;
            insert(tables, "registrar")
        });
        assert!(matches!(result, Err(StoreError::UniqueViolation { .. })));

        let usernames = db
            .read(|tables| {
                tables
                    .users
                    .values()
                    .map(|user| user.username.clone())
                    .collect::<Vec<_>>()
            })
            .expect("read");
        assert_eq!(usernames, vec!["registrar".to_string()]);
    }

    #[test]
    fn snapshot_round_trips_through_the_file_system() {
        let dir = std::env::temp_dir().join(format!("campus-store-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join("snapshot.json");
        let _ = fs::remove_file(&path);

        let db = MemoryDatabase::open(&path).expect("open empty");
        db.write(|tables| insert(tables, "dean")).expect("write");
        db.save().expect("save");

        let reopened = MemoryDatabase::open(&path).expect("reopen");
        let count = reopened.read(|tables| tables.users.len()).expect("read");
        assert_eq!(count, 1);

        let _ = fs::remove_file(&path);
    }
}

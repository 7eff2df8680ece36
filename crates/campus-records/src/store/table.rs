use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::StoreError;
use crate::ids::RowId;
use crate::records_error::Conflict;

/// One named unique key of a row. Rows of the same table collide when they share
/// a key with the same constraint and value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueKey {
    pub conflict: Conflict,
    pub value: String,
}

impl UniqueKey {
    pub fn new(conflict: Conflict, value: impl Into<String>) -> Self {
        Self {
            conflict,
            value: value.into(),
        }
    }
}

/// Rows declare their unique constraints so the table can enforce them on write.
pub trait Constrained {
    const ENTITY: &'static str;

    fn unique_keys(&self) -> Vec<UniqueKey> {
        Vec::new()
    }
}

/// Keyed row storage with its own id sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(
    serialize = "K: Serialize + Ord, V: Serialize",
    deserialize = "K: DeserializeOwned + Ord, V: DeserializeOwned"
))]
pub struct Table<K, V> {
    next_id: u64,
    rows: BTreeMap<K, V>,
}

impl<K, V> Default for Table<K, V> {
    fn default() -> Self {
        Self {
            next_id: 1,
            rows: BTreeMap::new(),
        }
    }
}

impl<K, V> Table<K, V>
where
    K: RowId,
    V: Constrained,
{
    /// Allocate an id, build the row and insert it if no unique key collides.
    pub fn insert_with(&mut self, build: impl FnOnce(K) -> V) -> Result<K, StoreError> {
        let id = K::from_raw(self.next_id);
        let row = build(id);
        self.check_unique(None, &row)?;
        self.next_id += 1;
        self.rows.insert(id, row);
        Ok(id)
    }

    /// Replace a row, re-checking unique keys against every other row.
    pub fn replace(&mut self, id: K, row: V) -> Result<(), StoreError> {
        if !self.rows.contains_key(&id) {
            return Err(StoreError::RowMissing {
                entity: V::ENTITY,
                key: id.raw().to_string(),
            });
        }
        self.check_unique(Some(id), &row)?;
        self.rows.insert(id, row);
        Ok(())
    }

    /// Mutate non-key columns of a row in place.
    pub fn update(&mut self, id: K, apply: impl FnOnce(&mut V)) -> Result<(), StoreError> {
        let row = self.rows.get_mut(&id).ok_or_else(|| StoreError::RowMissing {
            entity: V::ENTITY,
            key: id.raw().to_string(),
        })?;
        apply(row);
        Ok(())
    }

    pub fn fetch(&self, id: K) -> Result<&V, StoreError> {
        self.rows.get(&id).ok_or_else(|| StoreError::RowMissing {
            entity: V::ENTITY,
            key: id.raw().to_string(),
        })
    }

    pub fn get(&self, id: K) -> Option<&V> {
        self.rows.get(&id)
    }

    pub fn remove(&mut self, id: K) -> Option<V> {
        self.rows.remove(&id)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&V) -> bool) -> usize {
        let before = self.rows.len();
        self.rows.retain(|_, row| keep(row));
        before - self.rows.len()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.rows.values()
    }

    pub fn find(&self, mut predicate: impl FnMut(&V) -> bool) -> Option<&V> {
        self.rows.values().find(|row| predicate(*row))
    }

    pub fn filter<'a>(
        &'a self,
        mut predicate: impl FnMut(&V) -> bool + 'a,
    ) -> impl Iterator<Item = &'a V> + 'a {
        self.rows.values().filter(move |row| predicate(*row))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn check_unique(&self, exclude: Option<K>, row: &V) -> Result<(), StoreError> {
        let keys = row.unique_keys();
        if keys.is_empty() {
            return Ok(());
        }

        for (id, existing) in &self.rows {
            if Some(*id) == exclude {
                continue;
            }
            let existing_keys = existing.unique_keys();
            if let Some(key) = keys.iter().find(|key| existing_keys.contains(key)) {
                return Err(StoreError::UniqueViolation {
                    conflict: key.conflict,
                    key: key.value.clone(),
                });
            }
        }

        Ok(())
    }
}

//! Versioned in-memory table shared by every memory repository.

use anyhow::{anyhow, bail, Result};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use shared::{Goal, LedgerEntry, PaymentRequest, Reminder, ReservedHold};

/// A record that can be stored in a [`VersionedTable`]
pub trait Versioned: Clone + Send + Sync {
    fn id(&self) -> &str;
    fn version(&self) -> u64;
    fn set_version(&mut self, version: u64);
}

macro_rules! impl_versioned {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Versioned for $ty {
                fn id(&self) -> &str {
                    &self.id
                }
                fn version(&self) -> u64 {
                    self.version
                }
                fn set_version(&mut self, version: u64) {
                    self.version = version;
                }
            }
        )*
    };
}

impl_versioned!(LedgerEntry, Goal, ReservedHold, PaymentRequest, Reminder);

/// Rows keyed by id. Locks are only held inside each call, never across an await.
pub struct VersionedTable<T> {
    name: &'static str,
    rows: RwLock<HashMap<String, T>>,
}

impl<T: Versioned> VersionedTable<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            rows: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, T>>> {
        self.rows
            .read()
            .map_err(|_| anyhow!("{} table lock poisoned", self.name))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, T>>> {
        self.rows
            .write()
            .map_err(|_| anyhow!("{} table lock poisoned", self.name))
    }

    pub fn insert(&self, row: &T) -> Result<()> {
        let mut rows = self.write()?;
        if rows.contains_key(row.id()) {
            bail!("{} already contains id {}", self.name, row.id());
        }
        rows.insert(row.id().to_string(), row.clone());
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<T>> {
        Ok(self.read()?.get(id).cloned())
    }

    pub fn filter<F>(&self, predicate: F) -> Result<Vec<T>>
    where
        F: Fn(&T) -> bool,
    {
        Ok(self.read()?.values().filter(|r| predicate(r)).cloned().collect())
    }

    /// Swap in `row` if the stored version still matches. `guard` sees the
    /// stored row first and can veto the write with an error.
    pub fn compare_and_swap_with<G>(&self, row: &T, guard: G) -> Result<bool>
    where
        G: FnOnce(&T, &T) -> Result<()>,
    {
        let mut rows = self.write()?;
        let Some(stored) = rows.get_mut(row.id()) else {
            return Ok(false);
        };
        if stored.version() != row.version() {
            return Ok(false);
        }
        guard(stored, row)?;
        let mut next = row.clone();
        next.set_version(row.version() + 1);
        *stored = next;
        Ok(true)
    }

    pub fn compare_and_swap(&self, row: &T) -> Result<bool> {
        self.compare_and_swap_with(row, |_, _| Ok(()))
    }

    pub fn remove(&self, id: &str) -> Result<Option<T>> {
        Ok(self.write()?.remove(id))
    }
}

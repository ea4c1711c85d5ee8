//! # Memory Ledger Repository
//!
//! Ledger entries keyed by id. Stored amount and kind are frozen: an update
//! that tries to change either is refused, only the share list may move.

use anyhow::{bail, Result};
use async_trait::async_trait;
use tracing::debug;

use shared::LedgerEntry;

use super::connection::MemoryConnection;
use crate::storage::traits::LedgerStorage;

#[derive(Clone)]
pub struct LedgerRepository {
    connection: MemoryConnection,
}

impl LedgerRepository {
    pub fn new(connection: MemoryConnection) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl LedgerStorage for LedgerRepository {
    async fn store_entry(&self, entry: &LedgerEntry) -> Result<()> {
        debug!("Storing ledger entry {} for {}", entry.id, entry.owner);
        self.connection.tables().ledger.insert(entry)
    }

    async fn get_entry(&self, entry_id: &str) -> Result<Option<LedgerEntry>> {
        self.connection.tables().ledger.get(entry_id)
    }

    async fn list_entries(&self, owner: &str) -> Result<Vec<LedgerEntry>> {
        self.connection.tables().ledger.filter(|e| e.owner == owner)
    }

    async fn update_entry(&self, entry: &LedgerEntry) -> Result<bool> {
        self.connection
            .tables()
            .ledger
            .compare_and_swap_with(entry, |stored, next| {
                if stored.amount != next.amount || stored.kind != next.kind {
                    bail!("ledger entry {} is immutable: amount and kind cannot change", stored.id);
                }
                if stored.owner != next.owner {
                    bail!("ledger entry {} cannot change owner", stored.id);
                }
                Ok(())
            })
    }

    async fn delete_entry(&self, entry_id: &str) -> Result<Option<LedgerEntry>> {
        self.connection.tables().ledger.remove(entry_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use shared::EntryKind;

    fn entry(owner: &str) -> LedgerEntry {
        LedgerEntry {
            id: LedgerEntry::generate_id(),
            owner: owner.to_string(),
            title: "Groceries".to_string(),
            amount: dec!(42.10),
            kind: EntryKind::Expense,
            category: "Food".to_string(),
            occurred_at: Utc::now(),
            group_id: None,
            shares: Vec::new(),
            notes: None,
            origin: None,
            version: 0,
        }
    }

    #[tokio::test]
    async fn test_list_entries_is_scoped_to_owner() {
        let repo = LedgerRepository::new(MemoryConnection::new());
        repo.store_entry(&entry("alice")).await.unwrap();
        repo.store_entry(&entry("alice")).await.unwrap();
        repo.store_entry(&entry("bob")).await.unwrap();

        assert_eq!(repo.list_entries("alice").await.unwrap().len(), 2);
        assert_eq!(repo.list_entries("bob").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_refuses_amount_change() {
        let repo = LedgerRepository::new(MemoryConnection::new());
        let mut e = entry("alice");
        repo.store_entry(&e).await.unwrap();

        e.amount = dec!(1);
        assert!(repo.update_entry(&e).await.is_err());

        let stored = repo.get_entry(&e.id).await.unwrap().unwrap();
        assert_eq!(stored.amount, dec!(42.10));
        assert_eq!(stored.version, 0);
    }

    #[tokio::test]
    async fn test_stale_copy_loses_the_update() {
        let repo = LedgerRepository::new(MemoryConnection::new());
        let e = entry("alice");
        repo.store_entry(&e).await.unwrap();

        let mut first = repo.get_entry(&e.id).await.unwrap().unwrap();
        let mut second = repo.get_entry(&e.id).await.unwrap().unwrap();
        first.notes = Some("first".to_string());
        second.notes = Some("second".to_string());

        assert!(repo.update_entry(&first).await.unwrap());
        assert!(!repo.update_entry(&second).await.unwrap());

        let stored = repo.get_entry(&e.id).await.unwrap().unwrap();
        assert_eq!(stored.notes.as_deref(), Some("first"));
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn test_delete_returns_removed_entry() {
        let repo = LedgerRepository::new(MemoryConnection::new());
        let e = entry("alice");
        repo.store_entry(&e).await.unwrap();

        let removed = repo.delete_entry(&e.id).await.unwrap();
        assert_eq!(removed.map(|r| r.id), Some(e.id.clone()));
        assert!(repo.delete_entry(&e.id).await.unwrap().is_none());
    }
}

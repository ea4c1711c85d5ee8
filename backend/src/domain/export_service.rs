//! Export service domain logic for the ledger engine.
//!
//! Writes an owner's ledger to a CSV file, oldest entry first, so it can be
//! reconciled outside the app.

use anyhow::Context;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use shared::LedgerEntry;

use super::errors::LedgerResult;
use super::validation::validate_owner;
use crate::storage::{Connection, LedgerStorage};

/// One CSV row; field order is the column order
#[derive(Debug, Serialize)]
struct LedgerCsvRow<'a> {
    id: &'a str,
    occurred_at: String,
    title: &'a str,
    kind: String,
    category: &'a str,
    amount: String,
    group_id: &'a str,
    origin: String,
}

impl<'a> From<&'a LedgerEntry> for LedgerCsvRow<'a> {
    fn from(entry: &'a LedgerEntry) -> Self {
        Self {
            id: &entry.id,
            occurred_at: entry.occurred_at.to_rfc3339(),
            title: &entry.title,
            kind: entry.kind.to_string(),
            category: &entry.category,
            amount: format!("{:.2}", entry.amount),
            group_id: entry.group_id.as_deref().unwrap_or(""),
            origin: entry.origin.as_ref().map(ToString::to_string).unwrap_or_default(),
        }
    }
}

/// Export service that handles all export-related business logic
#[derive(Clone)]
pub struct ExportService<C: Connection> {
    ledger_repository: C::LedgerRepository,
}

impl<C: Connection> ExportService<C> {
    pub fn new(connection: Arc<C>) -> Self {
        Self {
            ledger_repository: connection.create_ledger_repository(),
        }
    }

    /// Write the owner's ledger to `path` and return the number of rows written
    pub async fn export_ledger_csv(&self, owner: &str, path: &Path) -> LedgerResult<usize> {
        validate_owner(owner)?;
        info!("📄 EXPORT: Exporting ledger for {} to {}", owner, path.display());

        let mut entries = self.ledger_repository.list_entries(owner).await?;
        entries.sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at).then_with(|| a.id.cmp(&b.id)));

        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create export file {}", path.display()))?;
        for entry in &entries {
            writer
                .serialize(LedgerCsvRow::from(entry))
                .with_context(|| format!("Failed to write entry {}", entry.id))?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to flush export file {}", path.display()))?;

        info!("✅ EXPORT: Wrote {} entries for {}", entries.len(), owner);
        Ok(entries.len())
    }
}

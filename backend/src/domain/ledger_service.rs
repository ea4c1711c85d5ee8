//! Ledger service: the only write path for balance-affecting facts.
//!
//! Every other service that moves money (settling a share, funding a goal,
//! issuing or settling a payment request) appends through [`LedgerService::append`]
//! instead of touching a stored balance. The balance is always re-derived
//! from the entries.
//!
//! ## Business Rules
//!
//! - Amounts are positive with at most two decimal places
//! - Titles and categories are 1-256 characters
//! - Shares only exist on expense entries and never add up to more than
//!   the entry amount
//! - Removing an entry deactivates the reminders of its shares

use std::collections::HashSet;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::info;

use shared::{CreateLedgerEntryRequest, EntryKind, LedgerEntry, LedgerFilter, Share, ShareStatus};

use super::clock::Clock;
use super::commands::AppendEntryCommand;
use super::errors::{LedgerError, LedgerResult};
use super::reminder_lifecycle::{retire_reminders, Retirement};
use super::validation::{validate_amount, validate_owner, validate_text};
use crate::storage::{Connection, LedgerStorage};

#[derive(Clone)]
pub struct LedgerService<C: Connection> {
    ledger_repository: C::LedgerRepository,
    reminder_repository: C::ReminderRepository,
    clock: Arc<dyn Clock>,
}

impl<C: Connection> LedgerService<C> {
    pub fn new(connection: Arc<C>, clock: Arc<dyn Clock>) -> Self {
        Self {
            ledger_repository: connection.create_ledger_repository(),
            reminder_repository: connection.create_reminder_repository(),
            clock,
        }
    }

    /// Validate and store a new entry
    pub async fn append(&self, command: AppendEntryCommand) -> LedgerResult<LedgerEntry> {
        validate_owner(&command.owner)?;
        let title = validate_text("Title", &command.title)?;
        let category = validate_text("Category", &command.category)?;
        validate_amount("Amount", command.amount)?;
        validate_shares(command.kind, command.amount, &command.shares)?;

        let entry = LedgerEntry {
            id: LedgerEntry::generate_id(),
            owner: command.owner,
            title,
            amount: command.amount,
            kind: command.kind,
            category,
            occurred_at: command.occurred_at.unwrap_or_else(|| self.clock.now()),
            group_id: command.group_id,
            shares: command.shares,
            notes: command.notes,
            origin: command.origin,
            version: 0,
        };

        self.ledger_repository.store_entry(&entry).await?;
        info!(
            "Appended {} entry {} for {}: {} ({})",
            entry.kind, entry.id, entry.owner, entry.amount, entry.category
        );
        Ok(entry)
    }

    /// Record a plain income or expense entered by the owner
    pub async fn create_entry(
        &self,
        owner: &str,
        request: CreateLedgerEntryRequest,
    ) -> LedgerResult<LedgerEntry> {
        self.append(AppendEntryCommand {
            owner: owner.to_string(),
            title: request.title,
            amount: request.amount,
            kind: request.kind,
            category: request.category,
            occurred_at: request.occurred_at,
            group_id: request.group_id,
            shares: Vec::new(),
            notes: request.notes,
            origin: None,
        })
        .await
    }

    pub async fn get_entry(&self, owner: &str, entry_id: &str) -> LedgerResult<LedgerEntry> {
        let entry = self
            .ledger_repository
            .get_entry(entry_id)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("ledger entry {}", entry_id)))?;
        ensure_owner(owner, &entry)?;
        Ok(entry)
    }

    /// Entries of one owner matching `filter`, newest first
    pub async fn list_entries(
        &self,
        owner: &str,
        filter: &LedgerFilter,
    ) -> LedgerResult<Vec<LedgerEntry>> {
        let mut entries: Vec<LedgerEntry> = self
            .ledger_repository
            .list_entries(owner)
            .await?
            .into_iter()
            .filter(|e| filter.matches(e))
            .collect();

        entries.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at).then_with(|| b.id.cmp(&a.id)));
        if let Some(limit) = filter.limit {
            entries.truncate(limit);
        }
        Ok(entries)
    }

    /// Remove an entry and deactivate every reminder derived from its shares
    pub async fn remove(&self, owner: &str, entry_id: &str) -> LedgerResult<LedgerEntry> {
        let entry = self.get_entry(owner, entry_id).await?;

        let deactivated = retire_reminders(
            &self.reminder_repository,
            entry_id,
            None,
            Retirement::EntryDeleted,
            self.clock.now(),
        )
        .await?;

        let removed = self
            .ledger_repository
            .delete_entry(entry_id)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("ledger entry {}", entry_id)))?;

        info!(
            "Removed entry {} for {} ({} reminders deactivated)",
            entry.id, owner, deactivated
        );
        Ok(removed)
    }

    pub(crate) fn repository(&self) -> &C::LedgerRepository {
        &self.ledger_repository
    }
}

pub(crate) fn ensure_owner(owner: &str, entry: &LedgerEntry) -> LedgerResult<()> {
    if entry.owner != owner {
        return Err(LedgerError::Unauthorized(format!(
            "ledger entry {} does not belong to {}",
            entry.id, owner
        )));
    }
    Ok(())
}

fn validate_shares(kind: EntryKind, amount: Decimal, shares: &[Share]) -> LedgerResult<()> {
    if shares.is_empty() {
        return Ok(());
    }
    if kind != EntryKind::Expense {
        return Err(LedgerError::validation("Only expense entries can be split into shares"));
    }

    let mut ids = HashSet::new();
    let mut total = Decimal::ZERO;
    for share in shares {
        if !ids.insert(share.id.as_str()) {
            return Err(LedgerError::validation(format!("Duplicate share id {}", share.id)));
        }
        validate_amount("Share amount", share.amount_owed)?;
        if share.amount_owed > amount {
            return Err(LedgerError::validation(format!(
                "Share {} owes {} which exceeds the entry amount {}",
                share.id, share.amount_owed, amount
            )));
        }
        if (share.status == ShareStatus::Paid) != share.paid_at.is_some() {
            return Err(LedgerError::validation(format!(
                "Share {} must have a payment time exactly when paid",
                share.id
            )));
        }
        total += share.amount_owed;
    }

    if total > amount {
        return Err(LedgerError::validation(format!(
            "Shares add up to {} which exceeds the entry amount {}",
            total, amount
        )));
    }
    Ok(())
}

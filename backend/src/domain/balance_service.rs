//! Balance projection for the ledger engine.
//!
//! Nothing here writes. The snapshot is rebuilt from raw ledger entries on
//! every call, then adjusted for reserved holds; pending friend-shares are
//! reported next to it without changing the usable figure.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::debug;

use shared::{BalanceSnapshot, EntryKind, LedgerEntry};

use super::errors::LedgerResult;
use super::reserved_fund_service::reserved_total;
use crate::storage::{Connection, LedgerStorage, ReservedHoldStorage};

/// Service responsible for balance calculations
#[derive(Clone)]
pub struct BalanceService<C: Connection> {
    ledger_repository: C::LedgerRepository,
    hold_repository: C::ReservedHoldRepository,
}

impl<C: Connection> BalanceService<C> {
    pub fn new(connection: Arc<C>) -> Self {
        Self {
            ledger_repository: connection.create_ledger_repository(),
            hold_repository: connection.create_reserved_hold_repository(),
        }
    }

    /// Compute income, expenses, balance, reserved and usable balance for `owner`
    pub async fn project_balance(&self, owner: &str) -> LedgerResult<BalanceSnapshot> {
        let entries = self.ledger_repository.list_entries(owner).await?;
        let holds = self.hold_repository.list_holds(owner).await?;

        let (income, expenses) = ledger_totals(&entries);
        let pending_shares = entries.iter().map(LedgerEntry::pending_shares_total).sum();
        let reserved = reserved_total(&holds);
        let balance = income - expenses;

        debug!(
            "Balance for {}: income={} expenses={} reserved={} over {} entries",
            owner,
            income,
            expenses,
            reserved,
            entries.len()
        );

        Ok(BalanceSnapshot {
            owner: owner.to_string(),
            income,
            expenses,
            balance,
            reserved,
            usable_balance: balance - reserved,
            pending_shares,
        })
    }
}

/// Sum of income and sum of expense amounts, in that order
pub fn ledger_totals(entries: &[LedgerEntry]) -> (Decimal, Decimal) {
    entries
        .iter()
        .fold((Decimal::ZERO, Decimal::ZERO), |(income, expenses), e| match e.kind {
            EntryKind::Income => (income + e.amount, expenses),
            EntryKind::Expense => (income, expenses + e.amount),
        })
}
